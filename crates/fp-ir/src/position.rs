//! Playback position and loop policy.

use crate::song::Song;

/// What happens when playback reaches the end of a pattern or the song.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoopMode {
    /// Stop after the last note of the last pattern.
    None = 0,
    /// Wrap to the first pattern.
    #[default]
    Song = 1,
    /// Repeat the current pattern forever.
    Pattern = 2,
}

impl LoopMode {
    /// Decode a value produced by `as u8`. Unknown values fall back to `Song`.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => LoopMode::None,
            2 => LoopMode::Pattern,
            _ => LoopMode::Song,
        }
    }
}

/// Current position of the playback cursor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackPosition {
    /// Song position (index into the pattern sequence)
    pub pattern: u16,
    /// Note within the pattern
    pub note: u16,
    /// Absolute note frame: pattern * pattern_length + note
    pub frame: u32,
    /// Tempo accumulator (16.8 fixed point)
    pub tempo_counter: i32,
}

impl PlaybackPosition {
    /// The song start.
    pub const fn start() -> Self {
        Self { pattern: 0, note: 0, frame: 0, tempo_counter: 0 }
    }

    /// Position of an absolute note frame, clamped to the song.
    pub fn at_frame(song: &Song, frame: u32) -> Self {
        if song.pattern_length == 0 || song.length == 0 {
            return Self::start();
        }
        let frame = frame.min(song.frame_count() - 1);
        let pattern_length = song.pattern_length as u32;
        Self {
            pattern: (frame / pattern_length) as u16,
            note: (frame % pattern_length) as u16,
            frame,
            tempo_counter: 0,
        }
    }
}

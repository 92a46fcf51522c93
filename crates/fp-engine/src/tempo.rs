//! Fixed-point tempo accumulator.
//!
//! Once per video frame the song tempo is added to a 16.8 fixed-point
//! counter scaled by 256/150 (NTSC). Whenever the integer part reaches the
//! current speed, one note's worth of time is subtracted and the playback
//! cursor moves to the next note. Fractional tempo/speed ratios therefore
//! accumulate error across frames instead of rounding every frame.

use fp_ir::{LoopMode, PlaybackPosition, Song};

/// Outcome of advancing the tempo by one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TempoTick {
    /// Time advanced but the cursor stayed on the same note.
    Waiting,
    /// The cursor moved to a new note.
    Advanced,
    /// The last note of the last pattern was passed under `LoopMode::None`.
    Finished,
}

impl TempoTick {
    /// False only once playback has reached its terminal state.
    pub const fn is_running(self) -> bool {
        !matches!(self, TempoTick::Finished)
    }

    /// True when the cursor moved to a new note this frame.
    pub const fn advanced(self) -> bool {
        matches!(self, TempoTick::Advanced)
    }
}

/// Advance `pos` by exactly one video frame.
///
/// `speed` is the frames-per-note divisor currently in effect and must be
/// non-zero for the cursor to ever hold on a note.
pub fn advance_tempo(
    song: &Song,
    speed: u8,
    loop_mode: LoopMode,
    pos: &mut PlaybackPosition,
) -> TempoTick {
    pos.tempo_counter += song.tempo as i32 * 256 / 150;

    if (pos.tempo_counter >> 8) < speed as i32 {
        return TempoTick::Waiting;
    }

    pos.tempo_counter -= (speed as i32) << 8;

    pos.note += 1;
    if pos.note == song.pattern_length {
        pos.note = 0;

        if loop_mode != LoopMode::Pattern {
            pos.pattern += 1;
            if pos.pattern == song.length {
                if loop_mode == LoopMode::None {
                    return TempoTick::Finished;
                }
                pos.pattern = 0;
            }
        }
    }

    pos.frame = pos.pattern as u32 * song.pattern_length as u32 + pos.note as u32;
    TempoTick::Advanced
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn song(tempo: u16, pattern_length: u16, length: u16) -> Song {
        let mut song = Song::new("tempo", pattern_length, length);
        song.tempo = tempo;
        song
    }

    fn run(song: &Song, speed: u8, mode: LoopMode, ticks: usize) -> Vec<(u16, u16, u32, TempoTick)> {
        let mut pos = PlaybackPosition::start();
        (0..ticks)
            .map(|_| {
                let tick = advance_tempo(song, speed, mode, &mut pos);
                (pos.pattern, pos.note, pos.frame, tick)
            })
            .collect()
    }

    #[test]
    fn worked_example_advances_every_fourth_tick() {
        let song = song(150, 16, 8);
        let mut pos = PlaybackPosition::start();

        for _ in 0..3 {
            assert_eq!(advance_tempo(&song, 4, LoopMode::Song, &mut pos), TempoTick::Waiting);
        }
        assert_eq!(pos.tempo_counter, 768);

        assert_eq!(advance_tempo(&song, 4, LoopMode::Song, &mut pos), TempoTick::Advanced);
        assert_eq!(pos.tempo_counter, 0);
        assert_eq!((pos.pattern, pos.note, pos.frame), (0, 1, 1));
    }

    #[test]
    fn worked_example_pattern_and_song_wrap() {
        let song = song(150, 16, 8);
        let mut pos = PlaybackPosition::start();

        for _ in 0..64 {
            advance_tempo(&song, 4, LoopMode::Song, &mut pos);
        }
        assert_eq!((pos.pattern, pos.note, pos.frame), (1, 0, 16));

        for _ in 64..512 {
            assert!(advance_tempo(&song, 4, LoopMode::Song, &mut pos).is_running());
        }
        assert_eq!((pos.pattern, pos.note, pos.frame), (0, 0, 0));
    }

    #[test]
    fn sequence_is_deterministic() {
        let song = song(125, 12, 3);
        for mode in [LoopMode::None, LoopMode::Song, LoopMode::Pattern] {
            assert_eq!(run(&song, 5, mode, 400), run(&song, 5, mode, 400));
        }
    }

    #[test]
    fn fractional_tempo_accumulates() {
        // 160 * 256 / 150 = 273 per tick against a threshold of 6 << 8 = 1536:
        // tick 6 reaches 1638 (102 left over), tick 12 reaches 102 + 6 * 273.
        let song = song(160, 64, 1);
        let advanced: Vec<usize> = run(&song, 6, LoopMode::Song, 12)
            .iter()
            .enumerate()
            .filter(|(_, s)| s.3.advanced())
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(advanced, [6, 12]);
    }

    #[test]
    fn loop_none_finishes_exactly_once_at_last_note() {
        let song = song(150, 4, 3);
        let mut pos = PlaybackPosition::start();
        let mut ticks = 0;

        loop {
            let before = pos;
            let tick = advance_tempo(&song, 2, LoopMode::None, &mut pos);
            ticks += 1;
            if !tick.is_running() {
                assert_eq!(before.pattern, song.length - 1);
                assert_eq!(before.note, song.pattern_length - 1);
                break;
            }
            assert!(ticks < 1000, "never finished");
        }

        // 12 notes at 2 frames each; the 12th advance is the terminal one.
        assert_eq!(ticks, 24);
    }

    #[test]
    fn loop_song_never_terminates() {
        let song = song(150, 4, 2);
        let steps = run(&song, 1, LoopMode::Song, 1000);
        assert!(steps.iter().all(|s| s.3.is_running()));
        assert!(steps.iter().all(|s| s.0 < song.length));
        assert_eq!(steps[7].0, 0, "pattern wraps after the last one");
    }

    #[test]
    fn loop_pattern_freezes_pattern_index() {
        let song = song(150, 4, 2);
        let mut pos = PlaybackPosition::at_frame(&song, 5);
        for _ in 0..1000 {
            let tick = advance_tempo(&song, 3, LoopMode::Pattern, &mut pos);
            assert!(tick.is_running());
            assert_eq!(pos.pattern, 1);
            assert!(pos.note < song.pattern_length);
        }
    }

    #[test]
    fn waiting_tick_leaves_position_alone() {
        let song = song(150, 16, 8);
        let mut pos = PlaybackPosition::at_frame(&song, 20);
        let tick = advance_tempo(&song, 6, LoopMode::Song, &mut pos);
        assert_eq!(tick, TempoTick::Waiting);
        assert!(!tick.advanced());
        assert_eq!((pos.pattern, pos.note, pos.frame), (1, 4, 20));
    }
}

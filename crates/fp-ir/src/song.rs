//! Song structure and per-channel sequencing.

use alloc::vec;
use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::channel::ChannelType;
use crate::pattern::{Note, Pattern};

/// A complete song.
#[derive(Clone, Debug)]
pub struct Song {
    /// Song name
    pub name: ArrayString<32>,
    /// Tempo in NTSC tempo units (150 = one tempo step per frame)
    pub tempo: u16,
    /// Initial speed (frames-per-note divisor)
    pub speed: u8,
    /// Notes per pattern
    pub pattern_length: u16,
    /// Number of patterns in the song sequence
    pub length: u16,
    /// One track per channel type, in canonical order
    pub channels: Vec<ChannelTrack>,
}

impl Song {
    /// Create an empty song with the default tempo (150) and speed (6).
    pub fn new(name: &str, pattern_length: u16, length: u16) -> Self {
        let mut title = ArrayString::new();
        let _ = title.try_push_str(name);
        Self {
            name: title,
            tempo: 150,
            speed: 6,
            pattern_length,
            length,
            channels: ChannelType::ALL
                .iter()
                .map(|&ty| ChannelTrack::new(ty, length))
                .collect(),
        }
    }

    /// Track for a channel type.
    pub fn track(&self, channel: ChannelType) -> &ChannelTrack {
        &self.channels[channel.index()]
    }

    /// Mutable track for a channel type.
    pub fn track_mut(&mut self, channel: ChannelType) -> &mut ChannelTrack {
        &mut self.channels[channel.index()]
    }

    /// Note played by `channel` at song position (`pattern`, `note`).
    pub fn note_at(&self, channel: ChannelType, pattern: u16, note: u16) -> Note {
        self.track(channel).note_at(pattern, note)
    }

    /// Total number of note frames in the song.
    pub fn frame_count(&self) -> u32 {
        self.length as u32 * self.pattern_length as u32
    }
}

/// A channel's pattern pool and its placement in the song sequence.
#[derive(Clone, Debug)]
pub struct ChannelTrack {
    pub channel_type: ChannelType,
    /// Pool of patterns owned by this channel
    pub patterns: Vec<Pattern>,
    /// Pattern played at each song position (`None` = silent)
    pub instances: Vec<Option<u16>>,
}

impl ChannelTrack {
    /// Create a track with `length` empty song positions.
    pub fn new(channel_type: ChannelType, length: u16) -> Self {
        Self {
            channel_type,
            patterns: Vec::new(),
            instances: vec![None; length as usize],
        }
    }

    /// Add a pattern to the pool, returning its index.
    pub fn add_pattern(&mut self, pattern: Pattern) -> u16 {
        self.patterns.push(pattern);
        (self.patterns.len() - 1) as u16
    }

    /// Place pool pattern `index` at song position `position`.
    ///
    /// Positions past the end of the song are ignored.
    pub fn set_instance(&mut self, position: u16, index: u16) {
        if let Some(slot) = self.instances.get_mut(position as usize) {
            *slot = Some(index);
        }
    }

    /// Pattern placed at a song position, if any.
    pub fn pattern_at(&self, position: u16) -> Option<&Pattern> {
        let idx = (*self.instances.get(position as usize)?)?;
        self.patterns.get(idx as usize)
    }

    /// Note at a song position; missing patterns read as empty.
    pub fn note_at(&self, position: u16, note: u16) -> Note {
        self.pattern_at(position)
            .map(|p| p.note(note))
            .unwrap_or_default()
    }
}

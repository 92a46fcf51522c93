//! Pattern and note types.

use alloc::vec;
use alloc::vec::Vec;

/// Note value that silences the channel.
pub const NOTE_STOP: u8 = 0xFF;

/// Highest musical note value (B7). Value 1 is C0.
pub const NOTE_MAX: u8 = 96;

/// A single note slot in a pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Note {
    /// 0 = empty, 1..=NOTE_MAX = musical note, NOTE_STOP = stop
    pub value: u8,
    /// Channel volume (0-15), sticky until the next volume change
    pub volume: Option<u8>,
    /// Speed effect: new frames-per-note divisor from this note on
    pub speed: Option<u8>,
}

impl Note {
    /// An empty slot.
    pub const fn empty() -> Self {
        Self { value: 0, volume: None, speed: None }
    }

    /// A musical note.
    pub const fn on(value: u8) -> Self {
        Self { value, volume: None, speed: None }
    }

    /// A stop note.
    pub const fn stop() -> Self {
        Self { value: NOTE_STOP, volume: None, speed: None }
    }

    /// Builder: attach a volume change.
    pub const fn with_volume(mut self, volume: u8) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Builder: attach a speed effect.
    pub const fn with_speed(mut self, speed: u8) -> Self {
        self.speed = Some(speed);
        self
    }

    pub const fn is_musical(&self) -> bool {
        self.value >= 1 && self.value <= NOTE_MAX
    }

    pub const fn is_stop(&self) -> bool {
        self.value == NOTE_STOP
    }

    /// Returns true if the slot carries nothing at all.
    pub const fn is_empty(&self) -> bool {
        self.value == 0 && self.volume.is_none() && self.speed.is_none()
    }
}

/// One channel's notes for one pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    pub notes: Vec<Note>,
}

impl Pattern {
    /// Create an empty pattern of `length` notes.
    pub fn new(length: u16) -> Self {
        Self { notes: vec![Note::empty(); length as usize] }
    }

    /// Get a note; out-of-range indices read as empty.
    pub fn note(&self, index: u16) -> Note {
        self.notes.get(index as usize).copied().unwrap_or_default()
    }

    /// Get a mutable note slot.
    ///
    /// Panics if `index` is out of range.
    pub fn note_mut(&mut self, index: u16) -> &mut Note {
        &mut self.notes[index as usize]
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.iter().all(Note::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_kinds() {
        assert!(Note::on(1).is_musical());
        assert!(Note::on(NOTE_MAX).is_musical());
        assert!(!Note::on(NOTE_MAX + 1).is_musical());
        assert!(Note::stop().is_stop());
        assert!(Note::empty().is_empty());
        assert!(!Note::empty().with_volume(3).is_empty());
    }

    #[test]
    fn out_of_range_reads_are_empty() {
        let pat = Pattern::new(4);
        assert_eq!(pat.note(100), Note::empty());
    }

    #[test]
    fn pattern_with_note_is_not_empty() {
        let mut pat = Pattern::new(4);
        assert!(pat.is_empty());
        *pat.note_mut(2) = Note::on(40);
        assert!(!pat.is_empty());
        assert_eq!(pat.note(2).value, 40);
    }
}

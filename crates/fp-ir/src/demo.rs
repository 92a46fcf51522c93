//! Built-in demo project.
//!
//! A short VRC6 song that puts a note on every channel type, used by the
//! command-line player and by the integration tests.

use alloc::vec::Vec;

use crate::channel::{ChannelType, ExpansionAudio};
use crate::pattern::{Note, Pattern};
use crate::project::{DpcmSample, Project};
use crate::song::Song;

/// Notes per pattern in the demo song.
pub const DEMO_PATTERN_LENGTH: u16 = 16;

/// Patterns in the demo song.
pub const DEMO_LENGTH: u16 = 4;

/// Note value for `octave` and `semitone` (C0 = 1).
pub const fn note_value(octave: u8, semitone: u8) -> u8 {
    octave * 12 + semitone + 1
}

/// Build the demo project.
pub fn demo_project() -> Project {
    let mut project = Project::new(ExpansionAudio::Vrc6);
    project.dpcm_samples.push(DpcmSample::new("kick", kick_sample()));
    project.songs.push(demo_song());
    project
}

fn demo_song() -> Song {
    let mut song = Song::new("Demo", DEMO_PATTERN_LENGTH, DEMO_LENGTH);

    // C minor arpeggio, one pattern reused for the whole song.
    let arp = [0u8, 3, 7, 12];
    let mut lead = Pattern::new(DEMO_PATTERN_LENGTH);
    for i in 0..DEMO_PATTERN_LENGTH {
        *lead.note_mut(i) = Note::on(note_value(4, arp[i as usize % 4]));
    }
    lead.note_mut(0).volume = Some(10);
    place_everywhere(&mut song, ChannelType::Square1, lead);

    // Slow counter-melody under the arpeggio.
    let mut counter = Pattern::new(DEMO_PATTERN_LENGTH);
    *counter.note_mut(0) = Note::on(note_value(3, 7)).with_volume(5);
    *counter.note_mut(4) = Note::on(note_value(3, 8));
    *counter.note_mut(8) = Note::on(note_value(3, 10));
    *counter.note_mut(12) = Note::on(note_value(3, 7));
    place_everywhere(&mut song, ChannelType::Square2, counter);

    let mut bass = Pattern::new(DEMO_PATTERN_LENGTH);
    *bass.note_mut(0) = Note::on(note_value(2, 0));
    *bass.note_mut(8) = Note::on(note_value(2, 7));
    *bass.note_mut(14) = Note::stop();
    place_everywhere(&mut song, ChannelType::Triangle, bass);

    let mut hats = Pattern::new(DEMO_PATTERN_LENGTH);
    for i in (2..DEMO_PATTERN_LENGTH).step_by(4) {
        *hats.note_mut(i) = Note::on(note_value(0, 12)).with_volume(6);
        *hats.note_mut(i + 1) = Note::stop();
    }
    place_everywhere(&mut song, ChannelType::Noise, hats);

    let mut kick = Pattern::new(DEMO_PATTERN_LENGTH);
    *kick.note_mut(0) = Note::on(1);
    *kick.note_mut(8) = Note::on(1);
    place_everywhere(&mut song, ChannelType::Dpcm, kick);

    let mut harmony = Pattern::new(DEMO_PATTERN_LENGTH);
    *harmony.note_mut(0) = Note::on(note_value(3, 3)).with_volume(8);
    *harmony.note_mut(8) = Note::on(note_value(3, 2));
    place_range(&mut song, ChannelType::Vrc6Square1, harmony, 1..DEMO_LENGTH);

    let mut fifth = Pattern::new(DEMO_PATTERN_LENGTH);
    *fifth.note_mut(0) = Note::on(note_value(3, 7)).with_volume(8);
    *fifth.note_mut(8) = Note::on(note_value(3, 5));
    place_range(&mut song, ChannelType::Vrc6Square2, fifth, 1..DEMO_LENGTH);

    let mut saw = Pattern::new(DEMO_PATTERN_LENGTH);
    *saw.note_mut(0) = Note::on(note_value(5, 0)).with_volume(12).with_speed(5);
    *saw.note_mut(4) = Note::on(note_value(4, 10));
    *saw.note_mut(8) = Note::on(note_value(4, 7));
    *saw.note_mut(12) = Note::stop();
    place_range(&mut song, ChannelType::Vrc6Saw, saw, 2..DEMO_LENGTH);

    song
}

fn place_everywhere(song: &mut Song, channel: ChannelType, pattern: Pattern) {
    place_range(song, channel, pattern, 0..DEMO_LENGTH);
}

fn place_range(
    song: &mut Song,
    channel: ChannelType,
    pattern: Pattern,
    positions: core::ops::Range<u16>,
) {
    let track = song.track_mut(channel);
    let idx = track.add_pattern(pattern);
    for position in positions {
        track.set_instance(position, idx);
    }
}

/// A falling 1-bit delta ramp: a crude kick drum.
fn kick_sample() -> Vec<u8> {
    let mut data = Vec::with_capacity(65);
    data.extend(core::iter::repeat(0xFF).take(8));
    data.extend(core::iter::repeat(0x00).take(24));
    data.extend(core::iter::repeat(0x55).take(33));
    data
}

//! Per-frame song driver and offline rendering.

use std::sync::Arc;

use fp_engine::{
    advance_tempo, create_channel_states, nes_apu_expansion, Apu, ChannelStates, DmcReadFn,
    TempoTick,
};
use fp_ir::{LoopMode, PlaybackPosition, Project, Song, DPCM_BASE_ADDRESS};
use parking_lot::RwLock;

use crate::{PlayerError, SAMPLE_RATE};

/// Value read from DPCM memory outside any sample.
const DPCM_FILL: u8 = 0x55;

/// Drives one song through the channel states, one video frame per step.
pub struct SongCursor {
    song: Song,
    channels: ChannelStates,
    position: PlaybackPosition,
    speed: u8,
    started: bool,
}

impl SongCursor {
    /// Position the cursor on `frame` of `song`; the first step plays that note.
    pub fn new(song: Song, channels: ChannelStates, frame: u32) -> Self {
        let position = PlaybackPosition::at_frame(&song, frame);
        let speed = song.speed;
        Self { song, channels, position, speed, started: false }
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn position(&self) -> PlaybackPosition {
        self.position
    }

    /// Speed currently in effect (frames per note).
    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn channels(&self) -> &ChannelStates {
        &self.channels
    }

    /// Render one frame into `apu`.
    ///
    /// Returns false once the song has finished; nothing is written to the
    /// core on that call.
    pub fn step<A: Apu + ?Sized>(&mut self, apu: &mut A, loop_mode: LoopMode) -> bool {
        if !self.started {
            self.started = true;
            self.trigger_notes();
        } else {
            match advance_tempo(&self.song, self.speed, loop_mode, &mut self.position) {
                TempoTick::Finished => return false,
                TempoTick::Advanced => self.trigger_notes(),
                TempoTick::Waiting => {}
            }
        }

        for channel in self.channels.iter_mut() {
            channel.update_apu(apu);
        }
        apu.end_frame();
        true
    }

    fn trigger_notes(&mut self) {
        let (pattern, note) = (self.position.pattern, self.position.note);
        for channel in self.channels.iter_mut() {
            if let Some(speed) = channel.advance(&self.song, pattern, note) {
                self.speed = speed;
            }
        }
    }
}

fn dpcm_byte(memory: &[u8], addr: u16) -> u8 {
    memory
        .get(addr.wrapping_sub(DPCM_BASE_ADDRESS) as usize)
        .copied()
        .unwrap_or(DPCM_FILL)
}

/// DMC read callback over a project's DPCM memory image.
pub fn dpcm_reader(memory: Arc<Vec<u8>>) -> DmcReadFn {
    Arc::new(move |addr: u16| dpcm_byte(&memory, addr))
}

/// DMC read callback over memory that is swapped out for every new project.
pub(crate) fn shared_dpcm_reader(memory: Arc<RwLock<Arc<Vec<u8>>>>) -> DmcReadFn {
    Arc::new(move |addr: u16| dpcm_byte(&memory.read(), addr))
}

/// Look up a song, reporting the index range on failure.
pub(crate) fn song_at(project: &Project, index: usize) -> Result<&Song, PlayerError> {
    project.songs.get(index).ok_or(PlayerError::SongOutOfRange {
        index,
        count: project.songs.len(),
    })
}

/// Render a song offline, without a sink or producer thread.
///
/// Plays from the first frame under [`LoopMode::None`] until the song ends
/// or `max_frames` frames have been rendered, and returns the mono samples.
pub fn render_song<A: Apu + ?Sized>(
    project: &Project,
    song_index: usize,
    apu: &mut A,
    max_frames: usize,
) -> Result<Vec<i16>, PlayerError> {
    let song = song_at(project, song_index)?.clone();

    apu.init(SAMPLE_RATE, dpcm_reader(Arc::new(project.dpcm_memory())));
    apu.reset(nes_apu_expansion(project.expansion_audio));

    let mut cursor = SongCursor::new(song, create_channel_states(project, 0), 0);
    let mut samples = Vec::new();

    for _ in 0..max_frames {
        if !cursor.step(apu, LoopMode::None) {
            break;
        }
        let start = samples.len();
        samples.resize(start + apu.samples_available(), 0);
        let read = apu.read_samples(&mut samples[start..]);
        samples.truncate(start + read);
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fp_engine::SoftApu;
    use fp_ir::demo::demo_project;
    use fp_ir::{ChannelType, ExpansionAudio, Note, Pattern};

    #[test]
    fn dpcm_readers_agree_and_follow_swaps() {
        let image = Arc::new(vec![0x11, 0x22]);
        let shared = Arc::new(RwLock::new(image.clone()));
        let plain = dpcm_reader(image);
        let swappable = shared_dpcm_reader(shared.clone());

        for addr in [0xC000, 0xC001, 0xC002, 0x8000] {
            assert_eq!(plain(addr), swappable(addr));
        }
        assert_eq!(swappable(0xC002), DPCM_FILL);

        *shared.write() = Arc::new(vec![0x33]);
        assert_eq!(swappable(0xC000), 0x33);
        assert_eq!(swappable(0xC001), DPCM_FILL);
    }

    fn one_note_song(speed_change: Option<u8>) -> Project {
        let mut project = Project::new(ExpansionAudio::None);
        let mut song = Song::new("cursor", 4, 2);
        song.speed = 2;

        let mut pattern = Pattern::new(4);
        let mut note = Note::on(40);
        if let Some(speed) = speed_change {
            note = note.with_speed(speed);
        }
        *pattern.note_mut(1) = note;
        let track = song.track_mut(ChannelType::Square1);
        let index = track.add_pattern(pattern);
        track.set_instance(0, index);

        project.songs.push(song);
        project
    }

    #[test]
    fn first_step_plays_start_position_without_advancing() {
        let project = one_note_song(None);
        let mut apu = SoftApu::new();
        apu.init(SAMPLE_RATE, Arc::new(|_: u16| 0u8));
        apu.reset(nes_apu_expansion(project.expansion_audio));

        let song = project.songs[0].clone();
        let mut cursor = SongCursor::new(song, create_channel_states(&project, 0), 5);
        assert!(cursor.step(&mut apu, LoopMode::Song));
        assert_eq!(cursor.position().frame, 5);
        assert_eq!((cursor.position().pattern, cursor.position().note), (1, 1));
    }

    #[test]
    fn speed_effect_takes_over_tempo() {
        let project = one_note_song(Some(4));
        let mut apu = SoftApu::new();
        apu.init(SAMPLE_RATE, Arc::new(|_: u16| 0u8));
        apu.reset(nes_apu_expansion(project.expansion_audio));

        let song = project.songs[0].clone();
        let mut cursor = SongCursor::new(song, create_channel_states(&project, 0), 0);
        assert_eq!(cursor.speed(), 2);

        // Frame 0 plays note 0; two frames later note 1 (carrying speed 4) plays.
        for _ in 0..3 {
            assert!(cursor.step(&mut apu, LoopMode::Song));
        }
        assert_eq!(cursor.position().note, 1);
        assert_eq!(cursor.speed(), 4);
        assert!(cursor.channels()[0].is_playing());
    }

    #[test]
    fn render_stops_at_song_end() {
        let project = one_note_song(None);
        let samples = render_song(&project, 0, &mut SoftApu::new(), 10_000).unwrap();

        // 8 notes at speed 2 (tempo 150) = 16 frames.
        let frames = samples.len() as f64 / (SAMPLE_RATE as f64 / fp_engine::FRAME_RATE_NTSC);
        assert!((frames - 16.0).abs() < 0.1, "rendered {frames} frames");
        assert!(samples.iter().any(|&s| s != 0));
    }

    #[test]
    fn render_respects_frame_limit() {
        let project = demo_project();
        let samples = render_song(&project, 0, &mut SoftApu::new(), 3).unwrap();
        assert_eq!(samples.len(), 733 + 734 + 734);
    }

    #[test]
    fn render_rejects_missing_song() {
        let project = demo_project();
        let err = render_song(&project, 7, &mut SoftApu::new(), 3).unwrap_err();
        assert!(matches!(err, PlayerError::SongOutOfRange { index: 7, count: 1 }));
    }
}

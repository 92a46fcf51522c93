//! Playback controller for the famiplay tracker.
//!
//! Owns the emulation core and the audio sink and runs the producer thread
//! that keeps the sink fed, one video frame of audio at a time. Offline
//! rendering shares the same per-frame driver.

mod producer;
mod queue;
mod render;
mod signal;
mod stats;
mod wav;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use fp_audio::{AudioError, AudioSink, FillCallback, SinkConfig};
use fp_engine::{create_channel_states, nes_apu_expansion, Apu, EngineError};
use fp_ir::IrError;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use producer::{FrameProducer, SessionStatus};

// Re-export common types so callers don't need fp-ir/fp-engine directly.
pub use fp_engine::{SampleChunk, SoftApu, FRAME_RATE_NTSC};
pub use fp_ir::{LoopMode, Project, Song};

pub use queue::SampleQueue;
pub use render::{dpcm_reader, render_song, SongCursor};
pub use signal::{FrameSignal, Wake};
pub use stats::{PipelineStats, StatsSnapshot};
pub use wav::{samples_to_wav, write_wav};

/// Output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// Device buffers cycled by the sink, and chunks queued before it starts.
pub const NUM_AUDIO_BUFFERS: usize = 3;

/// Nominal samples per video frame: ceil(44100 / 60.0988).
pub const SAMPLES_PER_FRAME: usize = 734;

/// Nominal size of one frame of 16-bit mono samples.
pub const BUFFER_SIZE_BYTES: usize = SAMPLES_PER_FRAME * std::mem::size_of::<i16>();

/// Errors from player setup and control.
#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    /// `play` before `initialize`, or after `shutdown`
    #[error("player is not initialized")]
    NotInitialized,

    #[error("song index {index} out of range ({count} songs)")]
    SongOutOfRange { index: usize, count: usize },

    #[error("failed to spawn producer thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Player settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerConfig {
    pub sample_rate: u32,
    /// Sink buffers; also the pre-roll depth
    pub buffer_count: usize,
    /// Emulation core index recorded in every channel state
    pub apu_index: usize,
    pub loop_mode: LoopMode,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            buffer_count: NUM_AUDIO_BUFFERS,
            apu_index: 0,
            loop_mode: LoopMode::Song,
        }
    }
}

impl PlayerConfig {
    /// Sink parameters for this configuration.
    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig {
            sample_rate: self.sample_rate,
            channels: 1,
            buffer_size_bytes: BUFFER_SIZE_BYTES,
            buffer_count: self.buffer_count,
        }
    }
}

/// Real-time player: one emulation core, one sink, at most one session.
pub struct Player<A: Apu + 'static> {
    config: PlayerConfig,
    /// `None` while a producer thread owns the core
    apu: Option<A>,
    sink: Option<Box<dyn AudioSink>>,
    queue: SampleQueue,
    signal: Arc<FrameSignal>,
    stats: Arc<PipelineStats>,
    loop_mode: Arc<AtomicU8>,
    dpcm: Arc<RwLock<Arc<Vec<u8>>>>,
    session: Option<Session<A>>,
}

struct Session<A> {
    status: Arc<SessionStatus>,
    thread: JoinHandle<A>,
}

impl<A: Apu + 'static> Player<A> {
    pub fn new(apu: A, config: PlayerConfig) -> Self {
        Self {
            config,
            apu: Some(apu),
            sink: None,
            queue: SampleQueue::new(),
            signal: Arc::new(FrameSignal::new()),
            stats: Arc::new(PipelineStats::new()),
            loop_mode: Arc::new(AtomicU8::new(config.loop_mode as u8)),
            dpcm: Arc::new(RwLock::new(Arc::new(Vec::new()))),
            session: None,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Prepare the core and open the sink.
    ///
    /// `open_sink` receives the sink parameters and the fill callback the
    /// sink must call for every buffer it needs.
    pub fn initialize<F>(&mut self, open_sink: F) -> Result<(), PlayerError>
    where
        F: FnOnce(SinkConfig, FillCallback) -> Result<Box<dyn AudioSink>, AudioError>,
    {
        self.shutdown();
        let apu = self.apu.as_mut().ok_or(PlayerError::NotInitialized)?;

        apu.init(self.config.sample_rate, render::shared_dpcm_reader(self.dpcm.clone()));

        let sink_config = self.config.sink_config();
        let sink = open_sink(sink_config, self.fill_callback())?;
        debug!(
            sample_rate = sink_config.sample_rate,
            buffer_count = sink_config.buffer_count,
            "player initialized"
        );
        self.sink = Some(sink);
        Ok(())
    }

    fn fill_callback(&self) -> FillCallback {
        let queue = self.queue.clone();
        let signal = self.signal.clone();
        let stats = self.stats.clone();

        Box::new(move || match queue.try_pop() {
            Some(chunk) => {
                stats.record_consumed();
                signal.notify_frame();
                Some(chunk)
            }
            None => {
                let underruns = stats.record_underrun();
                trace!(underruns, "sample queue underrun");
                None
            }
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.sink.is_some()
    }

    /// Play a song from its first frame.
    pub fn play(&mut self, project: &Project, song_index: usize) -> Result<(), PlayerError> {
        self.play_from(project, song_index, 0)
    }

    /// Play a song starting at `frame` (clamped to the song).
    pub fn play_from(
        &mut self,
        project: &Project,
        song_index: usize,
        frame: u32,
    ) -> Result<(), PlayerError> {
        self.stop();

        let transport = self
            .sink
            .as_ref()
            .map(|sink| sink.transport().clone())
            .ok_or(PlayerError::NotInitialized)?;
        let song = render::song_at(project, song_index)?.clone();
        let channels = create_channel_states(project, self.config.apu_index);
        let mut apu = self.apu.take().ok_or(PlayerError::NotInitialized)?;

        *self.dpcm.write() = Arc::new(project.dpcm_memory());
        apu.reset(nes_apu_expansion(project.expansion_audio));

        self.queue.clear();
        self.signal.rearm();

        let status = Arc::new(SessionStatus::default());
        let producer = FrameProducer {
            apu,
            cursor: SongCursor::new(song, channels, frame),
            queue: self.queue.clone(),
            signal: self.signal.clone(),
            transport,
            stats: self.stats.clone(),
            status: status.clone(),
            loop_mode: self.loop_mode.clone(),
            preroll: self.config.buffer_count.max(1),
        };

        let thread = std::thread::Builder::new()
            .name("fp-producer".into())
            .spawn(move || producer.run())
            .map_err(PlayerError::ThreadSpawn)?;

        debug!(song_index, frame, channels = project.active_channel_count(), "playback started");
        self.session = Some(Session { status, thread });
        Ok(())
    }

    /// Stop the current session, if any. The queue is emptied.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        self.signal.stop();
        match session.thread.join() {
            Ok(apu) => self.apu = Some(apu),
            Err(_) => warn!("producer thread panicked"),
        }

        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.stop() {
                warn!("failed to stop sink: {err}");
            }
        }

        let dropped = self.queue.clear();
        debug!(dropped, "playback stopped");
    }

    /// Stop playback and release the sink. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.stop();
        if let Some(mut sink) = self.sink.take() {
            if let Err(err) = sink.stop() {
                warn!("failed to stop sink: {err}");
            }
            debug!("sink released");
        }
    }

    /// A session is running and has not reached the end of the song.
    pub fn is_playing(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.status.finished.load(Ordering::Acquire))
    }

    /// The current session ran to the end of the song.
    pub fn is_finished(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.status.finished.load(Ordering::Acquire))
    }

    /// Song frame of the most recently rendered chunk.
    pub fn current_frame(&self) -> Option<u32> {
        let session = self.session.as_ref()?;
        Some(session.status.current_frame.load(Ordering::Relaxed))
    }

    /// Change the loop mode; a running session picks it up on its next frame.
    pub fn set_loop_mode(&self, mode: LoopMode) {
        self.loop_mode.store(mode as u8, Ordering::Relaxed);
    }

    pub fn loop_mode(&self) -> LoopMode {
        LoopMode::from_u8(self.loop_mode.load(Ordering::Relaxed))
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn sink(&self) -> Option<&dyn AudioSink> {
        self.sink.as_deref()
    }
}

impl<A: Apu + 'static> Drop for Player<A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fp_audio::ManualSink;
    use fp_ir::demo::demo_project;
    use std::time::{Duration, Instant};

    fn manual_player() -> (Player<SoftApu>, ManualSink) {
        let mut player = Player::new(SoftApu::new(), PlayerConfig::default());
        let mut handle = None;
        player
            .initialize(|config, fill| {
                let sink = ManualSink::new(config, fill);
                handle = Some(sink.clone());
                let sink: Box<dyn AudioSink> = Box::new(sink);
                Ok(sink)
            })
            .unwrap();
        (player, handle.unwrap())
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn nominal_buffer_covers_one_frame() {
        assert_eq!(SAMPLES_PER_FRAME, (SAMPLE_RATE as f64 / FRAME_RATE_NTSC).ceil() as usize);
        assert_eq!(BUFFER_SIZE_BYTES, 1468);
        let config = PlayerConfig::default().sink_config();
        assert_eq!((config.channels, config.buffer_count), (1, 3));
    }

    #[test]
    fn play_requires_initialize() {
        let mut player = Player::new(SoftApu::new(), PlayerConfig::default());
        let err = player.play(&demo_project(), 0).unwrap_err();
        assert!(matches!(err, PlayerError::NotInitialized));
        assert!(!player.is_playing());
    }

    #[test]
    fn play_rejects_missing_song_and_keeps_core() {
        let (mut player, _sink) = manual_player();
        let err = player.play(&demo_project(), 3).unwrap_err();
        assert!(matches!(err, PlayerError::SongOutOfRange { index: 3, count: 1 }));

        // The core was not consumed by the failed attempt.
        player.play(&demo_project(), 0).unwrap();
        assert!(player.is_playing());
    }

    #[test]
    fn underrun_is_counted_not_fatal() {
        let (mut player, sink) = manual_player();
        player.play(&demo_project(), 0).unwrap();
        wait_until(|| sink.is_started());

        // Pull far faster than one frame per pull can be rendered.
        let underran = (0..10_000).any(|_| sink.pull().is_none());
        assert!(underran);
        assert!(player.stats().underruns >= 1);
        assert!(player.is_playing());

        player.stop();
        let before = player.stats().underruns;
        assert!(sink.pull().is_none());
        assert_eq!(player.stats().underruns, before, "halted sink must not pull");
    }

    #[test]
    fn stop_is_prompt_and_idempotent() {
        let (mut player, sink) = manual_player();
        player.play(&demo_project(), 0).unwrap();
        wait_until(|| sink.is_started());

        let started = Instant::now();
        player.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!player.is_playing());
        assert!(!sink.is_started());
        assert_eq!(player.current_frame(), None);
        player.stop();
    }

    #[test]
    fn shutdown_without_play_is_safe() {
        let (mut player, _sink) = manual_player();
        player.shutdown();
        player.shutdown();
        assert!(!player.is_initialized());
        assert!(matches!(player.play(&demo_project(), 0), Err(PlayerError::NotInitialized)));
    }

    #[test]
    fn play_from_starts_at_requested_frame() {
        let (mut player, sink) = manual_player();
        player.play_from(&demo_project(), 0, 40).unwrap();
        wait_until(|| sink.is_started());
        // Pre-roll is three frames; at speed 6 the cursor is still on frame 40.
        assert_eq!(player.current_frame(), Some(40));
    }

    #[test]
    fn loop_mode_is_shared_with_session() {
        let player = Player::new(SoftApu::new(), PlayerConfig::default());
        assert_eq!(player.loop_mode(), LoopMode::Song);
        player.set_loop_mode(LoopMode::Pattern);
        assert_eq!(player.loop_mode(), LoopMode::Pattern);
    }
}

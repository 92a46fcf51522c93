//! Producer thread: renders frames ahead of the sink.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fp_audio::Transport;
use fp_engine::{Apu, SampleChunk};
use fp_ir::LoopMode;
use tracing::{debug, info};

use crate::queue::SampleQueue;
use crate::render::SongCursor;
use crate::signal::{FrameSignal, Wake};
use crate::stats::{PipelineStats, StatsReporter};

const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// State the producer publishes for the controlling thread.
#[derive(Debug, Default)]
pub(crate) struct SessionStatus {
    pub(crate) current_frame: AtomicU32,
    pub(crate) finished: AtomicBool,
}

/// Everything the producer thread owns for one playback session.
pub(crate) struct FrameProducer<A: Apu> {
    pub(crate) apu: A,
    pub(crate) cursor: SongCursor,
    pub(crate) queue: SampleQueue,
    pub(crate) signal: Arc<FrameSignal>,
    pub(crate) transport: Transport,
    pub(crate) stats: Arc<PipelineStats>,
    pub(crate) status: Arc<SessionStatus>,
    pub(crate) loop_mode: Arc<AtomicU8>,
    /// Chunks to queue before starting the sink
    pub(crate) preroll: usize,
}

impl<A: Apu> FrameProducer<A> {
    /// Run until stopped or the song ends, then hand the core back.
    pub(crate) fn run(mut self) -> A {
        debug!(
            frame = self.cursor.position().frame,
            song = %self.cursor.song().name,
            "producer started"
        );
        let mut reporter = StatsReporter::new(STATS_INTERVAL);

        while self.signal.wait() == Wake::Frame {
            let loop_mode = LoopMode::from_u8(self.loop_mode.load(Ordering::Relaxed));

            if !self.render_frame(loop_mode) {
                self.status.finished.store(true, Ordering::Release);
                // A song shorter than the pre-roll would otherwise never play.
                if !self.queue.is_empty() {
                    self.start_sink();
                }
                info!(frame = self.cursor.position().frame, "song finished");
                break;
            }

            self.status
                .current_frame
                .store(self.cursor.position().frame, Ordering::Relaxed);

            let mut samples = vec![0i16; self.apu.samples_available()];
            let read = self.apu.read_samples(&mut samples);
            samples.truncate(read);
            self.queue.push(SampleChunk::from_vec(samples));
            self.stats.record_produced();

            if !self.transport.is_started() {
                if self.queue.len() >= self.preroll {
                    self.start_sink();
                } else {
                    self.signal.notify_frame();
                }
            }

            reporter.maybe_log(&self.stats, self.queue.len());
        }

        debug!(frame = self.cursor.position().frame, "producer exiting");
        self.apu
    }

    #[cfg(not(feature = "alloc_check"))]
    fn render_frame(&mut self, loop_mode: LoopMode) -> bool {
        self.cursor.step(&mut self.apu, loop_mode)
    }

    #[cfg(feature = "alloc_check")]
    fn render_frame(&mut self, loop_mode: LoopMode) -> bool {
        let (cursor, apu) = (&mut self.cursor, &mut self.apu);
        assert_no_alloc::assert_no_alloc(|| cursor.step(apu, loop_mode))
    }

    fn start_sink(&self) {
        if self.transport.start() {
            self.stats.record_start();
            debug!(queued = self.queue.len(), "pre-roll complete, sink started");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fp_engine::{create_channel_states, nes_apu_expansion, SoftApu};
    use fp_ir::demo::demo_project;
    use std::thread;
    use std::time::Instant;

    struct Harness {
        queue: SampleQueue,
        signal: Arc<FrameSignal>,
        transport: Transport,
        stats: Arc<PipelineStats>,
        status: Arc<SessionStatus>,
        thread: thread::JoinHandle<SoftApu>,
    }

    fn spawn(loop_mode: LoopMode) -> Harness {
        let project = demo_project();
        let mut apu = SoftApu::new();
        apu.init(44_100, Arc::new(|_: u16| 0u8));
        apu.reset(nes_apu_expansion(project.expansion_audio));

        let queue = SampleQueue::new();
        let signal = Arc::new(FrameSignal::new());
        let transport = Transport::new();
        let stats = Arc::new(PipelineStats::new());
        let status = Arc::new(SessionStatus::default());

        let producer = FrameProducer {
            apu,
            cursor: SongCursor::new(project.songs[0].clone(), create_channel_states(&project, 0), 0),
            queue: queue.clone(),
            signal: signal.clone(),
            transport: transport.clone(),
            stats: stats.clone(),
            status: status.clone(),
            loop_mode: Arc::new(AtomicU8::new(loop_mode as u8)),
            preroll: 3,
        };
        let thread = thread::spawn(move || producer.run());

        Harness { queue, signal, transport, stats, status, thread }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn preroll_fills_three_chunks_then_starts_sink() {
        let h = spawn(LoopMode::Song);
        wait_until(|| h.transport.is_started());

        // No consumer yet: the producer parks with exactly the pre-roll queued.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(h.queue.len(), 3);
        assert_eq!(h.stats.snapshot().chunks_produced, 3);
        assert_eq!(h.stats.snapshot().sink_starts, 1);

        h.signal.stop();
        h.thread.join().unwrap();
    }

    #[test]
    fn each_consumed_chunk_produces_one_more() {
        let h = spawn(LoopMode::Song);
        wait_until(|| h.transport.is_started());

        for expected in 4..10 {
            assert!(h.queue.try_pop().is_some());
            h.signal.notify_frame();
            wait_until(|| h.stats.snapshot().chunks_produced == expected);
        }
        thread::sleep(Duration::from_millis(20));
        assert_eq!(h.queue.len(), 3);

        h.signal.stop();
        h.thread.join().unwrap();
    }

    #[test]
    fn burst_of_consumed_chunks_is_fully_replaced() {
        let h = spawn(LoopMode::Song);
        wait_until(|| h.transport.is_started());

        // A device callback spanning three frames takes the whole pre-roll
        // before the producer gets to run.
        for round in 1..=5u64 {
            for _ in 0..3 {
                assert!(h.queue.try_pop().is_some());
                h.signal.notify_frame();
            }
            wait_until(|| h.stats.snapshot().chunks_produced == 3 + round * 3);
            wait_until(|| h.queue.len() == 3);
        }

        h.signal.stop();
        h.thread.join().unwrap();
    }

    #[test]
    fn stop_releases_producer_parked_on_signal() {
        let h = spawn(LoopMode::Song);
        wait_until(|| h.transport.is_started());

        let started = Instant::now();
        h.signal.stop();
        let apu = h.thread.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!h.status.finished.load(Ordering::Acquire));
        assert_eq!(apu.samples_available(), 0);
    }

    #[test]
    fn loop_none_finishes_and_reports() {
        let h = spawn(LoopMode::None);
        wait_until(|| h.transport.is_started());

        // Keep consuming until the producer reports the end of the song.
        while !h.thread.is_finished() {
            if h.queue.try_pop().is_some() {
                h.signal.notify_frame();
            }
            thread::yield_now();
        }
        h.thread.join().unwrap();
        assert!(h.status.finished.load(Ordering::Acquire));
        assert_eq!(h.status.current_frame.load(Ordering::Relaxed), 63);
    }
}

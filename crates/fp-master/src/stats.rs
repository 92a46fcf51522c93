//! Pipeline health counters and periodic diagnostics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

/// Counters shared by the producer thread and the sink's fill callback.
#[derive(Debug, Default)]
pub struct PipelineStats {
    chunks_produced: AtomicU64,
    chunks_consumed: AtomicU64,
    underruns: AtomicU64,
    sink_starts: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub chunks_produced: u64,
    pub chunks_consumed: u64,
    /// Sink requests that found the queue empty
    pub underruns: u64,
    /// Times pre-roll completed and the sink was started
    pub sink_starts: u64,
}

impl StatsSnapshot {
    /// Chunks produced but not yet consumed (or dropped at stop).
    pub fn in_flight(&self) -> u64 {
        self.chunks_produced.saturating_sub(self.chunks_consumed)
    }
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_produced(&self) {
        self.chunks_produced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_consumed(&self) {
        self.chunks_consumed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an underrun, returning the running total.
    pub fn record_underrun(&self) -> u64 {
        self.underruns.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_start(&self) {
        self.sink_starts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            chunks_produced: self.chunks_produced.load(Ordering::Relaxed),
            chunks_consumed: self.chunks_consumed.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            sink_starts: self.sink_starts.load(Ordering::Relaxed),
        }
    }
}

/// Logs a stats summary at most once per interval.
pub(crate) struct StatsReporter {
    interval: Duration,
    last_log: Instant,
    last: StatsSnapshot,
}

impl StatsReporter {
    pub(crate) fn new(interval: Duration) -> Self {
        Self { interval, last_log: Instant::now(), last: StatsSnapshot::default() }
    }

    pub(crate) fn maybe_log(&mut self, stats: &PipelineStats, queue_len: usize) {
        if self.last_log.elapsed() < self.interval {
            return;
        }
        let now = stats.snapshot();
        debug!(
            produced = now.chunks_produced,
            consumed = now.chunks_consumed,
            new_underruns = now.underruns - self.last.underruns,
            queued = queue_len,
            "pipeline stats"
        );
        self.last = now;
        self.last_log = Instant::now();
    }
}

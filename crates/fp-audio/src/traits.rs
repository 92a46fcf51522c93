//! Audio sink contract and error types.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use fp_engine::SampleChunk;

/// Error type for audio operations.
#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    /// No audio device available
    #[error("no audio output device available")]
    NoDevice,
    /// Failed to query or configure the device
    #[error("device init error: {0}")]
    DeviceInit(String),
    /// Failed to create the output stream
    #[error("stream create error: {0}")]
    StreamCreate(String),
    /// Playback control error
    #[error("playback error: {0}")]
    Playback(String),
}

/// Output format and buffering requested from a sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Nominal size of one buffer (one frame of 16-bit samples)
    pub buffer_size_bytes: usize,
    /// Buffers the device cycles through
    pub buffer_count: usize,
}

impl SinkConfig {
    /// Nominal samples per buffer.
    pub fn buffer_samples(&self) -> usize {
        self.buffer_size_bytes / std::mem::size_of::<i16>()
    }
}

/// Supplies the next chunk to play, or `None` when nothing is ready.
///
/// Called from the sink's playback context and must never block.
pub type FillCallback = Box<dyn FnMut() -> Option<SampleChunk> + Send>;

#[derive(Debug, Default)]
struct TransportState {
    started: AtomicBool,
    starts: AtomicU64,
}

/// Shared started flag of a sink.
///
/// The sink gates its output on it; the producer flips it once pre-roll is
/// complete. Clones observe the same state.
#[derive(Clone, Debug, Default)]
pub struct Transport {
    state: Arc<TransportState>,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin consuming. Returns true only on the stopped -> started transition.
    pub fn start(&self) -> bool {
        let first = !self.state.started.swap(true, Ordering::AcqRel);
        if first {
            self.state.starts.fetch_add(1, Ordering::Relaxed);
        }
        first
    }

    /// Stop consuming. Returns true if the transport was running.
    pub fn halt(&self) -> bool {
        self.state.started.swap(false, Ordering::AcqRel)
    }

    pub fn is_started(&self) -> bool {
        self.state.started.load(Ordering::Acquire)
    }

    /// Number of stopped -> started transitions so far.
    pub fn start_count(&self) -> u64 {
        self.state.starts.load(Ordering::Relaxed)
    }
}

/// A device-facing consumer of sample chunks.
///
/// The sink pulls chunks through its [`FillCallback`] while its transport
/// is started. Output is gated on the transport alone: the player's
/// producer thread starts a sink by flipping a clone of [`transport`]
/// once pre-roll is queued, without calling [`start`]. Any device stream
/// therefore has to be running from construction. Dropping the sink
/// releases the device.
///
/// [`transport`]: AudioSink::transport
/// [`start`]: AudioSink::start
pub trait AudioSink {
    fn config(&self) -> &SinkConfig;

    /// Handle to the started flag, for starting from another thread.
    fn transport(&self) -> &Transport;

    fn is_started(&self) -> bool {
        self.transport().is_started()
    }

    /// Start playback from the owning thread. Equivalent to starting the
    /// transport.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop playback. The sink can be started again afterwards.
    fn stop(&mut self) -> Result<(), AudioError>;
}

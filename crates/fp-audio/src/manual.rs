//! Headless sink driven by explicit pulls.

use std::sync::Arc;

use fp_engine::SampleChunk;
use parking_lot::Mutex;

use crate::traits::{AudioError, AudioSink, FillCallback, SinkConfig, Transport};

/// A sink with no device behind it.
///
/// Each [`pull`](ManualSink::pull) stands in for one device buffer
/// completion. Clones share the fill callback and transport, so a clone can
/// be handed to a consumer thread while the player owns the original.
#[derive(Clone)]
pub struct ManualSink {
    config: SinkConfig,
    transport: Transport,
    fill: Arc<Mutex<FillCallback>>,
}

impl ManualSink {
    pub fn new(config: SinkConfig, fill: FillCallback) -> Self {
        Self {
            config,
            transport: Transport::new(),
            fill: Arc::new(Mutex::new(fill)),
        }
    }

    /// Request the next chunk.
    ///
    /// Returns `None` without touching the queue while the transport is
    /// stopped, and `None` on underrun.
    pub fn pull(&self) -> Option<SampleChunk> {
        if !self.transport.is_started() {
            return None;
        }
        let mut fill = self.fill.lock();
        (*fill)()
    }
}

impl AudioSink for ManualSink {
    fn config(&self) -> &SinkConfig {
        &self.config
    }

    fn transport(&self) -> &Transport {
        &self.transport
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.transport.start();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.transport.halt();
        Ok(())
    }
}

//! Audio sinks for the famiplay playback engine.

mod cpal_backend;
mod manual;
mod traits;

pub use cpal_backend::CpalSink;
pub use manual::ManualSink;
pub use traits::{AudioError, AudioSink, FillCallback, SinkConfig, Transport};

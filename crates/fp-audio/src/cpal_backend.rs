//! CPAL-based audio sink.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use fp_engine::SampleChunk;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, warn};

use crate::traits::{AudioError, AudioSink, FillCallback, SinkConfig, Transport};

/// Audio sink on the default output device.
///
/// The stream runs from `open` onwards but outputs silence until the
/// transport is started. Mono chunks are fanned out to every device channel.
pub struct CpalSink {
    config: SinkConfig,
    transport: Transport,
    _stream: Stream,
}

impl CpalSink {
    /// Open the default output device and start its (gated) stream.
    pub fn open(config: SinkConfig, mut fill: FillCallback) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let mut stream_config: StreamConfig = supported.into();
        stream_config.sample_rate = SampleRate(config.sample_rate);
        let device_channels = stream_config.channels.max(1) as usize;

        debug!(
            device = %device.name().unwrap_or_default(),
            sample_rate = config.sample_rate,
            device_channels,
            "opening output stream"
        );

        let mut staging = Staging::new(staging_capacity(&config));
        let transport = Transport::new();
        let running = transport.clone();

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.is_started() {
                        // Drop anything staged by a previous session.
                        staging.clear();
                        data.fill(0.0);
                        return;
                    }
                    fill_device(data, device_channels, &mut staging, &mut fill);
                },
                |err| warn!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;

        Ok(Self { config, transport, _stream: stream })
    }
}

impl AudioSink for CpalSink {
    fn config(&self) -> &SinkConfig {
        &self.config
    }

    fn transport(&self) -> &Transport {
        &self.transport
    }

    fn start(&mut self) -> Result<(), AudioError> {
        if self.transport.start() {
            debug!("output started");
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        if self.transport.halt() {
            debug!("output stopped");
        }
        Ok(())
    }
}

/// Room for one full set of device buffers, and never less than two chunks.
fn staging_capacity(config: &SinkConfig) -> usize {
    config.buffer_samples().max(1) * config.buffer_count.max(2)
}

/// Mono samples taken from the fill callback but not yet played.
pub(crate) struct Staging {
    input: HeapProd<i16>,
    output: HeapCons<i16>,
}

impl Staging {
    pub(crate) fn new(capacity: usize) -> Self {
        let (input, output) = HeapRb::<i16>::new(capacity.max(1)).split();
        Self { input, output }
    }

    pub(crate) fn clear(&mut self) -> usize {
        self.output.clear()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.output.occupied_len()
    }

    fn stage(&mut self, chunk: &SampleChunk) {
        let pushed = self.input.push_slice(chunk);
        if pushed < chunk.len() {
            warn!(dropped = chunk.len() - pushed, "chunk larger than staging ring");
        }
    }
}

/// Fill one interleaved device buffer.
///
/// The staging ring is refilled one chunk at a time whenever it runs dry.
/// Once `fill` comes back empty it is not asked again for the rest of this
/// buffer, which is padded with silence. Returns the number of chunks taken.
pub(crate) fn fill_device<F>(
    data: &mut [f32],
    channels: usize,
    staging: &mut Staging,
    fill: &mut F,
) -> usize
where
    F: FnMut() -> Option<SampleChunk> + ?Sized,
{
    let mut taken = 0;
    let mut starved = false;

    for frame in data.chunks_mut(channels.max(1)) {
        if staging.output.is_empty() && !starved {
            match fill() {
                Some(chunk) => {
                    staging.stage(&chunk);
                    taken += 1;
                }
                None => starved = true,
            }
        }
        let sample = staging.output.try_pop().map_or(0.0, |s| s as f32 / 32768.0);
        frame.fill(sample);
    }
    taken
}

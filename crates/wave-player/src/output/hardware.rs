//! CPAL-backed [`AudioOutput`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};

use super::queue::{SampleQueue, capacity_for};
use super::stream::{StreamCounters, build_output_stream};
use super::{AudioOutput, OutputChannel, OutputFormat, device, pcm_to_f32};
use crate::error::{PlayerError, Result};

/// Settings for the CPAL output backend.
#[derive(Clone, Debug)]
pub struct CpalOutputConfig {
    /// Substring of the output device name; `None` uses the host default.
    pub device: Option<String>,
    /// Audio held between the transport and the device callback.
    pub buffer_seconds: f32,
    /// Longest a write may wait for room before the output counts as stalled.
    pub stall_timeout: Duration,
}

impl Default for CpalOutputConfig {
    fn default() -> Self {
        Self {
            device: None,
            buffer_seconds: 0.25,
            stall_timeout: Duration::from_secs(2),
        }
    }
}

/// Opens a CPAL output stream on the selected device for each track.
#[derive(Clone, Debug, Default)]
pub struct CpalOutput {
    config: CpalOutputConfig,
}

impl CpalOutput {
    pub fn new(config: CpalOutputConfig) -> Self {
        Self { config }
    }
}

impl AudioOutput for CpalOutput {
    fn configure(&mut self, format: &OutputFormat) -> Result<Box<dyn OutputChannel>> {
        let host = cpal::default_host();
        let device = device::pick_device(&host, self.config.device.as_deref())?;
        let supported = device::pick_output_config(&device, format.sample_rate, format.channels)?;
        let mut stream_config: cpal::StreamConfig = supported.clone().into();
        if let Some(buf) = device::pick_buffer_size(&supported) {
            stream_config.buffer_size = buf;
        }

        let channels = format.channels as usize;
        let queue = Arc::new(SampleQueue::new(
            channels,
            capacity_for(format.sample_rate, channels, self.config.buffer_seconds),
        ));
        let enabled = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(StreamCounters::default());
        let stream = build_output_stream(
            &device,
            &stream_config,
            supported.sample_format(),
            &queue,
            &enabled,
            &counters,
        )?;
        stream
            .play()
            .map_err(|e| PlayerError::Output(format!("start output stream: {e}")))?;

        tracing::info!(
            device = %device.description().map(|d| d.to_string()).unwrap_or_default(),
            rate_hz = format.sample_rate,
            source_channels = format.channels,
            device_channels = stream_config.channels,
            sample_format = ?supported.sample_format(),
            buffer_size = ?stream_config.buffer_size,
            "output configured"
        );

        Ok(Box::new(CpalChannel {
            _stream: stream,
            queue,
            enabled,
            counters,
            bits_per_sample: format.bits_per_sample,
            stall_timeout: self.config.stall_timeout,
            scratch: Vec::new(),
        }))
    }
}

struct CpalChannel {
    // Dropping the stream releases the device.
    _stream: cpal::Stream,
    queue: Arc<SampleQueue>,
    enabled: Arc<AtomicBool>,
    counters: Arc<StreamCounters>,
    bits_per_sample: u16,
    stall_timeout: Duration,
    scratch: Vec<f32>,
}

impl OutputChannel for CpalChannel {
    fn enable(&mut self) -> Result<()> {
        self.enabled.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.enabled.store(false, Ordering::Relaxed);
        tracing::debug!(buffered_frames = self.queue.len_frames(), "output disabled");
        Ok(())
    }

    fn discard_buffered(&mut self) {
        self.queue.clear();
    }

    fn write(&mut self, pcm: &[u8]) -> Result<usize> {
        pcm_to_f32(pcm, self.bits_per_sample, &mut self.scratch);
        if self.queue.push_timeout(&self.scratch, self.stall_timeout) {
            Ok(pcm.len())
        } else {
            Err(PlayerError::Output(format!(
                "device stopped accepting audio for {:?}",
                self.stall_timeout
            )))
        }
    }

    fn drain(&mut self, timeout: Duration) {
        if !self.queue.wait_empty(timeout) {
            tracing::debug!(
                buffered_frames = self.queue.len_frames(),
                "output drain timed out"
            );
        }
    }
}

impl Drop for CpalChannel {
    fn drop(&mut self) {
        tracing::debug!(
            played_frames = self.counters.played_frames.load(Ordering::Relaxed),
            underrun_events = self.counters.underrun_events.load(Ordering::Relaxed),
            "output released"
        );
    }
}

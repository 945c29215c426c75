//! CPAL output stream fed from a [`SampleQueue`].
//!
//! The callback refills a local buffer from the queue without waiting, maps
//! source channels onto the device layout and converts to the device sample
//! format. While the enable flag is clear it writes silence and leaves the
//! queue untouched, so disabling keeps the read position.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use cpal::traits::DeviceTrait;

use super::queue::SampleQueue;
use crate::error::{PlayerError, Result};

const REFILL_MAX_FRAMES: usize = 1_024;

/// Counters the callback updates for diagnostics.
#[derive(Debug, Default)]
pub(crate) struct StreamCounters {
    pub(crate) played_frames: AtomicU64,
    pub(crate) underrun_events: AtomicU64,
}

/// Build (but do not start) an output stream draining `queue`.
pub(crate) fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SampleQueue>,
    enabled: &Arc<AtomicBool>,
    counters: &Arc<StreamCounters>,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, enabled, counters),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, enabled, counters),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, enabled, counters),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, enabled, counters),
        other => Err(PlayerError::Output(format!("unsupported sample format: {other:?}"))),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SampleQueue>,
    enabled: &Arc<AtomicBool>,
    counters: &Arc<StreamCounters>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let dst_channels = (config.channels as usize).max(1);
    let mut local = LocalBuffer {
        pos: 0,
        src_channels: queue.channels(),
        src: Vec::with_capacity(REFILL_MAX_FRAMES * queue.channels()),
    };
    let queue = queue.clone();
    let enabled = enabled.clone();
    let counters = counters.clone();

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _| {
                let silence = <T as cpal::Sample>::from_sample::<f32>(0.0);
                if !enabled.load(Ordering::Relaxed) {
                    data.fill(silence);
                    return;
                }
                let frames = data.len() / dst_channels;
                let mut filled = 0usize;
                for frame in 0..frames {
                    if local.pos >= local.src.len() {
                        local.pos = 0;
                        if queue.pop_into(&mut local.src, REFILL_MAX_FRAMES) == 0 {
                            counters.underrun_events.fetch_add(1, Ordering::Relaxed);
                            data[frame * dst_channels..].fill(silence);
                            break;
                        }
                    }
                    for ch in 0..dst_channels {
                        data[frame * dst_channels + ch] =
                            <T as cpal::Sample>::from_sample::<f32>(local.sample_for(ch, dst_channels));
                    }
                    local.pos += local.src_channels;
                    filled += 1;
                }
                counters
                    .played_frames
                    .fetch_add(filled as u64, Ordering::Relaxed);
            },
            |err| tracing::warn!("output stream error: {err}"),
            None,
        )
        .map_err(|e| PlayerError::Output(format!("build output stream: {e}")))?;
    Ok(stream)
}

/// Interleaved samples pulled from the queue, consumed one frame at a time.
struct LocalBuffer {
    pos: usize,
    src_channels: usize,
    src: Vec<f32>,
}

impl LocalBuffer {
    /// Sample for destination channel `dst_ch` of the current frame.
    ///
    /// mono → N duplicates, stereo → mono averages, anything else clamps to
    /// the last available source channel.
    fn sample_for(&self, dst_ch: usize, dst_channels: usize) -> f32 {
        let at = |ch: usize| self.src.get(self.pos + ch).copied().unwrap_or(0.0);
        match (self.src_channels, dst_channels) {
            (2, 1) => 0.5 * (at(0) + at(1)),
            (1, _) => at(0),
            (src, _) => at(dst_ch.min(src - 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(src_channels: usize, src: Vec<f32>) -> LocalBuffer {
        LocalBuffer {
            pos: 0,
            src_channels,
            src,
        }
    }

    #[test]
    fn stereo_to_mono_averages() {
        let b = buffer(2, vec![0.2, 0.4]);
        assert!((b.sample_for(0, 1) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn mono_is_duplicated() {
        let b = buffer(1, vec![0.7]);
        assert_eq!(b.sample_for(0, 2), 0.7);
        assert_eq!(b.sample_for(1, 2), 0.7);
    }

    #[test]
    fn stereo_passes_through_and_clamps_extra_channels() {
        let b = buffer(2, vec![0.1, 0.9]);
        assert_eq!(b.sample_for(0, 2), 0.1);
        assert_eq!(b.sample_for(1, 2), 0.9);
        assert_eq!(b.sample_for(3, 4), 0.9);
    }

    #[test]
    fn missing_samples_read_as_silence() {
        let b = buffer(2, vec![0.5]);
        assert_eq!(b.sample_for(1, 2), 0.0);
    }
}

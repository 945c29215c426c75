//! Hardware output abstraction.
//!
//! The transport controller only sees [`AudioOutput`] (configure a channel for
//! a PCM format) and [`OutputChannel`] (enable/disable and blocking writes).
//! A channel is released when it is dropped.
//!
//! Backends:
//! - [`hardware::CpalOutput`]: a CPAL output stream fed from a small bounded
//!   sample queue that plays the role of a DMA ring.
//! - [`null::NullOutput`]: discards audio, optionally at real-time pace.

pub mod device;
pub mod hardware;
pub mod null;
mod queue;
mod stream;

use std::time::Duration;

use crate::error::Result;

pub use hardware::CpalOutput;
pub use null::NullOutput;

/// PCM layout the output channel must be configured for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl OutputFormat {
    /// Bytes per multi-channel frame.
    pub fn block_align(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// Bytes consumed per second of playback.
    pub fn byte_rate(&self) -> u64 {
        self.sample_rate as u64 * self.block_align() as u64
    }
}

/// Factory for output channels. Owned by the transport task.
pub trait AudioOutput {
    /// Acquire and configure an output channel. The channel starts disabled.
    fn configure(&mut self, format: &OutputFormat) -> Result<Box<dyn OutputChannel>>;
}

/// A configured output channel, exclusively owned by the transport task.
pub trait OutputChannel {
    /// Start consuming written audio.
    fn enable(&mut self) -> Result<()>;
    /// Stop consuming written audio; anything already accepted is retained.
    fn disable(&mut self) -> Result<()>;
    /// Drop audio that was accepted but not yet played.
    fn discard_buffered(&mut self);
    /// Write interleaved little-endian PCM, blocking until the output accepts it.
    fn write(&mut self, pcm: &[u8]) -> Result<usize>;
    /// Wait up to `timeout` for accepted audio to finish playing.
    fn drain(&mut self, timeout: Duration);
}

/// Convert little-endian PCM bytes to `f32` samples in `[-1.0, 1.0]`.
///
/// Trailing bytes that do not form a whole sample are ignored.
pub(crate) fn pcm_to_f32(pcm: &[u8], bits_per_sample: u16, out: &mut Vec<f32>) {
    out.clear();
    match bits_per_sample {
        8 => out.extend(pcm.iter().map(|&b| (b as f32 - 128.0) / 128.0)),
        16 => out.extend(
            pcm.chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32_768.0),
        ),
        24 => out.extend(pcm.chunks_exact(3).map(|b| {
            let v = i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8;
            v as f32 / 8_388_608.0
        })),
        32 => out.extend(
            pcm.chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0),
        ),
        other => tracing::warn!(bits = other, "unsupported pcm width; dropping block"),
    }
}

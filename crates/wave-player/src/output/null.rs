//! Output that discards audio.
//!
//! Used for headless runs and for exercising the transport without a sound
//! card. With `realtime` set, each write sleeps for the playback time of the
//! block so position and spectrum advance at the track's pace.

use std::time::Duration;

use super::{AudioOutput, OutputChannel, OutputFormat};
use crate::error::Result;

#[derive(Clone, Debug, Default)]
pub struct NullOutput {
    realtime: bool,
}

impl NullOutput {
    pub fn new(realtime: bool) -> Self {
        Self { realtime }
    }
}

impl AudioOutput for NullOutput {
    fn configure(&mut self, format: &OutputFormat) -> Result<Box<dyn OutputChannel>> {
        tracing::info!(
            rate_hz = format.sample_rate,
            channels = format.channels,
            bits = format.bits_per_sample,
            realtime = self.realtime,
            "null output configured"
        );
        Ok(Box::new(NullChannel {
            byte_rate: format.byte_rate(),
            realtime: self.realtime,
            enabled: false,
        }))
    }
}

struct NullChannel {
    byte_rate: u64,
    realtime: bool,
    enabled: bool,
}

impl NullChannel {
    fn pace_for(&self, bytes: usize) -> Option<Duration> {
        if !self.realtime || !self.enabled || self.byte_rate == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(bytes as f64 / self.byte_rate as f64))
    }
}

impl OutputChannel for NullChannel {
    fn enable(&mut self) -> Result<()> {
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.enabled = false;
        Ok(())
    }

    fn discard_buffered(&mut self) {}

    fn write(&mut self, pcm: &[u8]) -> Result<usize> {
        if let Some(pace) = self.pace_for(pcm.len()) {
            std::thread::sleep(pace);
        }
        Ok(pcm.len())
    }

    fn drain(&mut self, _timeout: Duration) {}
}

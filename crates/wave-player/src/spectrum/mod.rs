//! Spectral analyzer task.
//!
//! The transport pushes copies of each PCM block through a small bounded
//! relay. The analyzer thread downmixes to mono, runs a windowed 512-point FFT
//! per full window, folds bins into 32 bands with automatic gain control and
//! publishes 0..=15 heights to the [`HeightsStore`].
//!
//! A full relay drops the newest chunk: the display skips a frame rather
//! than slowing playback.

mod agc;
mod analyzer;
mod bands;
mod heights;

use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};

use crate::error::{PlayerError, Result};

pub use agc::{AGC_DECAY, AGC_FLOOR, AgcState, MAX_HEIGHT};
pub use analyzer::{FFT_SIZE, SpectrumAnalyzer};
pub use bands::{BAND_EDGES, BAND_GAINS, NUM_BANDS};
pub use heights::{HeightsReader, HeightsStore, SpectrumHeights};

/// Interleaved 16-bit PCM handed from the transport to the analyzer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioChunk {
    pub samples: Vec<i16>,
    /// 1 or 2.
    pub channels: u16,
}

/// Producer side of the audio relay.
#[derive(Clone, Debug)]
pub struct AudioRelay {
    tx: Sender<AudioChunk>,
    timeout: Duration,
}

/// Create the bounded relay between the transport and the analyzer.
pub fn relay_channel(capacity: usize, send_timeout: Duration) -> (AudioRelay, Receiver<AudioChunk>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (
        AudioRelay {
            tx,
            timeout: send_timeout,
        },
        rx,
    )
}

impl AudioRelay {
    /// Copy `samples` into a new chunk and enqueue it for analysis.
    ///
    /// Never waits longer than the relay send timeout. On any error nothing
    /// is enqueued.
    pub fn push(&self, samples: &[i16], channels: u16) -> Result<()> {
        check_channels(channels)?;
        let mut owned = owned_samples(samples.len())?;
        owned.extend_from_slice(samples);
        self.send(AudioChunk {
            samples: owned,
            channels,
        })
    }

    /// Like [`AudioRelay::push`], decoding little-endian 16-bit PCM straight
    /// into the new chunk. A trailing odd byte is ignored.
    pub fn push_pcm16(&self, pcm: &[u8], channels: u16) -> Result<()> {
        check_channels(channels)?;
        let mut owned = owned_samples(pcm.len() / 2)?;
        owned.extend(pcm.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])));
        self.send(AudioChunk {
            samples: owned,
            channels,
        })
    }

    fn send(&self, chunk: AudioChunk) -> Result<()> {
        match self.tx.send_timeout(chunk, self.timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(PlayerError::Backpressure("audio relay")),
            Err(SendTimeoutError::Disconnected(_)) => Err(PlayerError::Disconnected("audio relay")),
        }
    }
}

fn check_channels(channels: u16) -> Result<()> {
    if (1..=2).contains(&channels) {
        Ok(())
    } else {
        Err(PlayerError::Validation(format!(
            "analyzer takes mono or stereo, got {channels} channels"
        )))
    }
}

fn owned_samples(len: usize) -> Result<Vec<i16>> {
    let mut owned = Vec::new();
    owned
        .try_reserve_exact(len)
        .map_err(|_| PlayerError::ResourceExhausted)?;
    Ok(owned)
}

/// Analyzer loop. Returns once every relay sender is dropped.
pub fn run_analyzer(rx: Receiver<AudioChunk>, mut analyzer: SpectrumAnalyzer, store: HeightsStore) {
    tracing::info!("spectrum analyzer started");
    let mut passes: u64 = 0;
    for chunk in rx.iter() {
        analyzer.ingest(&chunk, |heights| {
            store.publish(heights);
            passes += 1;
        });
    }
    tracing::info!(passes, "spectrum analyzer stopped");
}

//! Published spectrum heights.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::bands::NUM_BANDS;
use crate::error::{PlayerError, Result};

/// One height per band, each in `0..=MAX_HEIGHT`.
pub type SpectrumHeights = [u8; NUM_BANDS];

/// Mutex-guarded heights written by the analyzer after every pass.
#[derive(Clone, Debug, Default)]
pub struct HeightsStore {
    inner: Arc<Mutex<SpectrumHeights>>,
}

impl HeightsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, heights: &SpectrumHeights) {
        *self.inner.lock() = *heights;
    }

    /// Bounded-wait copy of the current heights.
    pub fn try_read(&self, timeout: Duration) -> Result<SpectrumHeights> {
        self.inner
            .try_lock_for(timeout)
            .map(|h| *h)
            .ok_or(PlayerError::GuardTimeout("heights"))
    }
}

/// Renderer-side reader; keeps the previous heights when the guard is busy.
#[derive(Clone, Debug)]
pub struct HeightsReader {
    store: HeightsStore,
    timeout: Duration,
    last: SpectrumHeights,
}

impl HeightsReader {
    pub fn new(store: HeightsStore, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            last: [0; NUM_BANDS],
        }
    }

    pub fn read(&mut self) -> SpectrumHeights {
        match self.store.try_read(self.timeout) {
            Ok(heights) => self.last = heights,
            Err(e) => tracing::debug!("{e}; serving previous heights"),
        }
        self.last
    }
}

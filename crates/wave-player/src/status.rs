use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{PlayerError, Result};

/// Track name published while nothing is loaded.
pub const NO_TRACK: &str = "none";

/// Transport state machine position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Snapshot of the transport, published by the controller after every change.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportStatus {
    pub state: TransportState,
    /// Loaded track path, or [`NO_TRACK`].
    pub track: PathBuf,
    pub total_duration_sec: f64,
    pub current_position_sec: f64,
    pub channel_count: u16,
    pub bits_per_sample: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
}

impl Default for TransportStatus {
    fn default() -> Self {
        Self::stopped()
    }
}

impl TransportStatus {
    /// The published status whenever the transport is stopped.
    pub fn stopped() -> Self {
        Self {
            state: TransportState::Stopped,
            track: PathBuf::from(NO_TRACK),
            total_duration_sec: 0.0,
            current_position_sec: 0.0,
            channel_count: 0,
            bits_per_sample: 0,
            sample_rate: 0,
            byte_rate: 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    /// Position derived from payload bytes already sent to the output.
    ///
    /// Leaves the position untouched while the byte rate is unknown.
    pub fn set_position_from_bytes(&mut self, bytes_played: u64) {
        if self.byte_rate > 0 {
            self.current_position_sec = bytes_played as f64 / self.byte_rate as f64;
        }
    }
}

/// Mutex-guarded [`TransportStatus`] shared between the controller and readers.
///
/// The guard is only held for a clone or a field update, never across I/O.
#[derive(Clone, Debug, Default)]
pub struct StatusStore {
    inner: Arc<Mutex<TransportStatus>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published status.
    pub fn publish(&self, status: TransportStatus) {
        *self.inner.lock() = status;
    }

    /// Apply an in-place update under the guard.
    pub fn update(&self, f: impl FnOnce(&mut TransportStatus)) {
        let mut guard = self.inner.lock();
        f(&mut *guard);
    }

    /// Bounded-wait snapshot.
    pub fn try_snapshot(&self, timeout: Duration) -> Result<TransportStatus> {
        self.inner
            .try_lock_for(timeout)
            .map(|s| s.clone())
            .ok_or(PlayerError::GuardTimeout("status"))
    }

    /// Snapshot that waits for the guard however long it takes.
    pub fn snapshot(&self) -> TransportStatus {
        self.inner.lock().clone()
    }
}

/// Reader that degrades to its last observed value on guard timeout.
#[derive(Clone, Debug)]
pub struct StatusReader {
    store: StatusStore,
    timeout: Duration,
    last: TransportStatus,
}

impl StatusReader {
    pub fn new(store: StatusStore, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            last: TransportStatus::stopped(),
        }
    }

    pub fn read(&mut self) -> TransportStatus {
        match self.store.try_snapshot(self.timeout) {
            Ok(status) => self.last = status,
            Err(e) => tracing::debug!("{e}; serving previous status"),
        }
        self.last.clone()
    }
}

use std::time::Duration;

use crate::error::{PlayerError, Result};

/// Tuning parameters shared by the transport and spectrum tasks.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Bytes read from the data sub-chunk per pump step.
    ///
    /// Rounded down to a whole number of sample frames for each track.
    pub block_bytes: usize,
    /// Pending transport commands before `submit_command` reports backpressure.
    pub command_capacity: usize,
    /// How long `submit_command` waits for room in the command channel.
    pub command_send_timeout: Duration,
    /// Audio chunks in flight to the analyzer.
    pub relay_capacity: usize,
    /// How long the data pump waits for room in the relay channel.
    pub relay_send_timeout: Duration,
    /// Bounded wait used by status/heights readers.
    pub read_timeout: Duration,
    /// Longest an output write may block before playback is considered stalled.
    pub output_stall_timeout: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            block_bytes: 1024,
            command_capacity: 8,
            command_send_timeout: Duration::from_millis(50),
            relay_capacity: 10,
            relay_send_timeout: Duration::from_millis(20),
            read_timeout: Duration::from_millis(100),
            output_stall_timeout: Duration::from_secs(2),
        }
    }
}

impl PlayerConfig {
    /// Reject values that would leave a task unable to make progress.
    pub fn validate(&self) -> Result<()> {
        if self.block_bytes == 0 {
            return Err(PlayerError::Config("block_bytes must be > 0".into()));
        }
        if self.command_capacity == 0 {
            return Err(PlayerError::Config("command_capacity must be > 0".into()));
        }
        if self.relay_capacity == 0 {
            return Err(PlayerError::Config("relay_capacity must be > 0".into()));
        }
        Ok(())
    }
}

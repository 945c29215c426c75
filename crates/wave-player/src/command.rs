//! Transport commands and the bounded channel that carries them.

use std::path::PathBuf;
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};

use crate::error::{PlayerError, Result};

/// Commands accepted by the transport controller.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportCommand {
    Play(PathBuf),
    Pause,
    Resume,
    Stop,
    /// Reposition to a percentage (0..=100) of the track.
    Seek(f32),
    /// Stop playback and end the controller loop.
    Shutdown,
}

/// Producer side of the command channel, cloned into every caller context.
#[derive(Clone, Debug)]
pub struct CommandSender {
    tx: Sender<TransportCommand>,
    timeout: Duration,
}

/// Create the bounded command channel.
pub fn command_channel(capacity: usize, send_timeout: Duration) -> (CommandSender, Receiver<TransportCommand>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (
        CommandSender {
            tx,
            timeout: send_timeout,
        },
        rx,
    )
}

impl CommandSender {
    /// Enqueue a command, waiting at most the configured send timeout.
    pub fn submit(&self, cmd: TransportCommand) -> Result<()> {
        match self.tx.send_timeout(cmd, self.timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(cmd)) => {
                tracing::warn!(?cmd, "command channel full; dropping command");
                Err(PlayerError::Backpressure("command"))
            }
            Err(SendTimeoutError::Disconnected(_)) => Err(PlayerError::Disconnected("command")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_preserves_fifo_order() {
        let (tx, rx) = command_channel(4, Duration::from_millis(5));
        tx.submit(TransportCommand::Play(PathBuf::from("a.wav"))).unwrap();
        tx.submit(TransportCommand::Pause).unwrap();
        tx.submit(TransportCommand::Seek(50.0)).unwrap();
        assert_eq!(rx.recv().unwrap(), TransportCommand::Play(PathBuf::from("a.wav")));
        assert_eq!(rx.recv().unwrap(), TransportCommand::Pause);
        assert_eq!(rx.recv().unwrap(), TransportCommand::Seek(50.0));
    }

    #[test]
    fn submit_reports_backpressure_when_full() {
        let (tx, rx) = command_channel(1, Duration::from_millis(5));
        tx.submit(TransportCommand::Stop).unwrap();
        let err = tx.submit(TransportCommand::Pause).unwrap_err();
        assert!(matches!(err, PlayerError::Backpressure("command")));
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn submit_reports_disconnect() {
        let (tx, rx) = command_channel(1, Duration::from_millis(5));
        drop(rx);
        let err = tx.submit(TransportCommand::Stop).unwrap_err();
        assert!(matches!(err, PlayerError::Disconnected("command")));
    }
}

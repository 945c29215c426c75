//! Start-up wiring for the transport and spectrum tasks.
//!
//! [`PlayerContext`] owns both channels and both stores. [`PlayerContext::start`]
//! hands each task its half and returns a [`PlayerHandle`]; callers talk to
//! the tasks only through [`PlayerClient`].

use std::thread::JoinHandle;

use crossbeam_channel::Receiver;

use crate::command::{CommandSender, TransportCommand, command_channel};
use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};
use crate::output::AudioOutput;
use crate::spectrum::{
    AudioChunk, AudioRelay, HeightsReader, HeightsStore, SpectrumAnalyzer, SpectrumHeights,
    relay_channel, run_analyzer,
};
use crate::status::{StatusReader, StatusStore, TransportStatus};
use crate::transport::TransportController;

/// Channels, stores and configuration built once at start-up.
pub struct PlayerContext {
    config: PlayerConfig,
    status: StatusStore,
    heights: HeightsStore,
    commands: CommandSender,
    command_rx: Receiver<TransportCommand>,
    relay: AudioRelay,
    relay_rx: Receiver<AudioChunk>,
}

impl PlayerContext {
    pub fn new(config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        let (commands, command_rx) =
            command_channel(config.command_capacity, config.command_send_timeout);
        let (relay, relay_rx) = relay_channel(config.relay_capacity, config.relay_send_timeout);
        Ok(Self {
            config,
            status: StatusStore::new(),
            heights: HeightsStore::new(),
            commands,
            command_rx,
            relay,
            relay_rx,
        })
    }

    /// Spawn the `transport` and `spectrum` threads.
    ///
    /// The transport builds its controller on its own thread, so output
    /// channels never cross threads.
    pub fn start(self, output: Box<dyn AudioOutput + Send>) -> Result<PlayerHandle> {
        let Self {
            config,
            status,
            heights,
            commands,
            command_rx,
            relay,
            relay_rx,
        } = self;

        let spectrum = {
            let heights = heights.clone();
            std::thread::Builder::new()
                .name("spectrum".into())
                .spawn(move || run_analyzer(relay_rx, SpectrumAnalyzer::new(), heights))
                .map_err(|source| PlayerError::Spawn {
                    name: "spectrum",
                    source,
                })?
        };

        let transport = {
            let status = status.clone();
            let config = config.clone();
            std::thread::Builder::new()
                .name("transport".into())
                .spawn(move || {
                    TransportController::new(config, command_rx, output, relay, status).run()
                })
                .map_err(|source| PlayerError::Spawn {
                    name: "transport",
                    source,
                })?
        };

        tracing::info!(
            block_bytes = config.block_bytes,
            relay_capacity = config.relay_capacity,
            "player started"
        );
        Ok(PlayerHandle {
            client: PlayerClient {
                commands,
                status,
                heights,
                config,
            },
            transport: Some(transport),
            spectrum: Some(spectrum),
        })
    }
}

/// Cheap cloneable access to a running player.
#[derive(Clone, Debug)]
pub struct PlayerClient {
    commands: CommandSender,
    status: StatusStore,
    heights: HeightsStore,
    config: PlayerConfig,
}

impl PlayerClient {
    pub fn submit_command(&self, cmd: TransportCommand) -> Result<()> {
        self.commands.submit(cmd)
    }

    /// Bounded-wait status snapshot. Fails with `GuardTimeout` when the
    /// guard stays busy; use [`PlayerClient::status_reader`] to fall back to
    /// the last value instead.
    pub fn try_read_status(&self) -> Result<TransportStatus> {
        self.status.try_snapshot(self.config.read_timeout)
    }

    /// Bounded-wait heights snapshot. Fails with `GuardTimeout` when the
    /// guard stays busy; [`PlayerClient::heights_reader`] never fails.
    pub fn try_read_heights(&self) -> Result<SpectrumHeights> {
        self.heights.try_read(self.config.read_timeout)
    }

    /// Reader that keeps its last status when the guard is busy.
    ///
    /// This is the `read_status` surface for callers that poll: a busy guard
    /// returns the previous snapshot, or the stopped status before the first
    /// successful read.
    pub fn status_reader(&self) -> StatusReader {
        StatusReader::new(self.status.clone(), self.config.read_timeout)
    }

    /// Reader that keeps its last heights when the guard is busy.
    pub fn heights_reader(&self) -> HeightsReader {
        HeightsReader::new(self.heights.clone(), self.config.read_timeout)
    }
}

/// Owner of the running tasks.
pub struct PlayerHandle {
    client: PlayerClient,
    transport: Option<JoinHandle<()>>,
    spectrum: Option<JoinHandle<()>>,
}

impl PlayerHandle {
    pub fn client(&self) -> PlayerClient {
        self.client.clone()
    }

    pub fn submit_command(&self, cmd: TransportCommand) -> Result<()> {
        self.client.submit_command(cmd)
    }

    /// Stop playback and join both tasks.
    pub fn shutdown(mut self) {
        self.stop_tasks();
    }

    fn stop_tasks(&mut self) {
        let Some(transport) = self.transport.take() else {
            return;
        };
        const ATTEMPTS: usize = 20;
        for _ in 0..ATTEMPTS {
            match self.client.submit_command(TransportCommand::Shutdown) {
                Err(PlayerError::Backpressure(_)) => continue,
                Ok(()) | Err(_) => break,
            }
        }
        if transport.join().is_err() {
            tracing::error!("transport thread panicked");
        }
        // The analyzer exits once the transport drops its relay sender.
        if let Some(spectrum) = self.spectrum.take() {
            if spectrum.join().is_err() {
                tracing::error!("spectrum thread panicked");
            }
        }
        tracing::info!("player shut down");
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

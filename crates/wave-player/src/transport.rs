//! Transport controller.
//!
//! Owns the Stopped/Playing/Paused state machine, the open track and its
//! output channel. A single loop waits for the next event: while playing it
//! polls the command channel and otherwise runs one data pump step, so a
//! command takes effect within one block. While stopped or paused it blocks on
//! the command channel.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::command::TransportCommand;
use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};
use crate::output::{AudioOutput, OutputChannel, OutputFormat};
use crate::spectrum::AudioRelay;
use crate::status::{StatusStore, TransportState, TransportStatus};
use crate::wav::{self, WavContainerInfo};

/// Longest end of stream waits for the output to play what it already holds.
const END_OF_STREAM_DRAIN: Duration = Duration::from_millis(500);

enum Event {
    Command(TransportCommand),
    Pump,
    Disconnected,
}

/// Byte source of an open track.
trait TrackReader: Read + Seek {}

impl<T: Read + Seek> TrackReader for T {}

struct LoadedTrack {
    path: PathBuf,
    reader: Box<dyn TrackReader>,
    info: WavContainerInfo,
    channel: Box<dyn OutputChannel>,
    /// Pump read size, a whole number of frames.
    block_bytes: usize,
    /// Payload bytes consumed from the start of the data sub-chunk.
    bytes_played: u64,
}

impl LoadedTrack {
    fn forwards_to_analyzer(&self) -> bool {
        self.info.bits_per_sample == 16 && (1..=2).contains(&self.info.channel_count)
    }
}

pub struct TransportController {
    config: PlayerConfig,
    commands: Receiver<TransportCommand>,
    output: Box<dyn AudioOutput>,
    relay: AudioRelay,
    status: StatusStore,
    state: TransportState,
    track: Option<LoadedTrack>,
    block: Vec<u8>,
}

impl TransportController {
    pub fn new(
        config: PlayerConfig,
        commands: Receiver<TransportCommand>,
        output: Box<dyn AudioOutput>,
        relay: AudioRelay,
        status: StatusStore,
    ) -> Self {
        status.publish(TransportStatus::stopped());
        Self {
            config,
            commands,
            output,
            relay,
            status,
            state: TransportState::Stopped,
            track: None,
            block: Vec::new(),
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Serve commands until `Shutdown` or until every sender is gone.
    ///
    /// Dropping the controller afterwards drops the relay sender, which ends
    /// the analyzer loop.
    pub fn run(mut self) {
        tracing::info!("transport started");
        loop {
            match self.next_event() {
                Event::Command(TransportCommand::Shutdown) => break,
                Event::Command(cmd) => {
                    let label = format!("{cmd:?}");
                    if let Err(e) = self.handle_command(cmd) {
                        tracing::warn!(command = %label, "transport command failed: {e}");
                    }
                }
                Event::Pump => {
                    if let Err(e) = self.pump() {
                        tracing::warn!("playback stopped: {e}");
                        self.stop();
                    }
                }
                Event::Disconnected => {
                    tracing::info!("command channel closed");
                    break;
                }
            }
        }
        self.stop();
        tracing::info!("transport stopped");
    }

    fn next_event(&self) -> Event {
        if self.state == TransportState::Playing {
            match self.commands.try_recv() {
                Ok(cmd) => Event::Command(cmd),
                Err(TryRecvError::Empty) => Event::Pump,
                Err(TryRecvError::Disconnected) => Event::Disconnected,
            }
        } else {
            match self.commands.recv() {
                Ok(cmd) => Event::Command(cmd),
                Err(_) => Event::Disconnected,
            }
        }
    }

    /// Apply one command. Failures leave a consistent published status.
    pub fn handle_command(&mut self, cmd: TransportCommand) -> Result<()> {
        match cmd {
            TransportCommand::Play(path) => self.play(path),
            TransportCommand::Pause => self.pause(),
            TransportCommand::Resume => self.resume(),
            TransportCommand::Stop | TransportCommand::Shutdown => {
                self.stop();
                Ok(())
            }
            TransportCommand::Seek(percent) => self.seek(percent),
        }
    }

    fn play(&mut self, path: PathBuf) -> Result<()> {
        self.stop();

        let file = File::open(&path).map_err(|e| PlayerError::io("open", &path, e))?;
        let mut reader = BufReader::new(file);
        let info = wav::read_header(&mut reader, &path)?;
        let format = OutputFormat {
            sample_rate: info.sample_rate,
            channels: info.channel_count,
            bits_per_sample: info.bits_per_sample,
        };
        let channel = self.output.configure(&format)?;

        let frame = info.block_align.max(1) as usize;
        let block_bytes = (self.config.block_bytes / frame).max(1) * frame;
        let mut track = LoadedTrack {
            path,
            reader: Box::new(reader),
            info,
            channel,
            block_bytes,
            bytes_played: 0,
        };
        track.channel.enable()?;

        tracing::info!(
            path = %track.path.display(),
            rate_hz = info.sample_rate,
            channels = info.channel_count,
            bits = info.bits_per_sample,
            duration_secs = info.duration_secs(),
            "playback started"
        );
        self.status.publish(TransportStatus {
            state: TransportState::Playing,
            track: track.path.clone(),
            total_duration_sec: info.duration_secs(),
            current_position_sec: 0.0,
            channel_count: info.channel_count,
            bits_per_sample: info.bits_per_sample,
            sample_rate: info.sample_rate,
            byte_rate: info.byte_rate,
        });
        self.block.resize(block_bytes, 0);
        self.track = Some(track);
        self.state = TransportState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if self.state != TransportState::Playing {
            tracing::debug!(state = ?self.state, "pause ignored");
            return Ok(());
        }
        if let Some(track) = self.track.as_mut() {
            track.channel.disable()?;
        }
        self.set_state(TransportState::Paused);
        tracing::info!("playback paused");
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if self.state != TransportState::Paused {
            tracing::debug!(state = ?self.state, "resume ignored");
            return Ok(());
        }
        if let Some(track) = self.track.as_mut() {
            track.channel.enable()?;
        }
        self.set_state(TransportState::Playing);
        tracing::info!("playback resumed");
        Ok(())
    }

    /// Release the output and the file and publish the stopped status.
    fn stop(&mut self) {
        if let Some(mut track) = self.track.take() {
            if let Err(e) = track.channel.disable() {
                tracing::warn!("disable output on stop: {e}");
            }
            tracing::info!(path = %track.path.display(), bytes_played = track.bytes_played, "playback stopped");
        }
        self.state = TransportState::Stopped;
        self.status.publish(TransportStatus::stopped());
    }

    fn seek(&mut self, percent: f32) -> Result<()> {
        let playing = match self.state {
            TransportState::Playing => true,
            TransportState::Paused => false,
            TransportState::Stopped => {
                return Err(PlayerError::Validation("seek while stopped".into()));
            }
        };
        let Some(track) = self.track.as_mut() else {
            return Err(PlayerError::Validation("seek without a loaded track".into()));
        };
        if !(0.0..=100.0).contains(&percent) {
            return Err(PlayerError::Validation(format!(
                "seek position {percent} outside 0..=100"
            )));
        }

        let frame = track.info.block_align.max(1) as u64;
        let raw = (track.info.data_chunk_size as f64 * percent as f64 / 100.0) as u64;
        let target = (raw / frame * frame).min(track.info.data_chunk_size);

        if playing {
            track.channel.disable()?;
        }
        let moved = track
            .reader
            .seek(SeekFrom::Start(track.info.data_chunk_offset + target))
            .map_err(|e| PlayerError::io("seek", &track.path, e));
        if moved.is_ok() {
            // Audio queued before the jump must not play after it, paused or not.
            track.channel.discard_buffered();
            track.bytes_played = target;
        }
        let resumed = if playing { track.channel.enable() } else { Ok(()) };
        moved?;

        self.status.update(|s| {
            s.current_position_sec = s.total_duration_sec * percent as f64 / 100.0;
        });
        tracing::info!(percent, target_bytes = target, "seek");
        resumed
    }

    /// Stream one block to the output and the analyzer.
    fn pump(&mut self) -> Result<()> {
        let Some(track) = self.track.as_mut() else {
            self.stop();
            return Ok(());
        };

        let remaining = track.info.data_chunk_size.saturating_sub(track.bytes_played);
        let want = (track.block_bytes as u64).min(remaining) as usize;
        let read = read_block(&mut track.reader, &mut self.block[..want], &track.path)?;
        let frame = track.info.block_align.max(1) as usize;
        let n = read - read % frame;
        if n == 0 {
            track.channel.drain(END_OF_STREAM_DRAIN);
            tracing::info!(path = %track.path.display(), "end of stream");
            self.stop();
            return Ok(());
        }

        let block = &self.block[..n];
        track.channel.write(block)?;
        track.bytes_played += n as u64;

        if track.forwards_to_analyzer() {
            match self.relay.push_pcm16(block, track.info.channel_count) {
                Ok(()) => {}
                Err(PlayerError::Backpressure(_)) => {
                    tracing::trace!("analyzer busy; chunk dropped");
                }
                Err(e) => tracing::debug!("analyzer relay: {e}"),
            }
        }

        let bytes_played = track.bytes_played;
        self.status.update(|s| s.set_position_from_bytes(bytes_played));
        Ok(())
    }

    fn set_state(&mut self, state: TransportState) {
        self.state = state;
        self.status.update(|s| s.state = state);
    }
}

/// Fill `buf` from `reader`, stopping early only at end of file.
fn read_block(reader: &mut impl Read, buf: &mut [u8], path: &Path) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(PlayerError::io("read", path, e)),
        }
    }
    Ok(filled)
}

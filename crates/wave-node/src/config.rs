//! Configuration loading and resolution.
//!
//! An optional TOML file supplies defaults; command line flags override it.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use wave_player::PlayerConfig;
use wave_player::output::hardware::CpalOutputConfig;

use crate::cli::Args;

pub const DEFAULT_BIND: &str = "0.0.0.0:5556";

/// Node configuration file (TOML). Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Output device substring.
    pub device: Option<String>,
    /// Discard audio instead of opening a device.
    pub null_output: Option<bool>,
    /// HTTP bind address (host:port).
    pub bind: Option<String>,
    /// Directory holding the playable .wav files.
    pub media_dir: Option<String>,
    /// Transport and spectrum tuning.
    pub player: Option<PlayerSection>,
}

/// `[player]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerSection {
    pub block_bytes: Option<usize>,
    pub buffer_seconds: Option<f32>,
    pub relay_capacity: Option<usize>,
    pub command_capacity: Option<usize>,
    pub read_timeout_ms: Option<u64>,
    pub output_stall_timeout_ms: Option<u64>,
}

impl NodeConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        Self::parse(&raw).with_context(|| format!("parse config {:?}", path))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str::<NodeConfig>(raw)?)
    }
}

/// How audio leaves the process.
#[derive(Clone, Debug)]
pub enum OutputSettings {
    Device(CpalOutputConfig),
    Null,
}

#[derive(Clone, Debug)]
pub struct PlayConfig {
    pub path: PathBuf,
    pub output: OutputSettings,
    pub player: PlayerConfig,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub media_dir: PathBuf,
    pub output: OutputSettings,
    pub player: PlayerConfig,
}

/// Settings shared by every mode, file values under command line flags.
pub(crate) fn resolve_common(args: &Args, file: &NodeConfig) -> Result<(OutputSettings, PlayerConfig)> {
    let section = file.player.as_ref();
    let mut player = PlayerConfig::default();
    if let Some(block) = args.block_bytes.or(section.and_then(|s| s.block_bytes)) {
        player.block_bytes = block;
    }
    if let Some(cap) = section.and_then(|s| s.relay_capacity) {
        player.relay_capacity = cap;
    }
    if let Some(cap) = section.and_then(|s| s.command_capacity) {
        player.command_capacity = cap;
    }
    if let Some(ms) = section.and_then(|s| s.read_timeout_ms) {
        player.read_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = section.and_then(|s| s.output_stall_timeout_ms) {
        player.output_stall_timeout = Duration::from_millis(ms);
    }
    player.validate()?;

    let null_output = args.null_output || file.null_output.unwrap_or(false);
    let output = if null_output {
        OutputSettings::Null
    } else {
        let mut device = CpalOutputConfig {
            device: normalize_device_name(args.device.clone().or_else(|| file.device.clone())),
            stall_timeout: player.output_stall_timeout,
            ..CpalOutputConfig::default()
        };
        if let Some(secs) = args.buffer_seconds.or(section.and_then(|s| s.buffer_seconds)) {
            device.buffer_seconds = secs;
        }
        OutputSettings::Device(device)
    };
    Ok((output, player))
}

pub fn resolve_play(args: &Args, file: &NodeConfig, path: PathBuf) -> Result<PlayConfig> {
    let (output, player) = resolve_common(args, file)?;
    Ok(PlayConfig {
        path,
        output,
        player,
    })
}

pub fn resolve_serve(
    args: &Args,
    file: &NodeConfig,
    bind: Option<SocketAddr>,
    media_dir: Option<PathBuf>,
) -> Result<ServeConfig> {
    let (output, player) = resolve_common(args, file)?;
    let bind = match bind {
        Some(addr) => addr,
        None => file
            .bind
            .as_deref()
            .unwrap_or(DEFAULT_BIND)
            .parse()
            .with_context(|| format!("parse bind address {:?}", file.bind))?,
    };
    let media_dir = media_dir
        .or_else(|| file.media_dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(ServeConfig {
        bind,
        media_dir,
        output,
        player,
    })
}

pub(crate) fn normalize_device_name(device: Option<String>) -> Option<String> {
    device.and_then(|name| {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

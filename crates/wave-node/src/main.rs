//! wave-node: plays PCM WAV files through CPAL and publishes a live 32-band
//! spectrum.
//!
//! ## Modes
//! - `play <path>`: play one file to the end.
//! - `serve`: run the HTTP control API over the files in a media directory.

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wave_node::{cli, config, runtime};

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,wave_node=info,wave_player=info")
        }))
        .init();

    if args.list_devices {
        return runtime::list_devices();
    }

    let file = match args.config.as_ref() {
        Some(path) => config::NodeConfig::load(path)?,
        None => config::NodeConfig::default(),
    };

    match &args.cmd {
        Some(cli::Command::Play { path }) => {
            let cfg = config::resolve_play(&args, &file, path.clone())?;
            runtime::run_play(cfg)
        }
        Some(cli::Command::Serve { bind, media_dir }) => {
            let cfg = config::resolve_serve(&args, &file, *bind, media_dir.clone())?;
            runtime::run_serve(cfg)
        }
        None => Err(anyhow!("no command given; try `wave-node play <path>` or `wave-node serve`")),
    }
}

//! Node runtime helpers.
//!
//! Provides device enumeration, single-file playback and the HTTP control
//! server.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use wave_player::output::{AudioOutput, CpalOutput, NullOutput, device};
use wave_player::{PlayerContext, TransportCommand, TransportState};

use crate::config::{OutputSettings, PlayConfig, ServeConfig};
use crate::http_api;

const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(100);
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(5);
const START_TIMEOUT: Duration = Duration::from_secs(3);

/// List output devices and print them to stdout.
pub fn list_devices() -> Result<()> {
    let names = device::list_devices().context("list output devices")?;
    if names.is_empty() {
        println!("no output devices found");
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

/// Play one file to the end, or until Ctrl-C.
pub fn run_play(config: PlayConfig) -> Result<()> {
    let handle = PlayerContext::new(config.player.clone())?.start(build_output(&config.output))?;
    let client = handle.client();

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        install_ctrlc(move || interrupted.store(true, Ordering::Relaxed));
    }

    client.submit_command(TransportCommand::Play(config.path.clone()))?;
    let mut reader = client.status_reader();
    let started = Instant::now();
    let mut last_progress = Instant::now();
    let mut seen_playing = false;
    loop {
        if interrupted.load(Ordering::Relaxed) {
            tracing::info!("interrupted; stopping playback");
            let _ = client.submit_command(TransportCommand::Stop);
            break;
        }
        let status = reader.read();
        match status.state {
            TransportState::Stopped if seen_playing => break,
            TransportState::Stopped if started.elapsed() > START_TIMEOUT => {
                handle.shutdown();
                return Err(anyhow!("playback of {:?} did not start", config.path));
            }
            TransportState::Stopped => {}
            TransportState::Playing | TransportState::Paused => {
                seen_playing = true;
                if last_progress.elapsed() >= PROGRESS_LOG_INTERVAL {
                    last_progress = Instant::now();
                    tracing::info!(
                        position_secs = status.current_position_sec,
                        duration_secs = status.total_duration_sec,
                        "playing"
                    );
                }
            }
        }
        std::thread::sleep(STATUS_POLL_INTERVAL);
    }

    handle.shutdown();
    Ok(())
}

/// Run the HTTP control API until Ctrl-C.
pub fn run_serve(config: ServeConfig) -> Result<()> {
    if !config.media_dir.is_dir() {
        return Err(anyhow!("media dir {:?} is not a directory", config.media_dir));
    }
    let handle = PlayerContext::new(config.player.clone())?.start(build_output(&config.output))?;
    let client = handle.client();
    tracing::info!(
        bind = %config.bind,
        media_dir = %config.media_dir.display(),
        "starting wave-node"
    );

    let state = actix_web::web::Data::new(http_api::AppState::new(client.clone(), config.media_dir.clone()));
    let served = actix_web::rt::System::new().block_on(async move {
        let server = http_api::build_server(config.bind, state)
            .with_context(|| format!("bind {}", config.bind))?;
        let server_handle = server.handle();
        install_ctrlc(move || {
            tracing::info!("shutdown requested");
            let _ = client.submit_command(TransportCommand::Stop);
            // The stop request is sent eagerly; the returned future only awaits completion.
            let _ = server_handle.stop(true);
        });
        server.await.context("http server")
    });

    handle.shutdown();
    served
}

/// Install the Ctrl-C handler. Playback still runs without one, so a
/// failure is only logged.
fn install_ctrlc(handler: impl FnMut() + Send + 'static) -> bool {
    match ctrlc::set_handler(handler) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("ctrl-c handler not installed: {e}");
            false
        }
    }
}

fn build_output(settings: &OutputSettings) -> Box<dyn AudioOutput + Send> {
    match settings {
        OutputSettings::Device(cfg) => Box::new(CpalOutput::new(cfg.clone())),
        OutputSettings::Null => {
            tracing::info!("audio output disabled");
            Box::new(NullOutput::new(true))
        }
    }
}

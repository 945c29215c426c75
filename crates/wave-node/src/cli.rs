use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "wave-node", version = VERSION)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Discard audio instead of opening a device (still paced in real time)
    #[arg(long)]
    pub null_output: bool,

    /// Optional config file (TOML); command line flags win
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bytes read from the file per transport step
    #[arg(long)]
    pub block_bytes: Option<usize>,

    /// Output buffer between the transport and the device, in seconds
    #[arg(long)]
    pub buffer_seconds: Option<f32>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play one WAV file to the end
    Play {
        /// Path to a PCM WAV file
        path: PathBuf,
    },

    /// Run the HTTP control API
    Serve {
        /// HTTP API bind address, e.g. 0.0.0.0:5556
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Directory holding the playable .wav files
        #[arg(long)]
        media_dir: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_takes_a_path() {
        let args = Args::try_parse_from(["wave-node", "--device", "USB", "play", "song.wav"]).unwrap();
        assert_eq!(args.device.as_deref(), Some("USB"));
        assert!(matches!(args.cmd, Some(Command::Play { path }) if path == PathBuf::from("song.wav")));
    }

    #[test]
    fn serve_flags_are_optional() {
        let args = Args::try_parse_from(["wave-node", "--null-output", "serve"]).unwrap();
        assert!(args.null_output);
        assert!(matches!(
            args.cmd,
            Some(Command::Serve {
                bind: None,
                media_dir: None
            })
        ));
    }

    #[test]
    fn list_devices_needs_no_subcommand() {
        let args = Args::try_parse_from(["wave-node", "--list-devices"]).unwrap();
        assert!(args.list_devices);
        assert!(args.cmd.is_none());
    }
}

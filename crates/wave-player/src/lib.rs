//! WAV transport and spectrum analyzer core.
//!
//! Two long-lived tasks share this crate: the transport streams the `data`
//! sub-chunk of a PCM WAV file to an [`output::AudioOutput`], and the
//! spectrum analyzer turns copies of that audio into 32 band heights. Start
//! both with [`context::PlayerContext`].

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod output;
pub mod spectrum;
pub mod status;
pub mod transport;
pub mod wav;

pub use command::TransportCommand;
pub use config::PlayerConfig;
pub use context::{PlayerClient, PlayerContext, PlayerHandle};
pub use error::{PlayerError, Result};
pub use status::{TransportState, TransportStatus};

//! Error type shared by the transport, output and spectrum stages.

use std::path::PathBuf;

/// Result alias carrying [`PlayerError`].
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Failures reported by the player core.
///
/// None of these are fatal to the running tasks: the transport logs them and
/// keeps serving commands. Only start-up (see [`crate::context`]) turns them
/// into an abort.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// File open/read/seek failure.
    #[error("{context} {path:?}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The container is not PCM WAV or is structurally broken.
    #[error("unsupported container: {0}")]
    Format(String),
    /// A command was rejected in the current transport state.
    #[error("rejected: {0}")]
    Validation(String),
    /// The hardware output could not be configured or stopped accepting data.
    #[error("output: {0}")]
    Output(String),
    /// Copying a chunk for the analyzer could not allocate.
    #[error("out of memory while copying audio chunk")]
    ResourceExhausted,
    /// A bounded channel stayed full for the whole send window.
    #[error("{0} channel full")]
    Backpressure(&'static str),
    /// A guarded store was not released within the read window.
    #[error("{0} guard timed out")]
    GuardTimeout(&'static str),
    /// The receiving task is gone.
    #[error("{0} channel disconnected")]
    Disconnected(&'static str),
    /// A worker thread could not be started.
    #[error("spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    /// Invalid start-up configuration.
    #[error("config: {0}")]
    Config(String),
}

impl PlayerError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }
}

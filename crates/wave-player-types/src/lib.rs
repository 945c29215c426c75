use serde::{Deserialize, Serialize};

/// Command accepted by `POST /api/control`.
///
/// Tagged by the `command` field, for example
/// `{"command": "play", "track": "song.wav"}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum RemoteCommand {
    /// Start a track from the media directory.
    Play {
        /// File name relative to the media directory.
        track: String,
    },
    Pause,
    Resume,
    Stop,
    /// Jump to a percentage of the track.
    Seek {
        /// 0 to 100.
        value: f32,
    },
}

/// Transport state as reported to remote clients.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemoteState {
    Stopped,
    Playing,
    Paused,
}

/// Payload of `GET /api/status`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatus {
    /// `true` only while audio is streaming.
    pub is_playing: bool,
    /// File name of the loaded track, or `none`.
    pub track: String,
    /// Elapsed seconds, truncated.
    pub position: u64,
    /// Track length in seconds, truncated.
    pub duration: u64,
    pub state: RemoteState,
}

/// Payload of `GET /api/spectrum`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpectrumResponse {
    /// One height per band, low to high frequency, each 0 to 15.
    pub heights: Vec<u8>,
}

/// Reply to an accepted control command.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlAccepted {
    pub status: String,
}

impl ControlAccepted {
    pub fn queued() -> Self {
        Self {
            status: "queued".to_string(),
        }
    }
}

/// Error body returned with 4xx/5xx replies.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

/// Payload of `GET /health`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

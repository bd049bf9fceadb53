//! Error types for the Quill gateway

use thiserror::Error;

/// Result type alias for Quill operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Quill gateway
///
/// Every failure is terminal for the operation that raised it; nothing here
/// is retried automatically. The UI layer receives a single message string
/// via [`Error::message`], never a structured code.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing credential, bad config file)
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP/network failure reaching the token or synthesis endpoints
    #[error("transport error: {0}")]
    Transport(String),

    /// Realtime transcription channel failed to establish or dropped
    #[error("connection error: {0}")]
    Connection(String),

    /// Speech synthesis failure
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Audio device or codec error
    #[error("audio error: {0}")]
    Audio(String),

    /// Audio resource failed to play
    #[error("playback error: {0}")]
    Playback(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// The user-visible message for this error
    ///
    /// Endpoint error bodies are carried verbatim in the string-payload
    /// variants and must reach the user unchanged.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Config(m)
            | Self::Transport(m)
            | Self::Connection(m)
            | Self::Synthesis(m)
            | Self::Audio(m)
            | Self::Playback(m) => m.clone(),
            other => other.to_string(),
        }
    }
}

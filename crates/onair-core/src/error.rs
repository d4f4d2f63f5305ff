//! Error types for OnAir Core

use thiserror::Error;

/// Result type alias for lifecycle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lifecycle error types
///
/// None of these ever reach the page. The controller turns a recoverable
/// start failure into OFFLINE plus a retry, and any other failure into the
/// unsupported state.
#[derive(Error, Debug)]
pub enum Error {
    // Engine errors
    #[error("Failed to load source into engine: {0}")]
    EngineLoad(String),

    #[error("Native playback rejected source: {0}")]
    NativePlayback(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Network errors
    #[cfg(feature = "runtime")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an engine load error
    pub fn engine(msg: impl Into<String>) -> Self {
        Error::EngineLoad(msg.into())
    }

    /// Returns true if retrying the same start can succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::EngineLoad(_) | Error::NativePlayback(_) | Error::Io(_) => true,
            #[cfg(feature = "runtime")]
            Error::Network(_) => true,
            _ => false,
        }
    }

    /// Returns the error code used in log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::EngineLoad(_) => "ENGINE_LOAD",
            Error::NativePlayback(_) => "NATIVE_PLAYBACK",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            #[cfg(feature = "runtime")]
            Error::Network(_) => "NETWORK",
            Error::Url(_) => "URL",
            Error::Io(_) => "IO",
        }
    }
}

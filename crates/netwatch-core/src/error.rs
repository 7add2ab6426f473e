//! Error types for the netwatch system
//!
//! Probe-local failures (one URL or host unreachable) never show up here:
//! validators turn them into `false`. This enum covers configuration problems,
//! cancellation and failures the orchestrator cannot absorb.

use crate::validation::ProbeKind;
use thiserror::Error;

/// Result type alias for netwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the netwatch system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A check selected a probe kind nobody registered
    #[error("No validator registered for probe kind '{0}'")]
    MissingValidator(ProbeKind),

    /// A probe task failed in a way it could not absorb (e.g. it panicked)
    #[error("Probe error ({probe}): {message}")]
    Probe {
        /// Probe kind
        probe: ProbeKind,
        /// Error message
        message: String,
    },

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Ping primitive errors
    #[error("Ping error: {0}")]
    Ping(String),

    /// The operation was cancelled through its cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a probe error
    pub fn probe(probe: ProbeKind, message: impl Into<String>) -> Self {
        Self::Probe {
            probe,
            message: message.into(),
        }
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a ping error
    pub fn ping(msg: impl Into<String>) -> Self {
        Self::Ping(msg.into())
    }

    /// Whether this error is the cancellation signal rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

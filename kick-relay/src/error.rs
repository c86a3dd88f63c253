//! Application-wide error types.

use thiserror::Error;
use twitch_source::ResolveError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Source not live: {0}")]
    NotLive(String),

    #[error("Upstream protocol error: {0}")]
    Protocol(String),

    #[error("A relay is already active")]
    AlreadyActive,

    #[error("No active relay")]
    NoActiveSession,

    #[error("Failed to spawn relay process: {0}")]
    Spawn(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<ResolveError> for Error {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotLive { channel, .. } => Self::NotLive(channel),
            ResolveError::InvalidChannel(_) | ResolveError::UnknownQuality(_) => {
                Self::Validation(err.to_string())
            }
            other => Self::Protocol(other.to_string()),
        }
    }
}

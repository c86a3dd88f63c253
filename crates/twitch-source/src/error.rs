use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid channel: {0}")]
    InvalidChannel(String),
    #[error("unknown quality: {0}")]
    UnknownQuality(String),
    #[error("channel {channel} is not live (manifest status {status})")]
    NotLive { channel: String, status: u16 },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResolveError {
    /// Whether this error means the channel simply has no broadcast right now.
    pub fn is_not_live(&self) -> bool {
        matches!(self, Self::NotLive { .. })
    }
}

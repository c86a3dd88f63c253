//! Runtime configuration loaded from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::relay::{DEFAULT_INGEST_URL, DEFAULT_LOG_CAPACITY};
use crate::{Error, Result};

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(15);

/// Process-wide settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_address: String,
    pub port: u16,
    /// Explicit ffmpeg path; discovered when unset.
    pub ffmpeg_path: Option<PathBuf>,
    /// Destination base; the stream key is appended as the final path segment.
    pub ingest_url: String,
    /// Per-request timeout for the token exchange and manifest fetch.
    pub resolve_timeout: Duration,
    pub log_capacity: usize,
    /// Enables daily-rotated file logging when set.
    pub log_dir: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            ffmpeg_path: None,
            ingest_url: DEFAULT_INGEST_URL.to_string(),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            log_capacity: DEFAULT_LOG_CAPACITY,
            log_dir: None,
        }
    }
}

impl RelayConfig {
    /// Load from the process environment.
    ///
    /// Supported env vars:
    /// - `API_BIND_ADDRESS`
    /// - `API_PORT`, falling back to `PORT`
    /// - `FFMPEG_PATH`
    /// - `KICK_INGEST_URL`
    /// - `RESOLVE_TIMEOUT_SECS`
    /// - `RELAY_LOG_CAPACITY`
    /// - `LOG_DIR`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(bind_address) = get("API_BIND_ADDRESS") {
            config.bind_address = bind_address;
        }
        if let Some(port) = get("API_PORT").or_else(|| get("PORT")) {
            config.port = parse_value("API_PORT", &port)?;
        }
        config.ffmpeg_path = get("FFMPEG_PATH").map(PathBuf::from);
        if let Some(ingest_url) = get("KICK_INGEST_URL") {
            if !(ingest_url.starts_with("rtmp://") || ingest_url.starts_with("rtmps://")) {
                return Err(Error::config(format!(
                    "KICK_INGEST_URL must be an rtmp:// or rtmps:// URL, got '{ingest_url}'"
                )));
            }
            config.ingest_url = ingest_url;
        }
        if let Some(secs) = get("RESOLVE_TIMEOUT_SECS") {
            let secs: u64 = parse_value("RESOLVE_TIMEOUT_SECS", &secs)?;
            if secs == 0 {
                return Err(Error::config("RESOLVE_TIMEOUT_SECS must be greater than 0"));
            }
            config.resolve_timeout = Duration::from_secs(secs);
        }
        if let Some(capacity) = get("RELAY_LOG_CAPACITY") {
            let capacity: usize = parse_value("RELAY_LOG_CAPACITY", &capacity)?;
            if capacity == 0 {
                return Err(Error::config("RELAY_LOG_CAPACITY must be greater than 0"));
            }
            config.log_capacity = capacity;
        }
        config.log_dir = get("LOG_DIR").map(PathBuf::from);

        Ok(config)
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::config(format!("Invalid {key} '{value}': {e}")))
}

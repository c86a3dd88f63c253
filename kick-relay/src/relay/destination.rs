//! Outbound ingest URL handling.

use crate::{Error, Result};

/// Kick's RTMPS ingest; the stream key is appended as the final path segment.
pub const DEFAULT_INGEST_URL: &str = "rtmps://fa723fc1b171.global-contribute.live-video.net/app";

const REDACTED: &str = "****";

/// Build the destination URL for `stream_key`.
pub fn destination_url(ingest_base: &str, stream_key: &str) -> Result<String> {
    let key = stream_key.trim();
    if key.is_empty() {
        return Err(Error::validation("destination stream key is empty"));
    }
    if key.contains(|c: char| c.is_whitespace() || c == '/' || c == '?' || c == '#') {
        return Err(Error::validation(
            "destination stream key contains invalid characters",
        ));
    }
    Ok(format!("{}/{}", ingest_base.trim_end_matches('/'), key))
}

/// Hide the stream key (last path segment) of an RTMP(S) URL.
pub fn redact_destination(url: &str) -> String {
    if !(url.starts_with("rtmp://") || url.starts_with("rtmps://")) {
        return url.to_string();
    }
    let path_start = url.find("://").map_or(0, |p| p + 3);
    match url.rfind('/') {
        Some(idx) if idx >= path_start && idx + 1 < url.len() => {
            format!("{}/{REDACTED}", &url[..idx])
        }
        _ => url.to_string(),
    }
}

/// Redact every RTMP(S) URL in an argument list.
pub fn redact_args(args: &[String]) -> Vec<String> {
    args.iter().map(|a| redact_destination(a)).collect()
}

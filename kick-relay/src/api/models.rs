//! Request and response bodies.

use serde::{Deserialize, Serialize};

use crate::relay::SessionInfo;

/// Body of `POST /api/stream`.
///
/// Fields are optional at the serde level so that a missing field is reported
/// as a validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStreamRequest {
    #[serde(default, alias = "twitchUsername")]
    pub source_channel: Option<String>,
    #[serde(default, alias = "kickStreamKey")]
    pub destination_stream_key: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStreamResponse {
    pub success: bool,
    pub message: String,
    pub session: SessionInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopStreamResponse {
    pub success: bool,
    pub message: String,
}

/// Query of `GET /api/stream/source`.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceQuery {
    pub channel: String,
    #[serde(default)]
    pub quality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceResponse {
    pub channel: String,
    pub quality: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub relay_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_request_accepts_both_field_spellings() {
        let current: StartStreamRequest = serde_json::from_str(
            r#"{"sourceChannel":"shroud","destinationStreamKey":"sk_abc","quality":"720p"}"#,
        )
        .unwrap();
        assert_eq!(current.source_channel.as_deref(), Some("shroud"));
        assert_eq!(current.destination_stream_key.as_deref(), Some("sk_abc"));
        assert_eq!(current.quality.as_deref(), Some("720p"));

        let legacy: StartStreamRequest =
            serde_json::from_str(r#"{"twitchUsername":"shroud","kickStreamKey":"sk_abc"}"#)
                .unwrap();
        assert_eq!(legacy.source_channel.as_deref(), Some("shroud"));
        assert_eq!(legacy.destination_stream_key.as_deref(), Some("sk_abc"));
        assert!(legacy.quality.is_none());
    }

    #[test]
    fn test_start_request_missing_fields() {
        let empty: StartStreamRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.source_channel.is_none());
        assert!(empty.destination_stream_key.is_none());
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            uptime_secs: 3600,
            relay_active: false,
            ffmpeg_version: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["uptimeSecs"], 3600);
        assert_eq!(json["relayActive"], false);
        assert!(json.get("ffmpegVersion").is_none());
    }
}

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, error, info};
use url::Url;

use crate::error::ResolveError;
use crate::manifest::Manifest;
use crate::models::{GqlResponse, PlaybackAccessToken, PlaybackAccessTokenData};
use crate::quality::Quality;

/// Public web-player client id accepted by the GraphQL gateway.
pub const CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";

const PLAYBACK_ACCESS_TOKEN_HASH: &str =
    "0828119ded1c134779664348596871485c815d28a38bc838173689910bf7aa36";

const PLAYBACK_ACCESS_TOKEN_QUERY: &str = r#"query PlaybackAccessToken($login: String!, $playerType: String!) {
  streamPlaybackAccessToken(channelName: $login, params: {platform: "web", playerBackend: "mediaplayer", playerType: $playerType}) {
    value
    signature
    __typename
  }
}"#;

static CHANNEL_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.|m\.)?twitch\.tv/([^/?#]+)").expect("valid regex")
});

static LOGIN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]{1,25}$").expect("valid regex"));

/// Normalize operator input (a login or a channel URL) to a lower-case login.
pub fn normalize_channel(input: &str) -> Result<String, ResolveError> {
    let trimmed = input.trim();
    let login = CHANNEL_URL_REGEX
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str())
        .to_ascii_lowercase();

    if LOGIN_REGEX.is_match(&login) {
        Ok(login)
    } else {
        Err(ResolveError::InvalidChannel(input.to_string()))
    }
}

/// Upstream endpoints, overridable so tests can point at a local server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// GraphQL gateway used for the token exchange.
    pub gql_url: String,
    /// Base for `<base>/<channel>.m3u8` manifests.
    pub usher_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            gql_url: "https://gql.twitch.tv/gql".to_string(),
            usher_base: "https://usher.ttvnw.net/api/channel/hls".to_string(),
        }
    }
}

/// Produces a playable media URL for a live channel.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, channel: &str, quality: Quality) -> Result<String, ResolveError>;
}

/// Two-step resolver: playback token exchange, then manifest fetch and variant selection.
///
/// Every call makes exactly one attempt per step; nothing is retried.
#[derive(Debug, Clone)]
pub struct TwitchResolver {
    client: Client,
    endpoints: Endpoints,
}

impl TwitchResolver {
    pub fn new(client: Client) -> Self {
        Self::with_endpoints(client, Endpoints::default())
    }

    pub fn with_endpoints(client: Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    fn token_request_body(channel: &str) -> serde_json::Value {
        serde_json::json!({
            "operationName": "PlaybackAccessToken",
            "variables": {
                "login": channel,
                "playerType": "embed",
            },
            "extensions": {
                "persistedQuery": {
                    "version": 1,
                    "sha256Hash": PLAYBACK_ACCESS_TOKEN_HASH,
                }
            },
            "query": PLAYBACK_ACCESS_TOKEN_QUERY,
        })
    }

    /// Exchange the channel login for a playback token.
    pub async fn playback_access_token(
        &self,
        channel: &str,
    ) -> Result<PlaybackAccessToken, ResolveError> {
        let response = self
            .client
            .post(&self.endpoints.gql_url)
            .header("Client-Id", CLIENT_ID)
            .json(&Self::token_request_body(channel))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(%status, body = %body, "Token exchange failed");
            return Err(ResolveError::Protocol(format!(
                "token exchange returned {status}"
            )));
        }
        debug!(len = body.len(), "Token response received");

        let parsed: GqlResponse<PlaybackAccessTokenData> = serde_json::from_str(&body)?;
        if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
            let detail = serde_json::to_string(&errors).unwrap_or_default();
            error!(errors = %detail, "Token exchange returned GraphQL errors");
            return Err(ResolveError::Protocol(format!(
                "token exchange rejected: {detail}"
            )));
        }

        parsed
            .data
            .and_then(|d| d.stream_playback_access_token)
            .ok_or_else(|| {
                error!(body = %body, "No playback access token in response");
                ResolveError::Protocol("no playback access token in response".to_string())
            })
    }

    /// Manifest URL carrying the token; also the last-resort playable value.
    pub fn manifest_url(
        &self,
        channel: &str,
        token: &PlaybackAccessToken,
    ) -> Result<Url, ResolveError> {
        let base = format!(
            "{}/{}.m3u8",
            self.endpoints.usher_base.trim_end_matches('/'),
            channel
        );
        Url::parse_with_params(
            &base,
            &[
                ("allow_source", "true"),
                ("allow_audio_only", "true"),
                ("allow_spectre", "true"),
                ("player", "twitchweb"),
                ("playlist_include_framerate", "true"),
                ("segment_preference", "4"),
                ("sig", token.signature.as_str()),
                ("token", token.value.as_str()),
            ],
        )
        .map_err(|e| ResolveError::InvalidUrl(e.to_string()))
    }

    async fn fetch_manifest(&self, channel: &str, url: &Url) -> Result<String, ResolveError> {
        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body = %body, "Manifest fetch failed");
            return Err(ResolveError::NotLive {
                channel: channel.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl SourceResolver for TwitchResolver {
    async fn resolve(&self, channel: &str, quality: Quality) -> Result<String, ResolveError> {
        let channel = normalize_channel(channel)?;
        info!(channel = %channel, quality = %quality, "Resolving source stream");

        let token = self.playback_access_token(&channel).await?;
        let manifest_url = self.manifest_url(&channel, &token)?;
        let text = self.fetch_manifest(&channel, &manifest_url).await?;

        match Manifest::parse(&text).select(quality) {
            Some(url) => Ok(url.to_string()),
            None => {
                debug!(channel = %channel, "Manifest lists no variants, using manifest url");
                Ok(manifest_url.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_logins_and_urls() {
        assert_eq!(normalize_channel(" Shroud ").unwrap(), "shroud");
        assert_eq!(
            normalize_channel("https://www.twitch.tv/Summit1G?referrer=raid").unwrap(),
            "summit1g"
        );
        assert_eq!(normalize_channel("twitch.tv/abby_").unwrap(), "abby_");
    }

    #[test]
    fn rejects_invalid_channels() {
        assert!(matches!(
            normalize_channel(""),
            Err(ResolveError::InvalidChannel(_))
        ));
        assert!(normalize_channel("no spaces allowed").is_err());
        assert!(normalize_channel("../etc/passwd").is_err());
    }

    #[test]
    fn manifest_url_carries_token() {
        let resolver = TwitchResolver::new(Client::new());
        let token = PlaybackAccessToken {
            value: r#"{"channel":"shroud"}"#.to_string(),
            signature: "abc123".to_string(),
        };
        let url = resolver.manifest_url("shroud", &token).unwrap();
        assert_eq!(url.path(), "/api/channel/hls/shroud.m3u8");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("sig".to_string(), "abc123".to_string())));
        assert!(pairs.contains(&("token".to_string(), r#"{"channel":"shroud"}"#.to_string())));
        assert!(pairs.contains(&("allow_source".to_string(), "true".to_string())));
    }

    #[test]
    fn token_body_uses_persisted_query() {
        let body = TwitchResolver::token_request_body("shroud");
        assert_eq!(body["operationName"], "PlaybackAccessToken");
        assert_eq!(body["variables"]["login"], "shroud");
        assert_eq!(
            body["extensions"]["persistedQuery"]["sha256Hash"],
            PLAYBACK_ACCESS_TOKEN_HASH
        );
    }
}

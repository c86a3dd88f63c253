use serde::Deserialize;

/// GraphQL envelope. `errors` is present (and non-empty) when the query was rejected.
#[derive(Debug, Deserialize)]
pub(crate) struct GqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlaybackAccessTokenData {
    pub stream_playback_access_token: Option<PlaybackAccessToken>,
}

/// Short-lived playback authorization returned by the token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackAccessToken {
    pub value: String,
    pub signature: String,
}

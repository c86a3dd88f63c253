use std::time::Duration;

use reqwest::Client;

use crate::error::ResolveError;

pub const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Upper bound on a single token-exchange or manifest request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client used for both resolution steps.
///
/// The connect timeout is capped at 10 seconds even for longer request timeouts.
pub fn default_client(timeout: Duration) -> Result<Client, ResolveError> {
    let client = Client::builder()
        .user_agent(DEFAULT_UA)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()?;
    Ok(client)
}

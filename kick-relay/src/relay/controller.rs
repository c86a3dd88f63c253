//! Start/stop/status orchestration for the single relay session.

use std::sync::Arc;

use tracing::{info, warn};
use twitch_source::{Quality, SourceResolver, normalize_channel};

use super::destination::{destination_url, redact_destination};
use super::session::{SessionInfo, SessionStore, StatusSnapshot};
use super::supervisor::RelaySupervisor;
use crate::{Error, Result};

/// Operator input for starting a relay.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub channel: String,
    pub stream_key: String,
    pub quality: Quality,
}

/// Entry point for the HTTP layer: resolves the source, admits one session
/// at a time and hands the process to the supervisor.
pub struct RelayController {
    resolver: Arc<dyn SourceResolver>,
    supervisor: RelaySupervisor,
    store: Arc<SessionStore>,
    ingest_url: String,
}

impl RelayController {
    pub fn new(
        resolver: Arc<dyn SourceResolver>,
        supervisor: RelaySupervisor,
        store: Arc<SessionStore>,
        ingest_url: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            supervisor,
            store,
            ingest_url: ingest_url.into(),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Resolve a playable source URL without starting anything.
    pub async fn resolve_source(&self, channel: &str, quality: Quality) -> Result<String> {
        let channel = normalize_channel(channel)?;
        Ok(self.resolver.resolve(&channel, quality).await?)
    }

    /// Start relaying `request.channel` to the configured ingest.
    ///
    /// The slot is reserved before the (slow) source resolution, so a second
    /// start arriving meanwhile fails fast with [`Error::AlreadyActive`].
    pub async fn start(&self, request: StartRequest) -> Result<SessionInfo> {
        if request.channel.trim().is_empty() {
            return Err(Error::validation("source channel is required"));
        }
        let channel = normalize_channel(&request.channel)?;
        let destination = destination_url(&self.ingest_url, &request.stream_key)?;

        let reservation = self.store.reserve()?;
        info!(
            channel = %channel,
            quality = %request.quality,
            destination = %redact_destination(&destination),
            "Resolving relay source"
        );

        let source_url = match self.resolver.resolve(&channel, request.quality).await {
            Ok(url) => url,
            Err(e) => {
                warn!(channel = %channel, "Source resolution failed: {e}");
                return Err(e.into());
            }
        };

        self.supervisor
            .launch(reservation, &channel, &source_url, &destination)
    }

    /// Stop the active relay. Returns immediately; the process is killed in the background.
    pub fn stop(&self) -> Result<SessionInfo> {
        self.supervisor.stop()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.store.status()
    }

    pub fn is_active(&self) -> bool {
        self.store.is_active()
    }

    /// Stop any active relay before the host exits.
    pub fn shutdown(&self) {
        match self.stop() {
            Ok(info) => info!(session_id = %info.id, "Stopped active relay on shutdown"),
            Err(Error::NoActiveSession) => {}
            Err(e) => warn!("Failed to stop relay on shutdown: {e}"),
        }
    }
}

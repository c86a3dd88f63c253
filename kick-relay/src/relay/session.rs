//! Single-slot session state shared by the controller, the supervisor tasks
//! and status queries.
//!
//! All mutations go through one mutex, so a reader never sees a half-built
//! session. The slot moves `Idle -> Starting -> Active -> Idle`; `Starting` is
//! held by a [`StartReservation`] while the source is resolved and the
//! process spawned.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::telemetry::{self, RelayMetrics};
use crate::{Error, Result};

/// Default number of diagnostic lines retained.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Identity of one relay session, used to tell a stale process apart from the current one.
pub type SessionId = Uuid;

/// Public description of the active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: SessionId,
    pub channel: String,
    pub start_time: DateTime<Utc>,
}

/// Session info plus derived uptime, as reported by status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    #[serde(flatten)]
    pub info: SessionInfo,
    pub uptime_secs: i64,
}

/// Point-in-time view of the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub active: bool,
    pub session_info: Option<SessionStatus>,
    pub latest_metrics: Option<RelayMetrics>,
    pub recent_logs: Vec<String>,
}

/// How a relay process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Code(i32),
    /// Terminated by a signal, no exit code.
    Signal,
    /// The exit status could not be collected.
    Unknown,
}

impl std::fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Signal => f.write_str("signal"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Bounded FIFO of diagnostic lines; the oldest line is evicted first.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    pub fn reset<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.clear();
        for line in lines {
            self.push(line);
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

#[derive(Debug)]
struct ActiveSession {
    info: SessionInfo,
    kill_switch: CancellationToken,
}

#[derive(Debug)]
enum Slot {
    Idle,
    Starting(SessionId),
    Active(ActiveSession),
}

#[derive(Debug)]
struct StoreState {
    slot: Slot,
    logs: LogBuffer,
    metrics: Option<RelayMetrics>,
}

impl StoreState {
    fn owned_by(&self, id: SessionId) -> bool {
        matches!(&self.slot, Slot::Active(session) if session.info.id == id)
    }
}

/// Process-wide relay state. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct SessionStore {
    state: Mutex<StoreState>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl SessionStore {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            state: Mutex::new(StoreState {
                slot: Slot::Idle,
                logs: LogBuffer::new(log_capacity),
                metrics: None,
            }),
        }
    }

    /// Claim the slot for a new session.
    ///
    /// Fails with [`Error::AlreadyActive`] while another session is starting or running.
    pub fn reserve(self: &Arc<Self>) -> Result<StartReservation> {
        let mut state = self.state.lock();
        if !matches!(state.slot, Slot::Idle) {
            return Err(Error::AlreadyActive);
        }
        let id = Uuid::new_v4();
        state.slot = Slot::Starting(id);
        Ok(StartReservation {
            store: Arc::clone(self),
            id,
            committed: false,
        })
    }

    fn release(&self, id: SessionId) {
        let mut state = self.state.lock();
        if matches!(state.slot, Slot::Starting(reserved) if reserved == id) {
            state.slot = Slot::Idle;
        }
    }

    /// Operator stop: clear the session and hand back its kill switch.
    pub fn end_by_operator(&self) -> Result<(SessionInfo, CancellationToken)> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut state.slot, Slot::Idle) {
            Slot::Active(session) => {
                state.metrics = None;
                state.logs.push("Relay stopped by operator");
                Ok((session.info, session.kill_switch))
            }
            other => {
                state.slot = other;
                Err(Error::NoActiveSession)
            }
        }
    }

    /// Process exit: clear the session only if `id` still owns it.
    ///
    /// Returns `false` for a stale exit (the session was already stopped or replaced).
    pub fn end_by_exit(&self, id: SessionId, outcome: ExitOutcome) -> bool {
        let mut state = self.state.lock();
        if !state.owned_by(id) {
            debug!(session_id = %id, "Ignoring exit of a process that no longer owns the session");
            return false;
        }
        state.slot = Slot::Idle;
        state.metrics = None;
        state.logs.push(format!("Process exited with code {outcome}"));
        true
    }

    /// Feed one diagnostic record from the process owning session `id`.
    ///
    /// Every record is logged; progress records also replace the metrics
    /// snapshot. Records from a process that no longer owns the session are dropped.
    pub fn record_output(&self, id: SessionId, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }
        let metrics = telemetry::parse_progress(line);

        let mut state = self.state.lock();
        if !state.owned_by(id) {
            return false;
        }
        state.logs.push(line);
        if let Some(metrics) = metrics {
            // Overwrite, never merge: the snapshot always reflects the newest line.
            state.metrics = Some(metrics);
        }
        true
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state.lock().slot, Slot::Active(_))
    }

    pub fn active_session(&self) -> Option<SessionInfo> {
        match &self.state.lock().slot {
            Slot::Active(session) => Some(session.info.clone()),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        let state = self.state.lock();
        let session_info = match &state.slot {
            Slot::Active(session) => Some(SessionStatus {
                uptime_secs: (Utc::now() - session.info.start_time).num_seconds().max(0),
                info: session.info.clone(),
            }),
            _ => None,
        };
        StatusSnapshot {
            active: session_info.is_some(),
            session_info,
            latest_metrics: state.metrics.clone(),
            recent_logs: state.logs.to_vec(),
        }
    }
}

/// Exclusive claim on the session slot, taken before resolution starts.
///
/// Dropping it without [`commit`](Self::commit) frees the slot again, so a
/// failed or abandoned start never blocks the next one.
#[derive(Debug)]
pub struct StartReservation {
    store: Arc<SessionStore>,
    id: SessionId,
    committed: bool,
}

impl StartReservation {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Turn the reservation into the active session.
    ///
    /// Resets the rolling log to the session preamble and clears old metrics.
    pub fn commit(
        mut self,
        channel: &str,
        source_url: &str,
        kill_switch: CancellationToken,
    ) -> SessionInfo {
        let info = SessionInfo {
            id: self.id,
            channel: channel.to_string(),
            start_time: Utc::now(),
        };

        let mut state = self.store.state.lock();
        state.logs.reset([
            format!("Starting relay for {channel}..."),
            format!("Source: {source_url}"),
        ]);
        state.metrics = None;
        state.slot = Slot::Active(ActiveSession {
            info: info.clone(),
            kill_switch,
        });
        drop(state);

        self.committed = true;
        info
    }
}

impl Drop for StartReservation {
    fn drop(&mut self) {
        if !self.committed {
            self.store.release(self.id);
        }
    }
}

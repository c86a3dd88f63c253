//! Lifecycle of the single ffmpeg relay process.
//!
//! A session ends in one of two ways, and both go through the session store:
//! - operator stop: the session is cleared immediately and the kill switch is
//!   tripped; the supervising task kills the child in the background.
//! - process exit: the supervising task clears the session only if the exited
//!   process still owns it, so a late exit never clobbers a newer session.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, ChildStderr};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::destination::redact_args;
use super::record_reader::RecordReader;
use super::session::{ExitOutcome, SessionId, SessionInfo, SessionStore, StartReservation};
use super::telemetry;
use crate::{Error, Result};

/// How long to keep draining stderr after the process is gone.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// ffmpeg invocation settings.
#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    /// Path or bare name of the ffmpeg executable.
    pub binary_path: PathBuf,
    /// Output buffer size passed as `-bufsize`.
    pub buffer_size: String,
    /// Packet queue bound passed as `-max_muxing_queue_size`.
    pub max_muxing_queue_size: u32,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("ffmpeg"),
            buffer_size: "6000k".to_string(),
            max_muxing_queue_size: 1024,
        }
    }
}

impl FfmpegConfig {
    pub fn with_binary(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            ..Self::default()
        }
    }

    /// Relay arguments: read at native rate, stream-copy into FLV, push to `destination`.
    pub fn build_args(&self, source_url: &str, destination_url: &str) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-re".to_string(),
            "-i".to_string(),
            source_url.to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-f".to_string(),
            "flv".to_string(),
            "-bufsize".to_string(),
            self.buffer_size.clone(),
            "-max_muxing_queue_size".to_string(),
            self.max_muxing_queue_size.to_string(),
            destination_url.to_string(),
        ]
    }
}

/// Spawns and tears down the relay process for the session store.
#[derive(Debug, Clone)]
pub struct RelaySupervisor {
    config: FfmpegConfig,
    store: Arc<SessionStore>,
}

impl RelaySupervisor {
    pub fn new(config: FfmpegConfig, store: Arc<SessionStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &FfmpegConfig {
        &self.config
    }

    /// Spawn the relay and turn `reservation` into the active session.
    ///
    /// On failure the reservation is dropped, which frees the slot; no
    /// session is ever recorded for a process that did not start.
    pub fn launch(
        &self,
        reservation: StartReservation,
        channel: &str,
        source_url: &str,
        destination_url: &str,
    ) -> Result<SessionInfo> {
        let args = self.config.build_args(source_url, destination_url);
        info!(
            channel = %channel,
            session_id = %reservation.id(),
            "Starting ffmpeg relay with args: {:?}",
            redact_args(&args)
        );

        let mut child = process_utils::tokio_command(&self.config.binary_path)
            .args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                error!(
                    binary = %self.config.binary_path.display(),
                    "Failed to spawn ffmpeg: {e}"
                );
                Error::Spawn(format!("{}: {e}", self.config.binary_path.display()))
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Spawn("failed to capture ffmpeg stderr".to_string()))?;

        let kill_switch = CancellationToken::new();
        let pid = child.id();
        let info = reservation.commit(channel, source_url, kill_switch.clone());
        info!(session_id = %info.id, pid = ?pid, "Relay process started");

        tokio::spawn(supervise(
            Arc::clone(&self.store),
            info.id,
            child,
            stderr,
            kill_switch,
        ));

        Ok(info)
    }

    /// Clear the active session and kill its process without waiting for it to exit.
    pub fn stop(&self) -> Result<SessionInfo> {
        let (info, kill_switch) = self.store.end_by_operator()?;
        kill_switch.cancel();
        info!(session_id = %info.id, channel = %info.channel, "Relay stopped by operator");
        Ok(info)
    }
}

/// Wait for the process to exit or be killed, then settle the session.
async fn supervise(
    store: Arc<SessionStore>,
    id: SessionId,
    mut child: Child,
    stderr: ChildStderr,
    kill_switch: CancellationToken,
) {
    let mut pump = tokio::spawn(pump_diagnostics(Arc::clone(&store), id, stderr));

    let exited = tokio::select! {
        _ = kill_switch.cancelled() => {
            if let Err(e) = child.kill().await {
                warn!(session_id = %id, "Failed to kill ffmpeg: {e}");
            }
            None
        }
        status = child.wait() => Some(match status {
            Ok(status) => match status.code() {
                Some(code) => ExitOutcome::Code(code),
                None => ExitOutcome::Signal,
            },
            Err(e) => {
                error!(session_id = %id, "Error waiting for ffmpeg: {e}");
                ExitOutcome::Unknown
            }
        }),
    };

    // Let the final diagnostic lines land before the session is cleared.
    if !drain(&mut pump, STDERR_DRAIN_TIMEOUT).await {
        debug!(session_id = %id, "Timed out draining ffmpeg stderr");
    }

    match exited {
        Some(outcome) => {
            if store.end_by_exit(id, outcome) {
                warn!(session_id = %id, "Relay process exited with code {outcome}");
            }
        }
        None => debug!(session_id = %id, "Relay process killed"),
    }
}

/// Wait up to `timeout` for the pump to finish, aborting it otherwise.
///
/// A grandchild that inherited the pipe can hold stderr open past the exit.
async fn drain(pump: &mut JoinHandle<()>, timeout: Duration) -> bool {
    if tokio::time::timeout(timeout, &mut *pump).await.is_ok() {
        return true;
    }
    pump.abort();
    false
}

/// Forward stderr records into the store until EOF.
async fn pump_diagnostics(store: Arc<SessionStore>, id: SessionId, stderr: ChildStderr) {
    let mut reader = RecordReader::new(stderr);
    loop {
        match reader.next_record().await {
            Ok(Some(line)) => {
                if !telemetry::is_progress_line(&line) {
                    if line.contains("Error") || line.contains("error") {
                        warn!(session_id = %id, "ffmpeg: {line}");
                    } else {
                        debug!(session_id = %id, "ffmpeg: {line}");
                    }
                }
                // Stale output is discarded by the store; keep reading so the pipe never fills.
                store.record_output(id, &line);
            }
            Ok(None) => break,
            Err(e) => {
                error!(session_id = %id, "Error reading ffmpeg output: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_aborts_a_stuck_pump() {
        let mut pump = tokio::spawn(std::future::pending::<()>());
        assert!(!drain(&mut pump, Duration::from_millis(20)).await);
        let err = pump.await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn drain_waits_for_a_finished_pump() {
        let mut pump = tokio::spawn(async {});
        assert!(drain(&mut pump, Duration::from_secs(1)).await);
    }

    #[test]
    fn test_build_args_template() {
        let config = FfmpegConfig::default();
        let args = config.build_args(
            "https://cdn.example/720p.m3u8",
            "rtmps://ingest.example/app/sk_abc",
        );
        assert_eq!(
            args,
            vec![
                "-hide_banner",
                "-re",
                "-i",
                "https://cdn.example/720p.m3u8",
                "-c",
                "copy",
                "-f",
                "flv",
                "-bufsize",
                "6000k",
                "-max_muxing_queue_size",
                "1024",
                "rtmps://ingest.example/app/sk_abc",
            ]
        );
    }

    #[tokio::test]
    async fn test_spawn_failure_frees_slot() {
        let store = Arc::new(SessionStore::default());
        let supervisor = RelaySupervisor::new(
            FfmpegConfig::with_binary("/nonexistent/ffmpeg-4c1e"),
            Arc::clone(&store),
        );

        let reservation = store.reserve().unwrap();
        let err = supervisor
            .launch(reservation, "shroud", "https://src", "rtmp://dst/app/key")
            .unwrap_err();
        assert!(matches!(err, Error::Spawn(_)));
        assert!(!store.is_active());
        assert!(store.reserve().is_ok());
    }

    #[test]
    fn test_stop_without_session() {
        let store = Arc::new(SessionStore::default());
        let supervisor = RelaySupervisor::new(FfmpegConfig::default(), store);
        assert!(matches!(supervisor.stop(), Err(Error::NoActiveSession)));
    }
}

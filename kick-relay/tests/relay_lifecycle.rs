//! End-to-end relay lifecycle against a scripted stand-in for ffmpeg.
//!
//! Each test writes a small shell script that prints ffmpeg-style diagnostics
//! to stderr and then either keeps running or exits, and drives it through the
//! real controller, supervisor and session store.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kick_relay::Error;
use kick_relay::relay::{
    FfmpegConfig, RelayController, RelaySupervisor, SessionStore, StartRequest, StatusSnapshot,
};
use tempfile::TempDir;
use twitch_source::{Quality, ResolveError, SourceResolver};

const SOURCE_URL: &str = "https://video-weaver.example/v1/playlist/720p.m3u8";
const INGEST: &str = "rtmps://ingest.example/app";

const RUNNING_SCRIPT: &str = r#"#!/bin/sh
echo "args: $*" >&2
printf 'frame=  100 fps= 30 q=-1.0 size=     512kB time=00:00:03.33 bitrate=1259.3kbits/s speed=1x\r' >&2
printf 'frame=  200 fps= 60 q=-1.0 size=    1024kB time=00:00:06.66 bitrate=1259.6kbits/s speed=1.01x\r' >&2
exec sleep 30
"#;

const FAILING_SCRIPT: &str = r#"#!/bin/sh
echo "[tls @ 0x1] Connection to tcp://ingest.example:443 failed: Connection refused" >&2
exit 3
"#;

const SIGNALED_SCRIPT: &str = r#"#!/bin/sh
kill -9 $$
"#;

/// Resolver that always returns the same URL and remembers what it was asked.
#[derive(Default)]
struct RecordingResolver {
    requests: Mutex<Vec<(String, Quality)>>,
}

#[async_trait]
impl SourceResolver for RecordingResolver {
    async fn resolve(&self, channel: &str, quality: Quality) -> Result<String, ResolveError> {
        self.requests
            .lock()
            .unwrap()
            .push((channel.to_string(), quality));
        // Suspend once so concurrent starts overlap the pending reservation.
        tokio::task::yield_now().await;
        Ok(SOURCE_URL.to_string())
    }
}

struct Harness {
    controller: RelayController,
    resolver: Arc<RecordingResolver>,
    _dir: TempDir,
}

fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("ffmpeg");
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn harness(script: &str) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_script(dir.path(), script);

    let resolver = Arc::new(RecordingResolver::default());
    let store = Arc::new(SessionStore::default());
    let supervisor = RelaySupervisor::new(FfmpegConfig::with_binary(binary), Arc::clone(&store));
    let controller = RelayController::new(resolver.clone(), supervisor, store, INGEST);

    Harness {
        controller,
        resolver,
        _dir: dir,
    }
}

fn request(channel: &str, key: &str, quality: Quality) -> StartRequest {
    StartRequest {
        channel: channel.to_string(),
        stream_key: key.to_string(),
        quality,
    }
}

/// Poll `status` until `cond` holds or five seconds pass.
async fn wait_until<F>(controller: &RelayController, cond: F) -> StatusSnapshot
where
    F: Fn(&StatusSnapshot) -> bool,
{
    for _ in 0..100 {
        let status = controller.status();
        if cond(&status) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached; last status: {:?}", controller.status());
}

#[tokio::test]
async fn relays_resolved_source_to_destination() {
    let h = harness(RUNNING_SCRIPT);

    let info = h
        .controller
        .start(request("shroud", "sk_abc", Quality::P720))
        .await
        .unwrap();
    assert_eq!(info.channel, "shroud");
    assert_eq!(
        h.resolver.requests.lock().unwrap().as_slice(),
        &[("shroud".to_string(), Quality::P720)]
    );

    let status = wait_until(&h.controller, |s| {
        s.latest_metrics.as_ref().is_some_and(|m| m.fps == "60")
    })
    .await;

    assert!(status.active);
    let session = status.session_info.unwrap();
    assert_eq!(session.info.id, info.id);
    assert_eq!(session.info.channel, "shroud");

    let metrics = status.latest_metrics.unwrap();
    assert_eq!(metrics.bitrate, "1259.6kbits/s");
    assert_eq!(metrics.speed, "1.01x");
    assert_eq!(metrics.time, "00:00:06.66");

    assert_eq!(status.recent_logs[0], "Starting relay for shroud...");
    assert_eq!(status.recent_logs[1], format!("Source: {SOURCE_URL}"));
    let expected_args = format!(
        "args: -hide_banner -re -i {SOURCE_URL} -c copy -f flv -bufsize 6000k \
         -max_muxing_queue_size 1024 {INGEST}/sk_abc"
    );
    assert!(
        status.recent_logs.contains(&expected_args),
        "missing {expected_args:?} in {:?}",
        status.recent_logs
    );

    h.controller.stop().unwrap();
}

#[tokio::test]
async fn second_start_is_rejected_while_active() {
    let h = harness(RUNNING_SCRIPT);
    let first = h
        .controller
        .start(request("shroud", "sk_abc", Quality::Auto))
        .await
        .unwrap();

    let err = h
        .controller
        .start(request("summit1g", "sk_def", Quality::Auto))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyActive));

    // The rejected start never reached the resolver and left the session alone.
    assert_eq!(h.resolver.requests.lock().unwrap().len(), 1);
    assert_eq!(h.controller.store().active_session().unwrap().id, first.id);

    h.controller.stop().unwrap();
}

#[tokio::test]
async fn concurrent_starts_admit_exactly_one() {
    let h = harness(RUNNING_SCRIPT);

    let (a, b, c, d) = tokio::join!(
        h.controller.start(request("shroud", "sk_a", Quality::Auto)),
        h.controller.start(request("summit1g", "sk_b", Quality::Auto)),
        h.controller.start(request("xqc", "sk_c", Quality::Auto)),
        h.controller.start(request("pokimane", "sk_d", Quality::Auto)),
    );
    let results = [a, b, c, d];

    let started: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(started.len(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, Error::AlreadyActive))
    );

    assert_eq!(h.resolver.requests.lock().unwrap().len(), 1);
    assert_eq!(h.controller.store().active_session().unwrap().id, started[0].id);

    h.controller.stop().unwrap();
    assert!(!h.controller.is_active());
}

#[tokio::test]
async fn operator_stop_is_idempotent() {
    let h = harness(RUNNING_SCRIPT);
    h.controller
        .start(request("shroud", "sk_abc", Quality::Auto))
        .await
        .unwrap();
    wait_until(&h.controller, |s| s.latest_metrics.is_some()).await;

    h.controller.stop().unwrap();
    let status = h.controller.status();
    assert!(!status.active);
    assert!(status.latest_metrics.is_none());
    assert_eq!(
        status.recent_logs.last().map(String::as_str),
        Some("Relay stopped by operator")
    );

    assert!(matches!(h.controller.stop(), Err(Error::NoActiveSession)));

    // The killed process must not add an exit line after the operator stop.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let status = h.controller.status();
    assert_eq!(
        status.recent_logs.last().map(String::as_str),
        Some("Relay stopped by operator")
    );
}

#[tokio::test]
async fn stale_exit_does_not_end_new_session() {
    let h = harness(RUNNING_SCRIPT);
    let old = h
        .controller
        .start(request("shroud", "sk_abc", Quality::Auto))
        .await
        .unwrap();
    h.controller.stop().unwrap();

    let new = h
        .controller
        .start(request("shroud", "sk_abc", Quality::Auto))
        .await
        .unwrap();
    assert_ne!(old.id, new.id);

    // Give the old process time to be killed and reaped.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let status = h.controller.status();
    assert!(status.active);
    assert_eq!(status.session_info.unwrap().info.id, new.id);
    assert!(
        !status
            .recent_logs
            .iter()
            .any(|l| l.starts_with("Process exited"))
    );

    h.controller.stop().unwrap();
}

#[tokio::test]
async fn unexpected_exit_clears_session() {
    let h = harness(FAILING_SCRIPT);
    h.controller
        .start(request("shroud", "sk_abc", Quality::Auto))
        .await
        .unwrap();

    let status = wait_until(&h.controller, |s| !s.active).await;
    assert!(status.session_info.is_none());
    assert!(status.latest_metrics.is_none());

    let logs = &status.recent_logs;
    assert_eq!(logs.last().map(String::as_str), Some("Process exited with code 3"));
    assert!(logs.iter().any(|l| l.contains("Connection refused")));

    // The operator has nothing left to stop, but can start again.
    assert!(matches!(h.controller.stop(), Err(Error::NoActiveSession)));
    assert!(
        h.controller
            .start(request("shroud", "sk_abc", Quality::Auto))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn signal_exit_is_reported() {
    let h = harness(SIGNALED_SCRIPT);
    h.controller
        .start(request("shroud", "sk_abc", Quality::Auto))
        .await
        .unwrap();

    let status = wait_until(&h.controller, |s| !s.active).await;
    assert_eq!(
        status.recent_logs.last().map(String::as_str),
        Some("Process exited with code signal")
    );
}

#[tokio::test]
async fn missing_binary_fails_start() {
    let resolver = Arc::new(RecordingResolver::default());
    let store = Arc::new(SessionStore::default());
    let supervisor = RelaySupervisor::new(
        FfmpegConfig::with_binary("/nonexistent/dir/ffmpeg"),
        Arc::clone(&store),
    );
    let controller = RelayController::new(resolver, supervisor, store, INGEST);

    let err = controller
        .start(request("shroud", "sk_abc", Quality::Auto))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Spawn(_)));

    let status = controller.status();
    assert!(!status.active);
    assert!(status.recent_logs.is_empty());
}

use std::path::PathBuf;
use std::sync::Arc;

use kick_relay::api::{ApiServer, ApiServerConfig, AppState};
use kick_relay::config::RelayConfig;
use kick_relay::logging;
use kick_relay::relay::{FfmpegConfig, RelayController, RelaySupervisor, SessionStore};
use process_utils::{BinaryLocation, BinarySpec, locate_binary};
use twitch_source::{TwitchResolver, default_client};

fn ffmpeg_location(config: &RelayConfig) -> BinaryLocation {
    if let Some(path) = &config.ffmpeg_path {
        return BinaryLocation::Override(path.clone());
    }
    let mut bundle_roots = vec![PathBuf::from("resources")];
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("resources")))
    {
        bundle_roots.push(dir);
    }
    locate_binary(&BinarySpec {
        name: "ffmpeg",
        env_var: "FFMPEG_PATH",
        bundle_roots,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = RelayConfig::from_env()?;
    let _log_guard = logging::init_logging(config.log_dir.as_deref())?;

    let ffmpeg = ffmpeg_location(&config);
    let ffmpeg_version = process_utils::probe_version(ffmpeg.path());
    match &ffmpeg_version {
        Some(version) => tracing::info!(path = %ffmpeg.path().display(), "Using {version}"),
        None => tracing::warn!(
            path = %ffmpeg.path().display(),
            "ffmpeg did not respond to -version; relays will fail to start"
        ),
    }

    let client = default_client(config.resolve_timeout)?;
    let resolver = Arc::new(TwitchResolver::new(client));
    let store = Arc::new(SessionStore::new(config.log_capacity));
    let supervisor = RelaySupervisor::new(
        FfmpegConfig::with_binary(ffmpeg.into_path()),
        Arc::clone(&store),
    );
    let controller = Arc::new(RelayController::new(
        resolver,
        supervisor,
        store,
        config.ingest_url.clone(),
    ));

    let state = AppState::new(Arc::clone(&controller)).with_ffmpeg_version(ffmpeg_version);
    let server = ApiServer::with_state(ApiServerConfig::from(&config), state);

    let cancel_token = server.cancel_token();
    let shutdown_controller = Arc::clone(&controller);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shutdown_controller.shutdown();
            cancel_token.cancel();
        }
    });

    server.run().await?;

    // Covers the server exiting on its own.
    controller.shutdown();
    tracing::info!("kick-relay stopped");
    Ok(())
}

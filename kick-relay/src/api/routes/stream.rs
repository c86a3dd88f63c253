//! Relay session routes.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/stream` | Start relaying a channel |
//! | DELETE | `/api/stream` | Stop the active relay |
//! | GET | `/api/stream` | Current status, metrics and recent logs |
//! | GET | `/api/stream/source` | Resolve a source URL without starting |

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    routing::get,
};
use twitch_source::Quality;

use crate::api::error::ApiResult;
use crate::api::models::{
    SourceQuery, SourceResponse, StartStreamRequest, StartStreamResponse, StopStreamResponse,
};
use crate::api::server::AppState;
use crate::error::Error;
use crate::relay::{StartRequest, StatusSnapshot};

/// Create the stream router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(stream_status).post(start_stream).delete(stop_stream),
        )
        .route("/source", get(resolve_source))
}

fn required(value: Option<String>, field: &str) -> Result<String, Error> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::validation(format!("{field} is required")))
}

async fn start_stream(
    State(state): State<AppState>,
    payload: Result<Json<StartStreamRequest>, JsonRejection>,
) -> ApiResult<Json<StartStreamResponse>> {
    let Json(payload) = payload?;

    let request = StartRequest {
        channel: required(payload.source_channel, "sourceChannel")?,
        stream_key: required(payload.destination_stream_key, "destinationStreamKey")?,
        quality: Quality::from_request(payload.quality.as_deref()),
    };

    let session = state.controller.start(request).await?;
    Ok(Json(StartStreamResponse {
        success: true,
        message: "Stream started".to_string(),
        session,
    }))
}

async fn stop_stream(State(state): State<AppState>) -> ApiResult<Json<StopStreamResponse>> {
    state.controller.stop()?;
    Ok(Json(StopStreamResponse {
        success: true,
        message: "Stream stopped".to_string(),
    }))
}

async fn stream_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.controller.status())
}

async fn resolve_source(
    State(state): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> ApiResult<Json<SourceResponse>> {
    let quality = Quality::from_request(query.quality.as_deref());
    let channel = twitch_source::normalize_channel(&query.channel).map_err(Error::from)?;
    let url = state.controller.resolve_source(&channel, quality).await?;
    Ok(Json(SourceResponse {
        channel,
        quality: quality.to_string(),
        url,
    }))
}

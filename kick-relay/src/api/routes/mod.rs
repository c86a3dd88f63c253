//! API route modules.

pub mod health;
pub mod stream;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/stream", stream::router())
        .nest("/health", health::router())
        .with_state(state)
}

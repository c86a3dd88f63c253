//! Single-session relay of a live Twitch channel to a Kick ingest endpoint.
//!
//! The HTTP layer ([`api`]) drives a [`relay::RelayController`], which resolves
//! the source playlist, spawns ffmpeg in stream-copy mode and keeps the session
//! state, rolling diagnostic log and latest progress metrics in one store.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod relay;

pub use error::{Error, Result};

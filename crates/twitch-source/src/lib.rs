//! Live source resolution for Twitch channels.
//!
//! [`TwitchResolver`] exchanges a channel login for a playback token, fetches the
//! master playlist with it and picks one variant URL according to a [`Quality`]
//! preference, degrading through a fixed cascade when the requested variant is
//! missing.

pub mod client;
pub mod error;
pub mod manifest;
mod models;
pub mod quality;
pub mod resolver;

pub use client::default_client;
pub use error::ResolveError;
pub use manifest::Manifest;
pub use models::PlaybackAccessToken;
pub use quality::Quality;
pub use resolver::{Endpoints, SourceResolver, TwitchResolver, normalize_channel};

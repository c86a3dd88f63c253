//! The relay core: session state, process supervision and telemetry.

pub mod controller;
pub mod destination;
pub mod record_reader;
pub mod session;
pub mod supervisor;
pub mod telemetry;

pub use controller::{RelayController, StartRequest};
pub use destination::{DEFAULT_INGEST_URL, destination_url, redact_destination};
pub use session::{
    DEFAULT_LOG_CAPACITY, ExitOutcome, SessionId, SessionInfo, SessionStatus, SessionStore,
    StatusSnapshot,
};
pub use supervisor::{FfmpegConfig, RelaySupervisor};
pub use telemetry::RelayMetrics;

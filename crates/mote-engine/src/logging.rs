//! `tracing` subscriber setup for hosts and demos.
//!
//! Library code only emits events; installing a subscriber is left to the
//! binary. Every registry operation emits a `trace` event, so running with
//! `RUST_LOG=mote_ecs=trace` is the equivalent of turning trace logging on.

use tracing_subscriber::EnvFilter;

use crate::EngineError;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn";

/// Install a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`.
///
/// Fails if the fallback directive does not parse or a global subscriber is
/// already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), EngineError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter).map_err(|e| EngineError::LoggingInit {
            details: e.to_string(),
        })?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| EngineError::LoggingInit {
            details: e.to_string(),
        })
}

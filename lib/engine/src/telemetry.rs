//! Tracing subscriber set-up.

use crate::error::EngineError;
use agentflow_core::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber: `RUST_LOG` if set, else `default_filter`.
///
/// # Errors
///
/// Returns `EngineError::Telemetry` if a global subscriber is already set.
pub fn init_tracing(default_filter: &str) -> Result<(), EngineError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| EngineError::Telemetry {
            reason: e.to_string(),
        })?;
    Ok(())
}

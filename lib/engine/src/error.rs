//! Error types for the engine crate.

use agentflow_core::SessionId;
use std::fmt;

/// Errors from building or configuring the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The catalog could not be loaded.
    CatalogLoad { reason: String },
    /// The tracing subscriber could not be installed.
    Telemetry { reason: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CatalogLoad { reason } => write!(f, "failed to load catalog: {reason}"),
            Self::Telemetry { reason } => write!(f, "failed to initialise tracing: {reason}"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Errors from opening editing sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Another editor holds the session.
    AlreadyActive { session_id: SessionId },
    /// The agent could not be turned into a graph.
    InvalidAgent { reason: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyActive { session_id } => {
                write!(f, "session {session_id} already has an active editor")
            }
            Self::InvalidAgent { reason } => write!(f, "cannot build agent graph: {reason}"),
        }
    }
}

impl std::error::Error for SessionError {}

//! Error types for the editor crate.

use std::fmt;

/// Errors from the auto-save manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoSaveError {
    /// Saves kept failing after every retry. Recover with a forced save or
    /// by marking the state saved.
    RetryExhausted { attempts: u32, reason: String },
    /// A save is already running.
    SaveInProgress,
    /// A forced save ran and failed.
    SaveFailed { reason: String },
    /// The auto-save task is no longer running.
    Stopped,
}

impl fmt::Display for AutoSaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryExhausted { attempts, reason } => {
                write!(f, "auto-save gave up after {attempts} attempts: {reason}")
            }
            Self::SaveInProgress => write!(f, "a save is already in progress"),
            Self::SaveFailed { reason } => write!(f, "save failed: {reason}"),
            Self::Stopped => write!(f, "auto-save is not running"),
        }
    }
}

impl std::error::Error for AutoSaveError {}

/// Failure reported by a save callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveError {
    pub reason: String,
}

impl SaveError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for SaveError {}

/// Errors from a graph store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphStoreError {
    /// The store could not be reached.
    Unavailable { reason: String },
}

impl fmt::Display for GraphStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "graph store unavailable: {reason}"),
        }
    }
}

impl std::error::Error for GraphStoreError {}

impl From<GraphStoreError> for SaveError {
    fn from(e: GraphStoreError) -> Self {
        Self::new(e.to_string())
    }
}

//! Error types for the integration crate.
//!
//! - `RemoteError`: failures reported by the external platform client
//! - `StoreError`: failures of the persistence store
//! - `LinkError`: identifier linking failures
//! - `SyncError`: reconciliation and export failures
//!
//! Collaborator traits return the plain enums. Service operations wrap them
//! in a rootcause `Report`.

use crate::resource::ResourceType;
use std::fmt;

/// Errors from the external platform client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote resource does not exist.
    NotFound { external_id: String },
    /// The platform rejected the payload.
    Validation { reason: String },
    /// The platform could not be reached.
    Connection { reason: String },
    /// The platform did not answer in time.
    Timeout,
}

impl RemoteError {
    /// Returns true if retrying the call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { external_id } => write!(f, "remote resource not found: {external_id}"),
            Self::Validation { reason } => write!(f, "remote validation failed: {reason}"),
            Self::Connection { reason } => write!(f, "connection to platform failed: {reason}"),
            Self::Timeout => write!(f, "platform call timed out"),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Errors from the persistence store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record with the given key.
    NotFound { kind: &'static str, key: String },
    /// A record with the given key already exists.
    Conflict { kind: &'static str, key: String },
    /// The store could not be reached.
    Unavailable { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { kind, key } => write!(f, "{kind} not found: {key}"),
            Self::Conflict { kind, key } => write!(f, "{kind} already exists: {key}"),
            Self::Unavailable { reason } => write!(f, "store unavailable: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from the identifier linking service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The change would break the one-to-one mapping.
    PreconditionFailed {
        resource_type: ResourceType,
        reason: String,
    },
    /// The local resource has no link.
    NotLinked {
        resource_type: ResourceType,
        local_id: String,
    },
    /// The link store failed.
    Storage { reason: String },
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreconditionFailed {
                resource_type,
                reason,
            } => write!(f, "precondition failed for {resource_type} link: {reason}"),
            Self::NotLinked {
                resource_type,
                local_id,
            } => write!(f, "{resource_type} {local_id} is not linked"),
            Self::Storage { reason } => write!(f, "link storage failed: {reason}"),
        }
    }
}

impl std::error::Error for LinkError {}

impl From<StoreError> for LinkError {
    fn from(e: StoreError) -> Self {
        Self::Storage {
            reason: e.to_string(),
        }
    }
}

/// Errors from synchronization and export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The local resource has no external counterpart.
    NotLinked {
        resource_type: ResourceType,
        local_id: String,
    },
    /// The local resource does not exist.
    ResourceMissing {
        resource_type: ResourceType,
        local_id: String,
    },
    /// The platform failed with a non-retryable error.
    Remote(RemoteError),
    /// The deadline passed before the sync finished.
    Timeout { deadline_ms: u64 },
    /// Transient platform failures outlasted the retry budget.
    RetryExhausted { attempts: u32, last: RemoteError },
    /// Linking the exported resource failed.
    Link { reason: String },
    /// A store failed.
    Storage { reason: String },
}

impl SyncError {
    /// Short cause recorded in the sync log.
    #[must_use]
    pub fn cause(&self) -> &'static str {
        match self {
            Self::NotLinked { .. } => "not_linked",
            Self::ResourceMissing { .. } => "resource_missing",
            Self::Remote(_) => "remote",
            Self::Timeout { .. } => "timeout",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::Link { .. } => "link",
            Self::Storage { .. } => "storage",
        }
    }

    /// True when a later attempt may succeed without changes to the
    /// resource or its link.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::RetryExhausted { .. } | Self::Storage { .. } => true,
            Self::Remote(e) => e.is_transient(),
            Self::NotLinked { .. }
            | Self::ResourceMissing { .. }
            | Self::Link { .. } => false,
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLinked {
                resource_type,
                local_id,
            } => write!(f, "{resource_type} {local_id} is not linked"),
            Self::ResourceMissing {
                resource_type,
                local_id,
            } => write!(f, "{resource_type} {local_id} does not exist"),
            Self::Remote(e) => write!(f, "remote error: {e}"),
            Self::Timeout { deadline_ms } => write!(f, "sync timed out after {deadline_ms}ms"),
            Self::RetryExhausted { attempts, last } => {
                write!(f, "gave up after {attempts} attempts: {last}")
            }
            Self::Link { reason } => write!(f, "linking failed: {reason}"),
            Self::Storage { reason } => write!(f, "storage failed: {reason}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        Self::Storage {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connection_failures_are_transient() {
        assert!(RemoteError::Timeout.is_transient());
        assert!(
            RemoteError::Connection {
                reason: "reset".to_string()
            }
            .is_transient()
        );
        assert!(
            !RemoteError::NotFound {
                external_id: "wf_1".to_string()
            }
            .is_transient()
        );
        assert!(
            !RemoteError::Validation {
                reason: "bad".to_string()
            }
            .is_transient()
        );
    }

    #[test]
    fn link_error_display() {
        let err = LinkError::NotLinked {
            resource_type: ResourceType::Agent,
            local_id: "a1".to_string(),
        };
        assert_eq!(err.to_string(), "agent a1 is not linked");
    }

    #[test]
    fn sync_error_causes() {
        assert_eq!(SyncError::Timeout { deadline_ms: 10 }.cause(), "timeout");
        let exhausted = SyncError::RetryExhausted {
            attempts: 4,
            last: RemoteError::Timeout,
        };
        assert_eq!(exhausted.cause(), "retry_exhausted");
        assert!(exhausted.to_string().contains("4 attempts"));
    }

    #[test]
    fn retryable_kinds() {
        assert!(SyncError::Timeout { deadline_ms: 10 }.is_retryable());
        assert!(
            SyncError::RetryExhausted {
                attempts: 4,
                last: RemoteError::Timeout,
            }
            .is_retryable()
        );
        assert!(
            !SyncError::Remote(RemoteError::NotFound {
                external_id: "wf_1".to_string()
            })
            .is_retryable()
        );
        assert!(
            !SyncError::NotLinked {
                resource_type: ResourceType::Agent,
                local_id: "a1".to_string(),
            }
            .is_retryable()
        );
    }
}

//! Sync log entries.
//!
//! Every reconciliation attempt leaves exactly one entry. It is written as
//! `Pending` before the platform is contacted and moved to `Success` or
//! `Error` when the attempt ends. Entries are never deleted here; retention
//! belongs to the store.

use crate::resource::ResourceType;
use agentflow_core::SyncLogId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// What the attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    /// Remote state pulled into the local resource.
    Pull,
    /// Local resource pushed to the platform.
    Export,
}

/// Status of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Pending,
    Success,
    Error,
}

impl SyncStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One attempt to reconcile a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub id: SyncLogId,
    pub resource_id: String,
    pub resource_type: ResourceType,
    pub action: SyncAction,
    pub status: SyncStatus,
    #[serde(default)]
    pub details: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl SyncLogEntry {
    /// A new pending entry.
    #[must_use]
    pub fn pending(
        resource_id: impl Into<String>,
        resource_type: ResourceType,
        action: SyncAction,
    ) -> Self {
        Self {
            id: SyncLogId::new(),
            resource_id: resource_id.into(),
            resource_type,
            action,
            status: SyncStatus::Pending,
            details: JsonValue::Null,
            created_at: Utc::now(),
        }
    }

    /// The entry moved to a terminal status.
    #[must_use]
    pub fn settled(mut self, status: SyncStatus, details: JsonValue) -> Self {
        self.status = status;
        self.details = details;
        self
    }
}

//! Synchronizable resources.

use agentflow_core::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Content keys owned by the local side. Remote content never replaces them.
pub const OWNERSHIP_FIELDS: &[&str] = &["ownerId", "owner", "userId", "workspaceId"];

/// Kind of resource mirrored on the external platform.
///
/// Each kind is its own identifier space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Agent,
    Workflow,
    Credential,
    Tool,
}

impl ResourceType {
    pub const ALL: [Self; 4] = [Self::Agent, Self::Workflow, Self::Credential, Self::Tool];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Workflow => "workflow",
            Self::Credential => "credential",
            Self::Tool => "tool",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Agent => 0,
            Self::Workflow => 1,
            Self::Credential => 2,
            Self::Tool => 3,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locally stored resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub resource_type: ResourceType,
    pub owner_id: UserId,
    pub name: String,
    #[serde(default)]
    pub content: Map<String, JsonValue>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        resource_type: ResourceType,
        owner_id: UserId,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type,
            owner_id,
            name: name.into(),
            content: Map::new(),
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.content.insert(key.into(), value);
        self
    }
}

/// Overlays remote content onto local content.
///
/// Remote values win for every key except [`OWNERSHIP_FIELDS`], which keep
/// their local value (or stay absent).
#[must_use]
pub fn merge_remote(
    local: &Map<String, JsonValue>,
    remote: &Map<String, JsonValue>,
) -> Map<String, JsonValue> {
    let mut merged = local.clone();
    for (key, value) in remote {
        if OWNERSHIP_FIELDS.contains(&key.as_str()) {
            continue;
        }
        merged.insert(key.clone(), value.clone());
    }
    merged
}

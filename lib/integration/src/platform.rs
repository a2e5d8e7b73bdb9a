//! External workflow platform client.
//!
//! The platform itself is out of scope; the sync service talks to it only
//! through [`ExternalPlatformClient`].

use crate::error::RemoteError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A workflow as the platform reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWorkflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: Map<String, JsonValue>,
}

/// A workflow to create on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPayload {
    pub name: String,
    #[serde(default)]
    pub content: Map<String, JsonValue>,
}

/// Client for the external workflow platform.
///
/// Every call may fail with `RemoteError::Connection`.
#[async_trait]
pub trait ExternalPlatformClient: Send + Sync {
    /// Fetches a workflow by its platform id.
    async fn get_remote_workflow(&self, external_id: &str) -> Result<RemoteWorkflow, RemoteError>;

    /// Creates a workflow and returns its platform id.
    async fn create_remote_workflow(&self, payload: WorkflowPayload) -> Result<String, RemoteError>;

    /// Checks whether the platform is reachable.
    async fn ping(&self) -> Result<bool, RemoteError>;
}

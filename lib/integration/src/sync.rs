//! Reconciliation with the external platform.
//!
//! Each attempt on a linked resource follows the same protocol:
//!
//! 1. Resolve the external id. Unlinked resources fail before anything is
//!    logged.
//! 2. Append a `Pending` sync log entry.
//! 3. Talk to the platform, retrying transient failures with capped
//!    exponential backoff, all within the deadline. Callers may pass their
//!    own deadline; otherwise the configured one applies.
//! 4. Settle the entry as `Success` or `Error`. Failures are logged and then
//!    returned to the caller. An attempt whose future is dropped before it
//!    settles is recorded as a canceled `Error`, so no entry stays `Pending`.
//!
//! Batches run with bounded concurrency and isolate per-resource failures.

use crate::error::{LinkError, RemoteError, SyncError};
use crate::link::IdLinkService;
use crate::platform::{ExternalPlatformClient, WorkflowPayload};
use crate::resource::{Resource, ResourceType, merge_remote};
use crate::store::{ResourceStore, SyncLogStore};
use crate::sync_log::{SyncAction, SyncLogEntry, SyncStatus};
use agentflow_core::{Backoff, SyncLogId};
use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Upper bound on concurrent reconciliations against the platform.
pub const MAX_CONCURRENCY: usize = 4;

/// Sync tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Concurrent reconciliations in a batch, clamped to 1..=4.
    pub max_concurrency: usize,
    /// Deadline for one attempt, retries included, when the caller gives none.
    pub deadline: Duration,
    /// Retries after the first transient failure.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrency: MAX_CONCURRENCY,
            deadline: Duration::from_secs(30),
            max_retries: 3,
            backoff: Backoff::new(Duration::from_millis(500), Duration::from_secs(8)),
        }
    }
}

/// A resource to reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTarget {
    pub resource_id: String,
    pub resource_type: ResourceType,
}

impl SyncTarget {
    #[must_use]
    pub fn new(resource_id: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_type,
        }
    }
}

/// Outcome for one resource of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSyncDetail {
    pub resource_id: String,
    pub resource_type: ResourceType,
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_id: Option<SyncLogId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure kind, as recorded in the sync log (`timeout`, `remote`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// True when the failure may clear up on a later attempt.
    #[serde(default)]
    pub retryable: bool,
}

/// Outcome of a batch, details in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBatchResult {
    pub success_count: usize,
    pub error_count: usize,
    pub details: Vec<ResourceSyncDetail>,
}

/// Outcome of an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutcome {
    pub external_id: String,
    /// True on first export, false when an existing link was repointed.
    pub created: bool,
    pub entry: SyncLogEntry,
}

/// A `Pending` entry not yet settled.
///
/// Dropping it while armed settles the entry as a canceled `Error` on the
/// current runtime.
struct PendingEntry {
    log: Arc<dyn SyncLogStore>,
    id: Option<SyncLogId>,
}

impl PendingEntry {
    fn disarm(&mut self) {
        self.id = None;
    }
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        warn!(sync_id = %id, "sync dropped before it settled, recording cancellation");
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!(sync_id = %id, "no runtime left to record the canceled sync");
            return;
        };
        let log = Arc::clone(&self.log);
        runtime.spawn(async move {
            let details = json!({ "cause": "canceled", "reason": "canceled" });
            if let Err(e) = log.settle(id, SyncStatus::Error, details).await {
                error!(sync_id = %id, error = %e, "failed to record canceled sync");
            }
        });
    }
}

/// Reconciles local resources with the external platform.
pub struct SyncService {
    links: Arc<IdLinkService>,
    platform: Arc<dyn ExternalPlatformClient>,
    resources: Arc<dyn ResourceStore>,
    log: Arc<dyn SyncLogStore>,
    config: SyncConfig,
}

impl SyncService {
    #[must_use]
    pub fn new(
        links: Arc<IdLinkService>,
        platform: Arc<dyn ExternalPlatformClient>,
        resources: Arc<dyn ResourceStore>,
        log: Arc<dyn SyncLogStore>,
        config: SyncConfig,
    ) -> Self {
        let config = SyncConfig {
            max_concurrency: config.max_concurrency.clamp(1, MAX_CONCURRENCY),
            ..config
        };
        Self {
            links,
            platform,
            resources,
            log,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Pulls the remote state of a linked resource into the local store,
    /// within the configured deadline.
    ///
    /// # Errors
    ///
    /// See [`SyncService::sync_resource_within`].
    pub async fn sync_resource(
        &self,
        local_id: &str,
        resource_type: ResourceType,
    ) -> Result<SyncLogEntry, Report<SyncError>> {
        self.sync_resource_within(local_id, resource_type, self.config.deadline)
            .await
    }

    /// Pulls the remote state of a linked resource into the local store.
    ///
    /// Returns the settled sync log entry, whose details hold the before and
    /// after snapshots.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotLinked` (without writing a log entry) if the
    /// resource has no link. Any later failure is recorded as an `Error`
    /// entry and returned: `Remote`, `RetryExhausted`, `Timeout`,
    /// `ResourceMissing` or `Storage`.
    #[instrument(skip(self), fields(resource_type = %resource_type))]
    pub async fn sync_resource_within(
        &self,
        local_id: &str,
        resource_type: ResourceType,
        deadline: Duration,
    ) -> Result<SyncLogEntry, Report<SyncError>> {
        Ok(self.reconcile(local_id, resource_type, deadline).await?)
    }

    /// Reconciles many resources within the configured per-resource
    /// deadline.
    pub async fn sync_many(&self, targets: &[SyncTarget]) -> SyncBatchResult {
        self.sync_many_within(targets, self.config.deadline).await
    }

    /// Reconciles many resources, at most `max_concurrency` at a time, each
    /// within `deadline`.
    ///
    /// One resource failing does not stop the others.
    pub async fn sync_many_within(
        &self,
        targets: &[SyncTarget],
        deadline: Duration,
    ) -> SyncBatchResult {
        let details: Vec<ResourceSyncDetail> = stream::iter(targets)
            .map(|target| async move {
                let outcome = self
                    .reconcile(&target.resource_id, target.resource_type, deadline)
                    .await;
                let mut detail = ResourceSyncDetail {
                    resource_id: target.resource_id.clone(),
                    resource_type: target.resource_type,
                    status: SyncStatus::Success,
                    sync_id: None,
                    error: None,
                    error_kind: None,
                    retryable: false,
                };
                match outcome {
                    Ok(entry) => detail.sync_id = Some(entry.id),
                    Err(e) => {
                        detail.status = SyncStatus::Error;
                        detail.error_kind = Some(e.cause().to_string());
                        detail.retryable = e.is_retryable();
                        detail.error = Some(e.to_string());
                    }
                }
                detail
            })
            .buffered(self.config.max_concurrency)
            .collect()
            .await;

        let success_count = details
            .iter()
            .filter(|d| d.status == SyncStatus::Success)
            .count();
        let error_count = details.len() - success_count;
        info!(success_count, error_count, "sync batch finished");

        SyncBatchResult {
            success_count,
            error_count,
            details,
        }
    }

    /// Pushes a local resource to the platform within the configured
    /// deadline.
    ///
    /// # Errors
    ///
    /// See [`SyncService::export_resource_within`].
    pub async fn export_resource(
        &self,
        local_id: &str,
        resource_type: ResourceType,
    ) -> Result<ExportOutcome, Report<SyncError>> {
        self.export_resource_within(local_id, resource_type, self.config.deadline)
            .await
    }

    /// Pushes a local resource to the platform and links the result.
    ///
    /// The first export creates the link; later exports repoint it at the
    /// newly created remote workflow.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ResourceMissing` if the resource does not exist.
    /// Later failures are recorded as an `Error` entry and returned.
    #[instrument(skip(self), fields(resource_type = %resource_type))]
    pub async fn export_resource_within(
        &self,
        local_id: &str,
        resource_type: ResourceType,
        deadline: Duration,
    ) -> Result<ExportOutcome, Report<SyncError>> {
        let resource = self
            .resources
            .get(resource_type, local_id)
            .await
            .map_err(SyncError::from)?;
        let Some(resource) = resource else {
            warn!("resource to export does not exist");
            return Err(SyncError::ResourceMissing {
                resource_type,
                local_id: local_id.to_string(),
            }
            .into());
        };

        let (entry, pending) = self
            .begin(local_id, resource_type, SyncAction::Export)
            .await?;
        let (external_id, created) =
            match Self::within_deadline(deadline, self.export(&resource)).await {
                Ok(exported) => exported,
                Err(e) => return Err(self.fail(entry, pending, e).await.into()),
            };

        let details = json!({ "externalId": external_id, "created": created });
        let entry = self.succeed(entry, pending, details).await?;
        Ok(ExportOutcome {
            external_id,
            created,
            entry,
        })
    }

    /// Returns true if the platform answers a ping.
    pub async fn platform_available(&self) -> bool {
        match self.platform.ping().await {
            Ok(up) => up,
            Err(e) => {
                warn!(error = %e, "platform ping failed");
                false
            }
        }
    }

    /// Sync log entries for a resource, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Storage` if the log store fails.
    pub async fn history(
        &self,
        local_id: &str,
        resource_type: ResourceType,
    ) -> Result<Vec<SyncLogEntry>, Report<SyncError>> {
        Ok(self
            .log
            .list_for_resource(resource_type, local_id)
            .await
            .map_err(SyncError::from)?)
    }

    async fn reconcile(
        &self,
        local_id: &str,
        resource_type: ResourceType,
        deadline: Duration,
    ) -> Result<SyncLogEntry, SyncError> {
        let external_id = self
            .links
            .get_external_id(local_id, resource_type)
            .await
            .map_err(|e| SyncError::Storage {
                reason: e.to_string(),
            })?;
        let Some(external_id) = external_id else {
            warn!(local_id, "resource is not linked, nothing to sync");
            return Err(SyncError::NotLinked {
                resource_type,
                local_id: local_id.to_string(),
            });
        };

        let (entry, pending) = self.begin(local_id, resource_type, SyncAction::Pull).await?;
        match Self::within_deadline(deadline, self.pull(local_id, resource_type, &external_id))
            .await
        {
            Ok(details) => self.succeed(entry, pending, details).await,
            Err(e) => Err(self.fail(entry, pending, e).await),
        }
    }

    async fn begin(
        &self,
        local_id: &str,
        resource_type: ResourceType,
        action: SyncAction,
    ) -> Result<(SyncLogEntry, PendingEntry), SyncError> {
        let entry = SyncLogEntry::pending(local_id, resource_type, action);
        self.log.append(entry.clone()).await.map_err(|e| {
            error!(error = %e, "failed to write sync log entry");
            SyncError::from(e)
        })?;
        let pending = PendingEntry {
            log: Arc::clone(&self.log),
            id: Some(entry.id),
        };
        Ok((entry, pending))
    }

    async fn succeed(
        &self,
        entry: SyncLogEntry,
        mut pending: PendingEntry,
        details: JsonValue,
    ) -> Result<SyncLogEntry, SyncError> {
        let settled = self
            .log
            .settle(entry.id, SyncStatus::Success, details.clone())
            .await;
        pending.disarm();
        settled.map_err(|e| {
            error!(sync_id = %entry.id, error = %e, "failed to settle sync log entry");
            SyncError::from(e)
        })?;
        info!(sync_id = %entry.id, action = ?entry.action, "sync succeeded");
        Ok(entry.settled(SyncStatus::Success, details))
    }

    async fn fail(
        &self,
        entry: SyncLogEntry,
        mut pending: PendingEntry,
        cause: SyncError,
    ) -> SyncError {
        error!(
            sync_id = %entry.id,
            action = ?entry.action,
            cause = cause.cause(),
            error = %cause,
            "sync failed"
        );
        let details = json!({ "cause": cause.cause(), "error": cause.to_string() });
        let settled = self.log.settle(entry.id, SyncStatus::Error, details).await;
        pending.disarm();
        if let Err(e) = settled {
            error!(sync_id = %entry.id, error = %e, "failed to record sync failure");
        }
        cause
    }

    async fn within_deadline<T>(
        deadline: Duration,
        work: impl Future<Output = Result<T, SyncError>>,
    ) -> Result<T, SyncError> {
        match tokio::time::timeout(deadline, work).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SyncError::Timeout {
                deadline_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn pull(
        &self,
        local_id: &str,
        resource_type: ResourceType,
        external_id: &str,
    ) -> Result<JsonValue, SyncError> {
        let remote = self
            .with_retry(|| self.platform.get_remote_workflow(external_id))
            .await?;

        let Some(mut resource) = self.resources.get(resource_type, local_id).await? else {
            return Err(SyncError::ResourceMissing {
                resource_type,
                local_id: local_id.to_string(),
            });
        };

        let before = json!({ "name": resource.name, "content": resource.content });
        resource.content = merge_remote(&resource.content, &remote.content);
        resource.name = remote.name;
        resource.updated_at = Utc::now();
        let after = json!({ "name": resource.name, "content": resource.content });

        self.resources.put(resource).await?;

        Ok(json!({ "externalId": external_id, "before": before, "after": after }))
    }

    async fn export(&self, resource: &Resource) -> Result<(String, bool), SyncError> {
        let payload = WorkflowPayload {
            name: resource.name.clone(),
            content: resource.content.clone(),
        };
        let external_id = self
            .with_retry(|| self.platform.create_remote_workflow(payload.clone()))
            .await?;

        let link_failed = |e: Report<LinkError>| SyncError::Link {
            reason: e.to_string(),
        };
        let existing = self
            .links
            .get_external_id(&resource.id, resource.resource_type)
            .await
            .map_err(link_failed)?;
        let created = existing.is_none();
        if created {
            self.links
                .create_link(
                    &resource.id,
                    &external_id,
                    resource.resource_type,
                    resource.owner_id,
                )
                .await
                .map_err(link_failed)?;
        } else {
            self.links
                .update_link(&resource.id, &external_id, resource.resource_type)
                .await
                .map_err(link_failed)?;
        }
        Ok((external_id, created))
    }

    async fn with_retry<T, F, Fut>(&self, mut call: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.backoff.delay(attempt);
                    warn!(attempt, ?delay, error = %e, "transient platform failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(SyncError::RetryExhausted {
                        attempts: attempt + 1,
                        last: e,
                    });
                }
                Err(e) => return Err(SyncError::Remote(e)),
            }
        }
    }
}

//! External platform integration for agentflow.
//!
//! This crate provides:
//!
//! - **ID linking**: a one-to-one mapping between local resources and their
//!   platform counterparts
//! - **Sync service**: pulls remote state into local resources and exports
//!   local resources, recording every attempt in the sync log
//! - **Stores**: persistence contracts with in-memory implementations

pub mod error;
pub mod link;
pub mod platform;
pub mod resource;
pub mod store;
pub mod sync;
pub mod sync_log;

pub use error::{LinkError, RemoteError, StoreError, SyncError};
pub use link::{IdLink, IdLinkService};
pub use platform::{ExternalPlatformClient, RemoteWorkflow, WorkflowPayload};
pub use resource::{OWNERSHIP_FIELDS, Resource, ResourceType, merge_remote};
pub use store::{
    InMemoryLinkStore, InMemoryResourceStore, InMemorySyncLogStore, LinkStore, ResourceStore,
    SyncLogStore,
};
pub use sync::{
    ExportOutcome, MAX_CONCURRENCY, ResourceSyncDetail, SyncBatchResult, SyncConfig, SyncService,
    SyncTarget,
};
pub use sync_log::{SyncAction, SyncLogEntry, SyncStatus};

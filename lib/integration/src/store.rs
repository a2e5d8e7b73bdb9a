//! Persistence store contracts and in-memory implementations.
//!
//! The store is an opaque collaborator. Each concern gets its own trait so
//! callers can back them with different systems. The in-memory stores are
//! `DashMap`-backed and safe to share across tasks.

use crate::error::StoreError;
use crate::link::IdLink;
use crate::resource::{Resource, ResourceType};
use crate::sync_log::{SyncLogEntry, SyncStatus};
use agentflow_core::{SyncLogId, UserId};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value as JsonValue;

/// Storage for identifier links.
///
/// The store does not enforce the one-to-one mapping; the linking service
/// checks it before every write.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn find_by_local(
        &self,
        resource_type: ResourceType,
        local_id: &str,
    ) -> Result<Option<IdLink>, StoreError>;

    async fn find_by_external(
        &self,
        resource_type: ResourceType,
        external_id: &str,
    ) -> Result<Option<IdLink>, StoreError>;

    /// Inserts a new link. Fails with `Conflict` if the local id is taken.
    async fn insert(&self, link: IdLink) -> Result<(), StoreError>;

    /// Replaces the link for the same local id. Fails with `NotFound` if
    /// there is none.
    async fn replace(&self, link: IdLink) -> Result<(), StoreError>;

    /// Deletes the link for a local id, returning it if it existed.
    async fn delete(
        &self,
        resource_type: ResourceType,
        local_id: &str,
    ) -> Result<Option<IdLink>, StoreError>;

    async fn list_for_owner(&self, owner_id: UserId) -> Result<Vec<IdLink>, StoreError>;
}

/// Append-only storage for sync log entries.
#[async_trait]
pub trait SyncLogStore: Send + Sync {
    async fn append(&self, entry: SyncLogEntry) -> Result<(), StoreError>;

    /// Moves an entry to its terminal status.
    async fn settle(
        &self,
        id: SyncLogId,
        status: SyncStatus,
        details: JsonValue,
    ) -> Result<(), StoreError>;

    /// Entries for one resource, oldest first.
    async fn list_for_resource(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<Vec<SyncLogEntry>, StoreError>;
}

/// Storage for the local side of synchronized resources.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get(
        &self,
        resource_type: ResourceType,
        id: &str,
    ) -> Result<Option<Resource>, StoreError>;

    /// Creates or replaces a resource.
    async fn put(&self, resource: Resource) -> Result<(), StoreError>;
}

type Key = (ResourceType, String);

/// In-memory [`LinkStore`].
#[derive(Debug, Default)]
pub struct InMemoryLinkStore {
    links: DashMap<Key, IdLink>,
}

impl InMemoryLinkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All links of one resource type.
    #[must_use]
    pub fn links_of(&self, resource_type: ResourceType) -> Vec<IdLink> {
        self.links
            .iter()
            .filter(|e| e.key().0 == resource_type)
            .map(|e| e.value().clone())
            .collect()
    }
}

#[async_trait]
impl LinkStore for InMemoryLinkStore {
    async fn find_by_local(
        &self,
        resource_type: ResourceType,
        local_id: &str,
    ) -> Result<Option<IdLink>, StoreError> {
        Ok(self
            .links
            .get(&(resource_type, local_id.to_string()))
            .map(|e| e.value().clone()))
    }

    async fn find_by_external(
        &self,
        resource_type: ResourceType,
        external_id: &str,
    ) -> Result<Option<IdLink>, StoreError> {
        Ok(self
            .links
            .iter()
            .find(|e| e.resource_type == resource_type && e.external_id == external_id)
            .map(|e| e.value().clone()))
    }

    async fn insert(&self, link: IdLink) -> Result<(), StoreError> {
        let key = (link.resource_type, link.local_id.clone());
        match self.links.entry(key) {
            Entry::Occupied(_) => Err(StoreError::Conflict {
                kind: "link",
                key: link.local_id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(link);
                Ok(())
            }
        }
    }

    async fn replace(&self, link: IdLink) -> Result<(), StoreError> {
        let key = (link.resource_type, link.local_id.clone());
        match self.links.get_mut(&key) {
            Some(mut existing) => {
                *existing = link;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: "link",
                key: link.local_id,
            }),
        }
    }

    async fn delete(
        &self,
        resource_type: ResourceType,
        local_id: &str,
    ) -> Result<Option<IdLink>, StoreError> {
        Ok(self
            .links
            .remove(&(resource_type, local_id.to_string()))
            .map(|(_, link)| link))
    }

    async fn list_for_owner(&self, owner_id: UserId) -> Result<Vec<IdLink>, StoreError> {
        let mut links: Vec<_> = self
            .links
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .map(|e| e.value().clone())
            .collect();
        links.sort_by(|a, b| {
            (a.resource_type, &a.local_id).cmp(&(b.resource_type, &b.local_id))
        });
        Ok(links)
    }
}

/// In-memory [`SyncLogStore`].
#[derive(Debug, Default)]
pub struct InMemorySyncLogStore {
    entries: DashMap<Key, Vec<SyncLogEntry>>,
}

impl InMemorySyncLogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.value().len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SyncLogStore for InMemorySyncLogStore {
    async fn append(&self, entry: SyncLogEntry) -> Result<(), StoreError> {
        self.entries
            .entry((entry.resource_type, entry.resource_id.clone()))
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn settle(
        &self,
        id: SyncLogId,
        status: SyncStatus,
        details: JsonValue,
    ) -> Result<(), StoreError> {
        for mut shard in self.entries.iter_mut() {
            if let Some(entry) = shard.value_mut().iter_mut().find(|e| e.id == id) {
                entry.status = status;
                entry.details = details;
                return Ok(());
            }
        }
        Err(StoreError::NotFound {
            kind: "sync log entry",
            key: id.to_string(),
        })
    }

    async fn list_for_resource(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<Vec<SyncLogEntry>, StoreError> {
        Ok(self
            .entries
            .get(&(resource_type, resource_id.to_string()))
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }
}

/// In-memory [`ResourceStore`].
#[derive(Debug, Default)]
pub struct InMemoryResourceStore {
    resources: DashMap<Key, Resource>,
}

impl InMemoryResourceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn get(
        &self,
        resource_type: ResourceType,
        id: &str,
    ) -> Result<Option<Resource>, StoreError> {
        Ok(self
            .resources
            .get(&(resource_type, id.to_string()))
            .map(|e| e.value().clone()))
    }

    async fn put(&self, resource: Resource) -> Result<(), StoreError> {
        self.resources
            .insert((resource.resource_type, resource.id.clone()), resource);
        Ok(())
    }
}

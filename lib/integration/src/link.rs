//! Local to external identifier linking.
//!
//! Within each resource type, links form a one-to-one mapping: a local id
//! has at most one external id and vice versa. Every mutation checks the
//! mapping and writes while holding that resource type's lock, so racing
//! callers cannot both pass the check. Lookups take no lock.

use crate::error::LinkError;
use crate::resource::ResourceType;
use crate::store::LinkStore;
use agentflow_core::{IdLinkId, UserId};
use chrono::{DateTime, Utc};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

/// A link between a local resource and its platform counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdLink {
    pub id: IdLinkId,
    pub local_id: String,
    pub external_id: String,
    pub resource_type: ResourceType,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdLink {
    #[must_use]
    pub fn new(
        local_id: impl Into<String>,
        external_id: impl Into<String>,
        resource_type: ResourceType,
        owner_id: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: IdLinkId::new(),
            local_id: local_id.into(),
            external_id: external_id.into(),
            resource_type,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Maintains the identifier mapping.
pub struct IdLinkService {
    store: Arc<dyn LinkStore>,
    partitions: [Mutex<()>; ResourceType::ALL.len()],
}

impl IdLinkService {
    #[must_use]
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        Self {
            store,
            partitions: Default::default(),
        }
    }

    fn partition(&self, resource_type: ResourceType) -> &Mutex<()> {
        &self.partitions[resource_type.index()]
    }

    /// Links a local id to an external id.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::PreconditionFailed` if either id is already
    /// linked under this resource type, or `LinkError::Storage` if the store
    /// fails.
    #[instrument(skip(self), fields(resource_type = %resource_type))]
    pub async fn create_link(
        &self,
        local_id: &str,
        external_id: &str,
        resource_type: ResourceType,
        owner_id: UserId,
    ) -> Result<IdLink, Report<LinkError>> {
        let _guard = self.partition(resource_type).lock().await;

        if let Some(existing) = self
            .store
            .find_by_local(resource_type, local_id)
            .await
            .map_err(LinkError::from)?
        {
            return Err(LinkError::PreconditionFailed {
                resource_type,
                reason: format!(
                    "local id {local_id} is already linked to {}",
                    existing.external_id
                ),
            }
            .into());
        }
        if let Some(existing) = self
            .store
            .find_by_external(resource_type, external_id)
            .await
            .map_err(LinkError::from)?
        {
            return Err(LinkError::PreconditionFailed {
                resource_type,
                reason: format!(
                    "external id {external_id} is already linked to {}",
                    existing.local_id
                ),
            }
            .into());
        }

        let link = IdLink::new(local_id, external_id, resource_type, owner_id);
        self.store.insert(link.clone()).await.map_err(|e| {
            error!(error = %e, "failed to store link");
            LinkError::from(e)
        })?;

        info!("link created");
        Ok(link)
    }

    /// Returns the external id linked to a local id.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Storage` if the store fails. A missing link is
    /// `Ok(None)`.
    pub async fn get_external_id(
        &self,
        local_id: &str,
        resource_type: ResourceType,
    ) -> Result<Option<String>, Report<LinkError>> {
        let link = self
            .store
            .find_by_local(resource_type, local_id)
            .await
            .map_err(LinkError::from)?;
        Ok(link.map(|l| l.external_id))
    }

    /// Returns the local id linked to an external id.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Storage` if the store fails. A missing link is
    /// `Ok(None)`.
    pub async fn get_local_id(
        &self,
        external_id: &str,
        resource_type: ResourceType,
    ) -> Result<Option<String>, Report<LinkError>> {
        let link = self
            .store
            .find_by_external(resource_type, external_id)
            .await
            .map_err(LinkError::from)?;
        Ok(link.map(|l| l.local_id))
    }

    /// Points an existing link at a new external id.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::NotLinked` if the local id has no link,
    /// `LinkError::PreconditionFailed` if the new external id belongs to
    /// another local id, or `LinkError::Storage` if the store fails.
    #[instrument(skip(self), fields(resource_type = %resource_type))]
    pub async fn update_link(
        &self,
        local_id: &str,
        new_external_id: &str,
        resource_type: ResourceType,
    ) -> Result<IdLink, Report<LinkError>> {
        let _guard = self.partition(resource_type).lock().await;

        let Some(mut link) = self
            .store
            .find_by_local(resource_type, local_id)
            .await
            .map_err(LinkError::from)?
        else {
            return Err(LinkError::NotLinked {
                resource_type,
                local_id: local_id.to_string(),
            }
            .into());
        };

        if link.external_id == new_external_id {
            return Ok(link);
        }

        if let Some(other) = self
            .store
            .find_by_external(resource_type, new_external_id)
            .await
            .map_err(LinkError::from)?
            && other.local_id != local_id
        {
            return Err(LinkError::PreconditionFailed {
                resource_type,
                reason: format!(
                    "external id {new_external_id} is already linked to {}",
                    other.local_id
                ),
            }
            .into());
        }

        link.external_id = new_external_id.to_string();
        link.updated_at = Utc::now();
        self.store.replace(link.clone()).await.map_err(|e| {
            error!(error = %e, "failed to update link");
            LinkError::from(e)
        })?;

        info!("link updated");
        Ok(link)
    }

    /// Removes a link. Removing a missing link succeeds.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Storage` if the store fails.
    #[instrument(skip(self), fields(resource_type = %resource_type))]
    pub async fn remove_link(
        &self,
        local_id: &str,
        resource_type: ResourceType,
    ) -> Result<(), Report<LinkError>> {
        let _guard = self.partition(resource_type).lock().await;

        let removed = self
            .store
            .delete(resource_type, local_id)
            .await
            .map_err(LinkError::from)?;
        if removed.is_some() {
            info!("link removed");
        }
        Ok(())
    }

    /// All links owned by a user.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Storage` if the store fails.
    pub async fn links_for_owner(&self, owner_id: UserId) -> Result<Vec<IdLink>, Report<LinkError>> {
        Ok(self
            .store
            .list_for_owner(owner_id)
            .await
            .map_err(LinkError::from)?)
    }
}

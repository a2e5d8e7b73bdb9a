//! The engine facade.

use crate::config::EngineConfig;
use crate::error::{EngineError, SessionError};
use agentflow_catalog::{
    Catalog, CatalogProvider, CatalogSource, JsonFileCatalogSource, StaticCatalogSource,
};
use agentflow_core::{Result, SessionId};
use agentflow_editor::{
    AutoSaveHandle, EditorSession, GraphStore, GraphStoreSaver, InMemoryGraphStore,
};
use agentflow_integration::{
    ExternalPlatformClient, IdLinkService, InMemoryLinkStore, InMemoryResourceStore,
    InMemorySyncLogStore, LinkStore, ResourceStore, SyncLogStore, SyncService,
};
use agentflow_workflow::{
    AgentDefinition, Graph, Modifier, OverrideConfig, SelectedCapability, TransformError,
    Transformer, ValidationReport, Validator,
};
use dashmap::DashSet;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{info, warn};

/// Persistence collaborators.
#[derive(Clone)]
pub struct EngineStores {
    pub links: Arc<dyn LinkStore>,
    pub sync_log: Arc<dyn SyncLogStore>,
    pub resources: Arc<dyn ResourceStore>,
    pub graphs: Arc<dyn GraphStore>,
}

impl EngineStores {
    /// Fresh in-memory stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            links: Arc::new(InMemoryLinkStore::new()),
            sync_log: Arc::new(InMemorySyncLogStore::new()),
            resources: Arc::new(InMemoryResourceStore::new()),
            graphs: Arc::new(InMemoryGraphStore::new()),
        }
    }
}

/// All engine components, built once per process.
pub struct Engine {
    config: EngineConfig,
    catalog: Arc<CatalogProvider>,
    transformer: Transformer,
    validator: Arc<Validator>,
    modifier: Arc<Modifier>,
    links: Arc<IdLinkService>,
    sync: SyncService,
    graphs: Arc<dyn GraphStore>,
    sessions: Arc<DashSet<SessionId>>,
}

impl Engine {
    /// Loads the catalog from `catalog_source` and builds every component.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::CatalogLoad` if the catalog cannot be loaded.
    pub fn new(
        config: EngineConfig,
        catalog_source: &dyn CatalogSource,
        platform: Arc<dyn ExternalPlatformClient>,
        stores: EngineStores,
    ) -> Result<Self, EngineError> {
        let catalog = CatalogProvider::load(catalog_source).map_err(|e| {
            EngineError::CatalogLoad {
                reason: e.to_string(),
            }
        })?;
        if let Some(expected) = &config.catalog.version_label
            && expected != catalog.version()
        {
            warn!(
                expected = %expected,
                loaded = %catalog.version(),
                "catalog version differs from the configured label"
            );
        }
        info!(
            version = %catalog.version(),
            node_types = catalog.len(),
            "catalog loaded"
        );

        let catalog = Arc::new(catalog);
        let validator = Validator::new(Arc::clone(&catalog))
            .with_deferred_node_types(config.validation.deferred_node_types.iter().cloned());
        let links = Arc::new(IdLinkService::new(stores.links));
        let sync = SyncService::new(
            Arc::clone(&links),
            platform,
            stores.resources,
            stores.sync_log,
            config.sync.to_config(),
        );

        Ok(Self {
            transformer: Transformer::new(Arc::clone(&catalog)),
            validator: Arc::new(validator),
            modifier: Arc::new(Modifier::new(Arc::clone(&catalog))),
            catalog,
            links,
            sync,
            graphs: stores.graphs,
            sessions: Arc::new(DashSet::new()),
            config,
        })
    }

    /// Builds the engine with the catalog named in the configuration.
    ///
    /// Without a catalog path the engine starts with an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::CatalogLoad` if the catalog file cannot be
    /// loaded.
    pub fn from_config(
        config: EngineConfig,
        platform: Arc<dyn ExternalPlatformClient>,
        stores: EngineStores,
    ) -> Result<Self, EngineError> {
        match config.catalog.path.clone() {
            Some(path) => Self::new(config, &JsonFileCatalogSource::new(path), platform, stores),
            None => {
                let empty = StaticCatalogSource::new(Catalog {
                    version: "empty".to_string(),
                    nodes: Vec::new(),
                });
                Self::new(config, &empty, platform, stores)
            }
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<CatalogProvider> {
        &self.catalog
    }

    #[must_use]
    pub fn transformer(&self) -> &Transformer {
        &self.transformer
    }

    #[must_use]
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    #[must_use]
    pub fn modifier(&self) -> &Modifier {
        &self.modifier
    }

    #[must_use]
    pub fn links(&self) -> &IdLinkService {
        &self.links
    }

    #[must_use]
    pub fn sync(&self) -> &SyncService {
        &self.sync
    }

    /// Builds the graph for an agent.
    ///
    /// # Errors
    ///
    /// See [`Transformer::transform`].
    pub fn transform(
        &self,
        agent: &AgentDefinition,
        selected: &[SelectedCapability],
        overrides: Option<&OverrideConfig>,
    ) -> Result<Graph, TransformError> {
        self.transformer.transform(agent, selected, overrides)
    }

    /// Validates a graph with the configured options.
    #[must_use]
    pub fn validate(&self, graph: &Graph) -> ValidationReport {
        self.validator
            .validate(graph, &self.config.validation.options())
    }

    /// Returns true while an editor holds the session.
    #[must_use]
    pub fn is_session_active(&self, session_id: SessionId) -> bool {
        self.sessions.contains(&session_id)
    }

    /// Opens an editing session over a freshly built agent graph.
    ///
    /// Must be called within a Tokio runtime; the session's auto-saver runs
    /// as a task on it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyActive` if the session is held by
    /// another lease, or `SessionError::InvalidAgent` if the graph cannot be
    /// built.
    pub fn open_session(
        &self,
        session_id: SessionId,
        agent: &AgentDefinition,
        selected: &[SelectedCapability],
        overrides: Option<&OverrideConfig>,
    ) -> Result<EditorLease, SessionError> {
        let guard = self.claim(session_id)?;
        let graph = self
            .transformer
            .transform(agent, selected, overrides)
            .map_err(|e| SessionError::InvalidAgent {
                reason: e.to_string(),
            })?;
        Ok(self.lease(guard, graph))
    }

    /// Opens an editing session over an existing graph.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyActive` if the session is held by
    /// another lease.
    pub fn open_graph_session(
        &self,
        session_id: SessionId,
        graph: Graph,
    ) -> Result<EditorLease, SessionError> {
        let guard = self.claim(session_id)?;
        Ok(self.lease(guard, graph))
    }

    fn claim(&self, session_id: SessionId) -> Result<SessionGuard, SessionError> {
        if !self.sessions.insert(session_id) {
            warn!(session_id = %session_id, "session already has an active editor");
            return Err(SessionError::AlreadyActive { session_id }.into());
        }
        Ok(SessionGuard {
            session_id,
            registry: Arc::clone(&self.sessions),
        })
    }

    fn lease(&self, guard: SessionGuard, graph: Graph) -> EditorLease {
        let session_id = guard.session_id;
        let autosave = AutoSaveHandle::spawn(
            Arc::new(GraphStoreSaver::new(Arc::clone(&self.graphs), session_id)),
            self.config.autosave.to_config(),
        );
        let session = EditorSession::new(
            session_id,
            graph,
            self.config.history.max_size,
            Arc::clone(&self.modifier),
            Arc::clone(&self.validator),
            autosave,
        );
        info!(session_id = %session_id, "editor session opened");
        EditorLease {
            session,
            _guard: guard,
        }
    }
}

/// Releases a session id when dropped.
struct SessionGuard {
    session_id: SessionId,
    registry: Arc<DashSet<SessionId>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.session_id);
    }
}

/// Exclusive access to one editing session.
///
/// The session id is free again once the lease is dropped or closed.
pub struct EditorLease {
    session: EditorSession,
    _guard: SessionGuard,
}

impl EditorLease {
    /// Closes the session, then releases the session id.
    ///
    /// # Errors
    ///
    /// See [`EditorSession::close`].
    pub async fn close(self) -> Result<(), agentflow_editor::AutoSaveError> {
        let Self { session, _guard } = self;
        session.close().await
    }
}

impl Deref for EditorLease {
    type Target = EditorSession;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl DerefMut for EditorLease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

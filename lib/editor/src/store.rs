//! Graph persistence for editing sessions.

use crate::autosave::SaveHandler;
use crate::error::{GraphStoreError, SaveError};
use agentflow_core::SessionId;
use agentflow_workflow::Graph;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Storage for the graph of each editing session.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Creates or replaces the session's graph.
    async fn save_graph(&self, session_id: SessionId, graph: &Graph) -> Result<(), GraphStoreError>;

    async fn load_graph(&self, session_id: SessionId) -> Result<Option<Graph>, GraphStoreError>;
}

/// Saves auto-save snapshots of one session into a [`GraphStore`].
pub struct GraphStoreSaver {
    store: Arc<dyn GraphStore>,
    session_id: SessionId,
}

impl GraphStoreSaver {
    #[must_use]
    pub fn new(store: Arc<dyn GraphStore>, session_id: SessionId) -> Self {
        Self { store, session_id }
    }
}

#[async_trait]
impl SaveHandler<Graph> for GraphStoreSaver {
    async fn save(&self, data: Graph) -> Result<(), SaveError> {
        self.store.save_graph(self.session_id, &data).await?;
        Ok(())
    }
}

/// In-memory [`GraphStore`].
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    graphs: DashMap<SessionId, Graph>,
}

impl InMemoryGraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn save_graph(&self, session_id: SessionId, graph: &Graph) -> Result<(), GraphStoreError> {
        self.graphs.insert(session_id, graph.clone());
        Ok(())
    }

    async fn load_graph(&self, session_id: SessionId) -> Result<Option<Graph>, GraphStoreError> {
        Ok(self.graphs.get(&session_id).map(|e| e.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_workflow::GraphNode;

    #[tokio::test]
    async fn saver_writes_through_to_the_store() {
        let store = Arc::new(InMemoryGraphStore::new());
        let session_id = SessionId::new();
        let saver = GraphStoreSaver::new(store.clone(), session_id);

        let mut graph = Graph::default();
        graph.nodes.push(GraphNode::start());
        saver.save(graph.clone()).await.expect("save");

        let loaded = store.load_graph(session_id).await.expect("load");
        assert_eq!(loaded, Some(graph));
        assert_eq!(store.load_graph(SessionId::new()).await.expect("load"), None);
    }
}

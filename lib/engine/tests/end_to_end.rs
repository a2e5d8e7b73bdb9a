//! End-to-end behaviour through the engine facade.

use agentflow_catalog::{Catalog, RawNodeDescriptor, StaticCatalogSource};
use agentflow_core::{SessionId, UserId};
use agentflow_editor::{AutoSaveStatus, GraphStore};
use agentflow_engine::{Engine, EngineConfig, EngineStores};
use agentflow_integration::{
    ExternalPlatformClient, RemoteError, RemoteWorkflow, Resource, ResourceStore, ResourceType,
    SyncStatus, SyncTarget, WorkflowPayload,
};
use agentflow_workflow::{
    AgentDefinition, Complexity, EdgeKind, ModificationContext, ModificationOp, NodeId,
    SelectedCapability,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Platform double that stores created workflows in memory.
#[derive(Default)]
struct MemoryPlatform {
    workflows: Mutex<HashMap<String, RemoteWorkflow>>,
}

#[async_trait]
impl ExternalPlatformClient for MemoryPlatform {
    async fn get_remote_workflow(&self, external_id: &str) -> Result<RemoteWorkflow, RemoteError> {
        self.workflows
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                external_id: external_id.to_string(),
            })
    }

    async fn create_remote_workflow(&self, payload: WorkflowPayload) -> Result<String, RemoteError> {
        let mut workflows = self.workflows.lock().unwrap();
        let id = format!("remote_{}", workflows.len() + 1);
        workflows.insert(
            id.clone(),
            RemoteWorkflow {
                id: id.clone(),
                name: payload.name,
                content: payload.content,
            },
        );
        Ok(id)
    }

    async fn ping(&self) -> Result<bool, RemoteError> {
        Ok(true)
    }
}

fn catalog() -> Catalog {
    Catalog {
        version: "2024.1".to_string(),
        nodes: vec![
            RawNodeDescriptor::new("bufferMemory", "Buffer Memory", "Memory"),
            RawNodeDescriptor::new("calculator", "Calculator", "Tools"),
        ],
    }
}

fn engine_with(stores: EngineStores) -> (Engine, Arc<MemoryPlatform>) {
    let platform = Arc::new(MemoryPlatform::default());
    let engine = Engine::new(
        EngineConfig::default(),
        &StaticCatalogSource::new(catalog()),
        platform.clone(),
        stores,
    )
    .expect("engine");
    (engine, platform)
}

fn support_agent() -> AgentDefinition {
    AgentDefinition::new("agent-1", "Support")
}

fn memory_and_tool(engine: &Engine) -> Vec<SelectedCapability> {
    let memory = engine.catalog().descriptor("bufferMemory").expect("memory");
    let tool = engine.catalog().descriptor("calculator").expect("tool");
    vec![
        SelectedCapability::from_descriptor(memory),
        SelectedCapability::from_descriptor(tool),
    ]
}

#[test]
fn support_agent_with_memory_and_tool_builds_five_node_chain() {
    let (engine, _) = engine_with(EngineStores::in_memory());

    let graph = engine
        .transform(&support_agent(), &memory_and_tool(&engine), None)
        .expect("transform");

    let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["start", "bufferMemory_1", "calculator_2", "agent", "end"]
    );
    assert_eq!(graph.edge_count(), 4);
    assert!(graph.edges.iter().all(|e| e.kind == EdgeKind::Sequential));
    assert_eq!(graph.metadata.complexity, Complexity::Medium);

    let report = engine.validate(&graph);
    assert!(report.valid);
    assert!(report.errors.is_empty());
}

#[test]
fn transform_is_deterministic() {
    let (engine, _) = engine_with(EngineStores::in_memory());
    let selected = memory_and_tool(&engine);

    let first = engine
        .transform(&support_agent(), &selected, None)
        .expect("transform");
    let second = engine
        .transform(&support_agent(), &selected, None)
        .expect("transform");
    assert_eq!(first, second);
    assert_eq!(engine.validate(&first), engine.validate(&second));
}

#[tokio::test]
async fn one_active_editor_per_session() {
    let (engine, _) = engine_with(EngineStores::in_memory());
    let session_id = SessionId::new();

    let lease = engine
        .open_session(session_id, &support_agent(), &[], None)
        .expect("open");
    assert!(engine.is_session_active(session_id));

    let err = engine
        .open_session(session_id, &support_agent(), &[], None)
        .err()
        .expect("second editor");
    assert!(err.to_string().contains("already has an active editor"));

    // Other sessions are independent.
    let other = engine
        .open_session(SessionId::new(), &support_agent(), &[], None)
        .expect("other session");
    drop(other);

    drop(lease);
    assert!(!engine.is_session_active(session_id));
    let reopened = engine
        .open_session(session_id, &support_agent(), &[], None)
        .expect("reopen");
    reopened.close().await.expect("close");
    assert!(!engine.is_session_active(session_id));
}

#[tokio::test]
async fn invalid_agent_releases_the_session() {
    let (engine, _) = engine_with(EngineStores::in_memory());
    let session_id = SessionId::new();

    let err = engine
        .open_session(session_id, &AgentDefinition::new("agent-1", " "), &[], None)
        .err()
        .expect("invalid agent");
    assert!(err.to_string().contains("cannot build agent graph"));
    assert!(!engine.is_session_active(session_id));
}

#[tokio::test(start_paused = true)]
async fn edits_are_autosaved_and_undoable() {
    let stores = EngineStores::in_memory();
    let graphs = Arc::clone(&stores.graphs);
    let (engine, _) = engine_with(stores);
    let session_id = SessionId::new();

    let mut lease = engine
        .open_session(session_id, &support_agent(), &memory_and_tool(&engine), None)
        .expect("open");
    let original = lease.graph().clone();

    let result = lease
        .apply(
            &[ModificationOp::RemoveNode {
                node_id: NodeId::new("calculator_2"),
            }],
            &ModificationContext::default(),
        )
        .expect("apply");
    assert!(result.success);
    assert_eq!(lease.graph().node_count(), 4);
    // Removing the tool leaves the chain broken around it.
    assert_eq!(lease.graph().edge_count(), 2);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let saved = graphs
        .load_graph(session_id)
        .await
        .expect("load")
        .expect("autosaved");
    assert_eq!(saved.node_count(), 4);
    assert_eq!(lease.autosave_state().status, AutoSaveStatus::Idle);
    assert!(!lease.is_dirty());

    assert!(lease.undo().expect("undo"));
    assert_eq!(lease.graph(), &original);
    lease.close().await.expect("close");
}

#[tokio::test]
async fn unlinked_sync_writes_no_log_entry() {
    let (engine, _) = engine_with(EngineStores::in_memory());

    let err = engine
        .sync()
        .sync_resource("agent-1", ResourceType::Agent)
        .await
        .expect_err("not linked");
    assert!(err.to_string().contains("is not linked"));

    let history = engine
        .sync()
        .history("agent-1", ResourceType::Agent)
        .await
        .expect("history");
    assert!(history.is_empty());
}

#[tokio::test]
async fn export_then_sync_round_trip() {
    let stores = EngineStores::in_memory();
    let resources = Arc::clone(&stores.resources);
    let (engine, platform) = engine_with(stores);
    let owner = UserId::new();

    let graph = engine
        .transform(&support_agent(), &memory_and_tool(&engine), None)
        .expect("transform");
    resources
        .put(
            Resource::new("agent-1", ResourceType::Agent, owner, "Support")
                .with_value("flowData", serde_json::to_value(&graph).expect("graph json"))
                .with_value("ownerId", json!(owner.to_string())),
        )
        .await
        .expect("put");

    let exported = engine
        .sync()
        .export_resource("agent-1", ResourceType::Agent)
        .await
        .expect("export");
    assert!(exported.created);
    assert_eq!(
        engine
            .links()
            .get_external_id("agent-1", ResourceType::Agent)
            .await
            .expect("lookup"),
        Some(exported.external_id.clone())
    );

    // Someone edits the workflow on the platform.
    {
        let mut workflows = platform.workflows.lock().unwrap();
        let remote = workflows.get_mut(&exported.external_id).expect("remote");
        remote.name = "Support (edited)".to_string();
        remote.content.insert("ownerId".to_string(), json!("someone-else"));
    }

    let batch = engine
        .sync()
        .sync_many(&[
            SyncTarget::new("agent-1", ResourceType::Agent),
            SyncTarget::new("agent-2", ResourceType::Agent),
        ])
        .await;
    assert_eq!(batch.success_count, 1);
    assert_eq!(batch.error_count, 1);

    let local = resources
        .get(ResourceType::Agent, "agent-1")
        .await
        .expect("get")
        .expect("resource");
    assert_eq!(local.name, "Support (edited)");
    assert_eq!(local.content["ownerId"], json!(owner.to_string()));

    let history = engine
        .sync()
        .history("agent-1", ResourceType::Agent)
        .await
        .expect("history");
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|e| e.status == SyncStatus::Success));
    assert!(engine.sync().platform_available().await);
}

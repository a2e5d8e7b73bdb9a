//! Agent definition to execution graph.
//!
//! The transformer lays out a linear chain:
//!
//! ```text
//! start -> capability 1 -> ... -> capability n -> agent -> end
//! ```
//!
//! Capabilities keep their selection order. The same inputs always produce
//! the same graph, ids and positions included.

use crate::edge::GraphEdge;
use crate::error::TransformError;
use crate::graph::Graph;
use crate::node::{AGENT_NODE_ID, GraphNode, Position};
use agentflow_catalog::{CatalogProvider, NodeCategory, RawNodeDescriptor};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::sync::Arc;
use tracing::debug;

/// Model used when neither the overrides nor the capability name one.
pub const DEFAULT_MODEL_NAME: &str = "gpt-4o-mini";
/// Temperature used when neither the overrides nor the capability set one.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

const NODE_SPACING: f64 = 250.0;
const ROW_Y: f64 = 100.0;

/// The agent being turned into a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: Map<String, JsonValue>,
    #[serde(default)]
    pub knowledge: Vec<JsonValue>,
}

impl AgentDefinition {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_knowledge(mut self, entry: JsonValue) -> Self {
        self.knowledge.push(entry);
        self
    }
}

/// A capability chosen for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedCapability {
    pub node_type: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub category: NodeCategory,
    #[serde(default)]
    pub config: Map<String, JsonValue>,
}

impl SelectedCapability {
    #[must_use]
    pub fn new(node_type: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            node_type: node_type.into(),
            display_name: None,
            category,
            config: Map::new(),
        }
    }

    /// Selects a catalog node type.
    #[must_use]
    pub fn from_descriptor(descriptor: &RawNodeDescriptor) -> Self {
        Self {
            node_type: descriptor.name.clone(),
            display_name: Some(descriptor.label.clone()),
            category: descriptor.node_category(),
            config: Map::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.config.insert(key.into(), value);
        self
    }
}

/// Caller-supplied overrides applied on top of defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Builds execution graphs from agent definitions.
#[derive(Debug, Clone)]
pub struct Transformer {
    catalog: Arc<CatalogProvider>,
}

impl Transformer {
    #[must_use]
    pub fn new(catalog: Arc<CatalogProvider>) -> Self {
        Self { catalog }
    }

    /// Builds the graph for an agent and its selected capabilities.
    ///
    /// # Errors
    ///
    /// Returns `TransformError::Validation` if the agent has no id or name,
    /// and `TransformError::InvalidCapability` if a selected capability is
    /// one of the fixed node kinds or has no node type.
    pub fn transform(
        &self,
        agent: &AgentDefinition,
        selected: &[SelectedCapability],
        overrides: Option<&OverrideConfig>,
    ) -> Result<Graph, Report<TransformError>> {
        check_agent(agent)?;

        let mut nodes = Vec::with_capacity(selected.len() + 3);
        nodes.push(GraphNode::start());

        for (offset, capability) in selected.iter().enumerate() {
            let position = offset + 1;
            if capability.node_type.trim().is_empty() {
                return Err(TransformError::InvalidCapability {
                    position,
                    reason: "node type is empty".to_string(),
                }
                .into());
            }
            if !capability.category.is_capability() {
                return Err(TransformError::InvalidCapability {
                    position,
                    reason: format!("{} nodes cannot be selected", capability.category),
                }
                .into());
            }
            nodes.push(self.capability_node(capability, position, overrides));
        }

        nodes.push(agent_node(agent, selected, overrides));
        nodes.push(GraphNode::end());

        for (index, node) in nodes.iter_mut().enumerate() {
            node.position = Position::new(NODE_SPACING * index as f64, ROW_Y);
        }

        let edges = nodes
            .windows(2)
            .map(|pair| GraphEdge::sequential(&pair[0].id, &pair[1].id))
            .collect();

        let mut graph = Graph {
            nodes,
            edges,
            ..Graph::default()
        };
        graph.refresh_metadata();

        debug!(
            agent_id = %agent.id,
            nodes = graph.node_count(),
            complexity = %graph.metadata.complexity,
            "graph built"
        );
        Ok(graph)
    }

    fn capability_node(
        &self,
        capability: &SelectedCapability,
        position: usize,
        overrides: Option<&OverrideConfig>,
    ) -> GraphNode {
        let mut config = Map::new();
        if let Some(schema) = self.catalog.schema(&capability.node_type) {
            for input in &schema.inputs {
                if let Some(default) = &input.default_value {
                    config.insert(input.name.clone(), default.clone());
                }
            }
        }
        for (key, value) in &capability.config {
            config.insert(key.clone(), value.clone());
        }

        match capability.category {
            NodeCategory::Llm => apply_llm_defaults(&mut config, overrides),
            NodeCategory::Memory => {
                config.insert("memoryEnabled".to_string(), JsonValue::Bool(true));
            }
            NodeCategory::Tools => {
                config.insert("toolsEnabled".to_string(), JsonValue::Bool(true));
            }
            _ => {}
        }

        let display_name = capability
            .display_name
            .clone()
            .or_else(|| {
                self.catalog
                    .descriptor(&capability.node_type)
                    .map(|d| d.label.clone())
            })
            .unwrap_or_else(|| capability.node_type.clone());

        GraphNode::new(
            format!("{}_{position}", capability.node_type),
            capability.node_type.clone(),
            display_name,
            capability.category,
        )
        .with_config(config)
    }
}

fn check_agent(agent: &AgentDefinition) -> Result<(), Report<TransformError>> {
    if agent.id.trim().is_empty() {
        return Err(TransformError::Validation {
            field: "id",
            reason: "is required".to_string(),
        }
        .into());
    }
    if agent.name.trim().is_empty() {
        return Err(TransformError::Validation {
            field: "name",
            reason: "is required".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Overrides win, then whatever the capability already carries, then the
/// fixed defaults.
fn apply_llm_defaults(config: &mut Map<String, JsonValue>, overrides: Option<&OverrideConfig>) {
    let model = overrides.and_then(|o| o.model_name.clone());
    match model {
        Some(model) => {
            config.insert("modelName".to_string(), JsonValue::String(model));
        }
        None => {
            config
                .entry("modelName")
                .or_insert_with(|| JsonValue::String(DEFAULT_MODEL_NAME.to_string()));
        }
    }

    match overrides.and_then(|o| o.temperature) {
        Some(temperature) => {
            config.insert("temperature".to_string(), json!(temperature));
        }
        None => {
            config
                .entry("temperature")
                .or_insert_with(|| json!(DEFAULT_TEMPERATURE));
        }
    }
}

fn agent_node(
    agent: &AgentDefinition,
    selected: &[SelectedCapability],
    overrides: Option<&OverrideConfig>,
) -> GraphNode {
    let has = |category: NodeCategory| selected.iter().any(|c| c.category == category);

    let mut config = Map::new();
    config.insert("agentId".to_string(), json!(agent.id));
    config.insert("name".to_string(), json!(agent.name));
    config.insert("description".to_string(), json!(agent.description));
    config.insert("config".to_string(), JsonValue::Object(agent.config.clone()));
    config.insert("knowledge".to_string(), JsonValue::Array(agent.knowledge.clone()));
    config.insert(
        "overrides".to_string(),
        overrides
            .and_then(|o| serde_json::to_value(o).ok())
            .unwrap_or_else(|| JsonValue::Object(Map::new())),
    );
    config.insert("memoryEnabled".to_string(), json!(has(NodeCategory::Memory)));
    config.insert("toolsEnabled".to_string(), json!(has(NodeCategory::Tools)));

    GraphNode::new(AGENT_NODE_ID, "agent", agent.name.clone(), NodeCategory::Agent)
        .with_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgeKind;
    use crate::graph::Complexity;
    use agentflow_catalog::Catalog;
    use proptest::prelude::*;

    fn catalog() -> Arc<CatalogProvider> {
        Arc::new(CatalogProvider::from_catalog(Catalog {
            version: "test".to_string(),
            nodes: vec![
                RawNodeDescriptor::new("bufferMemory", "Buffer Memory", "Memory").with_inputs(
                    "[{ label: 'Memory Key', name: 'memoryKey', type: 'string', default: 'chat_history' }]",
                ),
                RawNodeDescriptor::new("calculator", "Calculator", "Tools"),
                RawNodeDescriptor::new("chatOpenAI", "ChatOpenAI", "Chat Models").with_inputs(
                    "[{ label: 'Temperature', name: 'temperature', type: 'number', step: 0.1, default: 0.9 }]",
                ),
            ],
        }))
    }

    fn transformer() -> Transformer {
        Transformer::new(catalog())
    }

    fn support_agent() -> AgentDefinition {
        AgentDefinition::new("agt_1", "Support").with_description("Answers tickets")
    }

    fn ids(graph: &Graph) -> Vec<&str> {
        graph.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn memory_and_tool_make_a_medium_chain() {
        let selected = [
            SelectedCapability::new("bufferMemory", NodeCategory::Memory),
            SelectedCapability::new("calculator", NodeCategory::Tools),
        ];
        let graph = transformer()
            .transform(&support_agent(), &selected, None)
            .expect("transform");

        assert_eq!(
            ids(&graph),
            vec!["start", "bufferMemory_1", "calculator_2", "agent", "end"]
        );
        assert_eq!(graph.edge_count(), 4);
        assert!(graph.edges.iter().all(|e| e.kind == EdgeKind::Sequential));
        assert_eq!(graph.edges[0].id.as_str(), "start->bufferMemory_1");
        assert_eq!(graph.edges[3].id.as_str(), "agent->end");
        assert_eq!(graph.metadata.complexity, Complexity::Medium);
    }

    #[test]
    fn selection_order_is_kept() {
        let selected = [
            SelectedCapability::new("calculator", NodeCategory::Tools),
            SelectedCapability::new("bufferMemory", NodeCategory::Memory),
        ];
        let graph = transformer()
            .transform(&support_agent(), &selected, None)
            .expect("transform");
        assert_eq!(graph.nodes[1].node_type, "calculator");
        assert_eq!(graph.nodes[2].node_type, "bufferMemory");
    }

    #[test]
    fn schema_defaults_and_category_flags_are_injected() {
        let selected = [
            SelectedCapability::new("bufferMemory", NodeCategory::Memory),
            SelectedCapability::new("calculator", NodeCategory::Tools),
        ];
        let graph = transformer()
            .transform(&support_agent(), &selected, None)
            .expect("transform");

        let memory = &graph.nodes[1];
        assert_eq!(memory.config["memoryKey"], "chat_history");
        assert_eq!(memory.config["memoryEnabled"], true);
        assert_eq!(memory.display_name, "Buffer Memory");
        assert_eq!(graph.nodes[2].config["toolsEnabled"], true);

        let agent = &graph.nodes[3];
        assert_eq!(agent.config["agentId"], "agt_1");
        assert_eq!(agent.config["memoryEnabled"], true);
        assert_eq!(agent.config["toolsEnabled"], true);
    }

    #[test]
    fn llm_overrides_beat_schema_defaults() {
        let selected = [SelectedCapability::new("chatOpenAI", NodeCategory::Llm)];

        let plain = transformer()
            .transform(&support_agent(), &selected, None)
            .expect("transform");
        assert_eq!(plain.nodes[1].config["modelName"], DEFAULT_MODEL_NAME);
        assert_eq!(plain.nodes[1].config["temperature"], 0.9);

        let overrides = OverrideConfig {
            model_name: Some("gpt-4o".to_string()),
            temperature: Some(0.2),
            ..OverrideConfig::default()
        };
        let tuned = transformer()
            .transform(&support_agent(), &selected, Some(&overrides))
            .expect("transform");
        assert_eq!(tuned.nodes[1].config["modelName"], "gpt-4o");
        assert_eq!(tuned.nodes[1].config["temperature"], 0.2);
        assert_eq!(tuned.nodes[2].config["overrides"]["modelName"], "gpt-4o");
    }

    #[test]
    fn unknown_llm_gets_fixed_defaults() {
        let selected = [SelectedCapability::new("mysteryModel", NodeCategory::Llm)];
        let graph = transformer()
            .transform(&support_agent(), &selected, None)
            .expect("transform");
        assert_eq!(graph.nodes[1].config["temperature"], DEFAULT_TEMPERATURE);
        assert_eq!(graph.nodes[1].display_name, "mysteryModel");
    }

    #[test]
    fn no_capabilities_is_simple() {
        let graph = transformer()
            .transform(&support_agent(), &[], None)
            .expect("transform");
        assert_eq!(ids(&graph), vec!["start", "agent", "end"]);
        assert_eq!(graph.metadata.complexity, Complexity::Simple);
        assert_eq!(graph.nodes[2].position, Position::new(500.0, 100.0));
    }

    #[test]
    fn agent_without_name_is_rejected() {
        let agent = AgentDefinition::new("agt_1", "   ");
        let err = transformer()
            .transform(&agent, &[], None)
            .expect_err("blank name");
        assert!(err.to_string().contains("name is required"));

        let agent = AgentDefinition::new("", "Support");
        let err = transformer()
            .transform(&agent, &[], None)
            .expect_err("blank id");
        assert!(err.to_string().contains("id is required"));
    }

    #[test]
    fn fixed_node_kinds_cannot_be_selected() {
        let selected = [SelectedCapability::new("start", NodeCategory::Start)];
        let err = transformer()
            .transform(&support_agent(), &selected, None)
            .expect_err("start is not a capability");
        assert!(err.to_string().contains("position 1"));
    }

    proptest! {
        #[test]
        fn transform_is_deterministic(picks in proptest::collection::vec(0usize..3, 0..6)) {
            let pool = [
                SelectedCapability::new("bufferMemory", NodeCategory::Memory),
                SelectedCapability::new("calculator", NodeCategory::Tools),
                SelectedCapability::new("chatOpenAI", NodeCategory::Llm),
            ];
            let selected: Vec<_> = picks.iter().map(|&i| pool[i].clone()).collect();
            let transformer = transformer();

            let first = transformer.transform(&support_agent(), &selected, None).expect("transform");
            let second = transformer.transform(&support_agent(), &selected, None).expect("transform");

            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.node_count(), selected.len() + 3);
            prop_assert_eq!(first.edge_count(), selected.len() + 2);
        }
    }
}

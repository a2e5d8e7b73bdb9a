//! Batch graph modification.
//!
//! A batch is applied best-effort: every op runs against a working copy,
//! a failing op is recorded with its index and skipped, and the rest of the
//! batch carries on. The returned change set holds exactly the ops that
//! succeeded, so replaying it on the original graph yields the same result.

use crate::edge::{EdgeId, GraphEdge};
use crate::error::OpError;
use crate::graph::Graph;
use crate::node::{GraphNode, NodeId, Position};
use agentflow_catalog::{CatalogProvider, NodeCategory};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::{debug, warn};

/// A single graph mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ModificationOp {
    AddNode {
        node: GraphNode,
    },
    /// Also removes every edge touching the node.
    RemoveNode {
        #[serde(rename = "nodeId")]
        node_id: NodeId,
    },
    /// Shallow merge; a `null` value removes the key.
    UpdateNodeConfig {
        #[serde(rename = "nodeId")]
        node_id: NodeId,
        config: Map<String, JsonValue>,
    },
    AddEdge {
        edge: GraphEdge,
    },
    RemoveEdge {
        #[serde(rename = "edgeId")]
        edge_id: EdgeId,
    },
}

impl ModificationOp {
    /// Short name of the op kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddNode { .. } => "add_node",
            Self::RemoveNode { .. } => "remove_node",
            Self::UpdateNodeConfig { .. } => "update_node_config",
            Self::AddEdge { .. } => "add_edge",
            Self::RemoveEdge { .. } => "remove_edge",
        }
    }

    /// Applies the op in place.
    ///
    /// The graph is left untouched when the op fails.
    ///
    /// # Errors
    ///
    /// Returns an `OpError` if the op references a missing node or edge, or
    /// would create a duplicate id or a dangling edge.
    pub fn apply(&self, graph: &mut Graph) -> Result<(), Report<OpError>> {
        match self {
            Self::AddNode { node } => {
                if graph.contains_node(&node.id) {
                    return Err(OpError::DuplicateNode {
                        node_id: node.id.clone(),
                    }
                    .into());
                }
                graph.nodes.push(node.clone());
            }
            Self::RemoveNode { node_id } => {
                if !graph.contains_node(node_id) {
                    return Err(OpError::NodeNotFound {
                        node_id: node_id.clone(),
                    }
                    .into());
                }
                graph.nodes.retain(|n| &n.id != node_id);
                graph.edges.retain(|e| !e.touches(node_id));
            }
            Self::UpdateNodeConfig { node_id, config } => {
                let Some(node) = graph.node_mut(node_id) else {
                    return Err(OpError::NodeNotFound {
                        node_id: node_id.clone(),
                    }
                    .into());
                };
                for (key, value) in config {
                    if value.is_null() {
                        node.config.remove(key);
                    } else {
                        node.config.insert(key.clone(), value.clone());
                    }
                }
            }
            Self::AddEdge { edge } => {
                if graph.contains_edge(&edge.id) {
                    return Err(OpError::DuplicateEdge {
                        edge_id: edge.id.clone(),
                    }
                    .into());
                }
                for endpoint in [&edge.source, &edge.target] {
                    if !graph.contains_node(endpoint) {
                        return Err(OpError::DanglingEdge {
                            edge_id: edge.id.clone(),
                            missing: endpoint.clone(),
                        }
                        .into());
                    }
                }
                graph.edges.push(edge.clone());
            }
            Self::RemoveEdge { edge_id } => {
                if !graph.contains_edge(edge_id) {
                    return Err(OpError::EdgeNotFound {
                        edge_id: edge_id.clone(),
                    }
                    .into());
                }
                graph.edges.retain(|e| &e.id != edge_id);
            }
        }
        Ok(())
    }
}

/// Why a batch is being applied, and what the graph is expected to hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModificationContext {
    #[serde(default)]
    pub reason: Option<String>,
    /// Categories the suggester checks for.
    #[serde(default = "default_expected_categories")]
    pub expected_categories: Vec<NodeCategory>,
}

fn default_expected_categories() -> Vec<NodeCategory> {
    vec![NodeCategory::Memory]
}

impl Default for ModificationContext {
    fn default() -> Self {
        Self {
            reason: None,
            expected_categories: default_expected_categories(),
        }
    }
}

impl ModificationContext {
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn expecting(mut self, categories: impl IntoIterator<Item = NodeCategory>) -> Self {
        self.expected_categories = categories.into_iter().collect();
        self
    }
}

/// A failed op within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpFailure {
    /// Position of the op in the batch.
    pub index: usize,
    pub op: &'static str,
    pub error: String,
}

/// Outcome of applying a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ModificationResult {
    pub graph: Graph,
    /// The ops that succeeded, in batch order.
    pub change_set: Vec<ModificationOp>,
    pub errors: Vec<OpFailure>,
    /// True iff no op failed.
    pub success: bool,
}

/// An advisory op proposed for a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationSuggestion {
    pub reason: String,
    pub op: ModificationOp,
}

/// Applies modification batches and proposes improvements.
#[derive(Debug, Clone)]
pub struct Modifier {
    catalog: Arc<CatalogProvider>,
}

impl Modifier {
    #[must_use]
    pub fn new(catalog: Arc<CatalogProvider>) -> Self {
        Self { catalog }
    }

    /// Applies a batch of ops to a copy of `graph`.
    #[must_use]
    pub fn apply(
        &self,
        graph: &Graph,
        ops: &[ModificationOp],
        context: &ModificationContext,
    ) -> ModificationResult {
        let mut working = graph.clone();
        let mut change_set = Vec::with_capacity(ops.len());
        let mut errors = Vec::new();

        for (index, op) in ops.iter().enumerate() {
            match op.apply(&mut working) {
                Ok(()) => change_set.push(op.clone()),
                Err(e) => {
                    warn!(index, op = op.kind(), error = %e, "modification skipped");
                    errors.push(OpFailure {
                        index,
                        op: op.kind(),
                        error: e.to_string(),
                    });
                }
            }
        }
        working.refresh_metadata();

        debug!(
            reason = context.reason.as_deref().unwrap_or(""),
            applied = change_set.len(),
            failed = errors.len(),
            "modification batch applied"
        );

        ModificationResult {
            graph: working,
            change_set,
            success: errors.is_empty(),
            errors,
        }
    }

    /// Proposes nodes for expected categories the graph lacks.
    ///
    /// Never modifies the graph.
    #[must_use]
    pub fn suggest_modifications(
        &self,
        graph: &Graph,
        context: &ModificationContext,
    ) -> Vec<ModificationSuggestion> {
        let mut taken: Vec<NodeId> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        let mut suggestions = Vec::new();

        for &category in &context.expected_categories {
            if graph.has_category(category) {
                continue;
            }
            let node = self.suggested_node(category, graph.node_count() + suggestions.len(), &taken);
            taken.push(node.id.clone());
            suggestions.push(ModificationSuggestion {
                reason: format!("The graph has no {category} node."),
                op: ModificationOp::AddNode { node },
            });
        }
        suggestions
    }

    fn suggested_node(&self, category: NodeCategory, slot: usize, taken: &[NodeId]) -> GraphNode {
        let (node_type, display_name, config) =
            match self.catalog.descriptors_in(category).next() {
                Some(descriptor) => {
                    let mut config = Map::new();
                    if let Some(schema) = self.catalog.schema(&descriptor.name) {
                        for input in &schema.inputs {
                            if let Some(default) = &input.default_value {
                                config.insert(input.name.clone(), default.clone());
                            }
                        }
                    }
                    (descriptor.name.clone(), descriptor.label.clone(), config)
                }
                None => (category.as_str().to_string(), category.as_str().to_string(), Map::new()),
            };

        let base = format!("{node_type}_suggested");
        let mut id = NodeId::new(base.clone());
        let mut n = 2;
        while taken.contains(&id) {
            id = NodeId::new(format!("{base}_{n}"));
            n += 1;
        }

        GraphNode::new(id, node_type, display_name, category)
            .with_config(config)
            .with_position(Position::new(250.0 * slot as f64, 300.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Complexity;
    use crate::transformer::{AgentDefinition, SelectedCapability, Transformer};
    use agentflow_catalog::{Catalog, RawNodeDescriptor};
    use serde_json::json;

    fn catalog() -> Arc<CatalogProvider> {
        Arc::new(CatalogProvider::from_catalog(Catalog {
            version: "test".to_string(),
            nodes: vec![
                RawNodeDescriptor::new("bufferMemory", "Buffer Memory", "Memory").with_inputs(
                    "[{ label: 'Memory Key', name: 'memoryKey', type: 'string', default: 'chat_history' }]",
                ),
                RawNodeDescriptor::new("calculator", "Calculator", "Tools"),
            ],
        }))
    }

    fn base_graph() -> Graph {
        Transformer::new(catalog())
            .transform(
                &AgentDefinition::new("agt_1", "Support"),
                &[SelectedCapability::new("calculator", NodeCategory::Tools)],
                None,
            )
            .expect("transform")
    }

    fn calculator(id: &str) -> GraphNode {
        GraphNode::new(id, "calculator", "Calculator", NodeCategory::Tools)
    }

    #[test]
    fn failing_ops_are_skipped_not_fatal() {
        let graph = base_graph();
        let ops = vec![
            ModificationOp::AddNode {
                node: calculator("calc_b"),
            },
            ModificationOp::RemoveNode {
                node_id: NodeId::from("ghost"),
            },
            ModificationOp::AddEdge {
                edge: GraphEdge::sequential(&NodeId::from("calculator_1"), &NodeId::from("calc_b")),
            },
        ];

        let result = Modifier::new(catalog()).apply(&graph, &ops, &ModificationContext::default());
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].index, 1);
        assert_eq!(result.errors[0].op, "remove_node");
        assert_eq!(result.change_set, vec![ops[0].clone(), ops[2].clone()]);
        assert_eq!(result.graph.node_count(), graph.node_count() + 1);
        assert_eq!(result.graph.metadata.complexity, Complexity::Medium);
    }

    #[test]
    fn replaying_the_change_set_reproduces_the_graph() {
        let graph = base_graph();
        let ops = vec![
            ModificationOp::UpdateNodeConfig {
                node_id: NodeId::from("calculator_1"),
                config: json!({ "precision": 4 }).as_object().cloned().expect("object"),
            },
            ModificationOp::RemoveEdge {
                edge_id: EdgeId::from("missing"),
            },
            ModificationOp::AddNode {
                node: calculator("calc_b"),
            },
            ModificationOp::AddNode {
                node: calculator("calc_b"),
            },
            ModificationOp::RemoveNode {
                node_id: NodeId::from("calculator_1"),
            },
        ];
        let modifier = Modifier::new(catalog());
        let context = ModificationContext::default();

        let first = modifier.apply(&graph, &ops, &context);
        let replay = modifier.apply(&graph, &first.change_set, &context);

        assert!(replay.success);
        assert_eq!(replay.graph, first.graph);
        assert_eq!(first.errors.len(), 2);
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let graph = base_graph();
        let ops = [ModificationOp::RemoveNode {
            node_id: NodeId::from("calculator_1"),
        }];
        let result = Modifier::new(catalog()).apply(&graph, &ops, &ModificationContext::default());

        assert!(result.success);
        assert!(result.graph.edges.iter().all(|e| !e.touches(&NodeId::from("calculator_1"))));
        assert_eq!(result.graph.edge_count(), 1);
    }

    #[test]
    fn update_config_merges_and_null_removes() {
        let mut graph = base_graph();
        let op = ModificationOp::UpdateNodeConfig {
            node_id: NodeId::from("calculator_1"),
            config: json!({ "toolsEnabled": null, "precision": 2 })
                .as_object()
                .cloned()
                .expect("object"),
        };
        op.apply(&mut graph).expect("apply");

        let node = graph.node(&NodeId::from("calculator_1")).expect("node");
        assert!(!node.config.contains_key("toolsEnabled"));
        assert_eq!(node.config["precision"], 2);
    }

    #[test]
    fn edges_must_not_dangle_or_repeat() {
        let mut graph = base_graph();
        let dangling = ModificationOp::AddEdge {
            edge: GraphEdge::sequential(&NodeId::from("agent"), &NodeId::from("ghost")),
        };
        let err = dangling.apply(&mut graph).expect_err("dangling");
        assert!(err.to_string().contains("missing node ghost"));

        let repeat = ModificationOp::AddEdge {
            edge: GraphEdge::sequential(&NodeId::from("start"), &NodeId::from("calculator_1")),
        };
        assert!(repeat.apply(&mut graph).is_err());
        assert_eq!(graph, base_graph());
    }

    #[test]
    fn suggests_missing_memory_from_catalog() {
        let graph = base_graph();
        let suggestions =
            Modifier::new(catalog()).suggest_modifications(&graph, &ModificationContext::default());

        assert_eq!(suggestions.len(), 1);
        let ModificationOp::AddNode { node } = &suggestions[0].op else {
            panic!("expected add_node, got {:?}", suggestions[0].op);
        };
        assert_eq!(node.id.as_str(), "bufferMemory_suggested");
        assert_eq!(node.category, NodeCategory::Memory);
        assert_eq!(node.config["memoryKey"], "chat_history");
    }

    #[test]
    fn suggestions_skip_present_categories_and_fall_back_to_generic_nodes() {
        let graph = base_graph();
        let context = ModificationContext::default()
            .expecting([NodeCategory::Tools, NodeCategory::Llm]);
        let suggestions = Modifier::new(catalog()).suggest_modifications(&graph, &context);

        assert_eq!(suggestions.len(), 1);
        let ModificationOp::AddNode { node } = &suggestions[0].op else {
            panic!("expected add_node");
        };
        assert_eq!(node.node_type, "llm");
        assert_eq!(node.id.as_str(), "llm_suggested");
    }

    #[test]
    fn suggestions_avoid_taken_ids() {
        let mut graph = base_graph();
        graph.nodes.push(GraphNode::new(
            "bufferMemory_suggested",
            "calculator",
            "Shadow",
            NodeCategory::Tools,
        ));
        let suggestions =
            Modifier::new(catalog()).suggest_modifications(&graph, &ModificationContext::default());
        let ModificationOp::AddNode { node } = &suggestions[0].op else {
            panic!("expected add_node");
        };
        assert_eq!(node.id.as_str(), "bufferMemory_suggested_2");
    }

    #[test]
    fn ops_use_tagged_wire_format() {
        let op = ModificationOp::RemoveEdge {
            edge_id: EdgeId::from("a->b"),
        };
        let json = serde_json::to_value(&op).expect("serialize");
        assert_eq!(json, json!({ "op": "remove_edge", "edgeId": "a->b" }));
    }
}

//! Graph node types.
//!
//! Nodes are the building blocks of an agent's execution graph. Each node has:
//! - An id, unique within its graph
//! - The catalog node type it instantiates and its category
//! - A free-form configuration map
//! - A canvas position

use agentflow_catalog::NodeCategory;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Id of the fixed entry node.
pub const START_NODE_ID: &str = "start";
/// Id of the fixed exit node.
pub const END_NODE_ID: &str = "end";
/// Id of the agent node.
pub const AGENT_NODE_ID: &str = "agent";

/// Identifies a node within one graph.
///
/// Ids are plain strings so that graph construction stays deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Canvas position of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A node in an execution graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: NodeId,
    /// Catalog node type this node instantiates.
    pub node_type: String,
    pub display_name: String,
    pub category: NodeCategory,
    #[serde(default)]
    pub config: Map<String, JsonValue>,
    #[serde(default)]
    pub position: Position,
}

impl GraphNode {
    /// Creates a node with an empty configuration at the origin.
    #[must_use]
    pub fn new(
        id: impl Into<NodeId>,
        node_type: impl Into<String>,
        display_name: impl Into<String>,
        category: NodeCategory,
    ) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            display_name: display_name.into(),
            category,
            config: Map::new(),
            position: Position::default(),
        }
    }

    /// The fixed start node.
    #[must_use]
    pub fn start() -> Self {
        Self::new(START_NODE_ID, "start", "Start", NodeCategory::Start)
    }

    /// The fixed end node.
    #[must_use]
    pub fn end() -> Self {
        Self::new(END_NODE_ID, "end", "End", NodeCategory::End)
    }

    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: Map<String, JsonValue>) -> Self {
        self.config = config;
        self
    }

    /// Sets one configuration value.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Returns true if `key` holds a usable value.
    ///
    /// Null, blank strings and empty arrays count as unset.
    #[must_use]
    pub fn has_value(&self, key: &str) -> bool {
        match self.config.get(key) {
            None | Some(JsonValue::Null) => false,
            Some(JsonValue::String(s)) => !s.trim().is_empty(),
            Some(JsonValue::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }
}

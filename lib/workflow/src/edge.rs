//! Edge types for execution graphs.
//!
//! An edge connects a source node to a target node. Both endpoints must
//! name nodes of the same graph.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// Identifies an edge within one graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The conventional id for an edge between two nodes.
    #[must_use]
    pub fn between(source: &NodeId, target: &NodeId) -> Self {
        Self(format!("{source}->{target}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// How control passes along an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Unconditional hand-off to the next node.
    #[default]
    Sequential,
    /// Taken only when a branch condition holds.
    Conditional,
    /// Back-edge into an iteration node.
    Loop,
}

/// An edge in an execution graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: EdgeId,
    #[serde(rename = "sourceNodeId")]
    pub source: NodeId,
    #[serde(rename = "targetNodeId")]
    pub target: NodeId,
    #[serde(default)]
    pub kind: EdgeKind,
}

impl GraphEdge {
    /// Creates an edge with an explicit id.
    #[must_use]
    pub fn new(id: impl Into<String>, source: NodeId, target: NodeId, kind: EdgeKind) -> Self {
        Self {
            id: EdgeId::new(id),
            source,
            target,
            kind,
        }
    }

    /// Creates a sequential edge with the conventional id.
    #[must_use]
    pub fn sequential(source: &NodeId, target: &NodeId) -> Self {
        Self {
            id: EdgeId::between(source, target),
            source: source.clone(),
            target: target.clone(),
            kind: EdgeKind::Sequential,
        }
    }

    /// Returns true if either endpoint is `node_id`.
    #[must_use]
    pub fn touches(&self, node_id: &NodeId) -> bool {
        &self.source == node_id || &self.target == node_id
    }
}

//! Error types for the workflow crate.
//!
//! - `TransformError`: the agent definition or a selected capability cannot
//!   be turned into a graph
//! - `GraphInputError`: input handed to the validator is not a graph at all
//! - `OpError`: a single modification op could not be applied
//!
//! Validation findings are not errors; they are returned as report data.

use crate::edge::EdgeId;
use crate::node::NodeId;
use std::fmt;

/// Errors from building a graph out of an agent definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// A required field of the agent definition is missing or blank.
    Validation { field: &'static str, reason: String },
    /// A selected capability cannot be placed in the graph.
    InvalidCapability { position: usize, reason: String },
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { field, reason } => {
                write!(f, "invalid agent definition: {field} {reason}")
            }
            Self::InvalidCapability { position, reason } => {
                write!(f, "invalid capability at position {position}: {reason}")
            }
        }
    }
}

impl std::error::Error for TransformError {}

/// Errors for input that is not structurally a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphInputError {
    /// The input is not an object.
    NotAGraph,
    /// `nodes` is missing or not a list.
    NodesNotAList,
    /// `edges` is present but not a list.
    EdgesNotAList,
    /// A node or edge could not be read.
    InvalidMember { details: String },
}

impl fmt::Display for GraphInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAGraph => write!(f, "input is not a graph object"),
            Self::NodesNotAList => write!(f, "graph nodes must be a list"),
            Self::EdgesNotAList => write!(f, "graph edges must be a list"),
            Self::InvalidMember { details } => write!(f, "invalid graph member: {details}"),
        }
    }
}

impl std::error::Error for GraphInputError {}

/// Errors from applying a single modification op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpError {
    /// The op references a node that does not exist.
    NodeNotFound { node_id: NodeId },
    /// The op references an edge that does not exist.
    EdgeNotFound { edge_id: EdgeId },
    /// A node with this id already exists.
    DuplicateNode { node_id: NodeId },
    /// An edge with this id already exists.
    DuplicateEdge { edge_id: EdgeId },
    /// The edge would reference a missing node.
    DanglingEdge { edge_id: EdgeId, missing: NodeId },
}

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { node_id } => write!(f, "node not found: {node_id}"),
            Self::EdgeNotFound { edge_id } => write!(f, "edge not found: {edge_id}"),
            Self::DuplicateNode { node_id } => write!(f, "node already exists: {node_id}"),
            Self::DuplicateEdge { edge_id } => write!(f, "edge already exists: {edge_id}"),
            Self::DanglingEdge { edge_id, missing } => {
                write!(f, "edge {edge_id} references missing node {missing}")
            }
        }
    }
}

impl std::error::Error for OpError {}

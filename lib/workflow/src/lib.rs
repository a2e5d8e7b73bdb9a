//! Workflow graph engine for agentflow.
//!
//! This crate provides:
//!
//! - **Graph Model**: nodes, edges and derived metadata of an agent's
//!   execution graph
//! - **Transformer**: builds a deterministic graph from an agent definition
//!   and its selected capabilities
//! - **Validator**: structural and semantic checks, scoring and optional
//!   latency/cost estimates
//! - **Modifier**: best-effort batch mutations and advisory suggestions
//!
//! All of it is pure and synchronous.

pub mod edge;
pub mod error;
pub mod graph;
pub mod modifier;
pub mod node;
pub mod transformer;
pub mod validator;

pub use edge::{EdgeId, EdgeKind, GraphEdge};
pub use error::{GraphInputError, OpError, TransformError};
pub use graph::{Complexity, EstimatedTime, Graph, GraphMetadata};
pub use modifier::{
    ModificationContext, ModificationOp, ModificationResult, ModificationSuggestion, Modifier,
    OpFailure,
};
pub use node::{AGENT_NODE_ID, END_NODE_ID, GraphNode, NodeId, Position, START_NODE_ID};
pub use transformer::{
    AgentDefinition, DEFAULT_MODEL_NAME, DEFAULT_TEMPERATURE, OverrideConfig, SelectedCapability,
    Transformer,
};
pub use validator::{
    CostMetrics, DEFAULT_DEFERRED_NODE_TYPES, GraphMetrics, Issue, IssueEdge, PerformanceMetrics,
    Severity, ValidationOptions, ValidationReport, Validator,
};

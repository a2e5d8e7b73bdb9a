//! Execution graph model.
//!
//! A [`Graph`] keeps nodes and edges in insertion order so that every
//! traversal, and therefore every validation report, is deterministic.
//! Graph algorithms run on a petgraph view built on demand.

use crate::edge::{EdgeId, GraphEdge};
use crate::node::{GraphNode, NodeId};
use agentflow_catalog::NodeCategory;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Size class of a graph, by number of capability nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// Zero or one capability.
    #[default]
    Simple,
    /// Two or three capabilities.
    Medium,
    /// More than three capabilities.
    Complex,
}

impl Complexity {
    /// Classifies a graph by its capability count.
    #[must_use]
    pub fn from_capability_count(count: usize) -> Self {
        match count {
            0..=1 => Self::Simple,
            2..=3 => Self::Medium,
            _ => Self::Complex,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Medium => "medium",
            Self::Complex => "complex",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rough execution time bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimatedTime {
    #[default]
    #[serde(rename = "< 2s")]
    Fast,
    #[serde(rename = "2-5s")]
    Moderate,
    #[serde(rename = "> 5s")]
    Slow,
}

impl From<Complexity> for EstimatedTime {
    fn from(complexity: Complexity) -> Self {
        match complexity {
            Complexity::Simple => Self::Fast,
            Complexity::Medium => Self::Moderate,
            Complexity::Complex => Self::Slow,
        }
    }
}

/// Derived graph metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetadata {
    pub complexity: Complexity,
    pub estimated_time_bucket: EstimatedTime,
}

/// An agent's execution graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default)]
    pub metadata: GraphMetadata,
}

impl Graph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a node by id.
    #[must_use]
    pub fn node(&self, node_id: &NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| &n.id == node_id)
    }

    /// Gets a mutable reference to a node by id.
    pub fn node_mut(&mut self, node_id: &NodeId) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| &n.id == node_id)
    }

    #[must_use]
    pub fn contains_node(&self, node_id: &NodeId) -> bool {
        self.node(node_id).is_some()
    }

    /// Gets an edge by id.
    #[must_use]
    pub fn edge(&self, edge_id: &EdgeId) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| &e.id == edge_id)
    }

    #[must_use]
    pub fn contains_edge(&self, edge_id: &EdgeId) -> bool {
        self.edge(edge_id).is_some()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes of a category, in graph order.
    pub fn nodes_in(&self, category: NodeCategory) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(move |n| n.category == category)
    }

    #[must_use]
    pub fn has_category(&self, category: NodeCategory) -> bool {
        self.nodes_in(category).next().is_some()
    }

    /// Number of capability nodes.
    #[must_use]
    pub fn capability_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.category.is_capability())
            .count()
    }

    /// Recomputes complexity and time bucket from the current nodes.
    pub fn refresh_metadata(&mut self) {
        let complexity = Complexity::from_capability_count(self.capability_count());
        self.metadata = GraphMetadata {
            complexity,
            estimated_time_bucket: complexity.into(),
        };
    }

    pub(crate) fn topology(&self) -> Topology<'_> {
        Topology::new(self)
    }
}

/// Petgraph view over a [`Graph`].
///
/// Duplicate node ids resolve to the first occurrence. Edges with a missing
/// endpoint are left out.
pub(crate) struct Topology<'a> {
    graph: DiGraph<&'a NodeId, ()>,
    index: HashMap<&'a NodeId, NodeIndex>,
}

impl<'a> Topology<'a> {
    fn new(source: &'a Graph) -> Self {
        let mut graph = DiGraph::with_capacity(source.nodes.len(), source.edges.len());
        let mut index = HashMap::with_capacity(source.nodes.len());

        for node in &source.nodes {
            index
                .entry(&node.id)
                .or_insert_with(|| graph.add_node(&node.id));
        }
        for edge in &source.edges {
            if let (Some(&from), Some(&to)) = (index.get(&edge.source), index.get(&edge.target)) {
                graph.add_edge(from, to, ());
            }
        }

        Self { graph, index }
    }

    /// Node ids reachable from `start`, including `start` itself.
    pub(crate) fn reachable_from(&self, start: &NodeId) -> HashSet<&'a NodeId> {
        let mut seen = HashSet::new();
        let Some(&start) = self.index.get(start) else {
            return seen;
        };
        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(ix) = bfs.next(&self.graph) {
            seen.insert(self.graph[ix]);
        }
        seen
    }

    /// Strongly connected components that form a cycle, in graph order.
    pub(crate) fn cycles(&self) -> Vec<Vec<&'a NodeId>> {
        let mut components: Vec<Vec<NodeIndex>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|c| c.len() > 1 || self.graph.find_edge(c[0], c[0]).is_some())
            .collect();
        for component in &mut components {
            component.sort();
        }
        components.sort_by_key(|c| c[0]);

        components
            .into_iter()
            .map(|c| c.into_iter().map(|ix| self.graph[ix]).collect())
            .collect()
    }

    /// Heaviest path weight through the graph, or `None` if it is cyclic.
    pub(crate) fn longest_path(&self, weight: impl Fn(&NodeId) -> u64) -> Option<u64> {
        let order = toposort(&self.graph, None).ok()?;
        let mut best: HashMap<NodeIndex, u64> = HashMap::with_capacity(order.len());
        let mut longest = 0;

        for ix in order {
            let here = best.get(&ix).copied().unwrap_or(0) + weight(self.graph[ix]);
            longest = longest.max(here);
            for next in self.graph.neighbors(ix) {
                let entry = best.entry(next).or_insert(0);
                *entry = (*entry).max(here);
            }
        }
        Some(longest)
    }
}

//! Graph validation and scoring.
//!
//! Validation never fails on a malformed graph. Every finding is returned in
//! a [`ValidationReport`]; only input that is not a graph at all produces an
//! error (see [`Validator::validate_value`]).
//!
//! Checks run in a fixed order so that identical graphs always produce
//! identically ordered reports:
//!
//! 1. Structure: duplicate node ids, start/end nodes, dangling and duplicate
//!    edges, reachability from start, cycles
//! 2. Semantics, per node in graph order: catalog lookup, required inputs,
//!    LLM temperature
//! 3. Graph-level suggestions
//!
//! The score is 60 structural points, minus 15 per structural error and 5
//! per structural warning, plus 40 points scaled by how many required inputs
//! are configured. Deferred inputs count half.

use crate::edge::{EdgeId, GraphEdge};
use crate::error::GraphInputError;
use crate::graph::Graph;
use crate::node::{GraphNode, NodeId};
use agentflow_catalog::{CatalogProvider, InputSpec, NodeCategory};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Node types whose required inputs are usually filled in after creation.
pub const DEFAULT_DEFERRED_NODE_TYPES: &[&str] =
    &["customTool", "serpAPI", "braveSearchAPI", "webBrowser"];

const CONFIGURE_LATER: &str = "This input can be configured later.";

const STRUCTURE_POINTS: i64 = 60;
const COMPLETENESS_POINTS: f64 = 40.0;
const STRUCTURAL_ERROR_PENALTY: i64 = 15;
const STRUCTURAL_WARNING_PENALTY: i64 = 5;

/// Options controlling a validation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationOptions {
    /// Treat unreachable nodes as errors.
    pub strict_mode: bool,
    pub include_performance_analysis: bool,
    pub include_cost_analysis: bool,
}

impl ValidationOptions {
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict_mode = true;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self) -> Self {
        self.include_performance_analysis = true;
        self.include_cost_analysis = true;
        self
    }
}

/// How serious an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Suggestion,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<IssueEdge>,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

/// The edge an issue is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

impl Issue {
    fn new(severity: Severity, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity,
            node_id: None,
            edge: None,
            title: title.into(),
            description: description.into(),
            remediation: None,
        }
    }

    fn on(mut self, node_id: &NodeId) -> Self {
        self.node_id = Some(node_id.clone());
        self
    }

    fn along(mut self, edge: &GraphEdge) -> Self {
        self.edge = Some(IssueEdge {
            id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
        });
        self
    }

    fn fix(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }
}

/// Estimated latency of one run of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Sum of per-node latency estimates.
    pub estimated_latency_ms: u64,
    /// Heaviest path from any entry to any exit. `None` for cyclic graphs.
    pub critical_path_ms: Option<u64>,
    pub node_count: usize,
}

/// Estimated cost of one run of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostMetrics {
    pub llm_calls: usize,
    pub tool_calls: usize,
    pub estimated_cost_usd: f64,
}

/// Optional analysis attached to a report. Never affects the score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostMetrics>,
}

/// The result of validating a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// True when there are no errors.
    pub valid: bool,
    /// 0..=100.
    pub score: u8,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    pub suggestions: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<GraphMetrics>,
}

impl ValidationReport {
    /// All issues: errors, then warnings, then suggestions.
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.errors
            .iter()
            .chain(&self.warnings)
            .chain(&self.suggestions)
    }

    /// Issues attached to a node.
    pub fn issues_for<'a>(&'a self, node_id: &'a NodeId) -> impl Iterator<Item = &'a Issue> {
        self.issues()
            .filter(move |i| i.node_id.as_ref() == Some(node_id))
    }
}

#[derive(Default)]
struct Findings {
    errors: Vec<Issue>,
    warnings: Vec<Issue>,
    suggestions: Vec<Issue>,
}

impl Findings {
    fn push(&mut self, issue: Issue) {
        match issue.severity {
            Severity::Error => self.errors.push(issue),
            Severity::Warning => self.warnings.push(issue),
            Severity::Suggestion => self.suggestions.push(issue),
        }
    }
}

/// Required-input tally, counted in half points.
#[derive(Default)]
struct Completeness {
    required: u32,
    half_points: u32,
}

impl Completeness {
    fn points(&self) -> f64 {
        if self.required == 0 {
            return COMPLETENESS_POINTS;
        }
        COMPLETENESS_POINTS * f64::from(self.half_points) / f64::from(self.required * 2)
    }
}

/// Validates and scores graphs against the catalog.
#[derive(Debug, Clone)]
pub struct Validator {
    catalog: Arc<CatalogProvider>,
    deferred_node_types: BTreeSet<String>,
}

impl Validator {
    /// Creates a validator with the default deferred node types.
    #[must_use]
    pub fn new(catalog: Arc<CatalogProvider>) -> Self {
        Self {
            catalog,
            deferred_node_types: DEFAULT_DEFERRED_NODE_TYPES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Replaces the deferred node type allowlist.
    #[must_use]
    pub fn with_deferred_node_types<I, S>(mut self, node_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deferred_node_types = node_types.into_iter().map(Into::into).collect();
        self
    }

    /// Validates a graph.
    #[must_use]
    pub fn validate(&self, graph: &Graph, options: &ValidationOptions) -> ValidationReport {
        let mut findings = Findings::default();

        self.check_structure(graph, options, &mut findings);
        let structural_errors = findings.errors.len();
        let structural_warnings = findings.warnings.len();

        let mut completeness = Completeness::default();
        for node in &graph.nodes {
            self.check_node(node, &mut findings, &mut completeness);
        }

        if !graph.has_category(NodeCategory::Memory) {
            findings.push(
                Issue::new(
                    Severity::Suggestion,
                    "No memory",
                    "The agent will not remember earlier turns of a conversation.",
                )
                .fix("Add a memory node."),
            );
        }

        let structure = (STRUCTURE_POINTS
            - STRUCTURAL_ERROR_PENALTY * structural_errors as i64
            - STRUCTURAL_WARNING_PENALTY * structural_warnings as i64)
            .max(0);
        let score = (structure as f64 + completeness.points())
            .round()
            .clamp(0.0, 100.0) as u8;

        let metrics = (options.include_performance_analysis || options.include_cost_analysis)
            .then(|| GraphMetrics {
                performance: options
                    .include_performance_analysis
                    .then(|| performance_metrics(graph)),
                cost: options.include_cost_analysis.then(|| cost_metrics(graph)),
            });

        debug!(
            nodes = graph.node_count(),
            errors = findings.errors.len(),
            warnings = findings.warnings.len(),
            score,
            "graph validated"
        );

        ValidationReport {
            valid: findings.errors.is_empty(),
            score,
            errors: findings.errors,
            warnings: findings.warnings,
            suggestions: findings.suggestions,
            metrics,
        }
    }

    /// Validates untyped input.
    ///
    /// A graph with missing fields or broken references still yields a
    /// report. Only input that cannot be read as nodes and edges is an error.
    ///
    /// # Errors
    ///
    /// Returns `GraphInputError` if the input is not an object, `nodes` is
    /// not a list, `edges` is present but not a list, or a member cannot be
    /// read as a node or edge.
    pub fn validate_value(
        &self,
        input: &JsonValue,
        options: &ValidationOptions,
    ) -> Result<ValidationReport, Report<GraphInputError>> {
        let graph = graph_from_value(input)?;
        Ok(self.validate(&graph, options))
    }

    fn check_structure(&self, graph: &Graph, options: &ValidationOptions, out: &mut Findings) {
        let mut seen = HashSet::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            if !seen.insert(&node.id) {
                out.push(
                    Issue::new(
                        Severity::Error,
                        "Duplicate node id",
                        format!("More than one node uses the id '{}'.", node.id),
                    )
                    .on(&node.id)
                    .fix("Give every node a unique id."),
                );
            }
        }

        check_terminal(graph, NodeCategory::Start, out);
        check_terminal(graph, NodeCategory::End, out);

        for edge in &graph.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !seen.contains(endpoint) {
                    out.push(
                        Issue::new(
                            Severity::Error,
                            "Dangling edge",
                            format!("Edge '{}' references missing node '{endpoint}'.", edge.id),
                        )
                        .along(edge)
                        .fix("Remove the edge or add the missing node."),
                    );
                }
            }
        }

        let mut edge_ids = HashSet::with_capacity(graph.edges.len());
        for edge in &graph.edges {
            if !edge_ids.insert(&edge.id) {
                out.push(
                    Issue::new(
                        Severity::Error,
                        "Duplicate edge id",
                        format!("More than one edge uses the id '{}'.", edge.id),
                    )
                    .along(edge),
                );
            }
        }

        let topology = graph.topology();

        if let Some(start) = graph.nodes_in(NodeCategory::Start).next() {
            let reached = topology.reachable_from(&start.id);
            let severity = if options.strict_mode {
                Severity::Error
            } else {
                Severity::Warning
            };
            let mut reported = HashSet::new();
            for node in &graph.nodes {
                if !reached.contains(&node.id) && reported.insert(&node.id) {
                    out.push(
                        Issue::new(
                            severity,
                            "Unreachable node",
                            format!("Node '{}' cannot be reached from the start node.", node.id),
                        )
                        .on(&node.id)
                        .fix("Connect the node to the flow or remove it."),
                    );
                }
            }
        }

        for cycle in topology.cycles() {
            let permitted = cycle
                .iter()
                .filter_map(|id| graph.node(id))
                .any(|n| n.category.permits_loops());
            if permitted {
                continue;
            }
            let members: Vec<&str> = cycle.iter().map(|id| id.as_str()).collect();
            out.push(
                Issue::new(
                    Severity::Error,
                    "Cycle detected",
                    format!("Nodes {} form a cycle.", members.join(" -> ")),
                )
                .on(cycle[0])
                .fix("Break the cycle or route it through a loop node."),
            );
        }
    }

    fn check_node(&self, node: &GraphNode, out: &mut Findings, tally: &mut Completeness) {
        if !node.category.is_capability() {
            return;
        }

        let Some(schema) = self.catalog.schema(&node.node_type) else {
            out.push(
                Issue::new(
                    Severity::Suggestion,
                    "Unknown node type",
                    format!("'{}' is not in the node catalog.", node.node_type),
                )
                .on(&node.id),
            );
            return;
        };

        if schema.is_unknown_shape() {
            out.push(
                Issue::new(
                    Severity::Suggestion,
                    "Inputs unknown",
                    format!(
                        "The inputs of '{}' could not be determined; its configuration is not checked.",
                        node.node_type
                    ),
                )
                .on(&node.id),
            );
        }

        for input in schema.required_inputs() {
            tally.required += 1;
            if node.has_value(&input.name) {
                tally.half_points += 2;
                continue;
            }
            if self.is_deferred(&node.node_type, input) {
                tally.half_points += 1;
                out.push(
                    missing_input(node, input, Severity::Warning).fix(CONFIGURE_LATER),
                );
            } else {
                out.push(
                    missing_input(node, input, Severity::Error)
                        .fix(format!("Set '{}' on this node.", input.name)),
                );
            }
        }

        if node.category == NodeCategory::Llm
            && let Some(temperature) = node.config.get("temperature").and_then(JsonValue::as_f64)
            && !(0.0..=2.0).contains(&temperature)
        {
            out.push(
                Issue::new(
                    Severity::Warning,
                    "Temperature out of range",
                    format!("Temperature {temperature} is outside 0 to 2."),
                )
                .on(&node.id)
                .fix("Use a temperature between 0 and 2."),
            );
        }
    }

    fn is_deferred(&self, node_type: &str, input: &InputSpec) -> bool {
        self.deferred_node_types.contains(node_type)
            || self.catalog.requires_credential(node_type)
            || input.kind.is_secret()
    }
}

fn check_terminal(graph: &Graph, category: NodeCategory, out: &mut Findings) {
    let count = graph.nodes_in(category).count();
    let name = category.as_str();
    if count == 0 {
        out.push(
            Issue::new(
                Severity::Error,
                format!("Missing {name} node"),
                format!("The graph has no {name} node."),
            )
            .fix(format!("Add exactly one {name} node.")),
        );
    } else if count > 1 {
        let mut issue = Issue::new(
            Severity::Error,
            format!("Multiple {name} nodes"),
            format!("The graph has {count} {name} nodes."),
        )
        .fix(format!("Keep exactly one {name} node."));
        if let Some(extra) = graph.nodes_in(category).nth(1) {
            issue = issue.on(&extra.id);
        }
        out.push(issue);
    }
}

fn missing_input(node: &GraphNode, input: &InputSpec, severity: Severity) -> Issue {
    Issue::new(
        severity,
        "Missing required input",
        format!("'{}' ({}) is not configured.", input.label, input.name),
    )
    .on(&node.id)
}

fn node_latency_ms(category: NodeCategory) -> u64 {
    match category {
        NodeCategory::Start | NodeCategory::End => 0,
        NodeCategory::Agent => 1500,
        NodeCategory::Llm => 1200,
        NodeCategory::Loop => 800,
        NodeCategory::Tools => 400,
        NodeCategory::Other => 150,
        NodeCategory::Memory => 60,
    }
}

fn node_cost_usd(category: NodeCategory) -> f64 {
    match category {
        NodeCategory::Agent => 0.003,
        NodeCategory::Llm => 0.002,
        NodeCategory::Tools => 0.0005,
        _ => 0.0,
    }
}

fn performance_metrics(graph: &Graph) -> PerformanceMetrics {
    let estimated_latency_ms = graph
        .nodes
        .iter()
        .map(|n| node_latency_ms(n.category))
        .sum();
    let critical_path_ms = graph.topology().longest_path(|id| {
        graph
            .node(id)
            .map_or(0, |n| node_latency_ms(n.category))
    });
    PerformanceMetrics {
        estimated_latency_ms,
        critical_path_ms,
        node_count: graph.node_count(),
    }
}

fn cost_metrics(graph: &Graph) -> CostMetrics {
    CostMetrics {
        llm_calls: graph
            .nodes
            .iter()
            .filter(|n| matches!(n.category, NodeCategory::Llm | NodeCategory::Agent))
            .count(),
        tool_calls: graph.nodes_in(NodeCategory::Tools).count(),
        estimated_cost_usd: graph.nodes.iter().map(|n| node_cost_usd(n.category)).sum(),
    }
}

fn graph_from_value(input: &JsonValue) -> Result<Graph, Report<GraphInputError>> {
    let Some(object) = input.as_object() else {
        return Err(GraphInputError::NotAGraph.into());
    };
    let Some(raw_nodes) = object.get("nodes").and_then(JsonValue::as_array) else {
        return Err(GraphInputError::NodesNotAList.into());
    };
    let raw_edges: &[JsonValue] = match object.get("edges") {
        None | Some(JsonValue::Null) => &[],
        Some(JsonValue::Array(edges)) => edges,
        Some(_) => return Err(GraphInputError::EdgesNotAList.into()),
    };

    let mut graph = Graph::new();
    for (i, raw) in raw_nodes.iter().enumerate() {
        let node = serde_json::from_value(raw.clone()).map_err(|e| {
            GraphInputError::InvalidMember {
                details: format!("nodes[{i}]: {e}"),
            }
        })?;
        graph.nodes.push(node);
    }
    for (i, raw) in raw_edges.iter().enumerate() {
        let edge = serde_json::from_value(raw.clone()).map_err(|e| {
            GraphInputError::InvalidMember {
                details: format!("edges[{i}]: {e}"),
            }
        })?;
        graph.edges.push(edge);
    }
    graph.refresh_metadata();
    Ok(graph)
}

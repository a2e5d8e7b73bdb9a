//! Raw catalog descriptors and node categories.
//!
//! A descriptor is what the catalog feed ships for each node type. Its
//! `inputs` field is kept verbatim; turning it into a typed schema is the
//! parser's job.

use serde::{Deserialize, Serialize};

/// The category a node belongs to.
///
/// Categories drive the transformer's defaults, the validator's metrics and
/// the modifier's suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Fixed entry node of every graph.
    Start,
    /// Fixed exit node of every graph.
    End,
    /// The agent node carrying identity and knowledge.
    Agent,
    /// Language model capability.
    Llm,
    /// Conversation memory capability.
    Memory,
    /// Tool access capability.
    Tools,
    /// Iteration node; cycles through it are allowed.
    Loop,
    /// Anything the catalog labels differently.
    Other,
}

impl NodeCategory {
    /// Maps a free-form catalog category label onto a category.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase();
        match label.as_str() {
            "start" => Self::Start,
            "end" => Self::End,
            "agent" | "agents" => Self::Agent,
            "llm" | "llms" => Self::Llm,
            _ if label.contains("chat model") || label.contains("language model") => Self::Llm,
            _ if label.contains("memory") => Self::Memory,
            _ if label.contains("tool") => Self::Tools,
            _ if label.contains("loop") || label.contains("iteration") => Self::Loop,
            _ => Self::Other,
        }
    }

    /// Returns the snake_case name of this category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Agent => "agent",
            Self::Llm => "llm",
            Self::Memory => "memory",
            Self::Tools => "tools",
            Self::Loop => "loop",
            Self::Other => "other",
        }
    }

    /// Returns true for optional, selectable capability categories.
    #[must_use]
    pub fn is_capability(&self) -> bool {
        !matches!(self, Self::Start | Self::End | Self::Agent)
    }

    /// Returns true if cycles through a node of this category are legal.
    #[must_use]
    pub fn permits_loops(&self) -> bool {
        matches!(self, Self::Loop)
    }
}

impl std::fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node descriptor as shipped by the catalog feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNodeDescriptor {
    /// Node type, unique within the catalog (e.g. `bufferMemory`).
    pub name: String,
    /// Human-readable label.
    pub label: String,
    /// Free-form category label (e.g. `Chat Models`).
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<f64>,
    /// Whether the node needs an externally issued credential.
    #[serde(default)]
    pub credential_required: bool,
    /// The semi-structured inputs declaration, kept verbatim.
    #[serde(default)]
    pub inputs: String,
}

impl RawNodeDescriptor {
    /// Creates a descriptor with no inputs declaration.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            category: category.into(),
            description: None,
            version: None,
            credential_required: false,
            inputs: String::new(),
        }
    }

    /// Sets the raw inputs declaration.
    #[must_use]
    pub fn with_inputs(mut self, inputs: impl Into<String>) -> Self {
        self.inputs = inputs.into();
        self
    }

    /// Marks the node as needing an external credential.
    #[must_use]
    pub fn with_credential(mut self) -> Self {
        self.credential_required = true;
        self
    }

    /// Returns the parsed category of this descriptor.
    #[must_use]
    pub fn node_category(&self) -> NodeCategory {
        NodeCategory::from_label(&self.category)
    }
}

/// A versioned catalog document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Version label of this catalog build.
    pub version: String,
    /// All node descriptors, in feed order.
    pub nodes: Vec<RawNodeDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_from_catalog_labels() {
        assert_eq!(NodeCategory::from_label("Chat Models"), NodeCategory::Llm);
        assert_eq!(NodeCategory::from_label("LLMs"), NodeCategory::Llm);
        assert_eq!(NodeCategory::from_label("Memory"), NodeCategory::Memory);
        assert_eq!(NodeCategory::from_label("Tools"), NodeCategory::Tools);
        assert_eq!(NodeCategory::from_label("Document Loaders"), NodeCategory::Other);
    }

    #[test]
    fn only_loop_permits_cycles() {
        assert!(NodeCategory::Loop.permits_loops());
        assert!(!NodeCategory::Agent.permits_loops());
    }

    #[test]
    fn descriptor_defaults_missing_fields() {
        let json = r#"{"name":"bufferMemory","label":"Buffer Memory","category":"Memory"}"#;
        let descriptor: RawNodeDescriptor = serde_json::from_str(json).expect("deserialize");
        assert!(descriptor.inputs.is_empty());
        assert!(!descriptor.credential_required);
        assert_eq!(descriptor.node_category(), NodeCategory::Memory);
    }
}

//! Typed node schemas.
//!
//! A [`NodeSchema`] is immutable once parsed. An empty `inputs` list means
//! the shape is unknown, not that the node takes no inputs.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The kind of value an input accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InputKind {
    String,
    Number,
    Boolean,
    Options,
    MultiOptions,
    AsyncOptions,
    AsyncMultiOptions,
    Json,
    Code,
    Password,
    Credential,
    File,
    Date,
    /// A kind this build does not know about, kept by name.
    Other(String),
}

impl InputKind {
    /// Parses a catalog `type` value.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "string" => Self::String,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "options" => Self::Options,
            "multiOptions" => Self::MultiOptions,
            "asyncOptions" => Self::AsyncOptions,
            "asyncMultiOptions" => Self::AsyncMultiOptions,
            "json" => Self::Json,
            "code" => Self::Code,
            "password" => Self::Password,
            "credential" => Self::Credential,
            "file" => Self::File,
            "date" => Self::Date,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the catalog name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Options => "options",
            Self::MultiOptions => "multiOptions",
            Self::AsyncOptions => "asyncOptions",
            Self::AsyncMultiOptions => "asyncMultiOptions",
            Self::Json => "json",
            Self::Code => "code",
            Self::Password => "password",
            Self::Credential => "credential",
            Self::File => "file",
            Self::Date => "date",
            Self::Other(name) => name,
        }
    }

    /// Returns true for secrets issued outside the platform.
    #[must_use]
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Password | Self::Credential)
    }
}

impl From<String> for InputKind {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<InputKind> for String {
    fn from(kind: InputKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One configurable input of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSpec {
    /// Config key.
    pub name: String,
    /// Human-readable label.
    pub label: String,
    pub kind: InputKind,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<JsonValue>,
    /// Allowed option names for option-typed inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Name of the loader that fetches options at runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_method: Option<String>,
    /// Whether the value may reference a workflow variable.
    #[serde(default)]
    pub accepts_variable_ref: bool,
    /// Additional parameters are advanced settings, never required.
    #[serde(default)]
    pub is_additional_param: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
}

impl InputSpec {
    /// Creates a required input with no extras.
    #[must_use]
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: InputKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            optional: false,
            default_value: None,
            options: None,
            load_method: None,
            accepts_variable_ref: false,
            is_additional_param: false,
            step: None,
            rows: None,
        }
    }

    /// Marks the input optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: JsonValue) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Returns true if a value must be configured before the node is valid.
    #[must_use]
    pub fn is_required(&self) -> bool {
        !self.optional && !self.is_additional_param
    }
}

/// The typed description of a node type's inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSchema {
    pub node_type: String,
    pub inputs: Vec<InputSpec>,
}

impl NodeSchema {
    /// Creates a schema.
    #[must_use]
    pub fn new(node_type: impl Into<String>, inputs: Vec<InputSpec>) -> Self {
        Self {
            node_type: node_type.into(),
            inputs,
        }
    }

    /// Returns true if nothing is known about this node's inputs.
    #[must_use]
    pub fn is_unknown_shape(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Returns the input with the given name, if any.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Returns the inputs that must be configured.
    pub fn required_inputs(&self) -> impl Iterator<Item = &InputSpec> {
        self.inputs.iter().filter(|i| i.is_required())
    }
}

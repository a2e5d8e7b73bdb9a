//! Load-once catalog provider.
//!
//! Every descriptor is parsed exactly once when the provider is built. The
//! provider is immutable afterwards and is shared by `Arc` with the
//! components that need schemas.

use crate::descriptor::{Catalog, NodeCategory, RawNodeDescriptor};
use crate::error::CatalogError;
use crate::parser::parse_schema;
use crate::schema::NodeSchema;
use crate::source::CatalogSource;
use rootcause::Report;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone)]
struct CatalogEntry {
    descriptor: RawNodeDescriptor,
    schema: NodeSchema,
}

/// Immutable node catalog with memoized schemas.
#[derive(Debug, Clone)]
pub struct CatalogProvider {
    version: String,
    entries: HashMap<String, CatalogEntry>,
    /// Node types in feed order.
    order: Vec<String>,
}

impl CatalogProvider {
    /// Loads and parses the catalog from a source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be loaded.
    pub fn load(source: &dyn CatalogSource) -> Result<Self, Report<CatalogError>> {
        let catalog = source.load()?;
        Ok(Self::from_catalog(catalog))
    }

    /// Builds a provider from an already loaded catalog.
    #[must_use]
    pub fn from_catalog(catalog: Catalog) -> Self {
        let mut entries = HashMap::with_capacity(catalog.nodes.len());
        let mut order = Vec::with_capacity(catalog.nodes.len());

        for descriptor in catalog.nodes {
            if entries.contains_key(&descriptor.name) {
                warn!(node_type = %descriptor.name, "duplicate node type in catalog, keeping first");
                continue;
            }
            let schema = parse_schema(&descriptor);
            order.push(descriptor.name.clone());
            entries.insert(descriptor.name.clone(), CatalogEntry { descriptor, schema });
        }

        info!(
            version = %catalog.version,
            node_types = order.len(),
            "catalog loaded"
        );

        Self {
            version: catalog.version,
            entries,
            order,
        }
    }

    /// An empty catalog; every node type is unknown.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_catalog(Catalog {
            version: "empty".to_string(),
            nodes: Vec::new(),
        })
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the parsed schema for a node type.
    #[must_use]
    pub fn schema(&self, node_type: &str) -> Option<&NodeSchema> {
        self.entries.get(node_type).map(|e| &e.schema)
    }

    /// Returns the raw descriptor for a node type.
    #[must_use]
    pub fn descriptor(&self, node_type: &str) -> Option<&RawNodeDescriptor> {
        self.entries.get(node_type).map(|e| &e.descriptor)
    }

    /// Returns the category of a node type, if it is in the catalog.
    #[must_use]
    pub fn category_of(&self, node_type: &str) -> Option<NodeCategory> {
        self.descriptor(node_type).map(RawNodeDescriptor::node_category)
    }

    /// Returns true if the node type needs an externally issued credential.
    #[must_use]
    pub fn requires_credential(&self, node_type: &str) -> bool {
        self.descriptor(node_type)
            .is_some_and(|d| d.credential_required)
    }

    /// Descriptors of a category, in feed order.
    pub fn descriptors_in(
        &self,
        category: NodeCategory,
    ) -> impl Iterator<Item = &RawNodeDescriptor> {
        self.descriptors()
            .filter(move |d| d.node_category() == category)
    }

    /// All descriptors, in feed order.
    pub fn descriptors(&self) -> impl Iterator<Item = &RawNodeDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name))
            .map(|e| &e.descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticCatalogSource;

    fn catalog() -> Catalog {
        Catalog {
            version: "test".to_string(),
            nodes: vec![
                RawNodeDescriptor::new("chatOpenAI", "ChatOpenAI", "Chat Models")
                    .with_inputs("[{ label: 'Model', name: 'modelName', type: 'string' }]")
                    .with_credential(),
                RawNodeDescriptor::new("bufferMemory", "Buffer Memory", "Memory")
                    .with_inputs("[{ label: 'Key', name: 'memoryKey', type: 'string', default: 'chat_history' }]"),
                RawNodeDescriptor::new("zepMemory", "Zep Memory", "Memory")
                    .with_inputs("garbage"),
                RawNodeDescriptor::new("bufferMemory", "Duplicate", "Tools"),
            ],
        }
    }

    #[test]
    fn schemas_are_parsed_at_load() {
        let provider =
            CatalogProvider::load(&StaticCatalogSource::new(catalog())).expect("load");
        assert_eq!(provider.len(), 3);
        assert_eq!(provider.version(), "test");

        let memory = provider.schema("bufferMemory").expect("schema");
        assert_eq!(memory.inputs[0].name, "memoryKey");
        assert!(provider.schema("zepMemory").expect("schema").is_unknown_shape());
        assert!(provider.schema("missing").is_none());
    }

    #[test]
    fn duplicate_node_types_keep_first() {
        let provider = CatalogProvider::from_catalog(catalog());
        assert_eq!(
            provider.category_of("bufferMemory"),
            Some(NodeCategory::Memory)
        );
    }

    #[test]
    fn descriptors_in_category_follow_feed_order() {
        let provider = CatalogProvider::from_catalog(catalog());
        let names: Vec<_> = provider
            .descriptors_in(NodeCategory::Memory)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["bufferMemory", "zepMemory"]);
        assert!(provider.requires_credential("chatOpenAI"));
        assert!(!provider.requires_credential("bufferMemory"));
    }
}

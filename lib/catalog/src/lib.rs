//! Capability node catalog for agentflow.
//!
//! This crate provides:
//!
//! - **Descriptors**: raw node descriptors as they arrive from the catalog feed
//! - **Schemas**: typed [`NodeSchema`]s describing each node's configurable inputs
//! - **Parser**: a tolerant extractor for the semi-structured `inputs` strings
//! - **Provider**: an immutable, load-once [`CatalogProvider`] shared by the
//!   graph transformer, validator and modifier

pub mod descriptor;
pub mod error;
pub mod parser;
pub mod provider;
pub mod schema;
pub mod source;

pub use descriptor::{Catalog, NodeCategory, RawNodeDescriptor};
pub use error::{CatalogError, ParseError};
pub use parser::{ParseOutcome, parse_inputs, parse_schema};
pub use provider::CatalogProvider;
pub use schema::{InputKind, InputSpec, NodeSchema};
pub use source::{CatalogSource, JsonFileCatalogSource, StaticCatalogSource};

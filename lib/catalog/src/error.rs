//! Error types for the catalog crate.
//!
//! - `ParseError`: a single `inputs` fragment could not be understood. Never
//!   escapes the parser; it is logged and the fragment is skipped.
//! - `CatalogError`: the catalog feed itself could not be loaded.

use std::fmt;

/// Why a single input fragment was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A `{` was never closed.
    UnterminatedFragment { offset: usize },
    /// A field the schema cannot do without was absent.
    MissingField { field: &'static str },
    /// A field was present but its value could not be read.
    InvalidValue { field: String, value: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedFragment { offset } => {
                write!(f, "unterminated fragment starting at offset {offset}")
            }
            Self::MissingField { field } => write!(f, "missing field '{field}'"),
            Self::InvalidValue { field, value } => {
                write!(f, "invalid value for '{field}': {value}")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors loading the catalog feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The catalog source could not be read.
    Io { path: String, details: String },
    /// The catalog document is not a catalog.
    Malformed { details: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, details } => {
                write!(f, "failed to read catalog '{path}': {details}")
            }
            Self::Malformed { details } => write!(f, "malformed catalog: {details}"),
        }
    }
}

impl std::error::Error for CatalogError {}

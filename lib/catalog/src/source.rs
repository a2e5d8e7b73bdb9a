//! Catalog feeds.
//!
//! The catalog is read once per process. Picking up a new catalog version
//! requires a restart.

use crate::descriptor::Catalog;
use crate::error::CatalogError;
use rootcause::Report;
use std::path::PathBuf;

/// A read-only, versioned feed of raw node descriptors.
pub trait CatalogSource: Send + Sync {
    /// Loads the whole catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed cannot be read or is not a catalog
    /// document. Malformed `inputs` inside a descriptor are not errors.
    fn load(&self) -> Result<Catalog, Report<CatalogError>>;
}

/// Reads a JSON catalog document from disk.
#[derive(Debug, Clone)]
pub struct JsonFileCatalogSource {
    path: PathBuf,
}

impl JsonFileCatalogSource {
    /// Creates a source for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogSource for JsonFileCatalogSource {
    fn load(&self) -> Result<Catalog, Report<CatalogError>> {
        let bytes = std::fs::read(&self.path).map_err(|e| CatalogError::Io {
            path: self.path.display().to_string(),
            details: e.to_string(),
        })?;

        let catalog = serde_json::from_slice(&bytes).map_err(|e| CatalogError::Malformed {
            details: e.to_string(),
        })?;
        Ok(catalog)
    }
}

/// Serves a catalog held in memory.
#[derive(Debug, Clone)]
pub struct StaticCatalogSource {
    catalog: Catalog,
}

impl StaticCatalogSource {
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }
}

impl CatalogSource for StaticCatalogSource {
    fn load(&self) -> Result<Catalog, Report<CatalogError>> {
        Ok(self.catalog.clone())
    }
}

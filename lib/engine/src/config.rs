//! Engine configuration.
//!
//! Loaded via the `config` crate from an optional file, then environment
//! variables of the form `AGENTFLOW__SECTION__KEY`. Every field has a
//! default, so an empty configuration is valid.

use agentflow_core::Backoff;
use agentflow_editor::{AutoSaveConfig, DEFAULT_MAX_HISTORY_SIZE};
use agentflow_integration::{MAX_CONCURRENCY, SyncConfig};
use agentflow_workflow::{DEFAULT_DEFERRED_NODE_TYPES, ValidationOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine configuration, one section per component.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub catalog: CatalogSettings,
    pub validation: ValidationSettings,
    pub autosave: AutoSaveSettings,
    pub history: HistorySettings,
    pub sync: SyncSettings,
    pub log: LogSettings,
}

impl EngineConfig {
    /// Loads configuration from environment variables only.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed into its field.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(None)
    }

    /// Loads configuration from `path`, if given, overlaid with environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder
            .add_source(
                config::Environment::with_prefix("AGENTFLOW")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("validation.deferred_node_types"),
            )
            .build()?
            .try_deserialize()
    }
}

/// Where the node catalog comes from.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// JSON catalog file. Without one the engine starts with an empty catalog.
    pub path: Option<PathBuf>,
    /// Catalog version the deployment expects. A mismatch is logged.
    pub version_label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Treat unreachable nodes as errors.
    pub strict_mode: bool,
    /// Node types whose missing inputs can be configured later.
    pub deferred_node_types: Vec<String>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            strict_mode: false,
            deferred_node_types: DEFAULT_DEFERRED_NODE_TYPES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl ValidationSettings {
    #[must_use]
    pub fn options(&self) -> ValidationOptions {
        ValidationOptions {
            strict_mode: self.strict_mode,
            ..ValidationOptions::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutoSaveSettings {
    pub debounce_ms: u64,
    pub interval_ms: u64,
    pub max_retries: u32,
    pub backoff_unit_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for AutoSaveSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 2_000,
            interval_ms: 30_000,
            max_retries: 3,
            backoff_unit_ms: 1_000,
            max_backoff_ms: 60_000,
        }
    }
}

impl AutoSaveSettings {
    #[must_use]
    pub fn to_config(&self) -> AutoSaveConfig {
        AutoSaveConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            // A zero period would make the interval timer panic.
            interval: Duration::from_millis(self.interval_ms.max(1)),
            max_retries: self.max_retries,
            backoff: Backoff::new(
                Duration::from_millis(self.backoff_unit_ms),
                Duration::from_millis(self.max_backoff_ms),
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub max_size: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_HISTORY_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Clamped to 1..=4.
    pub max_concurrency: usize,
    pub deadline_ms: u64,
    pub max_retries: u32,
    pub backoff_unit_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_concurrency: MAX_CONCURRENCY,
            deadline_ms: 30_000,
            max_retries: 3,
            backoff_unit_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl SyncSettings {
    #[must_use]
    pub fn to_config(&self) -> SyncConfig {
        SyncConfig {
            max_concurrency: self.max_concurrency.clamp(1, MAX_CONCURRENCY),
            deadline: Duration::from_millis(self.deadline_ms),
            max_retries: self.max_retries,
            backoff: Backoff::new(
                Duration::from_millis(self.backoff_unit_ms),
                Duration::from_millis(self.max_backoff_ms),
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert!(config.catalog.path.is_none());
        assert!(!config.validation.strict_mode);
        assert_eq!(config.validation.deferred_node_types.len(), 4);
        assert_eq!(config.history.max_size, 50);
        assert_eq!(config.log.filter, "info");

        let autosave = config.autosave.to_config();
        assert_eq!(autosave.debounce, Duration::from_secs(2));
        assert_eq!(autosave.interval, Duration::from_secs(30));
        assert_eq!(autosave.backoff.delay(1), Duration::from_secs(2));

        let sync = config.sync.to_config();
        assert_eq!(sync, SyncConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            file,
            r#"
[validation]
strict_mode = true
deferred_node_types = ["customTool"]

[sync]
max_concurrency = 16
deadline_ms = 1000

[history]
max_size = 5
"#
        )
        .expect("write");

        let config = EngineConfig::load(Some(file.path())).expect("load");
        assert!(config.validation.options().strict_mode);
        assert_eq!(config.validation.deferred_node_types, vec!["customTool"]);
        assert_eq!(config.history.max_size, 5);
        assert_eq!(config.autosave.debounce_ms, 2_000);

        let sync = config.sync.to_config();
        assert_eq!(sync.max_concurrency, MAX_CONCURRENCY);
        assert_eq!(sync.deadline, Duration::from_secs(1));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.toml");
        assert!(EngineConfig::load(Some(&path)).is_err());
    }
}

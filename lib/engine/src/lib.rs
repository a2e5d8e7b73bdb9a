//! The agentflow graph engine.
//!
//! Wires the catalog, graph services, identifier linking, sync and editing
//! sessions together behind [`Engine`], configured by [`EngineConfig`].

pub mod config;
pub mod engine;
pub mod error;
pub mod telemetry;

pub use config::{
    AutoSaveSettings, CatalogSettings, EngineConfig, HistorySettings, LogSettings, SyncSettings,
    ValidationSettings,
};
pub use engine::{EditorLease, Engine, EngineStores};
pub use error::{EngineError, SessionError};
pub use telemetry::init_tracing;

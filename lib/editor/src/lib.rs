//! Editing support for agentflow graphs.
//!
//! This crate provides:
//!
//! - **History manager**: bounded undo/redo over graph snapshots
//! - **Auto-save**: a debounced and periodic persistence state machine,
//!   driven by a single actor task per session
//! - **Editor session**: the owner of one `EditorState`, tying modifier
//!   batches, history and auto-save together

pub mod autosave;
pub mod error;
pub mod history;
pub mod session;
pub mod store;

pub use autosave::{
    Action, AutoSaveConfig, AutoSaveHandle, AutoSaveMachine, AutoSaveState, AutoSaveStatus, Event,
    SaveHandler,
};
pub use error::{AutoSaveError, GraphStoreError, SaveError};
pub use history::{DEFAULT_MAX_HISTORY_SIZE, HistoryManager};
pub use session::{EditorSession, EditorState};
pub use store::{GraphStore, GraphStoreSaver, InMemoryGraphStore};

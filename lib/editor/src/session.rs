//! Editing sessions.
//!
//! An [`EditorSession`] is the single owner of one session's
//! [`EditorState`]. It is not shared between tasks; concurrent sessions are
//! independent.

use crate::autosave::{AutoSaveHandle, AutoSaveState, AutoSaveStatus};
use crate::error::AutoSaveError;
use crate::history::HistoryManager;
use agentflow_core::SessionId;
use agentflow_workflow::{
    Graph, ModificationContext, ModificationOp, ModificationResult, ModificationSuggestion,
    Modifier, ValidationOptions, ValidationReport, Validator,
};
use rootcause::Report;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// A graph under edit with its undo history.
///
/// The current graph is the history's present snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    /// True when there were unsaved edits as of the session's last call.
    /// [`EditorSession::is_dirty`] also sees saves made since then.
    pub dirty: bool,
    pub history: HistoryManager<Graph>,
}

impl EditorState {
    #[must_use]
    pub fn new(graph: Graph, max_history: usize) -> Self {
        Self {
            dirty: false,
            history: HistoryManager::with_max_size(graph, max_history),
        }
    }

    #[must_use]
    pub fn graph(&self) -> &Graph {
        self.history.present()
    }
}

/// One active editor over a graph.
pub struct EditorSession {
    id: SessionId,
    state: EditorState,
    modifier: Arc<Modifier>,
    validator: Arc<Validator>,
    autosave: AutoSaveHandle<Graph>,
}

impl EditorSession {
    #[must_use]
    pub fn new(
        id: SessionId,
        graph: Graph,
        max_history: usize,
        modifier: Arc<Modifier>,
        validator: Arc<Validator>,
        autosave: AutoSaveHandle<Graph>,
    ) -> Self {
        Self {
            id,
            state: EditorState::new(graph, max_history),
            modifier,
            validator,
            autosave,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn graph(&self) -> &Graph {
        self.state.graph()
    }

    #[must_use]
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.autosave.has_unsaved_changes()
    }

    #[must_use]
    pub fn autosave_state(&self) -> AutoSaveState {
        self.autosave.state()
    }

    /// Applies a modification batch to the current graph.
    ///
    /// The result becomes a new history entry only if at least one op
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns `AutoSaveError::Stopped` if the auto-saver is gone. The graph
    /// is updated regardless.
    #[instrument(skip_all, fields(session_id = %self.id, ops = ops.len()))]
    pub fn apply(
        &mut self,
        ops: &[ModificationOp],
        context: &ModificationContext,
    ) -> Result<ModificationResult, Report<AutoSaveError>> {
        let result = self.modifier.apply(self.graph(), ops, context);
        if result.change_set.is_empty() {
            debug!("no op applied, history unchanged");
            return Ok(result);
        }
        self.commit(result.graph.clone())?;
        Ok(result)
    }

    /// Proposes ops for expected capabilities the graph lacks.
    #[must_use]
    pub fn suggest(&self, context: &ModificationContext) -> Vec<ModificationSuggestion> {
        self.modifier.suggest_modifications(self.graph(), context)
    }

    /// Replaces the whole graph as one history entry.
    ///
    /// # Errors
    ///
    /// Returns `AutoSaveError::Stopped` if the auto-saver is gone.
    pub fn replace_graph(&mut self, graph: Graph) -> Result<(), Report<AutoSaveError>> {
        self.commit(graph)
    }

    /// Steps back one edit. Returns false if there was nothing to undo.
    ///
    /// # Errors
    ///
    /// Returns `AutoSaveError::Stopped` if the auto-saver is gone.
    pub fn undo(&mut self) -> Result<bool, Report<AutoSaveError>> {
        let Some(graph) = self.state.history.undo().cloned() else {
            return Ok(false);
        };
        self.touch(graph)?;
        Ok(true)
    }

    /// Re-applies one undone edit. Returns false if there was nothing to
    /// redo.
    ///
    /// # Errors
    ///
    /// Returns `AutoSaveError::Stopped` if the auto-saver is gone.
    pub fn redo(&mut self) -> Result<bool, Report<AutoSaveError>> {
        let Some(graph) = self.state.history.redo().cloned() else {
            return Ok(false);
        };
        self.touch(graph)?;
        Ok(true)
    }

    #[must_use]
    pub fn validate(&self, options: &ValidationOptions) -> ValidationReport {
        self.validator.validate(self.graph(), options)
    }

    /// Records that the caller persisted the graph itself.
    ///
    /// # Errors
    ///
    /// Returns `AutoSaveError::Stopped` if the auto-saver is gone.
    pub fn mark_saved(&mut self) -> Result<(), Report<AutoSaveError>> {
        self.autosave.mark_saved()?;
        self.state.dirty = false;
        Ok(())
    }

    /// Saves the current graph now and waits for the outcome.
    ///
    /// # Errors
    ///
    /// Returns `SaveInProgress` if an auto-save is running, `SaveFailed` if
    /// the save fails, or `Stopped` if the auto-saver is gone.
    pub async fn save_now(&mut self) -> Result<(), Report<AutoSaveError>> {
        self.autosave.mark_dirty(self.graph().clone())?;
        self.autosave.force_save().await?;
        self.state.dirty = self.autosave.has_unsaved_changes();
        Ok(())
    }

    /// Ends the session and stops its auto-saver.
    ///
    /// # Errors
    ///
    /// Returns `AutoSaveError::RetryExhausted` if auto-save had given up, in
    /// which case the last edits were not persisted.
    #[instrument(skip_all, fields(session_id = %self.id))]
    pub async fn close(self) -> Result<(), Report<AutoSaveError>> {
        let last = self.autosave.shutdown().await;
        info!(status = ?last.status, "editor session closed");
        if last.status == AutoSaveStatus::Error {
            return Err(AutoSaveError::RetryExhausted {
                attempts: last.retry_attempt + 1,
                reason: last.last_error.unwrap_or_default(),
            }
            .into());
        }
        Ok(())
    }

    fn commit(&mut self, graph: Graph) -> Result<(), Report<AutoSaveError>> {
        self.state.history.save_state(graph.clone());
        self.touch(graph)
    }

    fn touch(&mut self, graph: Graph) -> Result<(), Report<AutoSaveError>> {
        self.state.dirty = true;
        self.autosave.mark_dirty(graph)
    }
}

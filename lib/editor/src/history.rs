//! Bounded undo/redo history.

use std::collections::VecDeque;

/// Default number of undo steps kept.
pub const DEFAULT_MAX_HISTORY_SIZE: usize = 50;

/// A present snapshot with bounded past and future stacks.
///
/// Saving a new state clears the redo stack. When the past grows beyond
/// `max_size`, its oldest snapshot is evicted.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryManager<T> {
    past: VecDeque<T>,
    present: T,
    future: Vec<T>,
    max_size: usize,
}

impl<T: Clone> HistoryManager<T> {
    /// Starts a history at `initial` with the default size.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self::with_max_size(initial, DEFAULT_MAX_HISTORY_SIZE)
    }

    #[must_use]
    pub fn with_max_size(initial: T, max_size: usize) -> Self {
        Self {
            past: VecDeque::with_capacity(max_size.min(DEFAULT_MAX_HISTORY_SIZE)),
            present: initial,
            future: Vec::new(),
            max_size,
        }
    }

    #[must_use]
    pub fn present(&self) -> &T {
        &self.present
    }

    /// Makes `snapshot` the present state.
    pub fn save_state(&mut self, snapshot: T) {
        let previous = std::mem::replace(&mut self.present, snapshot);
        self.past.push_back(previous);
        while self.past.len() > self.max_size {
            self.past.pop_front();
        }
        self.future.clear();
    }

    /// Steps back one state. Returns `None` if there is nothing to undo.
    pub fn undo(&mut self) -> Option<&T> {
        let previous = self.past.pop_back()?;
        let current = std::mem::replace(&mut self.present, previous);
        self.future.push(current);
        Some(&self.present)
    }

    /// Steps forward one state. Returns `None` if there is nothing to redo.
    pub fn redo(&mut self) -> Option<&T> {
        let next = self.future.pop()?;
        let current = std::mem::replace(&mut self.present, next);
        self.past.push_back(current);
        Some(&self.present)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    #[must_use]
    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    #[must_use]
    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Drops undo and redo history, keeping the present state.
    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn undo_and_redo_walk_the_stacks() {
        let mut history = HistoryManager::new(0);
        history.save_state(1);
        history.save_state(2);

        assert_eq!(history.undo(), Some(&1));
        assert_eq!(history.undo(), Some(&0));
        assert_eq!(history.undo(), None);
        assert_eq!(*history.present(), 0);

        assert_eq!(history.redo(), Some(&1));
        assert_eq!(history.redo(), Some(&2));
        assert_eq!(history.redo(), None);
    }

    #[test]
    fn saving_clears_redo() {
        let mut history = HistoryManager::new("a");
        history.save_state("b");
        history.undo();
        assert!(history.can_redo());

        history.save_state("c");
        assert!(!history.can_redo());
        assert_eq!(history.past_len(), 1);
        assert_eq!(*history.present(), "c");
    }

    #[test]
    fn oldest_snapshot_is_evicted() {
        let mut history = HistoryManager::with_max_size(0, 3);
        for n in 1..=10 {
            history.save_state(n);
        }
        assert_eq!(history.past_len(), 3);

        let mut seen = Vec::new();
        while let Some(n) = history.undo() {
            seen.push(*n);
        }
        assert_eq!(seen, vec![9, 8, 7]);
    }

    #[test]
    fn clear_keeps_present() {
        let mut history = HistoryManager::new(0);
        history.save_state(1);
        history.save_state(2);
        history.undo();
        history.clear();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(*history.present(), 1);
    }

    proptest! {
        #[test]
        fn past_is_bounded_and_undo_redo_restores(saves in 1usize..120, max in 1usize..60) {
            let mut history = HistoryManager::with_max_size(0usize, max);
            for n in 1..=saves {
                history.save_state(n);
            }
            prop_assert_eq!(history.past_len(), saves.min(max));

            let before = *history.present();
            history.undo();
            history.redo();
            prop_assert_eq!(*history.present(), before);
        }
    }
}

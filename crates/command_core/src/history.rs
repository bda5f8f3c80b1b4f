use std::collections::VecDeque;

use crate::command::HistoryEntry;

pub(crate) type Entry = Box<dyn HistoryEntry>;

/// Undo and redo stacks with a bounded undo side.
///
/// The back of `undo` is the most recent command; the front is evicted first.
pub(crate) struct History {
    undo: VecDeque<Entry>,
    redo: Vec<Entry>,
    max_size: usize,
}

impl History {
    pub(crate) fn new(max_size: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_size,
        }
    }

    pub(crate) fn max_size(&self) -> usize {
        self.max_size
    }

    /// Pushes onto the undo stack and returns descriptions of evicted entries.
    pub(crate) fn push_undo(&mut self, entry: Entry) -> Vec<String> {
        self.undo.push_back(entry);
        self.trim()
    }

    pub(crate) fn pop_undo(&mut self) -> Option<Entry> {
        self.undo.pop_back()
    }

    pub(crate) fn push_redo(&mut self, entry: Entry) {
        self.redo.push(entry);
    }

    pub(crate) fn pop_redo(&mut self) -> Option<Entry> {
        self.redo.pop()
    }

    /// Drops every redo entry, returning how many were discarded.
    pub(crate) fn clear_redo(&mut self) -> usize {
        let dropped = self.redo.len();
        self.redo.clear();
        dropped
    }

    pub(crate) fn set_max_size(&mut self, max_size: usize) -> Vec<String> {
        self.max_size = max_size;
        self.trim()
    }

    pub(crate) fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub(crate) fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub(crate) fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Undo descriptions, most recent first.
    pub(crate) fn undo_descriptions(&self) -> Vec<String> {
        self.undo.iter().rev().map(|e| e.description()).collect()
    }

    /// Redo descriptions, next to be redone first.
    pub(crate) fn redo_descriptions(&self) -> Vec<String> {
        self.redo.iter().rev().map(|e| e.description()).collect()
    }

    fn trim(&mut self) -> Vec<String> {
        let mut evicted = Vec::new();
        while self.undo.len() > self.max_size {
            if let Some(oldest) = self.undo.pop_front() {
                evicted.push(oldest.description());
            }
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{command::Command, error::CommandError};

    struct Label(&'static str);

    #[async_trait]
    impl Command for Label {
        type Output = ();

        fn can_execute(&self) -> bool {
            true
        }

        async fn execute(&mut self) -> Result<(), CommandError> {
            Ok(())
        }

        async fn undo(&mut self) -> Result<(), CommandError> {
            Ok(())
        }

        fn can_undo(&self) -> bool {
            true
        }

        fn description(&self) -> String {
            self.0.to_string()
        }
    }

    fn filled(max_size: usize, labels: &[&'static str]) -> History {
        let mut history = History::new(max_size);
        for &label in labels {
            history.push_undo(Box::new(Label(label)));
        }
        history
    }

    #[test]
    fn push_beyond_bound_evicts_oldest_entry() {
        let mut history = filled(2, &["a", "b"]);
        let evicted = history.push_undo(Box::new(Label("c")));
        assert_eq!(evicted, vec!["a".to_string()]);
        assert_eq!(history.undo_descriptions(), vec!["c", "b"]);
    }

    #[test]
    fn lowering_bound_trims_to_exact_size_from_oldest_end() {
        let mut history = filled(10, &["a", "b", "c", "d"]);
        let evicted = history.set_max_size(1);
        assert_eq!(evicted, vec!["a", "b", "c"]);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.undo_descriptions(), vec!["d"]);
        assert_eq!(history.max_size(), 1);
    }

    #[test]
    fn undo_pops_most_recent_and_redo_is_lifo() {
        let mut history = filled(10, &["a", "b"]);
        let top = history.pop_undo().expect("entry");
        assert_eq!(top.description(), "b");
        history.push_redo(top);
        let next = history.pop_undo().expect("entry");
        history.push_redo(next);
        assert_eq!(history.redo_descriptions(), vec!["a", "b"]);
        assert_eq!(history.pop_redo().map(|e| e.description()).as_deref(), Some("a"));
        assert_eq!(history.clear_redo(), 1);
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn clear_empties_both_stacks() {
        let mut history = filled(10, &["a", "b"]);
        let entry = history.pop_undo().expect("entry");
        history.push_redo(entry);
        history.clear();
        assert_eq!(history.undo_len(), 0);
        assert_eq!(history.redo_len(), 0);
    }
}

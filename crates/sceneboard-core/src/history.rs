//! Undo/redo history.
//!
//! Each entry holds the before and after state of every element touched
//! since the previous boundary, so undoing a batch restores all of them at
//! once.

use crate::shapes::{Element, ElementId};
use std::collections::VecDeque;

/// Default maximum number of undo entries to keep.
pub const MAX_UNDO_HISTORY: usize = 50;

/// State of one element on both sides of a history boundary.
///
/// `None` means the element did not exist on that side.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementChange {
    pub id: ElementId,
    pub before: Option<Element>,
    pub after: Option<Element>,
}

/// One undoable user action.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub label: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub(crate) changes: Vec<ElementChange>,
    pub(crate) order_before: Vec<ElementId>,
    pub(crate) order_after: Vec<ElementId>,
}

impl HistoryEntry {
    /// Ids touched by this entry.
    pub fn ids(&self) -> Vec<ElementId> {
        self.changes.iter().map(|c| c.id).collect()
    }

    pub fn changes(&self) -> &[ElementChange] {
        &self.changes
    }
}

/// Two bounded stacks of history entries.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record a new action. Discards the redo stack and drops the oldest
    /// entry when over the limit.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.redo_stack.clear();
        self.push_undo(entry);
    }

    pub(crate) fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo_stack.push_back(entry);
        while self.undo_stack.len() > self.limit {
            if let Some(dropped) = self.undo_stack.pop_front() {
                log::debug!("History full, dropping oldest entry '{}'", dropped.label);
            }
        }
    }

    pub(crate) fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.undo_stack.pop_back()
    }

    pub(crate) fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo_stack.push(entry);
    }

    pub(crate) fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo_stack.pop()
    }

    /// Number of undoable entries.
    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Labels of the undoable entries, oldest first.
    pub fn labels(&self) -> Vec<&str> {
        self.undo_stack.iter().map(|e| e.label.as_str()).collect()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

//! Selection and editing focus.

use crate::shapes::ElementId;

/// Tracks which elements are selected and which one is being edited.
///
/// Kept separate from element data: selecting never mutates an element and
/// is never recorded in history.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Selected ids in selection order.
    selected: Vec<ElementId>,
    /// Element with an active editing session (e.g. text editing).
    editing: Option<ElementId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection with `{id}`, or toggle `id` when `multi` is set.
    pub fn select(&mut self, id: ElementId, multi: bool) {
        if multi {
            if self.selected.contains(&id) {
                self.deselect(id);
            } else {
                self.selected.push(id);
            }
        } else {
            self.selected.clear();
            self.selected.push(id);
        }
    }

    /// Remove an id from the selection.
    pub fn deselect(&mut self, id: ElementId) -> bool {
        let before = self.selected.len();
        self.selected.retain(|&s| s != id);
        self.selected.len() != before
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.selected.is_empty();
        self.selected.clear();
        changed
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.selected.contains(&id)
    }

    pub fn ids(&self) -> &[ElementId] {
        &self.selected
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn editing(&self) -> Option<ElementId> {
        self.editing
    }

    pub fn set_editing(&mut self, id: Option<ElementId>) {
        self.editing = id;
    }

    /// Forget a deleted element. Returns true if the selection or the
    /// editing target changed.
    pub fn remove(&mut self, id: ElementId) -> bool {
        let was_editing = self.editing == Some(id);
        if was_editing {
            self.editing = None;
        }
        self.deselect(id) || was_editing
    }

    /// Selected and edited ids together.
    pub fn active_ids(&self) -> Vec<ElementId> {
        let mut ids = self.selected.clone();
        if let Some(id) = self.editing {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

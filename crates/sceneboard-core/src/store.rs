//! Element store: the canonical element map, paint order, selection and
//! undo/redo history.
//!
//! Every mutation goes through this type. Mutations queue [`SceneEvent`]s
//! that the owning [`crate::Scene`] dispatches before returning to the caller.
//!
//! History works on explicit boundaries. Updates made with
//! [`UpdateOptions::gesture`] only remember the pre-gesture state of each
//! element they touch; the next boundary (an update with
//! [`UpdateOptions::commit`] or an explicit [`ElementStore::add_history_entry`])
//! turns everything touched since the previous boundary into one entry.
//! Plain [`ElementStore::add`] and [`ElementStore::delete`] are boundaries of
//! their own.

use crate::error::{SceneError, SceneResult};
use crate::event::SceneEvent;
use crate::geometry::union_all;
use crate::history::{ElementChange, History, HistoryEntry, MAX_UNDO_HISTORY};
use crate::selection::Selection;
use crate::shapes::{now_millis, Element, ElementId, ElementKind, ElementPatch};
use kurbo::{Rect, Vec2};
use std::collections::{HashMap, HashSet};

/// History behaviour of an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Label of the entry to record after applying, if any.
    pub record_history: Option<String>,
}

impl UpdateOptions {
    /// Intermediate step of a continuous gesture: no history entry.
    pub fn gesture() -> Self {
        Self::default()
    }

    /// End of a logical action: record one labeled entry.
    pub fn commit(label: impl Into<String>) -> Self {
        Self {
            record_history: Some(label.into()),
        }
    }
}

/// Canonical element storage.
#[derive(Debug, Clone)]
pub struct ElementStore {
    /// All elements, keyed by ID.
    elements: HashMap<ElementId, Element>,
    /// Paint order (back to front).
    order: Vec<ElementId>,
    selection: Selection,
    history: History,
    /// Pre-boundary state of every element touched since the last boundary.
    pending: HashMap<ElementId, Option<Element>>,
    /// Paint order at the last boundary, if it changed since.
    pending_order: Option<Vec<ElementId>>,
    /// Events waiting to be dispatched.
    events: Vec<SceneEvent>,
}

impl Default for ElementStore {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl ElementStore {
    /// Create an empty store keeping at most `history_limit` undo entries.
    pub fn new(history_limit: usize) -> Self {
        Self {
            elements: HashMap::new(),
            order: Vec::new(),
            selection: Selection::new(),
            history: History::new(history_limit),
            pending: HashMap::new(),
            pending_order: None,
            events: Vec::new(),
        }
    }

    // --- Queries ---

    /// Get an element by ID.
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Paint order (back to front).
    pub fn order(&self) -> &[ElementId] {
        &self.order
    }

    /// Elements in paint order (back to front).
    pub fn elements_in_order(&self) -> impl Iterator<Item = &Element> {
        self.order.iter().filter_map(|id| self.elements.get(id))
    }

    /// Position of an element in the paint order.
    pub fn z_index(&self, id: ElementId) -> Option<usize> {
        self.order.iter().position(|&o| o == id)
    }

    /// Bounds of an element in world coordinates, resolving groups through
    /// their children.
    pub fn bounds_of(&self, id: ElementId) -> SceneResult<Rect> {
        let element = self.elements.get(&id).ok_or(SceneError::NotFound(id))?;
        self.element_bounds(element)
    }

    /// Bounds of `element`, resolving groups through this store.
    pub fn element_bounds(&self, element: &Element) -> SceneResult<Rect> {
        let mut visited = HashSet::new();
        self.bounds_inner(element, &mut visited)
    }

    fn bounds_inner(&self, element: &Element, visited: &mut HashSet<ElementId>) -> SceneResult<Rect> {
        let Some(group) = element.as_group() else {
            return element.bounds();
        };
        if !visited.insert(element.id()) {
            return Err(SceneError::InvalidGeometry(format!("group {} contains itself", element.id())));
        }
        let rects = group
            .children
            .iter()
            .filter_map(|child| self.elements.get(child))
            .map(|child| self.bounds_inner(child, visited))
            .collect::<SceneResult<Vec<_>>>()?;
        union_all(rects).ok_or_else(|| {
            SceneError::InvalidGeometry(format!("group {} has no resolvable children", element.id()))
        })
    }

    // --- Mutations ---

    /// Insert a new element at the top of the paint order as its own
    /// undoable action.
    pub fn add(&mut self, element: Element) -> SceneResult<ElementId> {
        self.add_with(element, UpdateOptions::commit("Add"))
    }

    /// Insert a new element. With [`UpdateOptions::gesture`] the insertion
    /// stays pending and joins the next recorded entry.
    pub fn add_with(&mut self, element: Element, options: UpdateOptions) -> SceneResult<ElementId> {
        let id = element.id();
        if self.elements.contains_key(&id) {
            return Err(SceneError::DuplicateId(id));
        }
        element.validate()?;
        if element.as_group().is_some_and(|g| g.contains(id)) {
            return Err(SceneError::InvalidGeometry(format!("group {id} lists itself as a child")));
        }

        self.track(id);
        self.track_order();
        log::debug!("Adding {} {}", element.kind.name(), id);
        self.order.push(id);
        self.elements.insert(id, element);
        self.events.push(SceneEvent::Added(id));
        if let Some(label) = options.record_history {
            self.add_history_entry(label);
        }
        Ok(id)
    }

    /// Shallow-merge `patch` into one element.
    pub fn update(&mut self, id: ElementId, patch: ElementPatch, options: UpdateOptions) -> SceneResult<()> {
        self.batch_update(vec![(id, patch)], options)
    }

    /// Apply several patches as one unit.
    ///
    /// Every patch is validated before any is applied; on error nothing
    /// changes. Moving a group moves its members by the same delta.
    pub fn batch_update(&mut self, updates: Vec<(ElementId, ElementPatch)>, options: UpdateOptions) -> SceneResult<()> {
        let mut staged: HashMap<ElementId, Element> = HashMap::new();
        let mut staged_order: Vec<ElementId> = Vec::new();
        let mut geometry: HashSet<ElementId> = HashSet::new();
        // Members with their own patch are positioned by it, not by their group.
        let explicit: HashSet<ElementId> = updates.iter().map(|(id, _)| *id).collect();

        for (id, patch) in &updates {
            let current = self.staged_or_current(&staged, *id).ok_or(SceneError::NotFound(*id))?;
            if current.locked && !patch.only_changes_lock() {
                return Err(SceneError::Locked(*id));
            }

            let mut next = current.clone();
            patch.apply_to(&mut next)?;
            next.validate()?;
            if patch.touches_geometry() {
                geometry.insert(*id);
            }

            let delta = next.position - current.position;
            if next.as_group().is_some() && delta != Vec2::ZERO {
                for member in self.group_members(&staged, &next) {
                    if explicit.contains(&member) {
                        continue;
                    }
                    let Some(mut child) = self.staged_or_current(&staged, member) else {
                        continue;
                    };
                    if child.locked {
                        return Err(SceneError::Locked(member));
                    }
                    child.translate(delta);
                    geometry.insert(member);
                    if staged.insert(member, child).is_none() {
                        staged_order.push(member);
                    }
                }
            }

            if staged.insert(*id, next).is_none() {
                staged_order.push(*id);
            }
        }

        for id in staged_order {
            if let Some(mut element) = staged.remove(&id) {
                self.track(id);
                element.touch();
                self.elements.insert(id, element);
                self.events.push(SceneEvent::Updated {
                    id,
                    geometry: geometry.contains(&id),
                });
            }
        }

        if let Some(label) = options.record_history {
            self.add_history_entry(label);
        }
        Ok(())
    }

    fn staged_or_current(&self, staged: &HashMap<ElementId, Element>, id: ElementId) -> Option<Element> {
        staged.get(&id).or_else(|| self.elements.get(&id)).cloned()
    }

    /// All transitive members of a group, without repeats.
    fn group_members(&self, staged: &HashMap<ElementId, Element>, group: &Element) -> Vec<ElementId> {
        let mut members = Vec::new();
        let mut visited: HashSet<ElementId> = HashSet::from([group.id()]);
        let mut stack: Vec<ElementId> = group.as_group().map(|g| g.children.clone()).unwrap_or_default();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            members.push(id);
            let nested = staged.get(&id).or_else(|| self.elements.get(&id));
            if let Some(g) = nested.and_then(Element::as_group) {
                stack.extend(g.children.iter().copied());
            }
        }
        members
    }

    /// Remove an element as its own undoable action.
    pub fn delete(&mut self, id: ElementId) -> SceneResult<Element> {
        self.delete_with(id, UpdateOptions::commit("Delete"))
    }

    /// Remove an element, dropping it from the selection and from any group.
    pub fn delete_with(&mut self, id: ElementId, options: UpdateOptions) -> SceneResult<Element> {
        let element = self.elements.get(&id).ok_or(SceneError::NotFound(id))?;
        if element.locked {
            return Err(SceneError::Locked(id));
        }

        let parents: Vec<ElementId> = self
            .elements
            .values()
            .filter(|e| e.as_group().is_some_and(|g| g.contains(id)))
            .map(Element::id)
            .collect();
        for parent in parents {
            self.modify(parent, true, |e| {
                if let ElementKind::Group(g) = &mut e.kind {
                    g.children.retain(|&c| c != id);
                }
            })?;
        }

        self.track(id);
        self.track_order();
        let element = self.elements.remove(&id).ok_or(SceneError::NotFound(id))?;
        self.order.retain(|&o| o != id);
        if self.selection.remove(id) {
            self.events.push(SceneEvent::SelectionChanged);
        }
        log::debug!("Deleted {} {}", element.kind.name(), id);
        self.events.push(SceneEvent::Removed(Box::new(element.clone())));
        if let Some(label) = options.record_history {
            self.add_history_entry(label);
        }
        Ok(element)
    }

    /// Bookkeeping write used by the containment and connector engines.
    ///
    /// Tracked for history like any other change but not subject to the lock
    /// check: derived state (section membership, connector paths, collapse
    /// visibility) must stay consistent on locked elements too.
    pub(crate) fn modify<R>(
        &mut self,
        id: ElementId,
        geometry: bool,
        f: impl FnOnce(&mut Element) -> R,
    ) -> SceneResult<R> {
        if !self.elements.contains_key(&id) {
            return Err(SceneError::NotFound(id));
        }
        self.track(id);
        let element = self.elements.get_mut(&id).ok_or(SceneError::NotFound(id))?;
        let result = f(element);
        element.touch();
        self.events.push(SceneEvent::Updated { id, geometry });
        Ok(result)
    }

    // --- Paint order ---

    /// Bring an element to the front (topmost).
    pub fn bring_to_front(&mut self, id: ElementId) -> bool {
        match self.z_index(id) {
            Some(pos) if pos + 1 < self.order.len() => {
                self.track_order();
                self.order.remove(pos);
                self.order.push(id);
                self.events.push(SceneEvent::Reordered);
                true
            }
            _ => false,
        }
    }

    /// Send an element to the back (bottommost).
    pub fn send_to_back(&mut self, id: ElementId) -> bool {
        match self.z_index(id) {
            Some(pos) if pos > 0 => {
                self.track_order();
                self.order.remove(pos);
                self.order.insert(0, id);
                self.events.push(SceneEvent::Reordered);
                true
            }
            _ => false,
        }
    }

    /// Move an element one layer towards the front.
    pub fn bring_forward(&mut self, id: ElementId) -> bool {
        match self.z_index(id) {
            Some(pos) if pos + 1 < self.order.len() => {
                self.track_order();
                self.order.swap(pos, pos + 1);
                self.events.push(SceneEvent::Reordered);
                true
            }
            _ => false,
        }
    }

    /// Move an element one layer towards the back.
    pub fn send_backward(&mut self, id: ElementId) -> bool {
        match self.z_index(id) {
            Some(pos) if pos > 0 => {
                self.track_order();
                self.order.swap(pos, pos - 1);
                self.events.push(SceneEvent::Reordered);
                true
            }
            _ => false,
        }
    }

    // --- Selection ---

    /// Select an element. `multi` toggles membership instead of replacing.
    ///
    /// Locked elements can be selected; they just can't be mutated.
    pub fn select(&mut self, id: ElementId, multi: bool) -> SceneResult<()> {
        if !self.elements.contains_key(&id) {
            return Err(SceneError::NotFound(id));
        }
        self.selection.select(id, multi);
        self.events.push(SceneEvent::SelectionChanged);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if self.selection.clear() {
            self.events.push(SceneEvent::SelectionChanged);
        }
    }

    /// Select every element in paint order.
    pub fn select_all(&mut self) {
        self.selection.clear();
        for &id in &self.order {
            self.selection.select(id, true);
        }
        self.events.push(SceneEvent::SelectionChanged);
    }

    /// Selected ids in selection order.
    pub fn selected(&self) -> &[ElementId] {
        self.selection.ids()
    }

    pub fn is_selected(&self, id: ElementId) -> bool {
        self.selection.contains(id)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Mark an element as being edited (or clear with `None`).
    pub fn set_editing(&mut self, id: Option<ElementId>) -> SceneResult<()> {
        if let Some(id) = id {
            if !self.elements.contains_key(&id) {
                return Err(SceneError::NotFound(id));
            }
        }
        self.selection.set_editing(id);
        self.events.push(SceneEvent::SelectionChanged);
        Ok(())
    }

    // --- History ---

    /// Close the current action: record one entry holding the before and
    /// after state of everything touched since the previous boundary.
    ///
    /// Returns false (and records nothing) if nothing was touched.
    pub fn add_history_entry(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        let order_before = self.pending_order.take();
        let changes: Vec<ElementChange> = self
            .pending
            .drain()
            .map(|(id, before)| ElementChange {
                id,
                before,
                after: self.elements.get(&id).cloned(),
            })
            .filter(|c| c.before != c.after)
            .collect();
        let order_before = order_before.unwrap_or_else(|| self.order.clone());

        if changes.is_empty() && order_before == self.order {
            log::debug!("No changes since last boundary, skipping history entry '{label}'");
            return false;
        }

        log::debug!("Recording history entry '{}' ({} elements)", label, changes.len());
        self.history.push(HistoryEntry {
            label,
            timestamp: now_millis(),
            changes,
            order_before,
            order_after: self.order.clone(),
        });
        true
    }

    /// Restore the state before the most recent entry.
    ///
    /// Returns the ids whose state was replaced.
    pub fn undo(&mut self) -> SceneResult<Vec<ElementId>> {
        let entry = self.history.pop_undo().ok_or(SceneError::HistoryUnderflow)?;
        let ids = self.apply_entry(&entry, false);
        log::debug!("Undo '{}'", entry.label);
        self.history.push_redo(entry);
        Ok(ids)
    }

    /// Re-apply the most recently undone entry.
    pub fn redo(&mut self) -> SceneResult<Vec<ElementId>> {
        let entry = self.history.pop_redo().ok_or(SceneError::HistoryUnderflow)?;
        let ids = self.apply_entry(&entry, true);
        log::debug!("Redo '{}'", entry.label);
        self.history.push_undo(entry);
        Ok(ids)
    }

    fn apply_entry(&mut self, entry: &HistoryEntry, forward: bool) -> Vec<ElementId> {
        let mut ids = Vec::with_capacity(entry.changes.len());
        let mut selection_changed = false;
        for change in &entry.changes {
            // Restoring supersedes uncommitted edits to the same element.
            self.pending.remove(&change.id);
            let state = if forward { &change.after } else { &change.before };
            match state {
                Some(element) => {
                    self.elements.insert(change.id, element.clone());
                }
                None => {
                    self.elements.remove(&change.id);
                    selection_changed |= self.selection.remove(change.id);
                }
            }
            ids.push(change.id);
        }
        if self.pending.is_empty() {
            self.pending_order = None;
        }
        let target = if forward { &entry.order_after } else { &entry.order_before };
        self.reconcile_order(target);

        if selection_changed {
            self.events.push(SceneEvent::SelectionChanged);
        }
        self.events.push(SceneEvent::HistoryRestored { ids: ids.clone() });
        ids
    }

    /// Roll every element touched since the last boundary back to its
    /// pre-gesture state without writing history.
    pub fn cancel_gesture(&mut self) -> Vec<ElementId> {
        let pending: Vec<(ElementId, Option<Element>)> = self.pending.drain().collect();
        let order = self.pending_order.take();
        if pending.is_empty() && order.is_none() {
            return Vec::new();
        }

        let mut ids = Vec::with_capacity(pending.len());
        let mut selection_changed = false;
        for (id, before) in pending {
            match before {
                Some(element) => {
                    self.elements.insert(id, element);
                }
                None => {
                    self.elements.remove(&id);
                    selection_changed |= self.selection.remove(id);
                }
            }
            ids.push(id);
        }
        let target = order.unwrap_or_else(|| self.order.clone());
        self.reconcile_order(&target);

        log::debug!("Cancelled gesture, restored {} elements", ids.len());
        if selection_changed {
            self.events.push(SceneEvent::SelectionChanged);
        }
        self.events.push(SceneEvent::HistoryRestored { ids: ids.clone() });
        ids
    }

    /// Forget the pending pre-boundary state without recording an entry.
    ///
    /// Used after bulk loads, which are not undoable actions.
    pub fn settle(&mut self) {
        self.pending.clear();
        self.pending_order = None;
    }

    /// Whether anything was touched since the last boundary.
    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty() || self.pending_order.is_some()
    }

    /// Number of undoable entries.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn redo_len(&self) -> usize {
        self.history.redo_len()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    // --- Serialization ---

    /// Serialize the elements (in paint order) to JSON.
    pub fn to_json(&self) -> SceneResult<String> {
        let ordered: Vec<&Element> = self.elements_in_order().collect();
        serde_json::to_string_pretty(&ordered).map_err(|e| SceneError::Serialization(e.to_string()))
    }

    /// Parse elements previously written by [`ElementStore::to_json`].
    pub fn elements_from_json(json: &str) -> SceneResult<Vec<Element>> {
        serde_json::from_str(json).map_err(|e| SceneError::Serialization(e.to_string()))
    }

    // --- Internals ---

    pub(crate) fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    /// Remember an element's pre-boundary state the first time it is touched.
    fn track(&mut self, id: ElementId) {
        if !self.pending.contains_key(&id) {
            let before = self.elements.get(&id).cloned();
            self.pending.insert(id, before);
        }
    }

    fn track_order(&mut self) {
        if self.pending_order.is_none() {
            self.pending_order = Some(self.order.clone());
        }
    }

    /// Rebuild the paint order from `target`, dropping ids that no longer
    /// exist and appending live elements `target` does not mention.
    fn reconcile_order(&mut self, target: &[ElementId]) {
        let mut placed: HashSet<ElementId> = HashSet::with_capacity(self.elements.len());
        let mut order: Vec<ElementId> = Vec::with_capacity(self.elements.len());
        for &id in target.iter().chain(self.order.iter()) {
            if self.elements.contains_key(&id) && placed.insert(id) {
                order.push(id);
            }
        }
        let mut missing: Vec<ElementId> = self.elements.keys().copied().filter(|id| !placed.contains(id)).collect();
        missing.sort_by_key(|id| self.elements.get(id).map(|e| e.created_at));
        order.extend(missing);
        self.order = order;
    }
}

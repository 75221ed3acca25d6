//! The scene: element store plus the subsystems that react to it.
//!
//! Every mutating call runs to completion and dispatches the resulting
//! events before returning: first to the containment engine, then to the
//! connector engine, then to render cache invalidation, and finally to
//! external listeners. Events the subsystems cause while reacting go only to
//! the cache and the listeners.

use crate::cache::{CacheManager, RenderHandle, SharedCacheManager};
use crate::config::SceneConfig;
use crate::connectors::ConnectorEngine;
use crate::containment::ContainmentEngine;
use crate::error::{ListenerError, SceneError, SceneResult};
use crate::event::SceneEvent;
use crate::geometry::{rects_overlap, union_all, RoutingMode};
use crate::shapes::{Connector, Element, ElementId, ElementKind, ElementPatch, End, EndpointRef, Group};
use crate::store::{ElementStore, UpdateOptions};
use crate::viewport::{Viewport, FIT_PADDING};
use kurbo::{Point, Rect, Size, Vec2};
use std::collections::HashSet;
use uuid::Uuid;

/// Callback receiving every scene event.
pub type Listener = Box<dyn FnMut(&SceneEvent) -> Result<(), ListenerError>>;

/// Handle returned by [`Scene::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A whiteboard scene.
pub struct Scene {
    store: ElementStore,
    containment: ContainmentEngine,
    connectors: ConnectorEngine,
    viewport: Viewport,
    config: SceneConfig,
    cache: SharedCacheManager,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl Scene {
    /// Create a scene rendering through the given (possibly shared) cache.
    pub fn new(config: SceneConfig, cache: SharedCacheManager) -> Self {
        Self {
            store: ElementStore::new(config.history_limit),
            containment: ContainmentEngine::new(config.auto_containment),
            connectors: ConnectorEngine::new(),
            viewport: Viewport::new(),
            config,
            cache,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Create a scene with its own cache built from `config.cache`.
    pub fn with_config(config: SceneConfig) -> Self {
        let cache = CacheManager::new(config.cache.clone()).shared();
        Self::new(config, cache)
    }

    pub fn store(&self) -> &ElementStore {
        &self.store
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn cache(&self) -> &SharedCacheManager {
        &self.cache
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn containment(&self) -> &ContainmentEngine {
        &self.containment
    }

    pub fn set_auto_containment(&mut self, enabled: bool) {
        self.config.auto_containment = enabled;
        self.containment.set_auto_containment(enabled);
    }

    pub fn connectors(&self) -> &ConnectorEngine {
        &self.connectors
    }

    // --- Subscriptions ---

    /// Register a listener for every scene event.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SceneEvent) -> Result<(), ListenerError> + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    // --- Queries ---

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.store.get(id)
    }

    pub fn elements_in_order(&self) -> impl Iterator<Item = &Element> {
        self.store.elements_in_order()
    }

    pub fn selected(&self) -> &[ElementId] {
        self.store.selected()
    }

    pub fn bounds_of(&self, id: ElementId) -> SceneResult<Rect> {
        self.store.bounds_of(id)
    }

    pub fn history_len(&self) -> usize {
        self.store.history_len()
    }

    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.store.can_redo()
    }

    /// Visible (non-hidden) elements intersecting the viewport, back to front.
    pub fn visible_elements(&self, viewport_size: Size) -> Vec<&Element> {
        let visible = self.viewport.visible_rect(viewport_size);
        self.store
            .elements_in_order()
            .filter(|e| !e.hidden)
            .filter(|e| self.store.element_bounds(e).is_ok_and(|b| rects_overlap(b, visible)))
            .collect()
    }

    /// Bounds of all visible elements.
    pub fn content_bounds(&self) -> Option<Rect> {
        union_all(
            self.store
                .elements_in_order()
                .filter(|e| !e.hidden)
                .filter_map(|e| self.store.element_bounds(e).ok()),
        )
    }

    /// Zoom and pan so all visible content fits. Returns false for an empty
    /// scene.
    pub fn fit_to_content(&mut self, viewport_size: Size) -> bool {
        match self.content_bounds() {
            Some(bounds) => {
                self.viewport.fit_to_bounds(bounds, viewport_size, FIT_PADDING);
                true
            }
            None => false,
        }
    }

    // --- Element mutations ---

    /// Add an element as its own undoable action.
    pub fn add(&mut self, element: Element) -> SceneResult<ElementId> {
        self.add_with(element, UpdateOptions::commit("Add"))
    }

    /// Add an element; with [`UpdateOptions::gesture`] the insertion joins
    /// the next recorded entry.
    pub fn add_with(&mut self, element: Element, options: UpdateOptions) -> SceneResult<ElementId> {
        let result = self.store.add_with(element, UpdateOptions::gesture());
        self.flush();
        let id = result?;
        self.record(options);
        Ok(id)
    }

    /// Apply a patch. With [`UpdateOptions::commit`], the history entry is
    /// recorded after the subsystems have reacted, so it also covers the
    /// containment and connector changes the update caused.
    pub fn update(&mut self, id: ElementId, patch: ElementPatch, options: UpdateOptions) -> SceneResult<()> {
        self.batch_update(vec![(id, patch)], options)
    }

    pub fn batch_update(&mut self, updates: Vec<(ElementId, ElementPatch)>, options: UpdateOptions) -> SceneResult<()> {
        let result = self.store.batch_update(updates, UpdateOptions::gesture());
        self.flush();
        result?;
        self.record(options);
        Ok(())
    }

    /// Delete an element as its own undoable action.
    pub fn delete(&mut self, id: ElementId) -> SceneResult<Element> {
        self.delete_with(id, UpdateOptions::commit("Delete"))
    }

    pub fn delete_with(&mut self, id: ElementId, options: UpdateOptions) -> SceneResult<Element> {
        let result = self.store.delete_with(id, UpdateOptions::gesture());
        self.flush();
        let element = result?;
        self.record(options);
        Ok(element)
    }

    /// Delete every selected element that is not locked, as one action.
    pub fn delete_selected(&mut self) -> Vec<ElementId> {
        let ids: Vec<ElementId> = self.store.selected().to_vec();
        let mut deleted = Vec::new();
        for id in ids {
            match self.store.delete_with(id, UpdateOptions::gesture()) {
                Ok(_) => deleted.push(id),
                Err(err) => log::debug!("Not deleting {id}: {err}"),
            }
        }
        self.flush();
        if !deleted.is_empty() {
            self.store.add_history_entry("Delete");
        }
        deleted
    }

    /// Group elements under a new group element.
    pub fn group(&mut self, children: Vec<ElementId>) -> SceneResult<ElementId> {
        let bounds = children
            .iter()
            .map(|&id| self.store.bounds_of(id))
            .collect::<SceneResult<Vec<_>>>()?;
        let origin = union_all(bounds).map_or(Point::ZERO, |r| r.origin());
        self.add_with(
            Element::new(origin, ElementKind::Group(Group::new(children))),
            UpdateOptions::commit("Group"),
        )
    }

    /// Remove a group element, keeping its children.
    pub fn ungroup(&mut self, group_id: ElementId) -> SceneResult<Vec<ElementId>> {
        let children = self
            .store
            .get(group_id)
            .ok_or(SceneError::NotFound(group_id))?
            .as_group()
            .ok_or(SceneError::WrongKind {
                id: group_id,
                expected: "group",
            })?
            .children
            .clone();
        self.delete_with(group_id, UpdateOptions::commit("Ungroup"))?;
        Ok(children)
    }

    // --- Paint order ---

    pub fn bring_to_front(&mut self, id: ElementId) -> bool {
        let changed = self.store.bring_to_front(id);
        self.flush();
        changed
    }

    pub fn send_to_back(&mut self, id: ElementId) -> bool {
        let changed = self.store.send_to_back(id);
        self.flush();
        changed
    }

    pub fn bring_forward(&mut self, id: ElementId) -> bool {
        let changed = self.store.bring_forward(id);
        self.flush();
        changed
    }

    pub fn send_backward(&mut self, id: ElementId) -> bool {
        let changed = self.store.send_backward(id);
        self.flush();
        changed
    }

    // --- Selection ---

    pub fn select(&mut self, id: ElementId, multi: bool) -> SceneResult<()> {
        let result = self.store.select(id, multi);
        self.flush();
        result
    }

    pub fn clear_selection(&mut self) {
        self.store.clear_selection();
        self.flush();
    }

    pub fn select_all(&mut self) {
        self.store.select_all();
        self.flush();
    }

    pub fn set_editing(&mut self, id: Option<ElementId>) -> SceneResult<()> {
        let result = self.store.set_editing(id);
        self.flush();
        result
    }

    // --- History ---

    pub fn add_history_entry(&mut self, label: impl Into<String>) -> bool {
        self.flush();
        self.store.add_history_entry(label)
    }

    pub fn undo(&mut self) -> SceneResult<Vec<ElementId>> {
        let result = self.store.undo();
        self.flush();
        result
    }

    pub fn redo(&mut self) -> SceneResult<Vec<ElementId>> {
        let result = self.store.redo();
        self.flush();
        result
    }

    /// Abandon an in-progress gesture, restoring the pre-gesture state.
    pub fn cancel_gesture(&mut self) -> Vec<ElementId> {
        let restored = self.store.cancel_gesture();
        self.flush();
        restored
    }

    // --- Sections ---

    pub fn create_section(&mut self, bounds: Rect) -> SceneResult<ElementId> {
        let result = self.containment.create_section(&mut self.store, Uuid::new_v4(), bounds);
        self.flush();
        let id = result?;
        self.store.add_history_entry("Create section");
        Ok(id)
    }

    pub fn update_section_bounds(&mut self, section_id: ElementId, bounds: Rect) -> SceneResult<Vec<ElementId>> {
        let result = self.containment.update_section_bounds(&mut self.store, section_id, bounds);
        self.flush();
        result
    }

    pub fn check_containment(&self, bounds: Rect) -> Option<ElementId> {
        self.containment.check_containment(&self.store, bounds)
    }

    pub fn recalculate_containment(&mut self, section_id: ElementId) -> SceneResult<Vec<ElementId>> {
        let result = self.containment.recalculate_containment(&mut self.store, section_id);
        self.flush();
        result
    }

    pub fn recalculate_all(&mut self) -> SceneResult<usize> {
        let result = self.containment.recalculate_all(&mut self.store);
        self.flush();
        result
    }

    /// Move an element into a section. Connectors attached to it are
    /// rerouted if it had to move.
    pub fn move_element_to_section(&mut self, element_id: ElementId, section_id: ElementId) -> SceneResult<bool> {
        let result = self
            .containment
            .move_element_to_section(&mut self.store, element_id, section_id);
        self.flush();
        result
    }

    pub fn remove_element_from_section(&mut self, element_id: ElementId, section_id: ElementId) -> SceneResult<bool> {
        let result = self
            .containment
            .remove_element_from_section(&mut self.store, element_id, section_id);
        self.flush();
        result
    }

    pub fn set_section_collapsed(&mut self, section_id: ElementId, collapsed: bool) -> SceneResult<Vec<ElementId>> {
        let result = self.containment.set_collapsed(&mut self.store, section_id, collapsed);
        self.flush();
        result
    }

    pub fn translate_section(&mut self, section_id: ElementId, delta: Vec2) -> SceneResult<Vec<ElementId>> {
        let result = self.containment.translate_section(&mut self.store, section_id, delta);
        self.flush();
        result
    }

    // --- Connectors ---

    pub fn create_connector(&mut self, start: EndpointRef, end: EndpointRef, routing: RoutingMode) -> SceneResult<ElementId> {
        let id = Uuid::new_v4();
        let result = self
            .connectors
            .create_connector_with_routing(&mut self.store, id, start, end, routing);
        self.flush();
        result?;
        self.store.add_history_entry("Create connector");
        Ok(id)
    }

    pub fn update_connector_path(&mut self, id: ElementId) -> Option<Connector> {
        let connector = self.connectors.update_connector_path(&mut self.store, id);
        self.flush();
        connector
    }

    pub fn attach(&mut self, connector_id: ElementId, element_id: ElementId, end: End) -> SceneResult<Connector> {
        let result = self.connectors.attach(&mut self.store, connector_id, element_id, end);
        self.flush();
        result
    }

    pub fn detach(&mut self, connector_id: ElementId, end: End) -> SceneResult<Connector> {
        let result = self.connectors.detach(&mut self.store, connector_id, end);
        self.flush();
        result
    }

    /// Reroute every connector attached to `element_id`.
    pub fn on_element_moved(&mut self, element_id: ElementId) -> Vec<ElementId> {
        let affected = self.connectors.on_element_moved(&mut self.store, element_id);
        self.flush();
        affected
    }

    // --- Render cache ---

    /// Whether the renderer should rasterize element `id` this frame.
    pub fn should_cache(&self, id: ElementId) -> bool {
        match self.store.get(id) {
            Some(element) => self.cache.lock().should_cache(element),
            None => false,
        }
    }

    pub fn apply_cache(&self, handle: &mut dyn RenderHandle, id: ElementId) -> bool {
        match self.store.get(id) {
            Some(element) => self.cache.lock().apply_cache(handle, element),
            None => false,
        }
    }

    pub fn track_access(&self, id: ElementId) {
        self.cache.lock().track_access(id);
    }

    // --- Serialization ---

    pub fn to_json(&self) -> SceneResult<String> {
        self.store.to_json()
    }

    /// Add every element of a snapshot written by [`Scene::to_json`].
    ///
    /// Loading is not undoable. All elements are checked before any is
    /// added. Returns the number of elements added.
    pub fn load_json(&mut self, json: &str) -> SceneResult<usize> {
        let elements = ElementStore::elements_from_json(json)?;
        let mut seen = HashSet::new();
        for element in &elements {
            let id = element.id();
            if self.store.contains(id) || !seen.insert(id) {
                return Err(SceneError::DuplicateId(id));
            }
            element.validate()?;
        }

        let count = elements.len();
        for element in elements {
            self.store.add_with(element, UpdateOptions::gesture())?;
        }
        self.flush();
        self.store.settle();
        log::info!("Loaded {} elements", count);
        Ok(count)
    }

    // --- Dispatch ---

    /// Close the history boundary after the subsystems have reacted, so the
    /// entry covers their derived changes too.
    fn record(&mut self, options: UpdateOptions) {
        if let Some(label) = options.record_history {
            self.store.add_history_entry(label);
        }
    }

    /// Dispatch queued store events to the subsystems, the cache and the
    /// listeners.
    fn flush(&mut self) {
        let events = self.store.drain_events();
        if events.is_empty() {
            return;
        }

        for event in &events {
            if let Err(err) = self.containment.handle_event(&mut self.store, event) {
                log::warn!("Containment failed to handle {:?}: {}", event, err);
            }
            if let Err(err) = self.connectors.handle_event(&mut self.store, event) {
                log::warn!("Connector routing failed to handle {:?}: {}", event, err);
            }
        }

        let mut all = events;
        all.extend(self.store.drain_events());
        self.invalidate_cache(&all);
        self.notify(&all);
    }

    fn invalidate_cache(&self, events: &[SceneEvent]) {
        let mut cache = self.cache.lock();
        for event in events {
            match event {
                SceneEvent::Updated { id, .. } => {
                    cache.clear(*id);
                }
                SceneEvent::Removed(element) => cache.forget(element.id()),
                SceneEvent::HistoryRestored { ids } => {
                    for &id in ids {
                        if self.store.contains(id) {
                            cache.clear(id);
                        } else {
                            cache.forget(id);
                        }
                    }
                }
                SceneEvent::SelectionChanged => cache.set_protected(self.store.selection().active_ids()),
                SceneEvent::Added(_) | SceneEvent::Reordered => {}
            }
        }
    }

    fn notify(&mut self, events: &[SceneEvent]) {
        for event in events {
            for (id, listener) in &mut self.listeners {
                if let Err(err) = listener(event) {
                    log::warn!("Listener {:?} failed on {:?}: {}", id, event, err);
                }
            }
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::with_config(SceneConfig::default())
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("elements", &self.store.len())
            .field("selected", &self.store.selected().len())
            .field("history", &self.store.history_len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_listener_receives_events() {
        let mut scene = Scene::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        scene.subscribe(move |event| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        });
        let id = scene.add(Element::rectangle(0.0, 0.0, 10.0, 10.0)).unwrap();
        assert_eq!(seen.borrow().as_slice(), &[SceneEvent::Added(id)]);
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let mut scene = Scene::default();
        let count = Rc::new(RefCell::new(0));
        scene.subscribe(|_| Err(ListenerError::new("boom")));
        let counter = count.clone();
        scene.subscribe(move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });
        scene.add(Element::rectangle(0.0, 0.0, 10.0, 10.0)).unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let mut scene = Scene::default();
        let count = Rc::new(RefCell::new(0));
        let counter = count.clone();
        let sub = scene.subscribe(move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });
        assert!(scene.unsubscribe(sub));
        assert!(!scene.unsubscribe(sub));
        scene.add(Element::rectangle(0.0, 0.0, 10.0, 10.0)).unwrap();
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_containment_failure_does_not_block_connectors() {
        let mut scene = Scene::with_config(SceneConfig {
            auto_containment: true,
            ..SceneConfig::default()
        });
        let section = scene.create_section(Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let a = scene.add(Element::rectangle(300.0, 0.0, 20.0, 20.0)).unwrap();
        let b = scene.add(Element::rectangle(300.0, 300.0, 20.0, 20.0)).unwrap();
        let connector = scene
            .create_connector(EndpointRef::Element(a), EndpointRef::Element(b), RoutingMode::Straight)
            .unwrap();

        // A section whose bounds no longer resolve makes its recheck fail.
        scene
            .store
            .modify(section, false, |e| {
                if let Some(s) = e.as_section_mut() {
                    s.width = f64::NAN;
                }
            })
            .unwrap();
        scene.flush();
        let recheck = SceneEvent::Updated {
            id: section,
            geometry: true,
        };
        assert!(scene.containment.handle_event(&mut scene.store, &recheck).is_err());

        scene.store.modify(section, true, |_| ()).unwrap();
        scene
            .store
            .update(a, ElementPatch::position(300.0, 50.0), UpdateOptions::gesture())
            .unwrap();
        scene.flush();

        let path = scene.get(connector).unwrap().as_connector().unwrap().path().to_vec();
        assert_eq!(path[0], Point::new(310.0, 60.0));
    }

    #[test]
    fn test_undo_restores_connector_path() {
        let mut scene = Scene::default();
        let a = scene.add(Element::rectangle(0.0, 0.0, 100.0, 100.0)).unwrap();
        let b = scene.add(Element::rectangle(400.0, 0.0, 100.0, 100.0)).unwrap();
        let c = scene
            .create_connector(EndpointRef::Element(a), EndpointRef::Element(b), RoutingMode::Orthogonal)
            .unwrap();

        scene
            .update(a, ElementPatch::position(0.0, 300.0), UpdateOptions::commit("Move"))
            .unwrap();
        let moved = scene.get(c).unwrap().as_connector().unwrap().path()[0];
        assert_eq!(moved, Point::new(50.0, 350.0));

        scene.undo().unwrap();
        let restored = scene.get(c).unwrap().as_connector().unwrap().path()[0];
        assert_eq!(restored, Point::new(50.0, 50.0));
    }

    #[test]
    fn test_selection_protects_cache_entry() {
        let mut scene = Scene::default();
        let id = scene.add(Element::rectangle(0.0, 0.0, 10.0, 10.0)).unwrap();
        scene.select(id, false).unwrap();
        assert!(scene.cache().lock().is_protected(id));
        scene.clear_selection();
        assert!(!scene.cache().lock().is_protected(id));
    }

    #[test]
    fn test_update_invalidates_cache() {
        struct Noop;
        impl RenderHandle for Noop {
            fn rasterize(&mut self, _: &Element, _: &crate::cache::RasterConfig) -> Result<(), crate::error::RenderError> {
                Ok(())
            }
        }

        let mut scene = Scene::default();
        let id = scene.add(Element::rectangle(0.0, 0.0, 10.0, 10.0)).unwrap();
        assert!(scene.apply_cache(&mut Noop, id));
        scene
            .update(id, ElementPatch::position(5.0, 5.0), UpdateOptions::gesture())
            .unwrap();
        assert!(!scene.cache().lock().is_cached(id));
    }

    #[test]
    fn test_visible_elements_and_fit() {
        let mut scene = Scene::default();
        let near = scene.add(Element::rectangle(10.0, 10.0, 10.0, 10.0)).unwrap();
        scene.add(Element::rectangle(5000.0, 5000.0, 10.0, 10.0)).unwrap();
        let size = Size::new(800.0, 600.0);
        let visible: Vec<ElementId> = scene.visible_elements(size).iter().map(|e| e.id()).collect();
        assert_eq!(visible, vec![near]);

        assert!(scene.fit_to_content(size));
        assert_eq!(scene.visible_elements(size).len(), 2);
    }

    #[test]
    fn test_group_and_ungroup() {
        let mut scene = Scene::default();
        let a = scene.add(Element::rectangle(10.0, 10.0, 10.0, 10.0)).unwrap();
        let b = scene.add(Element::rectangle(50.0, 50.0, 10.0, 10.0)).unwrap();
        let group = scene.group(vec![a, b]).unwrap();
        assert_eq!(scene.bounds_of(group).unwrap(), Rect::new(10.0, 10.0, 60.0, 60.0));
        assert_eq!(scene.get(group).unwrap().position, Point::new(10.0, 10.0));
        assert_eq!(scene.ungroup(group).unwrap(), vec![a, b]);
        assert!(scene.get(group).is_none());
    }

    #[test]
    fn test_load_json() {
        let mut source = Scene::default();
        let a = source.add(Element::rectangle(0.0, 0.0, 10.0, 10.0)).unwrap();
        let b = source.add(Element::rectangle(100.0, 0.0, 10.0, 10.0)).unwrap();
        source
            .create_connector(EndpointRef::Element(a), EndpointRef::Element(b), RoutingMode::Straight)
            .unwrap();
        let json = source.to_json().unwrap();

        let mut scene = Scene::default();
        assert_eq!(scene.load_json(&json).unwrap(), 3);
        assert!(!scene.can_undo());
        assert_eq!(scene.connectors().connectors_for(a).len(), 1);
        assert_eq!(scene.load_json(&json), Err(SceneError::DuplicateId(a)));
    }
}

//! Connector routing: keeps connector paths in step with the elements their
//! endpoints are attached to.

use crate::error::{SceneError, SceneResult};
use crate::event::SceneEvent;
use crate::geometry::{ensure_point, RoutingMode};
use crate::shapes::{Connector, Element, ElementId, ElementKind, End, Endpoint, EndpointRef};
use crate::store::{ElementStore, UpdateOptions};
use kurbo::Point;
use std::collections::HashMap;

/// Recomputes connector paths and tracks which connectors follow which
/// elements.
#[derive(Debug, Clone, Default)]
pub struct ConnectorEngine {
    /// Attached element -> connectors following it.
    index: HashMap<ElementId, Vec<ElementId>>,
}

impl ConnectorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an orthogonally routed connector between two endpoints.
    pub fn create_connector(
        &mut self,
        store: &mut ElementStore,
        id: ElementId,
        start: EndpointRef,
        end: EndpointRef,
    ) -> SceneResult<Connector> {
        self.create_connector_with_routing(store, id, start, end, RoutingMode::default())
    }

    /// The insertion is left pending for the caller to record.
    pub fn create_connector_with_routing(
        &mut self,
        store: &mut ElementStore,
        id: ElementId,
        start: EndpointRef,
        end: EndpointRef,
        routing: RoutingMode,
    ) -> SceneResult<Connector> {
        let start = resolve_ref(store, id, start)?;
        let end = resolve_ref(store, id, end)?;
        let connector = Connector::new(start, end, routing);

        store.add_with(
            Element::with_id(id, start.point, ElementKind::Connector(connector.clone())),
            UpdateOptions::gesture(),
        )?;
        self.index_connector(id, &connector);
        log::debug!("Created connector {} ({} attachments)", id, connector.attachments().len());
        Ok(connector)
    }

    /// Re-resolve both endpoints and rebuild the path.
    ///
    /// `None` if `id` is missing or not a connector.
    pub fn update_connector_path(&self, store: &mut ElementStore, id: ElementId) -> Option<Connector> {
        let current = store.get(id)?.as_connector()?;
        let mut next = current.clone();
        next.start.point = resolve_endpoint(store, id, &next.start);
        next.end.point = resolve_endpoint(store, id, &next.end);
        next.reroute();

        if &next == current {
            return Some(next);
        }
        let updated = next.clone();
        let result = store.modify(id, true, move |e| {
            e.position = next.start.point;
            e.kind = ElementKind::Connector(next);
        });
        if let Err(err) = result {
            log::warn!("Failed to store path of connector {id}: {err}");
            return None;
        }
        Some(updated)
    }

    /// Attach one end of a connector to an element and reroute.
    pub fn attach(&mut self, store: &mut ElementStore, id: ElementId, element_id: ElementId, end: End) -> SceneResult<Connector> {
        editable_connector(store, id)?;
        check_target(store, id, element_id)?;

        store.modify(id, true, |e| {
            if let Some(c) = e.as_connector_mut() {
                c.endpoint_mut(end).attached = Some(element_id);
            }
        })?;
        self.reindex_connector(store, id);
        self.update_connector_path(store, id).ok_or(SceneError::NotFound(id))
    }

    /// Detach one end; it stays at its last resolved coordinate.
    pub fn detach(&mut self, store: &mut ElementStore, id: ElementId, end: End) -> SceneResult<Connector> {
        let connector = editable_connector(store, id)?;
        if connector.endpoint(end).attached.is_none() {
            return Ok(connector.clone());
        }
        let connector = store.modify(id, false, |e| {
            e.as_connector_mut().map(|c| {
                c.endpoint_mut(end).attached = None;
                c.clone()
            })
        })?;
        self.reindex_connector(store, id);
        connector.ok_or(SceneError::WrongKind { id, expected: "connector" })
    }

    /// Recompute every connector attached to `element_id`, in paint order.
    ///
    /// Returns the ids of the connectors recomputed.
    pub fn on_element_moved(&mut self, store: &mut ElementStore, element_id: ElementId) -> Vec<ElementId> {
        let mut affected: Vec<ElementId> = self
            .connectors_for(element_id)
            .iter()
            .copied()
            .filter(|c| {
                store
                    .get(*c)
                    .and_then(Element::as_connector)
                    .is_some_and(|c| c.is_attached_to(element_id))
            })
            .collect();
        affected.sort_by_key(|c| store.z_index(*c));

        affected.retain(|&c| self.update_connector_path(store, c).is_some());
        if !affected.is_empty() {
            log::debug!("Rerouted {} connectors after {} moved", affected.len(), element_id);
        }
        affected
    }

    /// Connectors attached to `element_id` at either end.
    pub fn connectors_for(&self, element_id: ElementId) -> &[ElementId] {
        self.index.get(&element_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// React to a store change.
    pub fn handle_event(&mut self, store: &mut ElementStore, event: &SceneEvent) -> SceneResult<()> {
        match event {
            SceneEvent::Added(id) => {
                if store.get(*id).is_some_and(Element::is_connector) {
                    self.reindex_connector(store, *id);
                    self.update_connector_path(store, *id);
                }
            }
            SceneEvent::Updated { id, geometry } => {
                if store.get(*id).is_some_and(Element::is_connector) {
                    self.reindex_connector(store, *id);
                    if *geometry {
                        self.update_connector_path(store, *id);
                    }
                } else if *geometry {
                    self.on_element_moved(store, *id);
                }
            }
            SceneEvent::Removed(element) => self.on_removed(store, element)?,
            SceneEvent::HistoryRestored { ids } => {
                self.reindex(store);
                for &id in ids {
                    match store.get(id).map(Element::is_connector) {
                        Some(true) => {
                            self.update_connector_path(store, id);
                        }
                        Some(false) => {
                            self.on_element_moved(store, id);
                        }
                        None => {}
                    }
                }
            }
            SceneEvent::Reordered | SceneEvent::SelectionChanged => {}
        }
        Ok(())
    }

    /// Rebuild the attachment index from the store.
    pub fn reindex(&mut self, store: &ElementStore) {
        self.index.clear();
        for element in store.elements_in_order() {
            if let Some(connector) = element.as_connector() {
                self.index_connector(element.id(), connector);
            }
        }
    }

    fn on_removed(&mut self, store: &mut ElementStore, removed: &Element) -> SceneResult<()> {
        let removed_id = removed.id();
        if removed.is_connector() {
            self.unindex(removed_id);
            return Ok(());
        }

        // Ends following the removed element keep its last resolved position.
        let followers: Vec<ElementId> = self.index.remove(&removed_id).unwrap_or_default();
        for connector_id in followers {
            if !store.contains(connector_id) {
                continue;
            }
            store.modify(connector_id, false, |e| {
                if let Some(c) = e.as_connector_mut() {
                    for end in [End::Start, End::End] {
                        if c.endpoint(end).attached == Some(removed_id) {
                            c.endpoint_mut(end).attached = None;
                        }
                    }
                }
            })?;
        }
        Ok(())
    }

    fn reindex_connector(&mut self, store: &ElementStore, id: ElementId) {
        self.unindex(id);
        if let Some(connector) = store.get(id).and_then(Element::as_connector) {
            self.index_connector(id, connector);
        }
    }

    fn index_connector(&mut self, id: ElementId, connector: &Connector) {
        for target in connector.attachments() {
            let followers = self.index.entry(target).or_default();
            if !followers.contains(&id) {
                followers.push(id);
            }
        }
    }

    fn unindex(&mut self, id: ElementId) {
        self.index.retain(|_, followers| {
            followers.retain(|&c| c != id);
            !followers.is_empty()
        });
    }
}

/// Connector `id`, rejecting locked ones.
fn editable_connector(store: &ElementStore, id: ElementId) -> SceneResult<&Connector> {
    let element = store.get(id).ok_or(SceneError::NotFound(id))?;
    if element.locked {
        return Err(SceneError::Locked(id));
    }
    element.as_connector().ok_or(SceneError::WrongKind { id, expected: "connector" })
}

/// Connectors may attach to any existing element except connectors.
fn check_target(store: &ElementStore, connector: ElementId, target: ElementId) -> SceneResult<()> {
    let element = store.get(target).ok_or(SceneError::NotFound(target))?;
    if target == connector || element.is_connector() {
        return Err(SceneError::InvalidAttachment { connector, target });
    }
    Ok(())
}

fn resolve_ref(store: &ElementStore, connector: ElementId, endpoint: EndpointRef) -> SceneResult<Endpoint> {
    match endpoint {
        EndpointRef::Point(point) => {
            ensure_point(point, "connector endpoint")?;
            Ok(Endpoint::free(point))
        }
        EndpointRef::Element(target) => {
            check_target(store, connector, target)?;
            let center = store.bounds_of(target)?.center();
            Ok(Endpoint::attached(target, center))
        }
    }
}

/// Current coordinate of an endpoint: the center of the attached element, or
/// the stored point when unattached or unresolvable.
fn resolve_endpoint(store: &ElementStore, connector: ElementId, endpoint: &Endpoint) -> Point {
    let Some(target) = endpoint.attached else {
        return endpoint.point;
    };
    match store.bounds_of(target) {
        Ok(bounds) => bounds.center(),
        Err(err) => {
            log::warn!("Connector {connector}: cannot resolve attachment {target} ({err}), keeping last position");
            endpoint.point
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{ElementPatch, Group};
    use uuid::Uuid;

    fn two_boxes(store: &mut ElementStore) -> (ElementId, ElementId) {
        let a = store.add(Element::rectangle(100.0, 100.0, 100.0, 100.0)).unwrap();
        let b = store.add(Element::rectangle(300.0, 200.0, 100.0, 100.0)).unwrap();
        (a, b)
    }

    #[test]
    fn test_create_resolves_element_centers() {
        let mut store = ElementStore::default();
        let mut engine = ConnectorEngine::new();
        let (a, b) = two_boxes(&mut store);
        let c = engine
            .create_connector(&mut store, Uuid::new_v4(), EndpointRef::Element(a), EndpointRef::Element(b))
            .unwrap();
        assert_eq!(c.path().first(), Some(&Point::new(150.0, 150.0)));
        assert_eq!(c.path().last(), Some(&Point::new(350.0, 250.0)));
        assert_eq!(c.path().len(), 4);
    }

    #[test]
    fn test_unresolvable_attachment_does_not_block_rerouting() {
        let mut store = ElementStore::default();
        let mut engine = ConnectorEngine::new();
        let (a, b) = two_boxes(&mut store);
        let x = store.add(Element::rectangle(0.0, 0.0, 10.0, 10.0)).unwrap();
        let y = store.add(Element::rectangle(30.0, 0.0, 10.0, 10.0)).unwrap();
        let group = store
            .add(Element::new(Point::ZERO, ElementKind::Group(Group::new(vec![x, y]))))
            .unwrap();
        let from_group = Uuid::new_v4();
        let from_box = Uuid::new_v4();
        engine
            .create_connector(&mut store, from_group, EndpointRef::Element(group), EndpointRef::Element(b))
            .unwrap();
        engine
            .create_connector(&mut store, from_box, EndpointRef::Element(a), EndpointRef::Element(b))
            .unwrap();

        // The group loses every child and can no longer be resolved.
        store.delete(x).unwrap();
        store.delete(y).unwrap();
        assert!(store.bounds_of(group).is_err());

        store
            .update(b, ElementPatch::position(300.0, 400.0), UpdateOptions::gesture())
            .unwrap();
        let mut rerouted = engine.on_element_moved(&mut store, b);
        rerouted.sort();
        let mut expected = vec![from_group, from_box];
        expected.sort();
        assert_eq!(rerouted, expected);

        let stale = store.get(from_group).unwrap().as_connector().unwrap();
        assert_eq!(stale.start.point, Point::new(20.0, 5.0));
        assert_eq!(stale.path().last(), Some(&Point::new(350.0, 450.0)));
        let live = store.get(from_box).unwrap().as_connector().unwrap();
        assert_eq!(live.path().first(), Some(&Point::new(150.0, 150.0)));
        assert_eq!(live.path().last(), Some(&Point::new(350.0, 450.0)));
    }

    #[test]
    fn test_on_element_moved_reroutes() {
        let mut store = ElementStore::default();
        let mut engine = ConnectorEngine::new();
        let (a, b) = two_boxes(&mut store);
        let id = Uuid::new_v4();
        engine
            .create_connector(&mut store, id, EndpointRef::Element(a), EndpointRef::Element(b))
            .unwrap();

        store
            .update(a, ElementPatch::position(150.0, 120.0), UpdateOptions::gesture())
            .unwrap();
        assert_eq!(engine.on_element_moved(&mut store, a), vec![id]);
        let path = store.get(id).unwrap().as_connector().unwrap().path().to_vec();
        assert_eq!(path[0], Point::new(200.0, 170.0));
    }

    #[test]
    fn test_self_connector_degenerates() {
        let mut store = ElementStore::default();
        let mut engine = ConnectorEngine::new();
        let (a, _) = two_boxes(&mut store);
        let c = engine
            .create_connector(&mut store, Uuid::new_v4(), EndpointRef::Element(a), EndpointRef::Element(a))
            .unwrap();
        assert_eq!(c.path(), &[Point::new(150.0, 150.0), Point::new(150.0, 150.0)]);
    }

    #[test]
    fn test_cannot_attach_to_connector() {
        let mut store = ElementStore::default();
        let mut engine = ConnectorEngine::new();
        let first = Uuid::new_v4();
        engine
            .create_connector(&mut store, first, EndpointRef::Point(Point::ZERO), EndpointRef::Point(Point::new(10.0, 0.0)))
            .unwrap();
        let second = Uuid::new_v4();
        let result = engine.create_connector(
            &mut store,
            second,
            EndpointRef::Element(first),
            EndpointRef::Point(Point::ZERO),
        );
        assert_eq!(result, Err(SceneError::InvalidAttachment { connector: second, target: first }));
    }

    #[test]
    fn test_detach_keeps_last_position() {
        let mut store = ElementStore::default();
        let mut engine = ConnectorEngine::new();
        let (a, b) = two_boxes(&mut store);
        let id = Uuid::new_v4();
        engine
            .create_connector(&mut store, id, EndpointRef::Element(a), EndpointRef::Element(b))
            .unwrap();

        let c = engine.detach(&mut store, id, End::Start).unwrap();
        assert_eq!(c.start, Endpoint::free(Point::new(150.0, 150.0)));
        assert!(engine.connectors_for(a).is_empty());

        store
            .update(a, ElementPatch::position(0.0, 0.0), UpdateOptions::gesture())
            .unwrap();
        assert!(engine.on_element_moved(&mut store, a).is_empty());
    }

    #[test]
    fn test_attach_reroutes() {
        let mut store = ElementStore::default();
        let mut engine = ConnectorEngine::new();
        let (a, _) = two_boxes(&mut store);
        let id = Uuid::new_v4();
        engine
            .create_connector(&mut store, id, EndpointRef::Point(Point::ZERO), EndpointRef::Point(Point::new(0.0, 500.0)))
            .unwrap();
        let c = engine.attach(&mut store, id, a, End::End).unwrap();
        assert_eq!(c.path().last(), Some(&Point::new(150.0, 150.0)));
        assert_eq!(engine.connectors_for(a), &[id]);
    }

    #[test]
    fn test_removed_target_detaches() {
        let mut store = ElementStore::default();
        let mut engine = ConnectorEngine::new();
        let (a, b) = two_boxes(&mut store);
        let id = Uuid::new_v4();
        engine
            .create_connector(&mut store, id, EndpointRef::Element(a), EndpointRef::Element(b))
            .unwrap();

        let removed = store.delete(b).unwrap();
        engine
            .handle_event(&mut store, &SceneEvent::Removed(Box::new(removed)))
            .unwrap();
        let c = store.get(id).unwrap().as_connector().unwrap();
        assert_eq!(c.end, Endpoint::free(Point::new(350.0, 250.0)));
        assert_eq!(c.start.attached, Some(a));
    }

    #[test]
    fn test_missing_attachment_falls_back() {
        let mut store = ElementStore::default();
        let engine = ConnectorEngine::new();
        let ghost = Uuid::new_v4();
        let id = Uuid::new_v4();
        let connector = Connector::new(
            Endpoint::attached(ghost, Point::new(5.0, 5.0)),
            Endpoint::free(Point::new(50.0, 5.0)),
            RoutingMode::Straight,
        );
        store
            .add(Element::with_id(id, Point::ZERO, ElementKind::Connector(connector)))
            .unwrap();
        let c = engine.update_connector_path(&mut store, id).unwrap();
        assert_eq!(c.path(), &[Point::new(5.0, 5.0), Point::new(50.0, 5.0)]);
    }

    #[test]
    fn test_update_missing_connector_is_none() {
        let mut store = ElementStore::default();
        let engine = ConnectorEngine::new();
        assert!(engine.update_connector_path(&mut store, Uuid::new_v4()).is_none());
    }
}

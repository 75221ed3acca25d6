//! End-to-end scenarios through the `Scene` API.

use kurbo::{Point, Rect, Vec2};
use sceneboard_core::cache::{RasterConfig, RenderHandle};
use sceneboard_core::shapes::Table;
use sceneboard_core::{
    CacheConfig, CacheManager, Element, ElementKind, ElementPatch, EndpointRef, RenderError, RoutingMode, Scene,
    SceneConfig, SceneError, SceneEvent, UpdateOptions,
};
use std::cell::RefCell;
use std::rc::Rc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct CountingHandle(usize);

impl RenderHandle for CountingHandle {
    fn rasterize(&mut self, _element: &Element, _config: &RasterConfig) -> Result<(), RenderError> {
        self.0 += 1;
        Ok(())
    }
}

#[test]
fn section_resize_drops_rectangle() {
    init_logging();
    let mut scene = Scene::default();
    let section = scene.create_section(Rect::new(100.0, 100.0, 300.0, 300.0)).unwrap();
    let rect = scene.add(Element::rectangle(150.0, 150.0, 50.0, 50.0)).unwrap();

    let bounds = scene.bounds_of(rect).unwrap();
    assert_eq!(scene.check_containment(bounds), Some(section));
    assert_eq!(scene.recalculate_containment(section).unwrap(), vec![rect]);

    scene
        .update_section_bounds(section, Rect::new(100.0, 100.0, 140.0, 140.0))
        .unwrap();
    let members = scene.recalculate_containment(section).unwrap();
    assert!(!members.contains(&rect));
    assert_eq!(scene.get(rect).unwrap().section_id(), None);
}

#[test]
fn connector_follows_moved_rectangle() {
    init_logging();
    let mut scene = Scene::default();
    let first = scene.add(Element::rectangle(100.0, 100.0, 80.0, 60.0)).unwrap();
    let second = scene.add(Element::rectangle(300.0, 200.0, 80.0, 60.0)).unwrap();
    let connector = scene
        .create_connector(EndpointRef::Element(first), EndpointRef::Element(second), RoutingMode::Orthogonal)
        .unwrap();

    scene
        .update(first, ElementPatch::position(150.0, 120.0), UpdateOptions::commit("Move"))
        .unwrap();
    assert_eq!(scene.on_element_moved(first), vec![connector]);

    let center = scene.bounds_of(first).unwrap().center();
    let path = scene.get(connector).unwrap().as_connector().unwrap().path().to_vec();
    assert_eq!(path[0], center);
    assert_eq!(center, Point::new(190.0, 150.0));
}

#[test]
fn drag_records_single_history_entry() {
    init_logging();
    let mut scene = Scene::default();
    let id = scene.add(Element::rectangle(10.0, 20.0, 40.0, 40.0)).unwrap();
    let before = scene.history_len();

    for step in 1..=10 {
        let offset = step as f64 * 5.0;
        scene
            .update(id, ElementPatch::position(10.0 + offset, 20.0 + offset), UpdateOptions::gesture())
            .unwrap();
    }
    scene
        .update(id, ElementPatch::position(70.0, 80.0), UpdateOptions::commit("Move"))
        .unwrap();
    assert_eq!(scene.history_len(), before + 1);

    scene.undo().unwrap();
    assert_eq!(scene.get(id).map(|e| e.position), Some(Point::new(10.0, 20.0)));

    scene.undo().unwrap();
    assert!(scene.get(id).is_none());
}

#[test]
fn undo_delete_restores_attachments() {
    init_logging();
    let mut scene = Scene::default();
    let a = scene.add(Element::rectangle(0.0, 0.0, 20.0, 20.0)).unwrap();
    let b = scene.add(Element::rectangle(200.0, 0.0, 20.0, 20.0)).unwrap();
    let connector = scene
        .create_connector(EndpointRef::Element(a), EndpointRef::Element(b), RoutingMode::Straight)
        .unwrap();
    let before = scene.history_len();

    scene.delete(a).unwrap();
    assert_eq!(scene.history_len(), before + 1);
    assert_eq!(scene.get(connector).unwrap().as_connector().unwrap().start.attached, None);

    scene.undo().unwrap();
    assert!(scene.get(a).is_some());
    assert_eq!(scene.get(connector).unwrap().as_connector().unwrap().start.attached, Some(a));
    assert_eq!(scene.connectors().connectors_for(a), &[connector]);
}

#[test]
fn batch_undo_restores_every_element() {
    init_logging();
    let mut scene = Scene::default();
    let ids: Vec<_> = (0..5)
        .map(|i| scene.add(Element::rectangle(i as f64 * 100.0, 0.0, 50.0, 50.0)).unwrap())
        .collect();

    let updates = ids
        .iter()
        .map(|&id| (id, ElementPatch::new().with_rotation(1.0).with_hidden(true)))
        .collect();
    scene.batch_update(updates, UpdateOptions::commit("Rotate all")).unwrap();
    scene.undo().unwrap();

    for id in &ids {
        let element = scene.get(*id).unwrap();
        assert!(element.rotation.abs() < f64::EPSILON);
        assert!(!element.hidden);
    }
    scene.redo().unwrap();
    assert!(ids.iter().all(|id| scene.get(*id).unwrap().hidden));
}

#[test]
fn cancel_gesture_leaves_no_trace() {
    init_logging();
    let mut scene = Scene::default();
    let id = scene.add(Element::rectangle(0.0, 0.0, 40.0, 40.0)).unwrap();

    for step in 1..=5 {
        scene
            .update(id, ElementPatch::position(step as f64 * 10.0, 0.0), UpdateOptions::gesture())
            .unwrap();
    }
    assert_eq!(scene.cancel_gesture(), vec![id]);
    assert_eq!(scene.get(id).unwrap().position, Point::ZERO);
    assert_eq!(scene.history_len(), 1);
}

#[test]
fn exclusive_section_membership() {
    init_logging();
    let mut scene = Scene::default();
    let a = scene.create_section(Rect::new(0.0, 0.0, 200.0, 200.0)).unwrap();
    let b = scene.create_section(Rect::new(300.0, 0.0, 500.0, 200.0)).unwrap();
    let el = scene.add(Element::rectangle(20.0, 20.0, 30.0, 30.0)).unwrap();

    scene.move_element_to_section(el, a).unwrap();
    scene.move_element_to_section(el, b).unwrap();

    let in_b = scene.get(b).unwrap().as_section().unwrap().contains(el);
    let in_a = scene.get(a).unwrap().as_section().unwrap().contains(el);
    assert!(in_b);
    assert!(!in_a);
}

#[test]
fn moving_into_section_reroutes_connectors() {
    init_logging();
    let mut scene = Scene::default();
    let section = scene.create_section(Rect::new(500.0, 500.0, 700.0, 700.0)).unwrap();
    let el = scene.add(Element::rectangle(0.0, 0.0, 20.0, 20.0)).unwrap();
    let anchor = scene.add(Element::rectangle(0.0, 300.0, 20.0, 20.0)).unwrap();
    let connector = scene
        .create_connector(EndpointRef::Element(el), EndpointRef::Element(anchor), RoutingMode::Straight)
        .unwrap();

    assert!(scene.move_element_to_section(el, section).unwrap());
    let path = scene.get(connector).unwrap().as_connector().unwrap().path().to_vec();
    assert_eq!(path[0], scene.bounds_of(el).unwrap().center());
}

#[test]
fn locked_elements_are_selectable_but_immutable() {
    init_logging();
    let mut scene = Scene::default();
    let mut element = Element::rectangle(0.0, 0.0, 10.0, 10.0);
    element.locked = true;
    let id = scene.add(element).unwrap();

    scene.select(id, false).unwrap();
    assert_eq!(scene.selected(), &[id]);
    assert_eq!(
        scene.update(id, ElementPatch::position(5.0, 5.0), UpdateOptions::commit("Move")),
        Err(SceneError::Locked(id))
    );
    assert_eq!(scene.get(id).unwrap().position, Point::ZERO);
}

#[test]
fn deleting_removes_all_back_references() {
    init_logging();
    let mut scene = Scene::default();
    let section = scene.create_section(Rect::new(0.0, 0.0, 500.0, 500.0)).unwrap();
    let a = scene.add(Element::rectangle(10.0, 10.0, 10.0, 10.0)).unwrap();
    let b = scene.add(Element::rectangle(100.0, 100.0, 10.0, 10.0)).unwrap();
    scene.recalculate_containment(section).unwrap();
    let connector = scene
        .create_connector(EndpointRef::Element(a), EndpointRef::Element(b), RoutingMode::Orthogonal)
        .unwrap();
    scene.select(a, false).unwrap();

    scene.delete(a).unwrap();
    assert!(scene.selected().is_empty());
    assert!(!scene.get(section).unwrap().as_section().unwrap().contains(a));
    let c = scene.get(connector).unwrap().as_connector().unwrap();
    assert_eq!(c.start.attached, None);
    assert_eq!(c.start.point, Point::new(15.0, 15.0));
}

#[test]
fn collapse_hides_and_restores_members() {
    init_logging();
    let mut scene = Scene::default();
    let el = scene.add(Element::rectangle(10.0, 10.0, 10.0, 10.0)).unwrap();
    let section = scene.create_section(Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();

    scene.set_section_collapsed(section, true).unwrap();
    assert!(scene.get(el).unwrap().hidden);
    assert!(scene.get(section).unwrap().as_section().unwrap().contains(el));

    scene.set_section_collapsed(section, false).unwrap();
    assert!(!scene.get(el).unwrap().hidden);
}

#[test]
fn translate_section_carries_members() {
    init_logging();
    let mut scene = Scene::default();
    let el = scene.add(Element::rectangle(10.0, 10.0, 10.0, 10.0)).unwrap();
    let section = scene.create_section(Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
    scene.translate_section(section, Vec2::new(200.0, 0.0)).unwrap();
    assert_eq!(scene.get(el).unwrap().position, Point::new(210.0, 10.0));
    assert_eq!(scene.get(el).unwrap().section_id(), Some(section));
}

#[test]
fn auto_containment_tracks_drags() {
    init_logging();
    let mut scene = Scene::with_config(SceneConfig {
        auto_containment: true,
        ..SceneConfig::default()
    });
    let section = scene.create_section(Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
    let el = scene.add(Element::rectangle(200.0, 200.0, 10.0, 10.0)).unwrap();
    assert_eq!(scene.get(el).unwrap().section_id(), None);

    scene
        .update(el, ElementPatch::position(20.0, 20.0), UpdateOptions::commit("Move"))
        .unwrap();
    assert_eq!(scene.get(el).unwrap().section_id(), Some(section));

    scene.undo().unwrap();
    assert_eq!(scene.get(el).unwrap().section_id(), None);
    assert!(!scene.get(section).unwrap().as_section().unwrap().contains(el));
}

#[test]
fn cache_pressure_refuses_and_evicts() {
    init_logging();
    let cache = CacheManager::new(CacheConfig {
        memory_limit_bytes: 10_000,
        ..CacheConfig::default()
    })
    .shared();
    let mut scene = Scene::new(SceneConfig::default(), cache.clone());
    let mut handle = CountingHandle(0);

    for i in 0..11 {
        // 20x10 at 4 bytes per pixel: 800 bytes each.
        let id = scene.add(Element::rectangle(i as f64 * 30.0, 0.0, 20.0, 10.0)).unwrap();
        assert!(scene.apply_cache(&mut handle, id));
    }
    assert_eq!(cache.lock().stats().used_bytes, 8_800);

    let before = cache.lock().stats().total_cached;
    let table = scene
        .add(Element::new(Point::ZERO, ElementKind::Table(Table::new(10, 10))))
        .unwrap();
    assert!(!scene.should_cache(table));
    assert!(cache.lock().stats().total_cached < before);
    assert_eq!(handle.0, 11);
}

#[test]
fn listener_sees_derived_events() {
    init_logging();
    let mut scene = Scene::default();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    scene.subscribe(move |event| {
        sink.borrow_mut().push(event.clone());
        Ok(())
    });

    let a = scene.add(Element::rectangle(0.0, 0.0, 10.0, 10.0)).unwrap();
    let b = scene.add(Element::rectangle(100.0, 0.0, 10.0, 10.0)).unwrap();
    let connector = scene
        .create_connector(EndpointRef::Element(a), EndpointRef::Element(b), RoutingMode::Straight)
        .unwrap();
    events.borrow_mut().clear();

    scene
        .update(b, ElementPatch::position(100.0, 50.0), UpdateOptions::gesture())
        .unwrap();
    let seen = events.borrow();
    assert_eq!(seen[0], SceneEvent::Updated { id: b, geometry: true });
    assert!(seen.contains(&SceneEvent::Updated {
        id: connector,
        geometry: true
    }));
}

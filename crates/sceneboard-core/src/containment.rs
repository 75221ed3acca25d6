//! Section containment: which elements lie inside which section.
//!
//! Membership is derived from bounding-box enclosure and cached on each
//! section. It is recomputed on request, or on every geometry change when
//! `auto_containment` is enabled. An element belongs to at most one section;
//! when several enclose it the smallest one wins, ties going to the section
//! further back in paint order.

use crate::error::{SceneError, SceneResult};
use crate::event::SceneEvent;
use crate::geometry::{ensure_rect, rect_contains_rect};
use crate::shapes::{Element, ElementId, ElementKind, ElementPatch, Section};
use crate::store::{ElementStore, UpdateOptions};
use kurbo::{Point, Rect, Vec2};

/// Resolved bounds of one section, in paint order.
#[derive(Debug, Clone, Copy)]
struct SectionBounds {
    id: ElementId,
    rect: Rect,
}

/// Maintains section membership caches and back references.
#[derive(Debug, Clone, Default)]
pub struct ContainmentEngine {
    auto_containment: bool,
}

impl ContainmentEngine {
    pub fn new(auto_containment: bool) -> Self {
        Self { auto_containment }
    }

    pub fn auto_containment(&self) -> bool {
        self.auto_containment
    }

    /// Recompute membership on every geometry change instead of on request.
    pub fn set_auto_containment(&mut self, enabled: bool) {
        self.auto_containment = enabled;
    }

    /// Create a section covering `bounds` and collect the elements already
    /// inside it. The insertion is left pending for the caller to record.
    pub fn create_section(&self, store: &mut ElementStore, id: ElementId, bounds: Rect) -> SceneResult<ElementId> {
        ensure_rect(bounds, "section bounds")?;
        let section = Element::with_id(
            id,
            Point::new(bounds.x0, bounds.y0),
            ElementKind::Section(Section::new(bounds.width(), bounds.height())),
        );
        store.add_with(section, UpdateOptions::gesture())?;
        self.recalculate_containment(store, id)?;
        Ok(id)
    }

    /// Move/resize a section to `bounds` and recompute its members.
    pub fn update_section_bounds(
        &self,
        store: &mut ElementStore,
        section_id: ElementId,
        bounds: Rect,
    ) -> SceneResult<Vec<ElementId>> {
        ensure_rect(bounds, "section bounds")?;
        section_of(store, section_id)?;
        let patch = ElementPatch::position(bounds.x0, bounds.y0).with_size(bounds.width(), bounds.height());
        store.update(section_id, patch, UpdateOptions::gesture())?;
        self.recalculate_containment(store, section_id)
    }

    /// The section an element with `bounds` would belong to.
    pub fn check_containment(&self, store: &ElementStore, bounds: Rect) -> Option<ElementId> {
        smallest_enclosing(&sections(store), bounds)
    }

    /// Recompute the members of one section from geometry.
    ///
    /// Elements the section gains are removed from any other section; elements
    /// it loses move to whichever other section encloses them, if any.
    pub fn recalculate_containment(&self, store: &mut ElementStore, section_id: ElementId) -> SceneResult<Vec<ElementId>> {
        let section = section_of(store, section_id)?;
        let previous = section.contained.clone();
        let section_rect = store.bounds_of(section_id)?;

        self.prune_missing(store, section_id, previous.iter().copied())?;

        let sections = sections(store);
        let candidates: Vec<(ElementId, Rect)> = store
            .elements_in_order()
            .filter(|e| !e.is_section())
            .filter_map(|e| resolve_bounds(store, e).map(|rect| (e.id(), rect)))
            .filter(|(id, rect)| {
                rect_contains_rect(section_rect, *rect)
                    || previous.contains(id)
                    || store.get(*id).is_some_and(|e| e.section == Some(section_id))
            })
            .collect();

        for (id, rect) in candidates {
            assign(store, &sections, id, smallest_enclosing(&sections, rect))?;
        }

        let members: Vec<ElementId> = section_of(store, section_id)?.contained().iter().copied().collect();
        log::debug!("Section {} contains {} elements", section_id, members.len());
        Ok(members)
    }

    /// Recompute membership of every element against every section.
    ///
    /// Returns the number of elements whose section changed.
    pub fn recalculate_all(&self, store: &mut ElementStore) -> SceneResult<usize> {
        let sections = sections(store);
        for section in &sections {
            let listed: Vec<ElementId> = section_of(store, section.id)?.contained().iter().copied().collect();
            self.prune_missing(store, section.id, listed)?;
        }

        let elements: Vec<(ElementId, Option<Rect>, bool)> = store
            .elements_in_order()
            .map(|e| (e.id(), resolve_bounds(store, e), e.is_section()))
            .collect();

        let mut changed = 0;
        for (id, rect, is_section) in elements {
            let target = match (is_section, rect) {
                (true, _) => None,
                (false, Some(rect)) => smallest_enclosing(&sections, rect),
                // Unresolvable geometry keeps whatever membership it had.
                (false, None) => continue,
            };
            if assign(store, &sections, id, target)? {
                changed += 1;
            }
        }
        log::debug!("Recalculated containment for {} sections, {} changes", sections.len(), changed);
        Ok(changed)
    }

    /// Put an element into a section, moving it inside if needed.
    ///
    /// Membership is exclusive: the element leaves any other section. Returns
    /// whether the element had to be moved to fit.
    pub fn move_element_to_section(
        &self,
        store: &mut ElementStore,
        element_id: ElementId,
        section_id: ElementId,
    ) -> SceneResult<bool> {
        let element = store.get(element_id).ok_or(SceneError::NotFound(element_id))?;
        if element.is_section() {
            return Err(SceneError::WrongKind {
                id: element_id,
                expected: "non-section element",
            });
        }
        let position = element.position;
        section_of(store, section_id)?;
        let section_rect = store.bounds_of(section_id)?;
        let bounds = store.bounds_of(element_id)?;

        let delta = clamp_delta(bounds, section_rect);
        let moved = delta != Vec2::ZERO;
        if moved {
            let target = position + delta;
            store.update(element_id, ElementPatch::position(target.x, target.y), UpdateOptions::gesture())?;
        }
        let sections = sections(store);
        assign(store, &sections, element_id, Some(section_id))?;
        Ok(moved)
    }

    /// Drop an element from a section's cache.
    ///
    /// Returns false if the section did not list it. A missing element is
    /// still removed from the cache.
    pub fn remove_element_from_section(
        &self,
        store: &mut ElementStore,
        element_id: ElementId,
        section_id: ElementId,
    ) -> SceneResult<bool> {
        if !section_of(store, section_id)?.contains(element_id) {
            return Ok(false);
        }
        detach(store, section_id, element_id)?;
        Ok(true)
    }

    /// Collapse or expand a section.
    ///
    /// Collapsing hides the members that are visible; expanding shows exactly
    /// those again. Membership is untouched. Returns the ids whose visibility
    /// changed.
    pub fn set_collapsed(&self, store: &mut ElementStore, section_id: ElementId, collapsed: bool) -> SceneResult<Vec<ElementId>> {
        let section = section_of(store, section_id)?;
        if section.collapsed == collapsed {
            return Ok(Vec::new());
        }

        let affected: Vec<ElementId> = if collapsed {
            section
                .contained
                .iter()
                .copied()
                .filter(|id| store.get(*id).is_some_and(|e| !e.hidden))
                .collect()
        } else {
            section
                .hidden_by_collapse
                .iter()
                .copied()
                .filter(|id| store.contains(*id))
                .collect()
        };

        for &id in &affected {
            store.modify(id, false, |e| e.hidden = collapsed)?;
        }
        let hidden = if collapsed { affected.clone() } else { Vec::new() };
        store.modify(section_id, false, |e| {
            if let Some(s) = e.as_section_mut() {
                s.collapsed = collapsed;
                s.hidden_by_collapse = hidden;
            }
        })?;
        log::debug!(
            "{} section {} ({} elements)",
            if collapsed { "Collapsed" } else { "Expanded" },
            section_id,
            affected.len()
        );
        Ok(affected)
    }

    /// Move a section together with its members. Atomic: a locked member
    /// fails the whole move.
    pub fn translate_section(&self, store: &mut ElementStore, section_id: ElementId, delta: Vec2) -> SceneResult<Vec<ElementId>> {
        let section = section_of(store, section_id)?;
        let mut ids = vec![section_id];
        ids.extend(section.contained.iter().copied().filter(|id| store.contains(*id)));

        let updates = ids
            .iter()
            .filter_map(|&id| store.get(id).map(|e| (id, e.position + delta)))
            .map(|(id, p)| (id, ElementPatch::position(p.x, p.y)))
            .collect();
        store.batch_update(updates, UpdateOptions::gesture())?;
        Ok(ids)
    }

    /// React to a store change.
    pub fn handle_event(&self, store: &mut ElementStore, event: &SceneEvent) -> SceneResult<()> {
        match event {
            SceneEvent::Removed(element) => self.on_removed(store, element),
            SceneEvent::Added(id) | SceneEvent::Updated { id, geometry: true } if self.auto_containment => {
                self.recheck(store, *id)
            }
            SceneEvent::HistoryRestored { ids } if self.auto_containment => {
                for &id in ids {
                    if let Err(err) = self.recheck(store, id) {
                        log::warn!("Containment recheck of {id} failed: {err}");
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn recheck(&self, store: &mut ElementStore, id: ElementId) -> SceneResult<()> {
        let Some(element) = store.get(id) else {
            return Ok(());
        };
        if element.is_section() {
            self.recalculate_containment(store, id)?;
            return Ok(());
        }
        let Some(rect) = resolve_bounds(store, element) else {
            return Ok(());
        };
        let sections = sections(store);
        let target = smallest_enclosing(&sections, rect);
        assign(store, &sections, id, target)?;
        Ok(())
    }

    fn on_removed(&self, store: &mut ElementStore, removed: &Element) -> SceneResult<()> {
        let removed_id = removed.id();

        if let Some(section) = removed.as_section() {
            // Members lose their back reference; anything the collapse hid reappears.
            for &id in &section.contained {
                let unhide = section.hidden_by_collapse.contains(&id);
                if store.get(id).is_some_and(|e| e.section == Some(removed_id) || unhide) {
                    store.modify(id, false, |e| {
                        if e.section == Some(removed_id) {
                            e.section = None;
                        }
                        if unhide {
                            e.hidden = false;
                        }
                    })?;
                }
            }
            return Ok(());
        }

        let listing: Vec<ElementId> = store
            .elements_in_order()
            .filter(|e| e.as_section().is_some_and(|s| s.contains(removed_id)))
            .map(Element::id)
            .collect();
        for section_id in listing {
            store.modify(section_id, false, |e| {
                if let Some(s) = e.as_section_mut() {
                    s.remove(removed_id);
                }
            })?;
        }
        Ok(())
    }

    /// Drop ids from a section's cache that no longer exist in the store.
    fn prune_missing(
        &self,
        store: &mut ElementStore,
        section_id: ElementId,
        listed: impl IntoIterator<Item = ElementId>,
    ) -> SceneResult<()> {
        let missing: Vec<ElementId> = listed.into_iter().filter(|id| !store.contains(*id)).collect();
        if missing.is_empty() {
            return Ok(());
        }
        store.modify(section_id, false, |e| {
            if let Some(s) = e.as_section_mut() {
                for id in &missing {
                    s.remove(*id);
                }
            }
        })
    }
}

fn section_of(store: &ElementStore, id: ElementId) -> SceneResult<&Section> {
    store
        .get(id)
        .ok_or(SceneError::NotFound(id))?
        .as_section()
        .ok_or(SceneError::WrongKind { id, expected: "section" })
}

/// Bounds of an element, or `None` (logged) when its geometry is unusable.
fn resolve_bounds(store: &ElementStore, element: &Element) -> Option<Rect> {
    match store.element_bounds(element) {
        Ok(rect) => Some(rect),
        Err(err) => {
            log::warn!("Skipping {} {} in containment: {}", element.kind.name(), element.id(), err);
            None
        }
    }
}

fn sections(store: &ElementStore) -> Vec<SectionBounds> {
    store
        .elements_in_order()
        .filter(|e| e.is_section())
        .filter_map(|e| resolve_bounds(store, e).map(|rect| SectionBounds { id: e.id(), rect }))
        .collect()
}

/// Smallest section enclosing `bounds`; equal areas resolve to the earliest
/// in paint order.
fn smallest_enclosing(sections: &[SectionBounds], bounds: Rect) -> Option<ElementId> {
    let mut best: Option<(ElementId, f64)> = None;
    for section in sections {
        if !rect_contains_rect(section.rect, bounds) {
            continue;
        }
        let area = section.rect.area();
        if best.is_none_or(|(_, best_area)| area < best_area) {
            best = Some((section.id, area));
        }
    }
    best.map(|(id, _)| id)
}

/// Translation that brings `inner` inside `outer`. Elements larger than the
/// section are aligned to its top-left edge.
fn clamp_delta(inner: Rect, outer: Rect) -> Vec2 {
    fn axis(lo: f64, hi: f64, outer_lo: f64, outer_hi: f64) -> f64 {
        if lo < outer_lo || hi - lo > outer_hi - outer_lo {
            outer_lo - lo
        } else if hi > outer_hi {
            outer_hi - hi
        } else {
            0.0
        }
    }
    Vec2::new(
        axis(inner.x0, inner.x1, outer.x0, outer.x1),
        axis(inner.y0, inner.y1, outer.y0, outer.y1),
    )
}

/// Make `target` the only one of `sections` listing `element_id`. Returns
/// whether anything changed.
fn assign(
    store: &mut ElementStore,
    sections: &[SectionBounds],
    element_id: ElementId,
    target: Option<ElementId>,
) -> SceneResult<bool> {
    let element = store.get(element_id).ok_or(SceneError::NotFound(element_id))?;
    let current = element.section;
    let already_hidden = element.hidden;
    let lists = |sid: ElementId| {
        store
            .get(sid)
            .and_then(Element::as_section)
            .is_some_and(|s| s.contains(element_id))
    };

    let listed = target.is_none_or(&lists);
    let others: Vec<ElementId> = sections
        .iter()
        .map(|s| s.id)
        .filter(|&sid| Some(sid) != target && lists(sid))
        .collect();
    if current == target && listed && others.is_empty() {
        return Ok(false);
    }

    for section_id in others {
        detach(store, section_id, element_id)?;
    }

    let mut hide = false;
    if let Some(section_id) = target {
        if !listed {
            hide = store.modify(section_id, false, |e| match e.as_section_mut() {
                Some(s) => {
                    s.insert(element_id);
                    // Entering a collapsed section hides the element like its peers.
                    let hide = s.collapsed && !already_hidden;
                    if hide {
                        s.hidden_by_collapse.push(element_id);
                    }
                    hide
                }
                None => false,
            })?;
        }
    }

    store.modify(element_id, false, |e| {
        e.section = target;
        if hide {
            e.hidden = true;
        }
    })?;
    Ok(true)
}

/// Remove `element_id` from one section's cache and clear its back reference.
fn detach(store: &mut ElementStore, section_id: ElementId, element_id: ElementId) -> SceneResult<()> {
    let was_hidden = store.modify(section_id, false, |e| match e.as_section_mut() {
        Some(s) => {
            let hidden = s.hidden_by_collapse.contains(&element_id);
            s.remove(element_id);
            hidden
        }
        None => false,
    })?;
    if store.contains(element_id) {
        store.modify(element_id, false, |e| {
            if e.section == Some(section_id) {
                e.section = None;
            }
            if was_hidden {
                e.hidden = false;
            }
        })?;
    }
    Ok(())
}

//! Change notifications emitted by the scene.

use crate::shapes::{Element, ElementId};

/// A change to the scene, delivered synchronously before the mutating call
/// returns.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// An element was inserted.
    Added(ElementId),
    /// An element's fields changed. `geometry` is set when its bounds may
    /// have changed.
    Updated { id: ElementId, geometry: bool },
    /// An element was deleted; carries its last state.
    Removed(Box<Element>),
    /// The paint order changed.
    Reordered,
    /// The selection or editing focus changed.
    SelectionChanged,
    /// Undo, redo or gesture cancellation replaced the state of these ids.
    HistoryRestored { ids: Vec<ElementId> },
}

impl SceneEvent {
    /// Element the event is keyed by, if it concerns a single element.
    pub fn element_id(&self) -> Option<ElementId> {
        match self {
            SceneEvent::Added(id) => Some(*id),
            SceneEvent::Updated { id, .. } => Some(*id),
            SceneEvent::Removed(element) => Some(element.id()),
            _ => None,
        }
    }

    /// Whether the event changes the set or order of elements.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            SceneEvent::Added(_) | SceneEvent::Removed(_) | SceneEvent::Reordered | SceneEvent::HistoryRestored { .. }
        )
    }
}

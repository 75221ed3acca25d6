//! Group element for combining multiple elements.

use super::ElementId;
use serde::{Deserialize, Serialize};

/// A group of elements manipulated as a unit.
///
/// Children stay top-level elements of the store; the group only refers to
/// them by id. Its bounds are the union of its children's bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Child element ids in paint order.
    pub children: Vec<ElementId>,
}

impl Group {
    pub fn new(children: Vec<ElementId>) -> Self {
        Self { children }
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.children.contains(&id)
    }
}

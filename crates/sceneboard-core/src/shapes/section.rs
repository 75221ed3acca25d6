//! Section container shape.

use super::{ElementId, ShapeTrait};
use indexmap::IndexSet;
use kurbo::Size;
use serde::{Deserialize, Serialize};

/// A rectangular region that groups the elements lying inside it.
///
/// `contained` is a cache recomputed from geometry by the containment
/// engine, not a source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub title: String,
    /// Ids of the elements found inside at the last recompute, in the
    /// order they joined.
    #[serde(default)]
    pub(crate) contained: IndexSet<ElementId>,
    #[serde(default)]
    pub(crate) collapsed: bool,
    /// Members that collapsing hid, restored on expand.
    #[serde(default)]
    pub(crate) hidden_by_collapse: Vec<ElementId>,
}

impl Section {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            title: String::new(),
            contained: IndexSet::new(),
            collapsed: false,
            hidden_by_collapse: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Members in the order they joined.
    pub fn contained(&self) -> &IndexSet<ElementId> {
        &self.contained
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.contained.contains(&id)
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub(crate) fn insert(&mut self, id: ElementId) -> bool {
        self.contained.insert(id)
    }

    pub(crate) fn remove(&mut self, id: ElementId) -> bool {
        self.hidden_by_collapse.retain(|&c| c != id);
        self.contained.shift_remove(&id)
    }
}

impl ShapeTrait for Section {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn resize(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
    }
}

//! Sticky note shape.

use super::{SerializableColor, ShapeTrait};
use kurbo::Size;
use serde::{Deserialize, Serialize};

/// A colored note with text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyNote {
    pub width: f64,
    pub height: f64,
    pub text: String,
    /// Note background color.
    pub color: SerializableColor,
}

impl StickyNote {
    pub const DEFAULT_SIZE: f64 = 200.0;

    pub fn new(text: impl Into<String>) -> Self {
        Self {
            width: Self::DEFAULT_SIZE,
            height: Self::DEFAULT_SIZE,
            text: text.into(),
            color: SerializableColor::sticky_yellow(),
        }
    }
}

impl ShapeTrait for StickyNote {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn resize(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
    }
}

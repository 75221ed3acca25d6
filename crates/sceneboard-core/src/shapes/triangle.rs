//! Triangle shape.

use super::ShapeTrait;
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};

/// An isosceles triangle inscribed in its box, apex at the top center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub width: f64,
    pub height: f64,
}

impl Triangle {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Vertices relative to the element position.
    pub fn vertices(&self) -> [Point; 3] {
        [
            Point::new(self.width / 2.0, 0.0),
            Point::new(self.width, self.height),
            Point::new(0.0, self.height),
        ]
    }
}

impl ShapeTrait for Triangle {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn resize(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
    }
}

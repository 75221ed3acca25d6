//! Ellipse shape.

use super::ShapeTrait;
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};

/// An ellipse (or circle) inscribed in its bounding box.
///
/// The owning element's position is the top-left corner of the box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    /// Horizontal radius.
    pub radius_x: f64,
    /// Vertical radius.
    pub radius_y: f64,
}

impl Ellipse {
    pub fn new(radius_x: f64, radius_y: f64) -> Self {
        Self { radius_x, radius_y }
    }

    /// Create a circle.
    pub fn circle(radius: f64) -> Self {
        Self::new(radius, radius)
    }

    /// Center relative to the element position.
    pub fn local_center(&self) -> Point {
        Point::new(self.radius_x, self.radius_y)
    }
}

impl ShapeTrait for Ellipse {
    fn size(&self) -> Size {
        Size::new(self.radius_x * 2.0, self.radius_y * 2.0)
    }

    fn resize(&mut self, size: Size) {
        self.radius_x = size.width / 2.0;
        self.radius_y = size.height / 2.0;
    }
}

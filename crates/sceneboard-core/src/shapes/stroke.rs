//! Pen stroke (freehand drawing) shape.

use super::ShapeTrait;
use crate::error::SceneResult;
use crate::geometry::{bounding_box, ensure_point};
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// A freehand stroke. Points are relative to the element position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PenStroke {
    pub points: Vec<Point>,
}

impl PenStroke {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Add a point to the path.
    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl ShapeTrait for PenStroke {
    fn size(&self) -> Size {
        self.local_bounds().size()
    }

    fn local_bounds(&self) -> Rect {
        bounding_box(&self.points).unwrap_or(Rect::ZERO)
    }

    /// Scale points about the top-left of their bounding box.
    fn resize(&mut self, size: Size) {
        let bounds = self.local_bounds();
        let sx = if bounds.width() > f64::EPSILON { size.width / bounds.width() } else { 1.0 };
        let sy = if bounds.height() > f64::EPSILON { size.height / bounds.height() } else { 1.0 };
        for p in &mut self.points {
            p.x = bounds.x0 + (p.x - bounds.x0) * sx;
            p.y = bounds.y0 + (p.y - bounds.y0) * sy;
        }
    }

    fn validate(&self) -> SceneResult<()> {
        self.points.iter().try_for_each(|p| ensure_point(*p, "stroke point"))
    }
}

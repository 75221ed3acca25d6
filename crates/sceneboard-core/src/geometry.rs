//! Bounding-box math and connector path generation.

use crate::error::{SceneError, SceneResult};
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// How a connector path is routed between its two endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingMode {
    /// A single straight segment.
    Straight,
    /// Right-angle ("elbow") routing through the midpoint.
    #[default]
    Orthogonal,
}

/// Closed-interval enclosure test: touching edges count as contained.
pub fn rect_contains_rect(outer: Rect, inner: Rect) -> bool {
    inner.x0 >= outer.x0 && inner.y0 >= outer.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

/// Closed-interval overlap test; zero-area rectangles on an edge overlap.
pub fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && a.x1 >= b.x0 && a.y0 <= b.y1 && a.y1 >= b.y0
}

/// Bounding rectangle from an origin and a size.
pub fn rect_from_origin_size(origin: Point, size: Size) -> Rect {
    Rect::new(origin.x, origin.y, origin.x + size.width, origin.y + size.height)
}

/// Bounding box of a point set, `None` when empty.
pub fn bounding_box(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    let mut rect = Rect::from_points(*first, *first);
    for p in &points[1..] {
        rect = rect.union_pt(*p);
    }
    Some(rect)
}

/// Union of a set of rectangles, `None` when empty.
pub fn union_all(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
    rects.into_iter().reduce(|acc, r| acc.union(r))
}

/// Compute the points of a connector path from `start` to `end`.
///
/// Pure function of its inputs. Orthogonal routing goes horizontal-first when
/// the horizontal distance dominates, vertical-first otherwise. Coincident
/// endpoints produce the degenerate path `[start, start]`.
pub fn calculate_path(start: Point, end: Point, mode: RoutingMode) -> Vec<Point> {
    let dx = end.x - start.x;
    let dy = end.y - start.y;

    if dx == 0.0 && dy == 0.0 {
        return vec![start, start];
    }

    match mode {
        RoutingMode::Straight => vec![start, end],
        RoutingMode::Orthogonal => {
            if dx.abs() > dy.abs() {
                let mid_x = start.x + dx / 2.0;
                vec![start, Point::new(mid_x, start.y), Point::new(mid_x, end.y), end]
            } else {
                let mid_y = start.y + dy / 2.0;
                vec![start, Point::new(start.x, mid_y), Point::new(end.x, mid_y), end]
            }
        }
    }
}

pub(crate) fn ensure_finite(value: f64, what: &str) -> SceneResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SceneError::InvalidGeometry(format!("{what} must be finite, got {value}")))
    }
}

pub(crate) fn ensure_point(point: Point, what: &str) -> SceneResult<()> {
    ensure_finite(point.x, what)?;
    ensure_finite(point.y, what)
}

pub(crate) fn ensure_extent(value: f64, what: &str) -> SceneResult<()> {
    ensure_finite(value, what)?;
    if value < 0.0 {
        return Err(SceneError::InvalidGeometry(format!("{what} must be non-negative, got {value}")));
    }
    Ok(())
}

pub(crate) fn ensure_size(size: Size, what: &str) -> SceneResult<()> {
    ensure_extent(size.width, &format!("{what} width"))?;
    ensure_extent(size.height, &format!("{what} height"))
}

pub(crate) fn ensure_rect(rect: Rect, what: &str) -> SceneResult<()> {
    ensure_point(Point::new(rect.x0, rect.y0), what)?;
    ensure_point(Point::new(rect.x1, rect.y1), what)?;
    if rect.x1 < rect.x0 || rect.y1 < rect.y0 {
        return Err(SceneError::InvalidGeometry(format!("{what} has negative extent: {rect:?}")));
    }
    Ok(())
}

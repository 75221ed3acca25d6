//! Viewport pan/zoom state.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Padding (in screen pixels) left around content by `fit_to_bounds`.
pub const FIT_PADDING: f64 = 40.0;

/// The visible window onto the scene.
///
/// World coordinates map to screen coordinates as `screen = world * zoom + offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Screen-space translation.
    pub offset: Vec2,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            min_zoom: 0.1,
            max_zoom: 10.0,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// World-to-screen transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Screen-to-world transform.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Pan by a screen-space delta.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Zoom by `factor`, keeping `screen_point` over the same world point.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        let anchor = self.screen_to_world(screen_point);
        self.zoom = zoom;
        self.offset += screen_point - self.world_to_screen(anchor);
    }

    /// World-space rectangle visible in a viewport of `size` screen pixels.
    pub fn visible_rect(&self, size: Size) -> Rect {
        let top_left = self.screen_to_world(Point::ZERO);
        let bottom_right = self.screen_to_world(Point::new(size.width, size.height));
        Rect::from_points(top_left, bottom_right)
    }

    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.zoom = 1.0;
    }

    /// Zoom and center so `bounds` fills a viewport of `size`, leaving
    /// `padding` screen pixels on each side.
    pub fn fit_to_bounds(&mut self, bounds: Rect, size: Size, padding: f64) {
        if bounds.is_zero_area() {
            self.reset();
            self.offset = Vec2::new(size.width / 2.0, size.height / 2.0) - bounds.center().to_vec2();
            return;
        }

        let available = Size::new(
            (size.width - padding * 2.0).max(1.0),
            (size.height - padding * 2.0).max(1.0),
        );
        self.zoom = (available.width / bounds.width())
            .min(available.height / bounds.height())
            .clamp(self.min_zoom, self.max_zoom);

        let center = bounds.center();
        self.offset = Vec2::new(
            size.width / 2.0 - center.x * self.zoom,
            size.height / 2.0 - center.y * self.zoom,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_by_default() {
        let viewport = Viewport::new();
        let p = Point::new(100.0, 200.0);
        assert_eq!(viewport.screen_to_world(p), p);
    }

    #[test]
    fn test_offset_and_zoom() {
        let viewport = Viewport {
            offset: Vec2::new(50.0, 100.0),
            zoom: 2.0,
            ..Viewport::default()
        };
        let world = viewport.screen_to_world(Point::new(150.0, 300.0));
        assert!((world.x - 50.0).abs() < f64::EPSILON);
        assert!((world.y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zoom_at_keeps_anchor() {
        let mut viewport = Viewport::new();
        let anchor = Point::new(300.0, 200.0);
        let before = viewport.screen_to_world(anchor);
        viewport.zoom_at(anchor, 2.5);
        let after = viewport.screen_to_world(anchor);
        assert!((before - after).hypot() < 1e-9);
        assert!((viewport.zoom - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zoom_clamped() {
        let mut viewport = Viewport::new();
        viewport.zoom_at(Point::ZERO, 0.0001);
        assert!((viewport.zoom - viewport.min_zoom).abs() < f64::EPSILON);
        viewport.zoom_at(Point::ZERO, -3.0);
        assert!((viewport.zoom - viewport.min_zoom).abs() < f64::EPSILON);
    }

    #[test]
    fn test_visible_rect() {
        let mut viewport = Viewport::new();
        viewport.pan(Vec2::new(-100.0, 0.0));
        viewport.zoom = 2.0;
        let rect = viewport.visible_rect(Size::new(800.0, 600.0));
        assert_eq!(rect, Rect::new(50.0, 0.0, 450.0, 300.0));
    }

    #[test]
    fn test_fit_to_bounds_centers_content() {
        let mut viewport = Viewport::new();
        let bounds = Rect::new(0.0, 0.0, 400.0, 200.0);
        let size = Size::new(800.0, 600.0);
        viewport.fit_to_bounds(bounds, size, 0.0);
        assert!((viewport.zoom - 2.0).abs() < f64::EPSILON);
        let center = viewport.world_to_screen(bounds.center());
        assert!((center.x - 400.0).abs() < 1e-9);
        assert!((center.y - 300.0).abs() < 1e-9);
    }
}

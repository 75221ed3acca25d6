//! Connector element: a routed path between two endpoints.

use super::ElementId;
use crate::error::SceneResult;
use crate::geometry::{bounding_box, calculate_path, ensure_point, RoutingMode};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Which end of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum End {
    Start,
    End,
}

/// How an endpoint is specified when creating a connector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndpointRef {
    /// Follow the center of an element.
    Element(ElementId),
    /// A fixed coordinate.
    Point(Point),
}

/// One end of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Element this endpoint follows, if any.
    pub attached: Option<ElementId>,
    /// Fixed coordinate when unattached; the last resolved coordinate
    /// otherwise.
    pub point: Point,
}

impl Endpoint {
    pub fn free(point: Point) -> Self {
        Self { attached: None, point }
    }

    pub fn attached(id: ElementId, point: Point) -> Self {
        Self {
            attached: Some(id),
            point,
        }
    }
}

/// A path between two endpoints. The path is derived, never hand-set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub start: Endpoint,
    pub end: Endpoint,
    #[serde(default)]
    pub routing: RoutingMode,
    /// Derived path points, recomputed from the endpoints.
    #[serde(default)]
    pub(crate) path: Vec<Point>,
}

impl Connector {
    pub fn new(start: Endpoint, end: Endpoint, routing: RoutingMode) -> Self {
        let path = calculate_path(start.point, end.point, routing);
        Self {
            start,
            end,
            routing,
            path,
        }
    }

    pub fn path(&self) -> &[Point] {
        &self.path
    }

    pub fn endpoint(&self, end: End) -> &Endpoint {
        match end {
            End::Start => &self.start,
            End::End => &self.end,
        }
    }

    pub fn endpoint_mut(&mut self, end: End) -> &mut Endpoint {
        match end {
            End::Start => &mut self.start,
            End::End => &mut self.end,
        }
    }

    /// Whether either end follows `id`.
    pub fn is_attached_to(&self, id: ElementId) -> bool {
        self.start.attached == Some(id) || self.end.attached == Some(id)
    }

    /// Element ids this connector follows (deduplicated).
    pub fn attachments(&self) -> Vec<ElementId> {
        let mut ids: Vec<ElementId> = [self.start.attached, self.end.attached].into_iter().flatten().collect();
        ids.dedup();
        ids
    }

    /// Rebuild the path from the endpoints' current coordinates.
    pub(crate) fn reroute(&mut self) {
        self.path = calculate_path(self.start.point, self.end.point, self.routing);
    }

    pub(crate) fn bounds(&self) -> Rect {
        bounding_box(&self.path)
            .or_else(|| bounding_box(&[self.start.point, self.end.point]))
            .unwrap_or(Rect::ZERO)
    }

    pub(crate) fn translate(&mut self, delta: Vec2) {
        self.start.point += delta;
        self.end.point += delta;
        for p in &mut self.path {
            *p += delta;
        }
    }

    pub(crate) fn validate(&self) -> SceneResult<()> {
        ensure_point(self.start.point, "connector start")?;
        ensure_point(self.end.point, "connector end")
    }
}

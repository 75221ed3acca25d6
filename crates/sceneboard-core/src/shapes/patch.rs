//! Partial element updates.

use super::{Element, ElementKind, ShapeStyle};
use crate::error::{SceneError, SceneResult};
use crate::geometry::ensure_size;
use kurbo::{Point, Size};
use std::mem;

/// A shallow set of field changes. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementPatch {
    pub position: Option<Point>,
    pub rotation: Option<f64>,
    pub locked: Option<bool>,
    pub hidden: Option<bool>,
    pub style: Option<ShapeStyle>,
    /// New box size for box-like kinds.
    pub size: Option<Size>,
    /// Text content, sticky note text or section title.
    pub text: Option<String>,
    /// Pen stroke points (relative to the element position).
    pub points: Option<Vec<Point>>,
    /// Replacement payload; must be the same variant.
    pub kind: Option<ElementKind>,
}

impl ElementPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(x: f64, y: f64) -> Self {
        Self {
            position: Some(Point::new(x, y)),
            ..Self::default()
        }
    }

    pub fn size(width: f64, height: f64) -> Self {
        Self {
            size: Some(Size::new(width, height)),
            ..Self::default()
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Point::new(x, y));
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.size = Some(Size::new(width, height));
        self
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = Some(locked);
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_points(mut self, points: Vec<Point>) -> Self {
        self.points = Some(points);
        self
    }

    pub fn with_kind(mut self, kind: ElementKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// True if the patch changes nothing but the lock flag.
    ///
    /// Such patches are the only ones allowed on locked elements.
    pub fn only_changes_lock(&self) -> bool {
        let Self { locked, .. } = self;
        locked.is_some() && Self { locked: None, ..self.clone() } == Self::default()
    }

    /// Whether the patch can change the element's bounds.
    pub fn touches_geometry(&self) -> bool {
        self.position.is_some() || self.size.is_some() || self.points.is_some() || self.kind.is_some()
    }

    /// Apply the patch to `element` in place.
    ///
    /// Callers apply to a scratch copy and validate the result before
    /// committing it, so a failed patch never leaves a half-applied element.
    pub(crate) fn apply_to(&self, element: &mut Element) -> SceneResult<()> {
        let id = element.id;

        if let Some(kind) = &self.kind {
            if mem::discriminant(kind) != mem::discriminant(&element.kind) {
                return Err(SceneError::WrongKind {
                    id,
                    expected: element.kind.name(),
                });
            }
            let mut kind = kind.clone();
            // Containment bookkeeping is derived state and survives payload swaps.
            if let (ElementKind::Section(next), ElementKind::Section(current)) = (&mut kind, &element.kind) {
                next.contained = current.contained.clone();
                next.collapsed = current.collapsed;
                next.hidden_by_collapse = current.hidden_by_collapse.clone();
            }
            element.kind = kind;
        }

        if let Some(position) = self.position {
            let delta = position - element.position;
            element.translate(delta);
        }

        if let Some(size) = self.size {
            ensure_size(size, element.kind.name())?;
            let kind_name = element.kind.name();
            match element.kind.as_shape_mut() {
                Some(shape) => shape.resize(size),
                None => {
                    return Err(SceneError::InvalidGeometry(format!("{kind_name} {id} has no resizable box")));
                }
            }
        }

        if let Some(text) = &self.text {
            match &mut element.kind {
                ElementKind::Text(t) => t.content = text.clone(),
                ElementKind::StickyNote(n) => n.text = text.clone(),
                ElementKind::Section(s) => s.title = text.clone(),
                _ => {
                    return Err(SceneError::WrongKind {
                        id,
                        expected: "text-bearing element",
                    });
                }
            }
        }

        if let Some(points) = &self.points {
            match &mut element.kind {
                ElementKind::PenStroke(stroke) => stroke.points = points.clone(),
                _ => {
                    return Err(SceneError::WrongKind {
                        id,
                        expected: "pen stroke",
                    });
                }
            }
        }

        if let Some(rotation) = self.rotation {
            element.rotation = rotation;
        }
        if let Some(locked) = self.locked {
            element.locked = locked;
        }
        if let Some(hidden) = self.hidden {
            element.hidden = hidden;
        }
        if let Some(style) = &self.style {
            element.style = style.clone();
        }
        Ok(())
    }
}

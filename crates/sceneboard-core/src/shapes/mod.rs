//! Element definitions for the whiteboard scene.

mod connector;
mod ellipse;
mod group;
mod image;
mod patch;
mod rectangle;
mod section;
mod sticky;
mod stroke;
mod table;
mod text;
mod triangle;

pub use connector::{Connector, End, Endpoint, EndpointRef};
pub use ellipse::Ellipse;
pub use group::Group;
pub use image::Image;
pub use patch::ElementPatch;
pub use rectangle::Rectangle;
pub use section::Section;
pub use sticky::StickyNote;
pub use stroke::PenStroke;
pub use table::Table;
pub use text::Text;
pub use triangle::Triangle;

use crate::error::{SceneError, SceneResult};
use crate::geometry::{self, ensure_finite, ensure_point};
use kurbo::{Point, Rect, Size, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use web_time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for elements.
pub type ElementId = Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn sticky_yellow() -> Self {
        Self::new(255, 235, 130, 255)
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Style properties carried by every element.
///
/// The engine stores these verbatim; painting them is the renderer's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    /// Stroke color.
    pub stroke_color: SerializableColor,
    /// Stroke width.
    pub stroke_width: f64,
    /// Fill color (None = no fill).
    pub fill_color: Option<SerializableColor>,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_opacity() -> f64 {
    1.0
}

impl ShapeStyle {
    /// Get the stroke color as a peniko Color.
    pub fn stroke(&self) -> Color {
        self.stroke_color.into()
    }

    /// Get the fill color as a peniko Color.
    pub fn fill(&self) -> Option<Color> {
        self.fill_color.map(|c| c.into())
    }

    fn validate(&self) -> SceneResult<()> {
        geometry::ensure_extent(self.stroke_width, "stroke width")?;
        ensure_finite(self.opacity, "opacity")
    }
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke_color: SerializableColor::black(),
            stroke_width: 2.0,
            fill_color: None,
            opacity: 1.0,
        }
    }
}

/// Common geometry behaviour of the box-like element kinds.
///
/// Local bounds are relative to the owning element's position.
pub trait ShapeTrait {
    /// Size of the local bounding box.
    fn size(&self) -> Size;

    /// Local bounding box (origin at the element position by default).
    fn local_bounds(&self) -> Rect {
        Rect::from_origin_size(Point::ZERO, self.size())
    }

    /// Resize to the given (already validated) box size.
    fn resize(&mut self, size: Size);

    /// Reject non-finite or negative geometry.
    fn validate(&self) -> SceneResult<()> {
        geometry::ensure_size(self.size(), "shape")
    }
}

/// Closed set of element variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementKind {
    Rectangle(Rectangle),
    Ellipse(Ellipse),
    Triangle(Triangle),
    Text(Text),
    Table(Table),
    PenStroke(PenStroke),
    Image(Image),
    StickyNote(StickyNote),
    Connector(Connector),
    Section(Section),
    Group(Group),
}

impl ElementKind {
    /// Variant name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Rectangle(_) => "rectangle",
            ElementKind::Ellipse(_) => "ellipse",
            ElementKind::Triangle(_) => "triangle",
            ElementKind::Text(_) => "text",
            ElementKind::Table(_) => "table",
            ElementKind::PenStroke(_) => "pen stroke",
            ElementKind::Image(_) => "image",
            ElementKind::StickyNote(_) => "sticky note",
            ElementKind::Connector(_) => "connector",
            ElementKind::Section(_) => "section",
            ElementKind::Group(_) => "group",
        }
    }

    /// The box-like shape behind this kind, if it has one.
    pub fn as_shape(&self) -> Option<&dyn ShapeTrait> {
        match self {
            ElementKind::Rectangle(s) => Some(s),
            ElementKind::Ellipse(s) => Some(s),
            ElementKind::Triangle(s) => Some(s),
            ElementKind::Text(s) => Some(s),
            ElementKind::Table(s) => Some(s),
            ElementKind::PenStroke(s) => Some(s),
            ElementKind::Image(s) => Some(s),
            ElementKind::StickyNote(s) => Some(s),
            ElementKind::Section(s) => Some(s),
            ElementKind::Connector(_) | ElementKind::Group(_) => None,
        }
    }

    /// Mutable access to the box-like shape behind this kind.
    pub fn as_shape_mut(&mut self) -> Option<&mut dyn ShapeTrait> {
        match self {
            ElementKind::Rectangle(s) => Some(s),
            ElementKind::Ellipse(s) => Some(s),
            ElementKind::Triangle(s) => Some(s),
            ElementKind::Text(s) => Some(s),
            ElementKind::Table(s) => Some(s),
            ElementKind::PenStroke(s) => Some(s),
            ElementKind::Image(s) => Some(s),
            ElementKind::StickyNote(s) => Some(s),
            ElementKind::Section(s) => Some(s),
            ElementKind::Connector(_) | ElementKind::Group(_) => None,
        }
    }

    fn validate(&self) -> SceneResult<()> {
        match self {
            ElementKind::Connector(c) => c.validate(),
            ElementKind::Group(_) => Ok(()),
            other => other.as_shape().map_or(Ok(()), |s| s.validate()),
        }
    }
}

/// One visual object on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub(crate) id: ElementId,
    /// Top-left corner of the element's box.
    pub position: Point,
    /// Section this element was last found inside (lookup only).
    #[serde(default)]
    pub(crate) section: Option<ElementId>,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Last modification time in milliseconds since the Unix epoch.
    pub updated_at: u64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub hidden: bool,
    /// Rotation angle in radians (around center).
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub style: ShapeStyle,
    pub kind: ElementKind,
}

impl Element {
    /// Create a new element with a fresh identifier.
    pub fn new(position: Point, kind: ElementKind) -> Self {
        Self::with_id(Uuid::new_v4(), position, kind)
    }

    /// Create an element with a caller-chosen identifier.
    pub fn with_id(id: ElementId, position: Point, kind: ElementKind) -> Self {
        let now = now_millis();
        Self {
            id,
            position,
            section: None,
            created_at: now,
            updated_at: now,
            locked: false,
            hidden: false,
            rotation: 0.0,
            style: ShapeStyle::default(),
            kind,
        }
    }

    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(Point::new(x, y), ElementKind::Rectangle(Rectangle::new(width, height)))
    }

    pub fn section(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(Point::new(x, y), ElementKind::Section(Section::new(width, height)))
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Section this element currently belongs to.
    pub fn section_id(&self) -> Option<ElementId> {
        self.section
    }

    pub fn is_section(&self) -> bool {
        matches!(self.kind, ElementKind::Section(_))
    }

    pub fn is_connector(&self) -> bool {
        matches!(self.kind, ElementKind::Connector(_))
    }

    pub fn as_section(&self) -> Option<&Section> {
        match &self.kind {
            ElementKind::Section(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_section_mut(&mut self) -> Option<&mut Section> {
        match &mut self.kind {
            ElementKind::Section(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_connector(&self) -> Option<&Connector> {
        match &self.kind {
            ElementKind::Connector(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_connector_mut(&mut self) -> Option<&mut Connector> {
        match &mut self.kind {
            ElementKind::Connector(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match &self.kind {
            ElementKind::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Bounding box in world coordinates.
    ///
    /// Groups have no bounds of their own; resolve them through
    /// [`crate::store::ElementStore::bounds_of`].
    pub fn bounds(&self) -> SceneResult<Rect> {
        let rect = match &self.kind {
            ElementKind::Connector(c) => c.bounds(),
            ElementKind::Group(_) => {
                return Err(SceneError::InvalidGeometry(format!(
                    "group {} has no intrinsic bounds",
                    self.id
                )));
            }
            other => match other.as_shape() {
                Some(shape) => shape.local_bounds() + self.position.to_vec2(),
                None => Rect::ZERO,
            },
        };
        geometry::ensure_rect(rect, "element bounds")?;
        Ok(rect)
    }

    /// Reject non-finite or negative geometry anywhere in the element.
    pub fn validate(&self) -> SceneResult<()> {
        ensure_point(self.position, "position")?;
        ensure_finite(self.rotation, "rotation")?;
        self.style.validate()?;
        self.kind.validate()
    }

    /// Move the element by a delta.
    pub fn translate(&mut self, delta: Vec2) {
        self.position += delta;
        if let ElementKind::Connector(c) = &mut self.kind {
            c.translate(delta);
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at);
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_bounds() {
        let el = Element::rectangle(10.0, 20.0, 100.0, 50.0);
        assert_eq!(el.bounds().unwrap(), Rect::new(10.0, 20.0, 110.0, 70.0));
    }

    #[test]
    fn test_group_has_no_intrinsic_bounds() {
        let el = Element::new(Point::ZERO, ElementKind::Group(Group::new(vec![])));
        assert!(el.bounds().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_size() {
        let el = Element::rectangle(0.0, 0.0, -5.0, 10.0);
        assert!(matches!(el.validate(), Err(SceneError::InvalidGeometry(_))));
    }

    #[test]
    fn test_validate_rejects_nan_position() {
        let el = Element::rectangle(f64::NAN, 0.0, 5.0, 10.0);
        assert!(el.validate().is_err());
    }

    #[test]
    fn test_translate() {
        let mut el = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        el.translate(Vec2::new(5.0, -5.0));
        assert_eq!(el.position, Point::new(5.0, -5.0));
    }

    #[test]
    fn test_json_roundtrip_keeps_kind_tag() {
        let el = Element::section(0.0, 0.0, 200.0, 100.0);
        let json = serde_json::to_string(&el).unwrap();
        assert!(json.contains("\"type\":\"section\""));
        let back: Element = serde_json::from_str(&json).unwrap();
        assert_eq!(back, el);
    }
}

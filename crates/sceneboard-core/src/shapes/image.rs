//! Image shape for embedded raster images.

use super::ShapeTrait;
use kurbo::Size;
use serde::{Deserialize, Serialize};

/// A raster image displayed at a given size.
///
/// The pixel data itself is owned by the host; the engine keeps a source
/// reference (URL, asset key or data URI) and the display geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    /// Display width.
    pub width: f64,
    /// Display height.
    pub height: f64,
    /// Host-defined source reference.
    pub source: String,
    /// Original pixel dimensions, if known.
    #[serde(default)]
    pub natural_size: Option<(u32, u32)>,
}

impl Image {
    pub fn new(width: f64, height: f64, source: impl Into<String>) -> Self {
        Self {
            width,
            height,
            source: source.into(),
            natural_size: None,
        }
    }

    /// Display area in square units.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

impl ShapeTrait for Image {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn resize(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
    }
}

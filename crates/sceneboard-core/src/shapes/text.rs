//! Text shape.

use super::ShapeTrait;
use kurbo::Size;
use serde::{Deserialize, Serialize};

/// A block of text laid out inside a box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    /// The text content.
    pub content: String,
    /// Font size in pixels.
    pub font_size: f64,
    /// Box width.
    pub width: f64,
    /// Box height.
    pub height: f64,
}

impl Text {
    /// Default font size.
    pub const DEFAULT_FONT_SIZE: f64 = 20.0;

    /// Create a text box sized by a rough per-character estimate.
    ///
    /// The renderer owns real layout; callers that know the measured size
    /// should resize the element afterwards.
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let font_size = Self::DEFAULT_FONT_SIZE;
        let (width, height) = estimate_size(&content, font_size);
        Self {
            content,
            font_size,
            width,
            height,
        }
    }

    /// Number of characters (not bytes).
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

fn estimate_size(content: &str, font_size: f64) -> (f64, f64) {
    let lines: Vec<&str> = content.lines().collect();
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let line_count = lines.len().max(1);
    (
        longest as f64 * font_size * 0.6,
        line_count as f64 * font_size * 1.2,
    )
}

impl ShapeTrait for Text {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn resize(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
    }
}

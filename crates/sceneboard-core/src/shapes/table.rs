//! Table shape with a grid of text cells.

use super::ShapeTrait;
use crate::error::{SceneError, SceneResult};
use crate::geometry::ensure_extent;
use kurbo::Size;
use serde::{Deserialize, Serialize};

/// A grid of uniformly sized cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub rows: usize,
    pub cols: usize,
    pub cell_width: f64,
    pub cell_height: f64,
    /// Row-major cell contents, `rows` rows of `cols` entries.
    pub cells: Vec<Vec<String>>,
}

impl Table {
    pub const DEFAULT_CELL_WIDTH: f64 = 120.0;
    pub const DEFAULT_CELL_HEIGHT: f64 = 40.0;

    /// Create an empty table.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cell_width: Self::DEFAULT_CELL_WIDTH,
            cell_height: Self::DEFAULT_CELL_HEIGHT,
            cells: vec![vec![String::new(); cols]; rows],
        }
    }

    /// Get a cell's contents.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.cells.get(row)?.get(col).map(String::as_str)
    }

    /// Set a cell's contents. Returns false if out of range.
    pub fn set_cell(&mut self, row: usize, col: usize, value: impl Into<String>) -> bool {
        match self.cells.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(cell) => {
                *cell = value.into();
                true
            }
            None => false,
        }
    }
}

impl ShapeTrait for Table {
    fn size(&self) -> Size {
        Size::new(self.cols as f64 * self.cell_width, self.rows as f64 * self.cell_height)
    }

    fn resize(&mut self, size: Size) {
        if self.cols > 0 {
            self.cell_width = size.width / self.cols as f64;
        }
        if self.rows > 0 {
            self.cell_height = size.height / self.rows as f64;
        }
    }

    fn validate(&self) -> SceneResult<()> {
        ensure_extent(self.cell_width, "cell width")?;
        ensure_extent(self.cell_height, "cell height")?;
        if self.cells.len() != self.rows || self.cells.iter().any(|r| r.len() != self.cols) {
            return Err(SceneError::InvalidGeometry(format!(
                "table cell grid does not match {}x{}",
                self.rows, self.cols
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_size() {
        let table = Table::new(3, 4);
        assert_eq!(table.size(), Size::new(480.0, 120.0));
    }

    #[test]
    fn test_set_cell() {
        let mut table = Table::new(2, 2);
        assert!(table.set_cell(1, 0, "x"));
        assert_eq!(table.cell(1, 0), Some("x"));
        assert!(!table.set_cell(2, 0, "y"));
    }

    #[test]
    fn test_mismatched_grid_is_invalid() {
        let mut table = Table::new(2, 2);
        table.cells.pop();
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_resize_divides_cells() {
        let mut table = Table::new(2, 4);
        table.resize(Size::new(200.0, 100.0));
        assert!((table.cell_width - 50.0).abs() < f64::EPSILON);
        assert!((table.cell_height - 50.0).abs() < f64::EPSILON);
    }
}

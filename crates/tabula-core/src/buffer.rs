//! Owned scratch copies of worksheet rectangles
//!
//! Rendering a region builds its output row block by row block in a
//! [`RangeBuffer`] and then pastes the whole buffer back over the region.
//! Coordinates inside a buffer are relative to its top-left corner.

use std::collections::BTreeMap;

use crate::cell::{CellAddress, CellRange, CellValue};
use crate::comment::CellComment;
use crate::error::Result;
use crate::hyperlink::Hyperlink;
use crate::style::Style;
use crate::worksheet::Worksheet;

/// Everything a buffer keeps for one cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferedCell {
    pub value: CellValue,
    /// `None` means the default style
    pub style: Option<Style>,
    pub comment: Option<CellComment>,
    pub hyperlink: Option<Hyperlink>,
}

impl BufferedCell {
    fn is_empty(&self) -> bool {
        self.value.is_empty()
            && self.style.is_none()
            && self.comment.is_none()
            && self.hyperlink.is_none()
    }
}

/// A detached rectangle of cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBuffer {
    rows: u32,
    cols: u16,
    cells: BTreeMap<(u32, u16), BufferedCell>,
    merges: Vec<CellRange>,
}

impl RangeBuffer {
    /// An empty buffer with no rows
    pub fn new(cols: u16) -> Self {
        Self {
            cols,
            ..Self::default()
        }
    }

    /// Copy `range` out of a worksheet
    ///
    /// Merged regions fully inside the range come along; merges crossing its
    /// border are left behind.
    pub fn extract(ws: &Worksheet, range: &CellRange) -> Self {
        let (r0, c0) = (range.start.row, range.start.col);
        let mut buffer = Self {
            rows: range.row_count(),
            cols: range.col_count(),
            ..Self::default()
        };

        for (row, col, data) in ws.cells_in(range) {
            let cell = buffer.cell_mut(row - r0, col - c0);
            cell.value = data.value.clone();
            cell.style = ws.cell_style_at(row, col).cloned();
        }
        for ((row, col), comment) in ws.comments() {
            if range.contains_cell(row, col) {
                buffer.cell_mut(row - r0, col - c0).comment = Some(comment.clone());
            }
        }
        for addr in range.cells() {
            if let Some(link) = ws.hyperlink_at(addr.row, addr.col) {
                buffer.cell_mut(addr.row - r0, addr.col - c0).hyperlink = Some(link.clone());
            }
        }
        buffer.merges = ws
            .merged_regions()
            .iter()
            .filter(|m| range.contains_range(m))
            .map(|m| {
                CellRange::from_indices(
                    m.start.row - r0,
                    m.start.col - c0,
                    m.end.row - r0,
                    m.end.col - c0,
                )
            })
            .collect();
        buffer
    }

    /// Number of rows
    pub fn row_count(&self) -> u32 {
        self.rows
    }

    /// Number of columns
    pub fn col_count(&self) -> u16 {
        self.cols
    }

    /// True when the buffer has no rows
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Relative merged regions
    pub fn merged_regions(&self) -> &[CellRange] {
        &self.merges
    }

    /// The cell at a relative position, if anything is stored there
    pub fn cell(&self, row: u32, col: u16) -> Option<&BufferedCell> {
        self.cells.get(&(row, col))
    }

    /// The value at a relative position
    pub fn value_at(&self, row: u32, col: u16) -> CellValue {
        self.cell(row, col)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    fn cell_mut(&mut self, row: u32, col: u16) -> &mut BufferedCell {
        self.cells.entry((row, col)).or_default()
    }

    /// Append another buffer below this one
    ///
    /// Returns the row offset the appended block starts at.
    pub fn append(&mut self, other: &RangeBuffer) -> u32 {
        let offset = self.rows;
        for (&(row, col), cell) in &other.cells {
            if !cell.is_empty() {
                self.cells.insert((row + offset, col), cell.clone());
            }
        }
        self.merges.extend(other.merges.iter().map(|m| {
            CellRange::from_indices(
                m.start.row + offset,
                m.start.col,
                m.end.row + offset,
                m.end.col,
            )
        }));
        self.rows += other.rows;
        self.cols = self.cols.max(other.cols);
        offset
    }

    /// Write the buffer into a worksheet with its top-left corner at `top_left`
    ///
    /// The target rectangle is cleared first. Returns the rectangle written,
    /// or `None` for a buffer without rows.
    pub fn paste(&self, ws: &mut Worksheet, top_left: CellAddress) -> Result<Option<CellRange>> {
        let Some(target) = CellRange::single(top_left).with_rows(top_left.row, self.rows) else {
            return Ok(None);
        };
        let target = CellRange::from_indices(
            target.start.row,
            target.start.col,
            target.end.row,
            top_left.col + self.cols.saturating_sub(1),
        );
        ws.clear_range(&target);

        for (&(row, col), cell) in &self.cells {
            let (row, col) = (top_left.row + row, top_left.col + col);
            if let Some(style) = &cell.style {
                ws.set_cell_style_at(row, col, style)?;
            }
            if !cell.value.is_empty() {
                ws.set_cell_value_at(row, col, cell.value.clone())?;
            }
            if let Some(comment) = &cell.comment {
                ws.set_comment_at(row, col, comment.clone());
            }
            if let Some(link) = &cell.hyperlink {
                ws.set_hyperlink_at(row, col, link.clone());
            }
        }
        for m in &self.merges {
            ws.merge_cells(&CellRange::from_indices(
                top_left.row + m.start.row,
                top_left.col + m.start.col,
                top_left.row + m.end.row,
                top_left.col + m.end.col,
            ))?;
        }
        Ok(Some(target))
    }
}

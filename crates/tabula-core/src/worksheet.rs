//! Worksheet type

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::cell::{CellAddress, CellData, CellRange, CellStorage, CellValue};
use crate::comment::CellComment;
use crate::error::{Error, Result};
use crate::hyperlink::Hyperlink;
use crate::style::{Color, Style};
use crate::{MAX_COLS, MAX_ROWS};

/// One key of a row sort
///
/// Blank cells always sort after non-blank ones, whatever the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    /// Absolute column index the key reads
    pub column: u16,
    /// Sort descending instead of ascending
    pub descending: bool,
}

impl SortKey {
    /// Ascending key on a column
    pub fn ascending(column: u16) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    /// Descending key on a column
    pub fn descending(column: u16) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// A worksheet (single sheet in a workbook)
#[derive(Debug)]
pub struct Worksheet {
    /// Sheet name
    name: String,
    /// Cell storage
    cells: CellStorage,
    /// Cell comments (keyed by (row, col))
    comments: HashMap<(u32, u16), CellComment>,
    /// Cell hyperlinks (keyed by (row, col))
    hyperlinks: HashMap<(u32, u16), Hyperlink>,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: CellStorage::new(),
            comments: HashMap::new(),
            hyperlinks: HashMap::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    // === Cell Access ===

    /// Get a cell by address string (e.g., "A1")
    pub fn cell(&self, address: &str) -> Result<Option<&CellData>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cells.get(addr.row, addr.col))
    }

    /// Get a cell by row and column indices
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellData> {
        self.cells.get(row, col)
    }

    /// Get a mutable cell by row and column indices
    pub fn cell_at_mut(&mut self, row: u32, col: u16) -> Option<&mut CellData> {
        self.cells.get_mut(row, col)
    }

    /// Get cell value (convenience method)
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_value_at(addr.row, addr.col))
    }

    /// Get cell value by indices
    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cells
            .get(row, col)
            .map(|c| c.value.clone())
            .unwrap_or(CellValue::Empty)
    }

    /// Get the non-default style applied to a cell, if any.
    pub fn cell_style_at(&self, row: u32, col: u16) -> Option<&Style> {
        match self.cells.get(row, col).map(|c| c.style_index) {
            None | Some(0) => None,
            Some(idx) => self.cells.style_pool().get(idx),
        }
    }

    /// The effective style of a cell (the default style when none is set)
    pub fn style_at(&self, row: u32, col: u16) -> Style {
        self.cell_style_at(row, col).cloned().unwrap_or_default()
    }

    // === Cell Modification ===

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by row and column indices
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        self.validate_cell_position(row, col)?;
        self.cells.set_value(row, col, value.into());
        Ok(())
    }

    /// Set a cell formula by address string
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_formula_at(addr.row, addr.col, formula)
    }

    /// Set a cell formula by row and column indices
    ///
    /// A leading `=` is added when missing.
    pub fn set_cell_formula_at(&mut self, row: u32, col: u16, formula: &str) -> Result<()> {
        self.validate_cell_position(row, col)?;
        let formula = if formula.starts_with('=') {
            formula.to_string()
        } else {
            format!("={}", formula)
        };
        self.cells.set_value(row, col, CellValue::formula(formula));
        Ok(())
    }

    /// Set a cell style by address string
    pub fn set_cell_style(&mut self, address: &str, style: &Style) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_style_at(addr.row, addr.col, style)
    }

    /// Set a cell style by row and column indices
    pub fn set_cell_style_at(&mut self, row: u32, col: u16, style: &Style) -> Result<()> {
        self.validate_cell_position(row, col)?;
        let style_index = self.cells.style_pool_mut().get_or_insert(style.clone());
        self.cells.set_style(row, col, style_index);
        Ok(())
    }

    /// Change only the font color of a cell
    pub fn set_font_color_at(&mut self, row: u32, col: u16, color: Color) -> Result<()> {
        let style = self.style_at(row, col).font_color(color);
        self.set_cell_style_at(row, col, &style)
    }

    /// Clear a cell by indices (value and style)
    pub fn clear_cell_at(&mut self, row: u32, col: u16) {
        self.cells.remove(row, col);
    }

    // === Range Operations ===

    /// Get the used range (bounds of all non-empty cells)
    pub fn used_range(&self) -> Option<CellRange> {
        self.cells
            .used_bounds()
            .map(|(min_row, min_col, max_row, max_col)| {
                CellRange::from_indices(min_row, min_col, max_row, max_col)
            })
    }

    /// Iterate over the stored cells inside a range, in row order
    pub fn cells_in(&self, range: &CellRange) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.cells.iter_range(*range)
    }

    /// Check whether every cell in the range has a blank value
    pub fn is_range_blank(&self, range: &CellRange) -> bool {
        self.cells_in(range).all(|(_, _, c)| c.value.is_blank())
    }

    /// Remove cells, comments, hyperlinks and contained merges in a range
    pub fn clear_range(&mut self, range: &CellRange) {
        let addrs: Vec<(u32, u16)> = self.cells_in(range).map(|(r, c, _)| (r, c)).collect();
        for (row, col) in addrs {
            self.cells.remove(row, col);
        }
        self.comments
            .retain(|&(row, col), _| !range.contains_cell(row, col));
        self.hyperlinks
            .retain(|&(row, col), _| !range.contains_cell(row, col));
        self.cells
            .retain_merged_regions(|m| !range.contains_range(m));
    }

    // === Row shifting ===

    /// Insert `count` rows at `at_row`, only within columns `first_col..=last_col`
    ///
    /// Cells, comments, hyperlinks and merged regions at or below `at_row` in
    /// those columns move down. Other columns are untouched.
    pub fn insert_rows_in(
        &mut self,
        at_row: u32,
        count: u32,
        first_col: u16,
        last_col: u16,
    ) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        if let Some(last) = self.cells.last_row_in_columns(first_col, last_col) {
            if last >= at_row && last as u64 + count as u64 >= MAX_ROWS as u64 {
                return Err(Error::RowOutOfBounds(last.saturating_add(count), MAX_ROWS - 1));
            }
        }

        self.cells.insert_rows(at_row, count, first_col, last_col);
        let moves = |&(row, col): &(u32, u16)| {
            row >= at_row && col >= first_col && col <= last_col
        };
        rekey(&mut self.comments, moves, |row| row + count);
        rekey(&mut self.hyperlinks, moves, |row| row + count);
        Ok(())
    }

    /// Delete the cells of `range` and shift the cells below it (same columns) up
    pub fn delete_rows_in(&mut self, range: &CellRange) -> Result<()> {
        self.validate_cell_position(range.end.row, range.end.col)?;
        let count = range.row_count();
        let (first_col, last_col) = (range.start.col, range.end.col);

        self.cells.delete_rows(*range);
        self.comments
            .retain(|&(row, col), _| !range.contains_cell(row, col));
        self.hyperlinks
            .retain(|&(row, col), _| !range.contains_cell(row, col));
        let moves = |&(row, col): &(u32, u16)| {
            row > range.end.row && col >= first_col && col <= last_col
        };
        rekey(&mut self.comments, moves, |row| row - count);
        rekey(&mut self.hyperlinks, moves, |row| row - count);
        Ok(())
    }

    // === Sorting ===

    /// Stable-sort the rows of `range` by `keys`, in key order
    ///
    /// Whole row slices (values, styles, comments, hyperlinks) move together.
    pub fn sort_rows(&mut self, range: &CellRange, keys: &[SortKey]) -> Result<()> {
        for key in keys {
            if key.column < range.start.col || key.column > range.end.col {
                return Err(Error::InvalidRange(format!(
                    "sort column {} is outside {}",
                    CellAddress::column_to_letters(key.column),
                    range
                )));
            }
        }
        if keys.is_empty() || range.row_count() < 2 {
            return Ok(());
        }

        let key_values: Vec<Vec<CellValue>> = (range.start.row..=range.end.row)
            .map(|row| {
                keys.iter()
                    .map(|k| self.get_value_at(row, k.column))
                    .collect()
            })
            .collect();

        let mut order: Vec<usize> = (0..key_values.len()).collect();
        order.sort_by(|&a, &b| {
            keys.iter()
                .enumerate()
                .map(|(i, key)| compare_for_sort(&key_values[a][i], &key_values[b][i], key.descending))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        if order.iter().enumerate().all(|(i, &src)| i == src) {
            return Ok(());
        }

        let mut slices = Vec::with_capacity(order.len());
        for row in range.start.row..=range.end.row {
            slices.push(self.take_row_slice(row, range.start.col, range.end.col));
        }
        for (dest, &src) in order.iter().enumerate() {
            let row = range.start.row + dest as u32;
            self.put_row_slice(row, &slices[src]);
        }
        Ok(())
    }

    fn take_row_slice(&mut self, row: u32, first_col: u16, last_col: u16) -> RowSlice {
        let mut slice = RowSlice::default();
        for col in first_col..=last_col {
            if let Some(data) = self.cells.remove(row, col) {
                slice.cells.push((col, data));
            }
            if let Some(comment) = self.comments.remove(&(row, col)) {
                slice.comments.push((col, comment));
            }
            if let Some(link) = self.hyperlinks.remove(&(row, col)) {
                slice.hyperlinks.push((col, link));
            }
        }
        slice
    }

    fn put_row_slice(&mut self, row: u32, slice: &RowSlice) {
        for (col, data) in &slice.cells {
            self.cells.set(row, *col, data.clone());
        }
        for (col, comment) in &slice.comments {
            self.comments.insert((row, *col), comment.clone());
        }
        for (col, link) in &slice.hyperlinks {
            self.hyperlinks.insert((row, *col), link.clone());
        }
    }

    // === Merged Cells ===

    /// Get merged regions
    pub fn merged_regions(&self) -> &[CellRange] {
        self.cells.merged_regions()
    }

    /// Merge cells
    pub fn merge_cells(&mut self, range: &CellRange) -> Result<()> {
        if self.cells.merged_regions().iter().any(|m| m.overlaps(range)) {
            return Err(Error::MergedCellConflict(range.to_string()));
        }
        self.cells.add_merged_region(*range);
        Ok(())
    }

    /// Unmerge cells
    pub fn unmerge_cells(&mut self, range: &CellRange) -> bool {
        let before = self.cells.merged_regions().len();
        self.cells.retain_merged_regions(|m| m != range);
        self.cells.merged_regions().len() != before
    }

    /// Grow a range until it fully covers every merged region it touches
    pub fn grow_to_merged(&self, range: &CellRange) -> CellRange {
        let mut grown = *range;
        loop {
            let next = self
                .cells
                .merged_regions()
                .iter()
                .filter(|m| m.overlaps(&grown))
                .fold(grown, |acc, m| acc.union(m));
            if next == grown {
                return grown;
            }
            grown = next;
        }
    }

    // === Cell Comments ===

    /// Set a comment on a cell by row and column indices
    pub fn set_comment_at(&mut self, row: u32, col: u16, comment: CellComment) {
        self.comments.insert((row, col), comment);
    }

    /// Get the comment on a cell
    pub fn comment_at(&self, row: u32, col: u16) -> Option<&CellComment> {
        self.comments.get(&(row, col))
    }

    /// Get the comment on a cell mutably
    pub fn comment_at_mut(&mut self, row: u32, col: u16) -> Option<&mut CellComment> {
        self.comments.get_mut(&(row, col))
    }

    /// Iterate over all comments
    pub fn comments(&self) -> impl Iterator<Item = ((u32, u16), &CellComment)> {
        self.comments.iter().map(|(k, v)| (*k, v))
    }

    // === Hyperlinks ===

    /// Attach a hyperlink to a cell
    pub fn set_hyperlink_at(&mut self, row: u32, col: u16, link: Hyperlink) {
        self.hyperlinks.insert((row, col), link);
    }

    /// Get the hyperlink on a cell
    pub fn hyperlink_at(&self, row: u32, col: u16) -> Option<&Hyperlink> {
        self.hyperlinks.get(&(row, col))
    }

    /// Get the hyperlink on a cell mutably
    pub fn hyperlink_at_mut(&mut self, row: u32, col: u16) -> Option<&mut Hyperlink> {
        self.hyperlinks.get_mut(&(row, col))
    }

    /// Iterate over all hyperlinks
    pub fn hyperlinks(&self) -> impl Iterator<Item = ((u32, u16), &Hyperlink)> {
        self.hyperlinks.iter().map(|(k, v)| (*k, v))
    }

    // === Statistics ===

    /// Get the number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.cell_count()
    }

    /// Check if the worksheet is empty
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Validate cell position
    fn validate_cell_position(&self, row: u32, col: u16) -> Result<()> {
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }
        if col >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
        }
        Ok(())
    }
}

/// The contents of one row across a column span, lifted out during a sort
#[derive(Debug, Default)]
struct RowSlice {
    cells: Vec<(u16, CellData)>,
    comments: Vec<(u16, CellComment)>,
    hyperlinks: Vec<(u16, Hyperlink)>,
}

/// Move every entry matching `moves` to a new row
fn rekey<T>(
    map: &mut HashMap<(u32, u16), T>,
    moves: impl Fn(&(u32, u16)) -> bool,
    new_row: impl Fn(u32) -> u32,
) {
    let keys: Vec<(u32, u16)> = map.keys().filter(|k| moves(k)).copied().collect();
    let moved: Vec<_> = keys
        .into_iter()
        .filter_map(|k| map.remove(&k).map(|v| ((new_row(k.0), k.1), v)))
        .collect();
    map.extend(moved);
}

/// Ordering used by [`Worksheet::sort_rows`]: numbers, then dates, then
/// text (case-insensitive), then booleans; blanks last in both directions
fn compare_for_sort(a: &CellValue, b: &CellValue, descending: bool) -> Ordering {
    let (a, b) = (a.effective_value(), b.effective_value());
    match (a.is_blank(), b.is_blank()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    fn rank(v: &CellValue) -> u8 {
        match v {
            CellValue::Number(_) => 0,
            CellValue::DateTime(_) => 1,
            CellValue::Boolean(_) => 3,
            _ => 2,
        }
    }

    let ordering = match (a, b) {
        (CellValue::Number(x), CellValue::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (CellValue::DateTime(x), CellValue::DateTime(y)) => x.cmp(y),
        (CellValue::Boolean(x), CellValue::Boolean(y)) => x.cmp(y),
        _ if rank(a) == rank(b) => a.text().to_lowercase().cmp(&b.text().to_lowercase()),
        _ => rank(a).cmp(&rank(b)),
    };

    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn column(ws: &Worksheet, col: u16, rows: std::ops::RangeInclusive<u32>) -> Vec<CellValue> {
        rows.map(|r| ws.get_value_at(r, col)).collect()
    }

    #[test]
    fn test_set_cell_values() {
        let mut ws = Worksheet::new("Test");
        ws.set_cell_value("A1", 42.0).unwrap();
        ws.set_cell_value("B1", "Hello").unwrap();
        ws.set_cell_formula("C1", "A1*2").unwrap();

        assert_eq!(ws.get_value("A1").unwrap().as_number(), Some(42.0));
        assert_eq!(ws.get_value("B1").unwrap().as_string(), Some("Hello"));
        assert_eq!(ws.get_value("C1").unwrap().formula_text(), Some("=A1*2"));
        assert_eq!(ws.used_range(), Some(CellRange::parse("A1:C1").unwrap()));
    }

    #[test]
    fn test_font_color_keeps_rest_of_style() {
        let mut ws = Worksheet::new("Test");
        ws.set_cell_style_at(0, 0, &Style::new().bold(true)).unwrap();
        ws.set_font_color_at(0, 0, Color::RED).unwrap();

        let style = ws.style_at(0, 0);
        assert!(style.font.bold);
        assert_eq!(style.font.color, Color::RED);
    }

    #[test]
    fn test_insert_rows_moves_annotations() {
        let mut ws = Worksheet::new("Test");
        ws.set_cell_value_at(2, 0, "x").unwrap();
        ws.set_comment_at(2, 0, CellComment::text_only("note"));
        ws.set_hyperlink_at(2, 1, Hyperlink::external("https://example.com"));
        ws.set_comment_at(2, 5, CellComment::text_only("fixed"));

        ws.insert_rows_in(1, 3, 0, 2).unwrap();

        assert_eq!(ws.get_value_at(5, 0).as_string(), Some("x"));
        assert!(ws.comment_at(5, 0).is_some());
        assert!(ws.hyperlink_at(5, 1).is_some());
        assert!(ws.comment_at(2, 5).is_some());
    }

    #[test]
    fn test_delete_rows_in() {
        let mut ws = Worksheet::new("Test");
        for row in 0..5 {
            ws.set_cell_value_at(row, 0, row as f64).unwrap();
            ws.set_cell_value_at(row, 3, row as f64).unwrap();
        }
        ws.set_comment_at(4, 0, CellComment::text_only("last"));

        ws.delete_rows_in(&CellRange::parse("A2:B3").unwrap()).unwrap();

        assert_eq!(
            column(&ws, 0, 0..=4),
            vec![
                CellValue::Number(0.0),
                CellValue::Number(3.0),
                CellValue::Number(4.0),
                CellValue::Empty,
                CellValue::Empty,
            ]
        );
        assert!(ws.comment_at(2, 0).is_some());
        // column D untouched
        assert_eq!(ws.get_value_at(1, 3), CellValue::Number(1.0));
    }

    #[test]
    fn test_grow_to_merged() {
        let mut ws = Worksheet::new("Test");
        ws.merge_cells(&CellRange::parse("C2:D3").unwrap()).unwrap();
        ws.merge_cells(&CellRange::parse("D4:E4").unwrap()).unwrap();

        let grown = ws.grow_to_merged(&CellRange::parse("A2:C2").unwrap());
        assert_eq!(grown, CellRange::parse("A2:D3").unwrap());

        let grown = ws.grow_to_merged(&CellRange::parse("A3:D4").unwrap());
        assert_eq!(grown, CellRange::parse("A2:E4").unwrap());
    }

    #[test]
    fn test_merge_conflict() {
        let mut ws = Worksheet::new("Test");
        ws.merge_cells(&CellRange::parse("A1:C3").unwrap()).unwrap();
        assert!(ws.merge_cells(&CellRange::parse("B2:D4").unwrap()).is_err());
        assert!(ws.unmerge_cells(&CellRange::parse("A1:C3").unwrap()));
        assert!(ws.merged_regions().is_empty());
    }

    #[test]
    fn test_sort_rows_blanks_last() {
        let mut ws = Worksheet::new("Test");
        let values = [Some(5.0), None, Some(2.0), None, Some(9.0)];
        for (i, v) in values.iter().enumerate() {
            if let Some(n) = v {
                ws.set_cell_value_at(i as u32, 0, *n).unwrap();
            }
            ws.set_cell_value_at(i as u32, 1, format!("row{}", i)).unwrap();
        }
        let range = CellRange::parse("A1:B5").unwrap();

        ws.sort_rows(&range, &[SortKey::ascending(0)]).unwrap();
        assert_eq!(
            column(&ws, 0, 0..=4),
            vec![
                CellValue::Number(2.0),
                CellValue::Number(5.0),
                CellValue::Number(9.0),
                CellValue::Empty,
                CellValue::Empty,
            ]
        );
        // rows move as a whole and blanks keep their relative order
        assert_eq!(ws.get_value_at(0, 1).as_string(), Some("row2"));
        assert_eq!(ws.get_value_at(3, 1).as_string(), Some("row1"));
        assert_eq!(ws.get_value_at(4, 1).as_string(), Some("row3"));

        ws.sort_rows(&range, &[SortKey::descending(0)]).unwrap();
        assert_eq!(
            column(&ws, 0, 0..=4),
            vec![
                CellValue::Number(9.0),
                CellValue::Number(5.0),
                CellValue::Number(2.0),
                CellValue::Empty,
                CellValue::Empty,
            ]
        );
    }

    #[test]
    fn test_sort_rows_multiple_keys() {
        let mut ws = Worksheet::new("Test");
        let rows = [("b", 2.0), ("a", 3.0), ("b", 1.0), ("A", 1.0)];
        for (i, (s, n)) in rows.iter().enumerate() {
            ws.set_cell_value_at(i as u32, 0, *s).unwrap();
            ws.set_cell_value_at(i as u32, 1, *n).unwrap();
        }
        let range = CellRange::parse("A1:B4").unwrap();
        ws.sort_rows(&range, &[SortKey::ascending(0), SortKey::descending(1)])
            .unwrap();

        assert_eq!(
            column(&ws, 1, 0..=3),
            vec![
                CellValue::Number(3.0),
                CellValue::Number(1.0),
                CellValue::Number(2.0),
                CellValue::Number(1.0),
            ]
        );
    }

    #[test]
    fn test_sort_key_outside_range() {
        let mut ws = Worksheet::new("Test");
        let range = CellRange::parse("A1:B4").unwrap();
        assert!(ws.sort_rows(&range, &[SortKey::ascending(4)]).is_err());
    }

    #[test]
    fn test_clear_range() {
        let mut ws = Worksheet::new("Test");
        ws.set_cell_value_at(0, 0, "a").unwrap();
        ws.set_comment_at(0, 0, CellComment::text_only("c"));
        ws.merge_cells(&CellRange::parse("A1:B1").unwrap()).unwrap();
        ws.set_cell_value_at(3, 0, "keep").unwrap();

        ws.clear_range(&CellRange::parse("A1:B2").unwrap());
        assert_eq!(ws.cell_count(), 1);
        assert!(ws.comment_at(0, 0).is_none());
        assert!(ws.merged_regions().is_empty());
    }
}

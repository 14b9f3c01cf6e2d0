//! Cell storage implementation
//!
//! Sparse, row-based storage: only non-empty cells are kept, in a
//! `BTreeMap<row, BTreeMap<col, CellData>>`, so row shifts and range scans walk
//! the populated cells in order.

use std::collections::BTreeMap;

use super::{CellAddress, CellRange, CellValue};
use crate::style::StylePool;

/// Complete data for a single cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellData {
    /// The cell's value
    pub value: CellValue,
    /// Index into the style pool (0 = default style)
    pub style_index: u32,
}

impl CellData {
    /// Create a new cell with a value and default style
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            style_index: 0,
        }
    }

    /// Create a new cell with a value and style
    pub fn with_style(value: CellValue, style_index: u32) -> Self {
        Self { value, style_index }
    }

    /// Create an empty cell
    pub fn empty() -> Self {
        Self::new(CellValue::Empty)
    }

    /// Check if this cell is effectively empty (no value and default style)
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.style_index == 0
    }
}

impl Default for CellData {
    fn default() -> Self {
        Self::empty()
    }
}

/// Sparse row-based storage for worksheet cells
#[derive(Debug, Default)]
pub struct CellStorage {
    /// Row index → column map
    rows: BTreeMap<u32, BTreeMap<u16, CellData>>,

    /// Shared style pool for deduplication
    pub(crate) style_pool: StylePool,

    /// Merged cell regions
    merged_regions: Vec<CellRange>,
}

impl CellStorage {
    /// Create a new empty cell storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cell
    pub fn get(&self, row: u32, col: u16) -> Option<&CellData> {
        self.rows.get(&row).and_then(|r| r.get(&col))
    }

    /// Get a mutable cell
    pub fn get_mut(&mut self, row: u32, col: u16) -> Option<&mut CellData> {
        self.rows.get_mut(&row).and_then(|r| r.get_mut(&col))
    }

    /// Set a cell
    ///
    /// If the cell data is empty (no value, default style), the cell is removed.
    pub fn set(&mut self, row: u32, col: u16, data: CellData) {
        if data.is_empty() {
            self.remove(row, col);
        } else {
            self.rows.entry(row).or_default().insert(col, data);
        }
    }

    /// Set just the cell value (preserving style)
    pub fn set_value(&mut self, row: u32, col: u16, value: CellValue) {
        let style_index = self.get(row, col).map(|c| c.style_index).unwrap_or(0);
        self.set(row, col, CellData::with_style(value, style_index));
    }

    /// Set just the cell style (preserving value)
    pub fn set_style(&mut self, row: u32, col: u16, style_index: u32) {
        let value = self.remove(row, col).map(|c| c.value).unwrap_or_default();
        self.set(row, col, CellData::with_style(value, style_index));
    }

    /// Remove a cell
    pub fn remove(&mut self, row: u32, col: u16) -> Option<CellData> {
        let row_map = self.rows.get_mut(&row)?;
        let removed = row_map.remove(&col);
        if row_map.is_empty() {
            self.rows.remove(&row);
        }
        removed
    }

    /// Clear all cells
    pub fn clear(&mut self) {
        self.rows.clear();
        self.merged_regions.clear();
    }

    /// Get the number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.len()).sum()
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get the bounds of used cells
    ///
    /// Returns (min_row, min_col, max_row, max_col) or None if empty
    pub fn used_bounds(&self) -> Option<(u32, u16, u32, u16)> {
        let min_row = *self.rows.keys().next()?;
        let max_row = *self.rows.keys().next_back()?;

        let mut min_col = u16::MAX;
        let mut max_col = 0u16;
        for cols in self.rows.values() {
            if let (Some(&first), Some(&last)) = (cols.keys().next(), cols.keys().next_back()) {
                min_col = min_col.min(first);
                max_col = max_col.max(last);
            }
        }

        Some((min_row, min_col, max_row, max_col))
    }

    /// Iterate over the stored cells inside a range, in row order
    pub fn iter_range(&self, range: CellRange) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.rows
            .range(range.start.row..=range.end.row)
            .flat_map(move |(&row, cols)| {
                cols.range(range.start.col..=range.end.col)
                    .map(move |(&col, data)| (row, col, data))
            })
    }

    /// Iterate over cells in a specific row
    pub fn iter_row(&self, row: u32) -> impl Iterator<Item = (u16, &CellData)> {
        self.rows
            .get(&row)
            .into_iter()
            .flat_map(|cols| cols.iter().map(|(&col, data)| (col, data)))
    }

    /// Last row holding any cell in `first_col..=last_col`
    pub fn last_row_in_columns(&self, first_col: u16, last_col: u16) -> Option<u32> {
        self.rows
            .iter()
            .rev()
            .find(|(_, cols)| cols.range(first_col..=last_col).next().is_some())
            .map(|(&row, _)| row)
    }

    // === Row shifting ===

    /// Move every cell at or below `at_row` in `first_col..=last_col` down by `count` rows
    pub fn insert_rows(&mut self, at_row: u32, count: u32, first_col: u16, last_col: u16) {
        if count == 0 {
            return;
        }
        let moved = self.take_cells(at_row, u32::MAX, first_col, last_col);
        for (row, col, data) in moved {
            self.set(row + count, col, data);
        }

        for region in &mut self.merged_regions {
            *region = region.shifted_for_insert(at_row, count, first_col, last_col);
        }
    }

    /// Remove the cells in `deleted` and move the cells below it (same columns) up
    pub fn delete_rows(&mut self, deleted: CellRange) {
        let count = deleted.row_count();
        let (first_col, last_col) = (deleted.start.col, deleted.end.col);
        self.take_cells(deleted.start.row, deleted.end.row, first_col, last_col);
        let moved = self.take_cells(deleted.end.row + 1, u32::MAX, first_col, last_col);
        for (row, col, data) in moved {
            self.set(row - count, col, data);
        }

        self.merged_regions = self
            .merged_regions
            .iter()
            .filter_map(|region| region.shifted_for_delete(&deleted))
            .filter(|region| region.cell_count() > 1)
            .collect();
    }

    /// Remove and return the cells in rows `from..=to`, columns `first_col..=last_col`
    fn take_cells(
        &mut self,
        from: u32,
        to: u32,
        first_col: u16,
        last_col: u16,
    ) -> Vec<(u32, u16, CellData)> {
        let rows: Vec<u32> = self.rows.range(from..=to).map(|(&row, _)| row).collect();
        let mut taken = Vec::new();
        for row in rows {
            if let Some(cols) = self.rows.get_mut(&row) {
                let keys: Vec<u16> = cols.range(first_col..=last_col).map(|(&c, _)| c).collect();
                for col in keys {
                    if let Some(data) = cols.remove(&col) {
                        taken.push((row, col, data));
                    }
                }
                if cols.is_empty() {
                    self.rows.remove(&row);
                }
            }
        }
        taken
    }

    // === Merged regions ===

    /// Get merged regions
    pub fn merged_regions(&self) -> &[CellRange] {
        &self.merged_regions
    }

    /// Add a merged region
    pub fn add_merged_region(&mut self, range: CellRange) {
        self.merged_regions.push(range);
    }

    /// Remove merged regions matching a predicate
    pub fn retain_merged_regions<F: FnMut(&CellRange) -> bool>(&mut self, keep: F) {
        self.merged_regions.retain(keep);
    }

    /// Check if a cell is part of a merged region
    pub fn is_merged(&self, row: u32, col: u16) -> bool {
        let addr = CellAddress::new(row, col);
        self.merged_regions.iter().any(|r| r.contains(&addr))
    }

    /// Get the style pool
    pub fn style_pool(&self) -> &StylePool {
        &self.style_pool
    }

    /// Get the style pool mutably
    pub fn style_pool_mut(&mut self) -> &mut StylePool {
        &mut self.style_pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn number(storage: &CellStorage, row: u32, col: u16) -> Option<f64> {
        storage.get(row, col).and_then(|c| c.value.as_number())
    }

    #[test]
    fn test_basic_operations() {
        let mut storage = CellStorage::new();
        storage.set(0, 0, CellData::new(CellValue::Number(42.0)));
        assert_eq!(number(&storage, 0, 0), Some(42.0));
        assert!(storage.get(1, 1).is_none());

        storage.set(0, 0, CellData::empty());
        assert_eq!(storage.cell_count(), 0);
    }

    #[test]
    fn test_set_value_keeps_style() {
        let mut storage = CellStorage::new();
        storage.set_style(2, 2, 5);
        storage.set_value(2, 2, CellValue::Number(1.0));
        assert_eq!(storage.get(2, 2).map(|c| c.style_index), Some(5));
    }

    #[test]
    fn test_used_bounds() {
        let mut storage = CellStorage::new();
        assert!(storage.used_bounds().is_none());

        storage.set(5, 3, CellData::new(CellValue::Number(1.0)));
        storage.set(10, 7, CellData::new(CellValue::Number(2.0)));
        storage.set(2, 1, CellData::new(CellValue::Number(3.0)));
        assert_eq!(storage.used_bounds(), Some((2, 1, 10, 7)));
    }

    #[test]
    fn test_iter_range() {
        let mut storage = CellStorage::new();
        for row in 0..4 {
            for col in 0..4 {
                storage.set(row, col, CellData::new(CellValue::Number(1.0)));
            }
        }
        let range = CellRange::from_indices(1, 1, 2, 2);
        let cells: Vec<_> = storage.iter_range(range).map(|(r, c, _)| (r, c)).collect();
        assert_eq!(cells, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
    }

    #[test]
    fn test_insert_rows_is_column_scoped() {
        let mut storage = CellStorage::new();
        storage.set(1, 0, CellData::new(CellValue::Number(1.0)));
        storage.set(1, 3, CellData::new(CellValue::Number(2.0)));
        storage.add_merged_region(CellRange::from_indices(4, 0, 4, 1));

        storage.insert_rows(1, 2, 0, 1);

        assert_eq!(number(&storage, 3, 0), Some(1.0));
        assert_eq!(number(&storage, 1, 0), None);
        // column D is outside the span and stays put
        assert_eq!(number(&storage, 1, 3), Some(2.0));
        assert_eq!(
            storage.merged_regions(),
            &[CellRange::from_indices(6, 0, 6, 1)]
        );
    }

    #[test]
    fn test_delete_rows_shifts_up() {
        let mut storage = CellStorage::new();
        for row in 0..5 {
            storage.set(row, 0, CellData::new(CellValue::Number(row as f64)));
        }
        storage.delete_rows(CellRange::from_indices(1, 0, 2, 0));

        let values: Vec<_> = storage
            .iter_range(CellRange::from_indices(0, 0, 9, 0))
            .map(|(r, _, d)| (r, d.value.as_number().unwrap_or(-1.0)))
            .collect();
        assert_eq!(values, vec![(0, 0.0), (1, 3.0), (2, 4.0)]);
    }
}

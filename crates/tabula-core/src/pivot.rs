//! Pivot caches
//!
//! A pivot cache remembers which rectangles feed a pivot table. When a
//! template region is rendered its rectangle changes, so the cache has to be
//! re-resolved before the pivot is usable.

use crate::cell::CellRange;
use crate::named_range::{NamedRangeCollection, SheetRange};

/// What a pivot cache reads from
#[derive(Debug, Clone, PartialEq)]
pub enum PivotSource {
    /// A named range, resolved on every refresh
    Name(String),
    /// A fixed rectangle; follows row shifts on its sheet
    Range(SheetRange),
}

/// A range-dependent pivot cache
#[derive(Debug, Clone, PartialEq)]
pub struct PivotCache {
    /// Cache name
    pub name: String,
    source: PivotSource,
    resolved: Vec<SheetRange>,
    refresh_count: u32,
}

impl PivotCache {
    /// Create a cache reading from a named range
    pub fn from_name(name: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self::new(name, PivotSource::Name(source_name.into()))
    }

    /// Create a cache reading from a fixed rectangle
    pub fn from_range(name: impl Into<String>, source: SheetRange) -> Self {
        let resolved = vec![source.clone()];
        Self {
            resolved,
            ..Self::new(name, PivotSource::Range(source))
        }
    }

    fn new(name: impl Into<String>, source: PivotSource) -> Self {
        Self {
            name: name.into(),
            source,
            resolved: Vec::new(),
            refresh_count: 0,
        }
    }

    /// The cache source
    pub fn source(&self) -> &PivotSource {
        &self.source
    }

    /// Rectangles resolved by the last refresh
    pub fn resolved(&self) -> &[SheetRange] {
        &self.resolved
    }

    /// How many times the cache has been refreshed
    pub fn refresh_count(&self) -> u32 {
        self.refresh_count
    }

    /// Re-resolve the source rectangles
    ///
    /// A named source that no longer exists resolves to nothing.
    pub fn refresh(&mut self, names: &NamedRangeCollection, sheet_index: usize) {
        self.resolved = match &self.source {
            PivotSource::Name(name) => names
                .get(name, sheet_index)
                .map(|n| n.ranges().to_vec())
                .unwrap_or_default(),
            PivotSource::Range(range) => vec![range.clone()],
        };
        self.refresh_count += 1;
    }

    pub(crate) fn adjust_for_insert(
        &mut self,
        sheet: &str,
        at_row: u32,
        count: u32,
        first_col: u16,
        last_col: u16,
    ) {
        if let PivotSource::Range(r) = &mut self.source {
            if r.is_on(sheet) {
                r.range = r.range.shifted_for_insert(at_row, count, first_col, last_col);
            }
        }
    }

    pub(crate) fn adjust_for_delete(&mut self, sheet: &str, deleted: &CellRange) {
        if let PivotSource::Range(r) = &mut self.source {
            if r.is_on(sheet) {
                if let Some(range) = r.range.shifted_for_delete(deleted) {
                    r.range = range;
                }
            }
        }
    }
}

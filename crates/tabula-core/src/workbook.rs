//! Workbook type - the main document structure

use crate::cell::CellRange;
use crate::error::{Error, Result};
use crate::named_range::{NameScope, NamedRange, NamedRangeCollection};
use crate::pivot::PivotCache;
use crate::worksheet::{SortKey, Worksheet};
use crate::MAX_SHEET_NAME_LEN;

/// A workbook: worksheets plus the names and pivot caches that refer to them
#[derive(Debug)]
pub struct Workbook {
    worksheets: Vec<Worksheet>,
    /// Named ranges (defined names)
    named_ranges: NamedRangeCollection,
    pivot_caches: Vec<PivotCache>,
}

impl Workbook {
    /// Create a new workbook with one worksheet named `Sheet1`
    pub fn new() -> Self {
        let mut wb = Self::empty();
        wb.worksheets.push(Worksheet::new("Sheet1"));
        wb
    }

    /// Create an empty workbook with no worksheets
    pub fn empty() -> Self {
        Self {
            worksheets: Vec::new(),
            named_ranges: NamedRangeCollection::new(),
            pivot_caches: Vec::new(),
        }
    }

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Check if the workbook has no worksheets
    pub fn is_empty(&self) -> bool {
        self.worksheets.is_empty()
    }

    /// Get a worksheet by index
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Get a mutable worksheet by index
    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Get a worksheet by name (case-insensitive)
    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheet_index(name).and_then(|i| self.worksheets.get(i))
    }

    /// Get the index of a worksheet by name (case-insensitive)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.worksheets
            .iter()
            .position(|ws| ws.name().eq_ignore_ascii_case(name))
    }

    /// Iterate over all worksheets
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Add a new worksheet with default name
    pub fn add_worksheet(&mut self) -> Result<usize> {
        let name = self.generate_sheet_name();
        self.add_worksheet_with_name(&name)
    }

    /// Add a new worksheet with specified name
    pub fn add_worksheet_with_name(&mut self, name: &str) -> Result<usize> {
        self.add_existing_worksheet(Worksheet::new(name))
    }

    /// Add an existing worksheet to the workbook
    pub fn add_existing_worksheet(&mut self, worksheet: Worksheet) -> Result<usize> {
        self.validate_sheet_name(worksheet.name())?;
        let index = self.worksheets.len();
        self.worksheets.push(worksheet);
        Ok(index)
    }

    fn sheet_mut_or_err(&mut self, index: usize) -> Result<&mut Worksheet> {
        let count = self.worksheets.len();
        self.worksheets
            .get_mut(index)
            .ok_or(Error::SheetOutOfBounds(index, count))
    }

    // ==================== Named Ranges ====================

    /// Define a new workbook-scoped named range from its definition text
    ///
    /// # Example
    /// ```
    /// use tabula_core::Workbook;
    ///
    /// let mut wb = Workbook::new();
    /// wb.define_name("Orders", "Sheet1!$A$2:$C$3").unwrap();
    /// assert!(wb.get_named_range("orders", 0).is_some());
    /// ```
    pub fn define_name(&mut self, name: &str, refers_to: &str) -> Result<()> {
        let range = NamedRange::parse(name, refers_to, NameScope::Workbook)?;
        self.define_named_range(range)
    }

    /// Define a named range
    pub fn define_named_range(&mut self, range: NamedRange) -> Result<()> {
        validate_name(&range.name)?;
        self.named_ranges.define(range)
    }

    /// Get a named range by name, sheet scope first, then workbook scope
    pub fn get_named_range(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.named_ranges.get(name, current_sheet)
    }

    /// Get the named range collection (read-only)
    pub fn named_ranges(&self) -> &NamedRangeCollection {
        &self.named_ranges
    }

    /// Get the named range collection (mutable)
    pub fn named_ranges_mut(&mut self) -> &mut NamedRangeCollection {
        &mut self.named_ranges
    }

    /// Names with at least one rectangle on `sheet` inside `range`
    ///
    /// Each hit is returned with the contained rectangle (without `$`
    /// markers), in name definition order.
    pub fn names_within(&self, sheet: &str, range: &CellRange) -> Vec<(String, CellRange)> {
        self.named_ranges
            .iter()
            .flat_map(|n| {
                n.ranges_on(sheet)
                    .filter(|r| range.contains_range(r))
                    .map(|r| (n.name.clone(), r.relative()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    // ==================== Pivot caches ====================

    /// Register a pivot cache
    pub fn add_pivot_cache(&mut self, cache: PivotCache) {
        self.pivot_caches.push(cache);
    }

    /// All pivot caches
    pub fn pivot_caches(&self) -> &[PivotCache] {
        &self.pivot_caches
    }

    /// Refresh every pivot cache, resolving names from `sheet_index`
    pub fn refresh_pivot_caches(&mut self, sheet_index: usize) {
        for cache in &mut self.pivot_caches {
            cache.refresh(&self.named_ranges, sheet_index);
        }
    }

    // ==================== Row shifting ====================

    /// Insert rows within a column span on one sheet
    ///
    /// Names and pivot sources on that sheet follow the shift.
    pub fn insert_rows_in(
        &mut self,
        sheet_index: usize,
        at_row: u32,
        count: u32,
        first_col: u16,
        last_col: u16,
    ) -> Result<()> {
        let ws = self.sheet_mut_or_err(sheet_index)?;
        ws.insert_rows_in(at_row, count, first_col, last_col)?;
        let sheet = ws.name().to_string();

        for name in self.named_ranges.iter_mut() {
            name.adjust_for_insert(&sheet, at_row, count, first_col, last_col);
        }
        for cache in &mut self.pivot_caches {
            cache.adjust_for_insert(&sheet, at_row, count, first_col, last_col);
        }
        Ok(())
    }

    /// Delete a rectangle on one sheet and shift the cells below it up
    ///
    /// Name rectangles deleted entirely are dropped from their names.
    pub fn delete_rows_in(&mut self, sheet_index: usize, range: &CellRange) -> Result<()> {
        let ws = self.sheet_mut_or_err(sheet_index)?;
        ws.delete_rows_in(range)?;
        let sheet = ws.name().to_string();

        for name in self.named_ranges.iter_mut() {
            name.adjust_for_delete(&sheet, range);
        }
        for cache in &mut self.pivot_caches {
            cache.adjust_for_delete(&sheet, range);
        }
        Ok(())
    }

    /// Sort rows of a rectangle on one sheet
    pub fn sort_rows(&mut self, sheet_index: usize, range: &CellRange, keys: &[SortKey]) -> Result<()> {
        self.sheet_mut_or_err(sheet_index)?.sort_rows(range, keys)
    }

    /// Validate a sheet name
    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }

        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }

        if self.sheet_index(name).is_some() {
            return Err(Error::DuplicateSheetName(name.into()));
        }
        Ok(())
    }

    /// Generate a unique sheet name
    fn generate_sheet_name(&self) -> String {
        (self.worksheets.len() + 1..)
            .map(|n| format!("Sheet{}", n))
            .find(|name| self.sheet_index(name).is_none())
            .unwrap_or_default()
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

/// Names start with a letter or underscore and hold only word characters and dots
fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(format!("'{}' is not a valid name", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;
    use crate::named_range::SheetRange;
    use pretty_assertions::assert_eq;

    fn rects(wb: &Workbook, name: &str) -> Vec<String> {
        wb.get_named_range(name, 0)
            .map(|n| n.ranges().iter().map(|r| r.range.to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_new_workbook() {
        let wb = Workbook::new();
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.worksheet(0).unwrap().name(), "Sheet1");
        assert!(Workbook::empty().is_empty());
    }

    #[test]
    fn test_add_worksheets() {
        let mut wb = Workbook::new();
        assert_eq!(wb.add_worksheet().unwrap(), 1);
        assert_eq!(wb.worksheet(1).unwrap().name(), "Sheet2");
        assert_eq!(wb.add_worksheet_with_name("Data").unwrap(), 2);
        assert_eq!(wb.sheet_index("data"), Some(2));
    }

    #[test]
    fn test_invalid_sheet_names() {
        let mut wb = Workbook::new();
        assert!(matches!(
            wb.add_worksheet_with_name("sheet1"),
            Err(Error::DuplicateSheetName(_))
        ));
        assert!(wb.add_worksheet_with_name("").is_err());
        assert!(wb.add_worksheet_with_name("a/b").is_err());
        assert!(wb
            .add_worksheet_with_name("This name is way too long for a sheet")
            .is_err());
    }

    #[test]
    fn test_define_name_validation() {
        let mut wb = Workbook::new();
        wb.define_name("Orders_Lines", "Sheet1!A2:C3").unwrap();
        assert!(wb.define_name("orders_lines", "Sheet1!A5").is_err());
        assert!(wb.define_name("1bad", "Sheet1!A1").is_err());
    }

    #[test]
    fn test_names_within() {
        let mut wb = Workbook::new();
        wb.define_name("Outer", "Sheet1!A1:D10").unwrap();
        wb.define_name("Inner", "Sheet1!B2:C4").unwrap();
        wb.define_name("Elsewhere", "Sheet1!F1:F2").unwrap();
        wb.define_name("Absolute", "Sheet1!$B$6:$D$6").unwrap();

        let range = CellRange::parse("B2:D9").unwrap();
        let within = wb.names_within("Sheet1", &range);
        assert_eq!(
            within,
            vec![
                ("Inner".to_string(), CellRange::parse("B2:C4").unwrap()),
                ("Absolute".to_string(), CellRange::parse("B6:D6").unwrap()),
            ]
        );
        assert_eq!(wb.names_within("Sheet1", &CellRange::parse("A1:D10").unwrap()).len(), 3);
    }

    #[test]
    fn test_row_shifts_follow_names() {
        let mut wb = Workbook::new();
        wb.define_name("Data", "Sheet1!A2:C3").unwrap();
        wb.define_name("Below", "Sheet1!A6:C6").unwrap();
        wb.define_name("Beside", "Sheet1!E6").unwrap();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_value_at(5, 0, "below")
            .unwrap();

        wb.insert_rows_in(0, 2, 3, 0, 2).unwrap();
        assert_eq!(rects(&wb, "Data"), vec!["A2:C6"]);
        assert_eq!(rects(&wb, "Below"), vec!["A9:C9"]);
        assert_eq!(rects(&wb, "Beside"), vec!["E6"]);
        assert_eq!(
            wb.worksheet(0).unwrap().get_value_at(8, 0),
            CellValue::string("below")
        );

        wb.delete_rows_in(0, &CellRange::parse("A9:C9").unwrap())
            .unwrap();
        assert!(rects(&wb, "Below").is_empty());
    }

    #[test]
    fn test_pivot_cache_refresh() {
        let mut wb = Workbook::new();
        wb.define_name("Data", "Sheet1!A2:C3").unwrap();
        wb.add_pivot_cache(PivotCache::from_name("Pivot1", "Data"));
        wb.add_pivot_cache(PivotCache::from_range(
            "Pivot2",
            SheetRange::parse("Sheet1!A2:C5").unwrap(),
        ));

        wb.insert_rows_in(0, 2, 2, 0, 2).unwrap();
        wb.refresh_pivot_caches(0);

        let caches = wb.pivot_caches();
        assert_eq!(caches[0].refresh_count(), 1);
        assert_eq!(caches[0].resolved()[0].range.to_string(), "A2:C5");
        assert_eq!(caches[1].resolved()[0].range.to_string(), "A2:C7");
    }

    #[test]
    fn test_sort_rows_bad_sheet() {
        let mut wb = Workbook::new();
        let range = CellRange::parse("A1:A2").unwrap();
        assert!(matches!(
            wb.sort_rows(3, &range, &[SortKey::ascending(0)]),
            Err(Error::SheetOutOfBounds(3, 1))
        ));
    }
}

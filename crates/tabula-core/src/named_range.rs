//! Named range definitions
//!
//! A named range binds a name to one or more rectangles, possibly on different
//! sheets. Template regions are named ranges: rendering replaces the template
//! rectangle with the generated one, so the rectangle set is mutable.
//!
//! # Example
//!
//! ```rust
//! use tabula_core::{NamedRange, NameScope};
//!
//! let name = NamedRange::parse("Orders", "Sheet1!$A$2:$D$4", NameScope::Workbook).unwrap();
//! assert_eq!(name.ranges().len(), 1);
//! assert_eq!(name.refers_to(), "Sheet1!$A$2:$D$4");
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::cell::CellRange;
use crate::error::{Error, Result};

/// Scope of a named range
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameScope {
    /// Available throughout the workbook (global)
    Workbook,
    /// Scoped to a specific sheet (local)
    Sheet(usize),
}

/// A rectangle on a named sheet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetRange {
    /// Sheet name
    pub sheet: String,
    /// Rectangle on that sheet
    pub range: CellRange,
}

impl SheetRange {
    /// Create a new sheet range
    pub fn new(sheet: impl Into<String>, range: CellRange) -> Self {
        Self {
            sheet: sheet.into(),
            range,
        }
    }

    /// Parse `Sheet1!A1:B2` or `'My Sheet'!A1`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (sheet, range) = s
            .rsplit_once('!')
            .ok_or_else(|| Error::InvalidRange(format!("missing sheet name in '{}'", s)))?;
        let sheet = sheet
            .strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''))
            .map(|quoted| quoted.replace("''", "'"))
            .unwrap_or_else(|| sheet.to_string());
        if sheet.is_empty() {
            return Err(Error::InvalidRange(format!("empty sheet name in '{}'", s)));
        }
        Ok(Self::new(sheet, CellRange::parse(range)?))
    }

    /// Is this rectangle on `sheet` (case-insensitive)
    pub fn is_on(&self, sheet: &str) -> bool {
        self.sheet.eq_ignore_ascii_case(sheet)
    }
}

impl fmt::Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let needs_quotes = self
            .sheet
            .chars()
            .any(|c| !(c.is_alphanumeric() || c == '_'));
        if needs_quotes {
            write!(f, "'{}'!{}", self.sheet.replace('\'', "''"), self.range)
        } else {
            write!(f, "{}!{}", self.sheet, self.range)
        }
    }
}

/// A named range definition
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRange {
    /// The name (e.g., "Orders"); names are case-insensitive
    pub name: String,
    /// Scope of this name (workbook-wide or sheet-specific)
    pub scope: NameScope,
    /// Rectangles this name refers to
    ranges: Vec<SheetRange>,
}

impl NamedRange {
    /// Create a new named range
    pub fn new(name: impl Into<String>, ranges: Vec<SheetRange>, scope: NameScope) -> Self {
        Self {
            name: name.into(),
            scope,
            ranges,
        }
    }

    /// Create a workbook-scoped named range over a single rectangle
    pub fn workbook_scope(name: impl Into<String>, range: SheetRange) -> Self {
        Self::new(name, vec![range], NameScope::Workbook)
    }

    /// Parse a comma-separated list of sheet ranges (`Sheet1!A1:B2,Sheet1!D1:E2`)
    pub fn parse(name: impl Into<String>, refers_to: &str, scope: NameScope) -> Result<Self> {
        let refers_to = refers_to.trim().trim_start_matches('=');
        let ranges = refers_to
            .split(',')
            .map(SheetRange::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(name, ranges, scope))
    }

    /// The rectangles of this name
    pub fn ranges(&self) -> &[SheetRange] {
        &self.ranges
    }

    /// Replace the whole rectangle set
    pub fn set_ranges(&mut self, ranges: Vec<SheetRange>) {
        self.ranges = ranges;
    }

    /// Replace one rectangle, keeping the others
    pub fn replace_range(&mut self, old: &SheetRange, new: SheetRange) -> bool {
        match self.ranges.iter().position(|r| r == old) {
            Some(i) => {
                self.ranges[i] = new;
                true
            }
            None => false,
        }
    }

    /// Rectangles on one sheet
    pub fn ranges_on<'a>(&'a self, sheet: &'a str) -> impl Iterator<Item = &'a CellRange> + 'a {
        self.ranges
            .iter()
            .filter(move |r| r.is_on(sheet))
            .map(|r| &r.range)
    }

    /// The definition text
    pub fn refers_to(&self) -> String {
        self.ranges
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Follow a row insertion on `sheet`
    pub fn adjust_for_insert(
        &mut self,
        sheet: &str,
        at_row: u32,
        count: u32,
        first_col: u16,
        last_col: u16,
    ) {
        for r in self.ranges.iter_mut().filter(|r| r.is_on(sheet)) {
            r.range = r.range.shifted_for_insert(at_row, count, first_col, last_col);
        }
    }

    /// Follow a row deletion on `sheet`; rectangles deleted entirely are dropped
    pub fn adjust_for_delete(&mut self, sheet: &str, deleted: &CellRange) {
        self.ranges.retain_mut(|r| {
            if !r.is_on(sheet) {
                return true;
            }
            match r.range.shifted_for_delete(deleted) {
                Some(range) => {
                    r.range = range;
                    true
                }
                None => false,
            }
        });
    }
}

/// Collection of named ranges with case-insensitive lookup
#[derive(Debug, Default, Clone)]
pub struct NamedRangeCollection {
    /// Keyed by lowercase name plus scope
    ranges: HashMap<String, NamedRange>,
    /// Keys in definition order
    order: Vec<String>,
}

impl NamedRangeCollection {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self::default()
    }

    fn make_key(name: &str, scope: &NameScope) -> String {
        let name_lower = name.to_lowercase();
        match scope {
            NameScope::Workbook => name_lower,
            NameScope::Sheet(idx) => format!("{}:sheet:{}", name_lower, idx),
        }
    }

    /// Define a new named range
    ///
    /// Returns an error if a name with the same scope already exists
    pub fn define(&mut self, range: NamedRange) -> Result<()> {
        let key = Self::make_key(&range.name, &range.scope);
        if self.ranges.contains_key(&key) {
            return Err(Error::InvalidName(format!(
                "Named range '{}' already exists in this scope",
                range.name
            )));
        }
        self.order.push(key.clone());
        self.ranges.insert(key, range);
        Ok(())
    }

    /// Define or update a named range
    pub fn define_or_update(&mut self, range: NamedRange) {
        let key = Self::make_key(&range.name, &range.scope);
        if !self.ranges.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.ranges.insert(key, range);
    }

    /// Get a named range by name, sheet scope first, then workbook scope
    pub fn get(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.ranges
            .get(&Self::make_key(name, &NameScope::Sheet(current_sheet)))
            .or_else(|| self.ranges.get(&Self::make_key(name, &NameScope::Workbook)))
    }

    /// Get a named range by exact scope
    pub fn get_exact(&self, name: &str, scope: &NameScope) -> Option<&NamedRange> {
        self.ranges.get(&Self::make_key(name, scope))
    }

    /// Get a named range mutably by exact scope
    pub fn get_exact_mut(&mut self, name: &str, scope: &NameScope) -> Option<&mut NamedRange> {
        self.ranges.get_mut(&Self::make_key(name, scope))
    }

    /// Remove a named range
    pub fn remove(&mut self, name: &str, scope: &NameScope) -> Option<NamedRange> {
        let key = Self::make_key(name, scope);
        self.order.retain(|k| k != &key);
        self.ranges.remove(&key)
    }

    /// Check if a name exists in the given scope
    pub fn contains(&self, name: &str, scope: &NameScope) -> bool {
        self.ranges.contains_key(&Self::make_key(name, scope))
    }

    /// Iterate over all named ranges in definition order
    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        self.order.iter().filter_map(|k| self.ranges.get(k))
    }

    /// Iterate mutably over all named ranges
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut NamedRange> {
        self.ranges.values_mut()
    }

    /// Get the number of named ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

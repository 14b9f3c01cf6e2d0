//! Cell address and range types

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A cell address (e.g., "A1", "$B$2")
///
/// Rows and columns are 0-based internally. The `$` markers are only kept so an
/// address parsed from a named-range definition prints back the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ..., XFD=16383)
    pub col: u16,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
}

impl CellAddress {
    /// Create a new cell address with relative references
    pub fn new(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Create an absolute cell address ($A$1 style)
    pub fn absolute(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: true,
            col_absolute: true,
        }
    }

    /// Parse a cell address from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use tabula_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("B3").unwrap();
    /// assert_eq!((addr.row, addr.col), (2, 1));
    ///
    /// let addr = CellAddress::parse("$C$10").unwrap();
    /// assert!(addr.row_absolute && addr.col_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (col_absolute, rest) = match s.strip_prefix('$') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let letters_end = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        if letters_end == 0 {
            return Err(Error::InvalidAddress(format!("no column letters in '{}'", s)));
        }
        let col = Self::letters_to_column(&rest[..letters_end])?;

        let rest = &rest[letters_end..];
        let (row_absolute, digits) = match rest.strip_prefix('$') {
            Some(digits) => (true, digits),
            None => (false, rest),
        };
        if digits.is_empty() {
            return Err(Error::InvalidAddress(format!("no row number in '{}'", s)));
        }

        let row: u32 = digits
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", s)))?;
        if row == 0 {
            return Err(Error::InvalidAddress(format!(
                "row number must be >= 1 in '{}'",
                s
            )));
        }
        let row = row - 1;
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }

        Ok(Self {
            row,
            col,
            row_absolute,
            col_absolute,
        })
    }

    /// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
    pub fn column_to_letters(col: u16) -> String {
        let mut letters = Vec::new();
        let mut n = col as u32 + 1;
        while n > 0 {
            n -= 1;
            letters.push((b'A' + (n % 26) as u8) as char);
            n /= 26;
        }
        letters.iter().rev().collect()
    }

    /// Convert column letters to index (A = 0, Z = 25, AA = 26, etc.)
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
            if col > MAX_COLS as u32 {
                return Err(Error::ColumnOutOfBounds(
                    col.min(u16::MAX as u32) as u16,
                    MAX_COLS - 1,
                ));
            }
        }

        Ok((col - 1) as u16)
    }

    /// Format as A1-style string
    pub fn to_a1_string(&self) -> String {
        format!(
            "{}{}{}{}",
            if self.col_absolute { "$" } else { "" },
            Self::column_to_letters(self.col),
            if self.row_absolute { "$" } else { "" },
            self.row + 1
        )
    }

    /// The same address with the `$` markers dropped
    pub fn relative(&self) -> Self {
        Self::new(self.row, self.col)
    }

    /// Create a range from this address to another
    pub fn to(&self, other: CellAddress) -> CellRange {
        CellRange::new(*self, other)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A rectangle of cells (e.g., "A1:B10")
///
/// `start` is always the top-left corner and `end` the bottom-right corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// Start address (top-left)
    pub start: CellAddress,
    /// End address (bottom-right)
    pub end: CellAddress,
}

impl CellRange {
    /// Create a new cell range, normalizing the corners
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        Self {
            start: CellAddress {
                row: a.row.min(b.row),
                col: a.col.min(b.col),
                row_absolute: a.row_absolute,
                col_absolute: a.col_absolute,
            },
            end: CellAddress {
                row: a.row.max(b.row),
                col: a.col.max(b.col),
                row_absolute: b.row_absolute,
                col_absolute: b.col_absolute,
            },
        }
    }

    /// Create a range from row/column indices
    pub fn from_indices(start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> Self {
        Self::new(
            CellAddress::new(start_row, start_col),
            CellAddress::new(end_row, end_col),
        )
    }

    /// Create a single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse a range from A1:B10 notation
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().split_once(':') {
            Some((a, b)) => Ok(Self::new(CellAddress::parse(a)?, CellAddress::parse(b)?)),
            None => Ok(Self::single(CellAddress::parse(s)?)),
        }
    }

    /// The same range with the `$` markers dropped
    pub fn relative(&self) -> Self {
        Self {
            start: self.start.relative(),
            end: self.end.relative(),
        }
    }

    /// Check if a cell is within this range
    pub fn contains(&self, addr: &CellAddress) -> bool {
        self.contains_cell(addr.row, addr.col)
    }

    /// Check if a row/column pair is within this range
    pub fn contains_cell(&self, row: u32, col: u16) -> bool {
        row >= self.start.row && row <= self.end.row && col >= self.start.col && col <= self.end.col
    }

    /// Check if another range lies entirely within this one
    pub fn contains_range(&self, other: &CellRange) -> bool {
        self.contains(&other.start) && self.contains(&other.end)
    }

    /// Check if this range spans exactly the columns of `first_col..=last_col` or fewer
    pub fn within_columns(&self, first_col: u16, last_col: u16) -> bool {
        self.start.col >= first_col && self.end.col <= last_col
    }

    /// Get the number of rows in the range
    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Get the number of columns in the range
    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    /// Get the total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        self.row_count() as u64 * self.col_count() as u64
    }

    /// Check if this range overlaps with another
    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.start.row <= other.end.row
            && self.end.row >= other.start.row
            && self.start.col <= other.end.col
            && self.end.col >= other.start.col
    }

    /// Smallest range covering both ranges
    pub fn union(&self, other: &CellRange) -> CellRange {
        CellRange::from_indices(
            self.start.row.min(other.start.row),
            self.start.col.min(other.start.col),
            self.end.row.max(other.end.row),
            self.end.col.max(other.end.col),
        )
    }

    /// One row of this range (0-based offset from the first row)
    pub fn row(&self, offset: u32) -> CellRange {
        let row = self.start.row + offset;
        CellRange::from_indices(row, self.start.col, row, self.end.col)
    }

    /// The last row of this range
    pub fn last_row(&self) -> CellRange {
        self.row(self.row_count() - 1)
    }

    /// The trailing options row of a multi-row range
    ///
    /// A single-row range has no options row.
    pub fn options_row(&self) -> Option<CellRange> {
        (self.row_count() > 1).then(|| self.last_row())
    }

    /// The rows above the options row (the whole range when there is none)
    pub fn data_rows(&self) -> CellRange {
        if self.row_count() > 1 {
            CellRange::from_indices(
                self.start.row,
                self.start.col,
                self.end.row - 1,
                self.end.col,
            )
        } else {
            *self
        }
    }

    /// Same columns, `rows` rows starting at `start_row`
    ///
    /// Returns `None` when `rows` is zero.
    pub fn with_rows(&self, start_row: u32, rows: u32) -> Option<CellRange> {
        (rows > 0).then(|| {
            CellRange::from_indices(start_row, self.start.col, start_row + rows - 1, self.end.col)
        })
    }

    /// Move the range vertically by `delta` rows
    pub fn offset_rows(&self, delta: i64) -> Result<CellRange> {
        let start = self.start.row as i64 + delta;
        let end = self.end.row as i64 + delta;
        if start < 0 || end >= MAX_ROWS as i64 {
            return Err(Error::RowOutOfBounds(
                start.clamp(0, u32::MAX as i64) as u32,
                MAX_ROWS - 1,
            ));
        }
        Ok(CellRange::from_indices(
            start as u32,
            self.start.col,
            end as u32,
            self.end.col,
        ))
    }

    /// Where this range ends up after `count` rows are inserted at `at_row`
    /// in columns `first_col..=last_col`
    ///
    /// Ranges not contained in the column span are unaffected. A range that
    /// straddles the insertion point grows.
    pub fn shifted_for_insert(
        &self,
        at_row: u32,
        count: u32,
        first_col: u16,
        last_col: u16,
    ) -> CellRange {
        if count == 0 || !self.within_columns(first_col, last_col) || self.end.row < at_row {
            return *self;
        }
        let start_row = if self.start.row >= at_row {
            self.start.row + count
        } else {
            self.start.row
        };
        CellRange::from_indices(start_row, self.start.col, self.end.row + count, self.end.col)
    }

    /// Where this range ends up after rows `deleted` are removed and the
    /// cells below shift up
    ///
    /// Returns `None` when the range is deleted entirely. A range that
    /// straddles the deleted rows shrinks.
    pub fn shifted_for_delete(&self, deleted: &CellRange) -> Option<CellRange> {
        if !self.within_columns(deleted.start.col, deleted.end.col)
            || self.end.row < deleted.start.row
        {
            return Some(*self);
        }
        let count = deleted.row_count();
        if self.start.row > deleted.end.row {
            return Some(CellRange::from_indices(
                self.start.row - count,
                self.start.col,
                self.end.row - count,
                self.end.col,
            ));
        }

        let removed_above_end = self.end.row.min(deleted.end.row) + 1
            - self.start.row.max(deleted.start.row);
        let remaining = self.row_count() - removed_above_end;
        if remaining == 0 {
            return None;
        }
        let start_row = self.start.row.min(deleted.start.row);
        Some(CellRange::from_indices(
            start_row,
            self.start.col,
            start_row + remaining - 1,
            self.end.col,
        ))
    }

    /// Iterate over all cell addresses in the range (row by row)
    pub fn cells(&self) -> CellRangeIterator {
        CellRangeIterator {
            range: *self,
            current_row: self.start.row,
            current_col: self.start.col,
        }
    }

    /// Format as A1:B10 string
    pub fn to_a1_string(&self) -> String {
        if self.start == self.end {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start.to_a1_string(), self.end.to_a1_string())
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Iterator over cells in a range
pub struct CellRangeIterator {
    range: CellRange,
    current_row: u32,
    current_col: u16,
}

impl Iterator for CellRangeIterator {
    type Item = CellAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row > self.range.end.row {
            return None;
        }

        let addr = CellAddress::new(self.current_row, self.current_col);
        if self.current_col == self.range.end.col {
            self.current_col = self.range.start.col;
            self.current_row += 1;
        } else {
            self.current_col += 1;
        }

        Some(addr)
    }
}

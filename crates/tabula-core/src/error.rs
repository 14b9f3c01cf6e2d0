//! Grid errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the grid: bad addresses, out-of-range edits, name and sheet
/// bookkeeping
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// Row past the last one a sheet can hold, with that last row
    #[error("Row {0} is beyond the last row {1}")]
    RowOutOfBounds(u32, u32),

    /// Column past the last one a sheet can hold, with that last column
    #[error("Column {0} is beyond the last column {1}")]
    ColumnOutOfBounds(u16, u16),

    /// Sheet index and the number of sheets
    #[error("No sheet at index {0} (workbook has {1})")]
    SheetOutOfBounds(usize, usize),

    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),

    #[error("Sheet name already exists: {0}")]
    DuplicateSheetName(String),

    #[error("Invalid defined name: {0}")]
    InvalidName(String),

    /// A merge would overlap an existing merged region
    #[error("Range {0} overlaps a merged region")]
    MergedCellConflict(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}

//! # tabula-core
//!
//! Grid data structures for the tabula template engine.
//!
//! This crate provides the in-memory grid that templates are loaded into and
//! rendered on:
//! - [`CellValue`] - Represents cell values (text, numbers, dates, booleans, formulas, rich text)
//! - [`CellAddress`] and [`CellRange`] - Cell addressing and ranges
//! - [`Worksheet`] and [`Workbook`] - The document structures
//! - [`NamedRange`] - Named regions bound to one or more rectangles
//! - [`RangeBuffer`] - Owned scratch copy of a rectangle used for region-to-region copies
//! - [`PivotCache`] - Range-dependent caches refreshed after regions move
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{CellValue, CellRange, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", "Hello").unwrap();
//! sheet.set_cell_value_at(1, 0, CellValue::Number(3.0)).unwrap();
//!
//! // Shift everything below row 1 in columns A:C down by two rows
//! workbook.insert_rows_in(0, 1, 2, 0, 2).unwrap();
//! assert_eq!(workbook.worksheet(0).unwrap().get_value_at(3, 0), CellValue::Number(3.0));
//! # let _ = CellRange::parse("A1:C3");
//! ```

pub mod buffer;
pub mod cell;
pub mod comment;
pub mod error;
pub mod hyperlink;
pub mod named_range;
pub mod pivot;
pub mod style;
pub mod workbook;
pub mod worksheet;

// Re-exports for convenience
pub use buffer::RangeBuffer;
pub use cell::{CellAddress, CellData, CellRange, CellValue, RichText, SharedString, TextRun};
pub use comment::CellComment;
pub use error::{Error, Result};
pub use hyperlink::Hyperlink;
pub use named_range::{NameScope, NamedRange, NamedRangeCollection, SheetRange};
pub use pivot::PivotCache;
pub use style::{Color, FontStyle, Style, StylePool};
pub use workbook::Workbook;
pub use worksheet::{SortKey, Worksheet};

/// Maximum number of rows in a worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;

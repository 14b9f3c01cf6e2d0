//! # tabula-csv
//!
//! CSV templates for tabula: a CSV file loads into a one-sheet
//! [`Workbook`](tabula_core::Workbook) and a rendered sheet writes back out.

mod error;
mod options;
mod reader;
mod writer;

pub use error::{CsvError, CsvResult};
pub use options::{CsvReadOptions, CsvWriteOptions, LineTerminator};
pub use reader::CsvReader;
pub use writer::CsvWriter;

//! CSV error types

use thiserror::Error;

/// Result type for CSV operations
pub type CsvResult<T> = std::result::Result<T, CsvError>;

/// Errors that can occur while loading or writing CSV
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The delimiter or quote is not a single ASCII character
    #[error("Invalid {what} '{value}': expected a single ASCII character")]
    InvalidByte { what: &'static str, value: String },

    #[error("Grid error: {0}")]
    Core(#[from] tabula_core::Error),
}

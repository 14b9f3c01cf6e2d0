//! Report error types

use std::fmt;

use tabula_core::CellRange;
use tabula_expr::ExprError;
use thiserror::Error;
use tracing::warn;

/// Result type for report operations
pub type ReportResult<T> = std::result::Result<T, ReportError>;

/// Errors raised while interpreting a template
#[derive(Debug, Error)]
pub enum ReportError {
    /// A directive's precondition or runtime check failed; recorded, not fatal
    #[error("{message}")]
    Directive { message: String, range: CellRange },

    /// The grid refused an operation; fatal for the render
    #[error(transparent)]
    Grid(#[from] tabula_core::Error),

    /// Expression failure surfaced outside a single cell
    #[error(transparent)]
    Expression(#[from] ExprError),
}

impl ReportError {
    /// Create a directive error anchored at `range`
    pub fn directive<S: Into<String>>(message: S, range: CellRange) -> Self {
        ReportError::Directive {
            message: message.into(),
            range,
        }
    }
}

/// A recoverable failure recorded during rendering
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateError {
    pub message: String,
    pub sheet: String,
    pub range: CellRange,
}

impl TemplateError {
    pub fn new(message: impl Into<String>, sheet: impl Into<String>, range: CellRange) -> Self {
        Self {
            message: message.into(),
            sheet: sheet.into(),
            range,
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}: {}", self.sheet, self.range, self.message)
    }
}

/// The error sink of one render, in the order failures happened
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateErrors {
    errors: Vec<TemplateError>,
}

impl TemplateErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure
    pub fn add(&mut self, error: TemplateError) {
        warn!(sheet = %error.sheet, range = %error.range, "{}", error.message);
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TemplateError> {
        self.errors.iter()
    }

    /// Messages only, in order
    pub fn messages(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.message.as_str()).collect()
    }

    pub fn into_vec(self) -> Vec<TemplateError> {
        self.errors
    }

    /// Take over errors recorded against a scratch copy of a block that now
    /// sits `rows` rows down and `cols` columns right on `sheet`
    pub(crate) fn extend_shifted(&mut self, other: TemplateErrors, sheet: &str, rows: u32, cols: u16) {
        for mut error in other.errors {
            error.sheet = sheet.to_string();
            error.range = CellRange::from_indices(
                error.range.start.row + rows,
                error.range.start.col + cols,
                error.range.end.row + rows,
                error.range.end.col + cols,
            );
            self.errors.push(error);
        }
    }
}

impl<'a> IntoIterator for &'a TemplateErrors {
    type Item = &'a TemplateError;
    type IntoIter = std::slice::Iter<'a, TemplateError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl IntoIterator for TemplateErrors {
    type Item = TemplateError;
    type IntoIter = std::vec::IntoIter<TemplateError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

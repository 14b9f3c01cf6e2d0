//! What a directive sees while it runs

use tabula_core::{CellRange, Workbook};

/// The workbook and the rows a tag list runs over
pub struct ProcessingContext<'a> {
    pub workbook: &'a mut Workbook,
    pub sheet_index: usize,
    /// Rows the directives act on
    pub range: CellRange,
}

impl<'a> ProcessingContext<'a> {
    pub fn new(workbook: &'a mut Workbook, sheet_index: usize, range: CellRange) -> Self {
        Self {
            workbook,
            sheet_index,
            range,
        }
    }

    /// Name of the sheet being processed, empty if it no longer exists
    pub fn sheet_name(&self) -> String {
        self.workbook
            .worksheet(self.sheet_index)
            .map(|ws| ws.name().to_string())
            .unwrap_or_default()
    }
}

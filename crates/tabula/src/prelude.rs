//! Prelude module - common imports for tabula users
//!
//! ```rust
//! use tabula::prelude::*;
//! ```

pub use crate::{
    CellAddress,
    CellRange,
    CellValue,
    CsvReader,
    CsvWriter,
    Error,
    Parameter,
    Record,
    RenderOptions,
    ReportTemplate,
    Result,
    TemplateErrors,
    Value,
    Workbook,
    // Extension traits
    WorkbookExt,
    Worksheet,
};

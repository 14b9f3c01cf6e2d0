//! # tabula
//!
//! A spreadsheet template engine.
//!
//! A template is a worksheet whose cells hold `{{ expr }}` placeholders and
//! `<<name ...>>` directives. Named ranges mark regions that repeat once per
//! item of a list, recursively. Rendering fills the template in place and
//! returns the recoverable errors it met along the way.
//!
//! ## Features
//!
//! - Expression placeholders with records, lists, lambdas and a pluggable
//!   function registry
//! - Repeating regions with an options row per region
//! - Sort directives (`<<sort>>`, `<<asc>>`, `<<desc>>`)
//! - CSV templates in, CSV output out
//!
//! ## Example
//!
//! ```rust
//! use tabula::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", "{{item.Name}}").unwrap();
//! sheet.set_cell_value("B1", "{{item.Score}}").unwrap();
//! sheet.set_cell_value("B2", "<<desc>>").unwrap();
//! workbook.define_name("Players", "Sheet1!A1:B2").unwrap();
//!
//! let players = Value::list(vec![
//!     Record::new().with("Name", "Ann").with("Score", 3).into(),
//!     Record::new().with("Name", "Bob").with("Score", 7).into(),
//! ]);
//! let mut report = ReportTemplate::new(workbook);
//! report.add_variable("Players", players);
//! let errors = report.render().unwrap();
//! assert!(errors.is_empty());
//!
//! let sheet = report.workbook().worksheet(0).unwrap();
//! assert_eq!(sheet.get_value_at(0, 0), CellValue::string("Bob"));
//! ```

pub mod prelude;

pub use tabula_core::{
    CellAddress, CellComment, CellData, CellRange, CellValue, Color, Error, FontStyle, Hyperlink,
    NameScope, NamedRange, PivotCache, RangeBuffer, Result, RichText, SheetRange, SortKey, Style,
    TextRun, Workbook, Worksheet,
};

pub use tabula_expr::{
    global_registry, install, Evaluator, ExprError, ExprResult, FunctionDef, FunctionRegistry,
    Parameter, Record, StaticMember, Value,
};

pub use tabula_report::{
    OptionTag, RangeInterpreter, RenderOptions, ReportError, ReportResult, ReportTemplate,
    TagKind, TagsList, TemplateError, TemplateErrors, LIST_RANGE_MISUSE,
};

pub use tabula_csv::{CsvError, CsvReadOptions, CsvReader, CsvWriteOptions, CsvWriter};

use std::path::Path;

/// Extension trait for Workbook to add file I/O
pub trait WorkbookExt {
    /// Open a template from a file
    fn open<P: AsRef<Path>>(path: P) -> Result<Workbook>;

    /// Save the first worksheet to a file
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()>;
}

impl WorkbookExt for Workbook {
    fn open<P: AsRef<Path>>(path: P) -> Result<Workbook> {
        let path = path.as_ref();
        match extension(path).as_deref() {
            Some("csv") => CsvReader::read_file(path, &CsvReadOptions::default())
                .map_err(|e| Error::other(e.to_string())),
            _ => Err(Error::other(format!(
                "Unsupported file format: {}",
                path.display()
            ))),
        }
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        match extension(path).as_deref() {
            Some("csv") => {
                let sheet = self
                    .worksheet(0)
                    .ok_or_else(|| Error::other("No worksheets to save"))?;
                CsvWriter::write_file(sheet, path, &CsvWriteOptions::default())
                    .map_err(|e| Error::other(e.to_string()))
            }
            _ => Err(Error::other(format!(
                "Unsupported file format: {}",
                path.display()
            ))),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

//! # tabula-report
//!
//! Template interpretation for the tabula template engine.
//!
//! A template is an ordinary [`Workbook`](tabula_core::Workbook) whose cells
//! carry `{{ expr }}` placeholders and `<<name ...>>` directives, and whose
//! named ranges mark regions to repeat once per item of a list:
//! - [`RangeInterpreter`] - Renders one rectangle, recursing into regions
//! - [`TagsList`] and [`TagsEvaluator`] - Directive parsing and execution
//! - [`ReportTemplate`] - Renders every sheet of a workbook
//! - [`TemplateErrors`] - Recoverable failures collected during a render
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{CellValue, Workbook};
//! use tabula_expr::{Record, Value};
//! use tabula_report::ReportTemplate;
//!
//! let mut wb = Workbook::new();
//! let ws = wb.worksheet_mut(0).unwrap();
//! ws.set_cell_value("A1", "{{item.Name}}").unwrap();
//! wb.define_name("People", "Sheet1!A1").unwrap();
//!
//! let mut report = ReportTemplate::new(wb);
//! report.add_variable(
//!     "People",
//!     Value::list(vec![
//!         Record::new().with("Name", "Ann").into(),
//!         Record::new().with("Name", "Bob").into(),
//!     ]),
//! );
//! report.render().unwrap();
//!
//! let ws = report.workbook().worksheet(0).unwrap();
//! assert_eq!(ws.get_value_at(1, 0), CellValue::string("Bob"));
//! ```

pub mod context;
pub mod convert;
pub mod error;
pub mod interpreter;
pub mod options;
pub mod report;
pub mod tags;

pub use context::ProcessingContext;
pub use convert::{from_cell_value, to_cell_value};
pub use error::{ReportError, ReportResult, TemplateError, TemplateErrors};
pub use interpreter::{RangeInterpreter, LIST_RANGE_MISUSE};
pub use options::RenderOptions;
pub use report::ReportTemplate;
pub use tags::{
    global_tag_registry, OptionTag, TagKind, TagParameters, TagRegistry, TagsEvaluator, TagsList,
    PRIORITY_HIGH, PRIORITY_LOW, PRIORITY_NORMAL,
};

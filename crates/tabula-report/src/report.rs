//! Workbook-level rendering

use std::sync::Arc;

use tabula_core::{CellRange, Workbook};
use tabula_expr::{global_registry, Evaluator, FunctionRegistry, Value};
use tracing::debug;

use crate::error::{ReportResult, TemplateErrors};
use crate::interpreter::RangeInterpreter;
use crate::options::RenderOptions;

/// A template workbook plus the variables published to it
///
/// ```
/// use tabula_core::{CellValue, Workbook};
/// use tabula_report::ReportTemplate;
///
/// let mut wb = Workbook::new();
/// wb.worksheet_mut(0).unwrap().set_cell_value_at(0, 0, "Hello {{name}}").unwrap();
///
/// let mut report = ReportTemplate::new(wb);
/// report.add_variable("name", "world");
/// let errors = report.render().unwrap();
///
/// assert!(errors.is_empty());
/// assert_eq!(
///     report.workbook().worksheet(0).unwrap().get_value_at(0, 0),
///     CellValue::string("Hello world")
/// );
/// ```
#[derive(Debug)]
pub struct ReportTemplate {
    workbook: Workbook,
    variables: Vec<(String, Value)>,
    registry: Arc<FunctionRegistry>,
    options: RenderOptions,
}

impl ReportTemplate {
    pub fn new(workbook: Workbook) -> Self {
        Self::with_options(workbook, RenderOptions::default())
    }

    pub fn with_options(workbook: Workbook, options: RenderOptions) -> Self {
        Self {
            workbook,
            variables: Vec::new(),
            registry: global_registry(),
            options,
        }
    }

    /// Use `registry` instead of the process-wide function registry
    pub fn with_registry(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Publish a variable; a later value under the same name (any case) wins
    pub fn add_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self
            .variables
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(slot) => *slot = (name, value),
            None => self.variables.push((name, value)),
        }
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn workbook_mut(&mut self) -> &mut Workbook {
        &mut self.workbook
    }

    pub fn into_workbook(self) -> Workbook {
        self.workbook
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render every worksheet in place
    ///
    /// Recoverable failures are returned; rendering continues past them.
    pub fn render(&mut self) -> ReportResult<TemplateErrors> {
        let mut errors = TemplateErrors::new();
        for sheet_index in 0..self.workbook.sheet_count() {
            let Some(range) = self.template_range(sheet_index) else {
                continue;
            };
            let mut interpreter = RangeInterpreter::with_evaluator(
                "",
                Evaluator::with_registry(self.registry.clone()),
                self.options.clone(),
            );
            for (name, value) in &self.variables {
                interpreter.add_variable(name, value.clone());
            }
            debug!(sheet = sheet_index, range = %range, "rendering sheet");
            interpreter.evaluate(&mut self.workbook, sheet_index, range, &mut errors)?;
        }
        Ok(errors)
    }

    /// Used range of a sheet, grown to cover every name rectangle on it
    fn template_range(&self, sheet_index: usize) -> Option<CellRange> {
        let ws = self.workbook.worksheet(sheet_index)?;
        self.workbook
            .named_ranges()
            .iter()
            .flat_map(|n| n.ranges_on(ws.name()).map(CellRange::relative).collect::<Vec<_>>())
            .fold(ws.used_range(), |acc, r| {
                Some(acc.map_or(r, |acc| acc.union(&r)))
            })
            .map(|r| CellRange::from_indices(0, 0, r.end.row, r.end.col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tabula_core::CellValue;
    use tabula_expr::Record;

    #[test]
    fn test_variables_replaced_case_insensitively() {
        let mut report = ReportTemplate::new(Workbook::new());
        report.add_variable("Title", "a");
        report.add_variable("title", "b");
        assert_eq!(report.variables.len(), 1);
        assert_eq!(report.variables[0].1, Value::from("b"));
    }

    #[test]
    fn test_renders_every_sheet() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Detail").unwrap();
        wb.worksheet_mut(0).unwrap().set_cell_value_at(0, 0, "{{title}}").unwrap();
        let detail = wb.worksheet_mut(1).unwrap();
        detail.set_cell_value_at(1, 0, "{{item.Sku}}").unwrap();
        wb.define_name("Lines", "Detail!A2").unwrap();

        let mut report = ReportTemplate::new(wb);
        report.add_variable("title", "Summary");
        report.add_variable(
            "Lines",
            Value::list(vec![
                Record::new().with("Sku", "X1").into(),
                Record::new().with("Sku", "X2").into(),
            ]),
        );
        let errors = report.render().unwrap();

        assert!(errors.is_empty());
        let wb = report.into_workbook();
        assert_eq!(wb.worksheet(0).unwrap().get_value_at(0, 0), CellValue::string("Summary"));
        let detail = wb.worksheet(1).unwrap();
        assert_eq!(detail.get_value_at(1, 0), CellValue::string("X1"));
        assert_eq!(detail.get_value_at(2, 0), CellValue::string("X2"));
    }

    #[test]
    fn test_empty_region_beyond_used_range() {
        // Only the name covers row 3; the cells are blank
        let mut wb = Workbook::new();
        wb.worksheet_mut(0).unwrap().set_cell_value_at(0, 0, "head").unwrap();
        wb.define_name("Rows", "Sheet1!A3:B3").unwrap();

        let mut report = ReportTemplate::new(wb);
        report.add_variable("Rows", Value::list(Vec::new()));
        let errors = report.render().unwrap();

        assert!(errors.is_empty());
        let names = report.workbook().get_named_range("Rows", 0).unwrap();
        assert!(names.ranges().is_empty());
    }
}

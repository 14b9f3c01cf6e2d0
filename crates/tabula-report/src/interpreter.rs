//! Region interpreter
//!
//! A [`RangeInterpreter`] renders one rectangle of a worksheet in four steps:
//!
//! 1. placeholders in cells outside bound regions are evaluated in place;
//! 2. named ranges inside the rectangle whose name resolves to a list are
//!    bound to that list;
//! 3. every bound rectangle is expanded: its data rows are rendered once per
//!    item on a scratch workbook by a nested interpreter, followed by the
//!    options row, and the result is spliced back over the rectangle;
//! 4. directives left in the rectangle are parsed and executed.
//!
//! The last row of a multi-row region is its options row. It is rendered
//! once after the items with `items` in scope, and its directives act on the
//! generated rows. A blank options row is removed after rendering.

use std::rc::Rc;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use tabula_core::{
    CellAddress, CellRange, CellValue, NameScope, NamedRange, RangeBuffer, SheetRange, Workbook,
    Worksheet,
};
use tabula_expr::{has_placeholders, Evaluator, ExprError, Parameter, Value, Variables};
use tracing::{debug, trace};

use crate::context::ProcessingContext;
use crate::convert::to_cell_value;
use crate::error::{ReportError, ReportResult, TemplateError, TemplateErrors};
use crate::options::RenderOptions;
use crate::tags::parser::has_tag;
use crate::tags::{TagsEvaluator, TagsList};

/// Written next to an `item` placeholder found outside any list region
pub const LIST_RANGE_MISUSE: &str =
    "The range does not meet the requirements of the list ranges. For details, see the documentation.";

/// A region name bound to the list it repeats over
struct BoundRange {
    name: String,
    items: Arc<Vec<Value>>,
}

/// Renders a rectangle of a worksheet and, recursively, the regions in it
#[derive(Debug, Clone)]
pub struct RangeInterpreter {
    /// Prefix of the flattened item fields (`alias_Field`)
    alias: String,
    evaluator: Evaluator,
    tags_evaluator: TagsEvaluator,
    /// Names regions bind to; a nested interpreter layers over its parent's
    variables: Rc<Variables>,
    /// Directive lists, keyed by the A1 text of the range they were parsed from
    tags: AHashMap<String, TagsList>,
    /// Lower-cased names of the regions bound so far
    bound: AHashSet<String>,
    options: RenderOptions,
    depth: usize,
}

impl RangeInterpreter {
    pub fn new(alias: impl Into<String>, options: RenderOptions) -> Self {
        Self::with_evaluator(alias, Evaluator::new(), options)
    }

    pub fn with_evaluator(alias: impl Into<String>, evaluator: Evaluator, options: RenderOptions) -> Self {
        Self {
            alias: alias.into(),
            evaluator,
            tags_evaluator: TagsEvaluator::new(),
            variables: Rc::new(Variables::new()),
            tags: AHashMap::new(),
            bound: AHashSet::new(),
            options,
            depth: 0,
        }
    }

    /// Interpreter for the items of region `alias`, one level down
    fn nested(&self, alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            evaluator: self.evaluator.scoped(),
            tags_evaluator: self.tags_evaluator.clone(),
            variables: Rc::new(Variables::child(&self.variables)),
            tags: AHashMap::new(),
            bound: AHashSet::new(),
            options: self.options.clone(),
            depth: self.depth + 1,
        }
    }

    /// Publish a variable to placeholders and to region binding
    pub fn add_variable(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        Rc::make_mut(&mut self.variables).insert(name, value.clone());
        self.evaluator.add_variable(name, value);
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Render `range` on sheet `sheet_index`
    ///
    /// Returns the rectangle the range covers afterwards: regions inside it
    /// may have added or removed rows.
    pub fn evaluate(
        &mut self,
        workbook: &mut Workbook,
        sheet_index: usize,
        range: CellRange,
        errors: &mut TemplateErrors,
    ) -> ReportResult<CellRange> {
        self.render(workbook, sheet_index, range, &[], errors)
    }

    fn render(
        &mut self,
        workbook: &mut Workbook,
        sheet_index: usize,
        range: CellRange,
        params: &[Parameter],
        errors: &mut TemplateErrors,
    ) -> ReportResult<CellRange> {
        let range_name = range.to_string();
        let range = self.evaluate_values(workbook, sheet_index, range, params, errors)?;
        self.parse_tags(workbook, sheet_index, range, &range_name)?;
        self.tags_postprocessing(workbook, sheet_index, &range_name, range, errors)?;
        Ok(range)
    }

    /// Evaluate placeholders and expand bound regions inside `range`
    pub fn evaluate_values(
        &mut self,
        workbook: &mut Workbook,
        sheet_index: usize,
        range: CellRange,
        params: &[Parameter],
        errors: &mut TemplateErrors,
    ) -> ReportResult<CellRange> {
        for param in params {
            self.add_parameter(param);
        }
        let sheet = sheet_name(workbook, sheet_index)?;

        let candidates = workbook.names_within(&sheet, &range);
        let mut bound: Vec<BoundRange> = Vec::new();
        for (name, _) in &candidates {
            if bound.iter().any(|b| b.name.eq_ignore_ascii_case(name)) {
                continue;
            }
            if let Some(items) = self.try_bind(name, params) {
                bound.push(BoundRange {
                    name: name.clone(),
                    items,
                });
            }
        }
        let bound_rects: Vec<CellRange> = candidates
            .iter()
            .filter(|(name, _)| bound.iter().any(|b| b.name.eq_ignore_ascii_case(name)))
            .map(|(_, r)| *r)
            .collect();

        self.evaluate_cells(workbook, sheet_index, &range, &bound_rects, params, errors)?;

        let mut current = range;
        let mut shifts = Vec::new();
        for region in &bound {
            self.bound.insert(region.name.to_lowercase());

            let mut rects = region_rects(workbook, sheet_index, &sheet, &region.name, &current);
            // Bottom-up, so a splice never moves a rectangle still to come
            rects.sort_by(|a, b| b.start.row.cmp(&a.start.row));
            for rect in rects {
                shifts.push(
                    self.expand_region(workbook, sheet_index, &sheet, region, rect, params, errors)?,
                );
            }
            current = resize_rows(range, extent_delta(&range, &shifts));
        }
        Ok(current)
    }

    /// Parse the directives of `range` into the list stored under `range_name`
    ///
    /// Cells of bound regions are skipped: their directives belong to the
    /// region's own pass.
    pub fn parse_tags(
        &mut self,
        workbook: &mut Workbook,
        sheet_index: usize,
        range: CellRange,
        range_name: &str,
    ) -> ReportResult<()> {
        let sheet = sheet_name(workbook, sheet_index)?;
        let regions: Vec<CellRange> = workbook
            .names_within(&sheet, &range)
            .into_iter()
            .filter(|(name, _)| {
                self.variables.contains(name) || self.bound.contains(&name.to_lowercase())
            })
            .map(|(_, r)| r)
            .collect();

        let ws = sheet_mut(workbook, sheet_index)?;
        let cells = tagged_cells(ws, &range, &regions);
        let list = self.tags.entry(range_name.to_string()).or_default();
        for cell in cells {
            list.add_range(self.tags_evaluator.apply_tags_to(ws, cell, &range)?);
        }
        Ok(())
    }

    /// Execute the directives stored under `range_name` over `range`
    pub fn tags_postprocessing(
        &mut self,
        workbook: &mut Workbook,
        sheet_index: usize,
        range_name: &str,
        range: CellRange,
        errors: &mut TemplateErrors,
    ) -> ReportResult<()> {
        let Some(list) = self.tags.get_mut(range_name) else {
            return Ok(());
        };
        let mut context = ProcessingContext::new(workbook, sheet_index, range);
        list.execute(&mut context, errors)
    }

    /// Publish the fields of a record parameter as `alias_Field` variables
    fn add_parameter(&mut self, param: &Parameter) {
        let Value::Record(record) = &param.value else {
            return;
        };
        let alias = param.alias.as_deref().unwrap_or(&self.alias);
        let prefix = if alias.is_empty() {
            String::new()
        } else {
            format!("{}_", alias)
        };
        for (field, value) in record.fields() {
            Rc::make_mut(&mut self.variables).insert(&format!("{}{}", prefix, field), value.clone());
        }
    }

    /// The list a region name refers to, if any
    ///
    /// A variable of that name comes first; otherwise the name is read as a
    /// path with `_` separating members (`Customer_Orders` is
    /// `Customer.Orders`).
    fn try_bind(&self, name: &str, params: &[Parameter]) -> Option<Arc<Vec<Value>>> {
        if let Some(Value::List(items)) = self.variables.get(name) {
            return Some(items.clone());
        }
        let expression = format!("{{{{{}}}}}", name.replace('_', "."));
        match self.evaluator.try_evaluate(&expression, params) {
            Some(Value::List(items)) => Some(items),
            _ => None,
        }
    }

    /// Evaluate the placeholder cells, comments and hyperlinks of `range`
    /// that lie outside `skip`
    fn evaluate_cells(
        &self,
        workbook: &mut Workbook,
        sheet_index: usize,
        range: &CellRange,
        skip: &[CellRange],
        params: &[Parameter],
        errors: &mut TemplateErrors,
    ) -> ReportResult<()> {
        let ws = sheet_mut(workbook, sheet_index)?;
        let sheet = ws.name().to_string();
        let templated = |row: u32, col: u16| {
            range.contains_cell(row, col) && !skip.iter().any(|r| r.contains_cell(row, col))
        };

        let cells: Vec<(u32, u16)> = ws
            .cells_in(range)
            .filter(|(row, col, data)| {
                !data.value.is_formula()
                    && cell_text(&data.value).map_or(false, |t| has_placeholders(&t))
                    && templated(*row, *col)
            })
            .map(|(row, col, _)| (row, col))
            .collect();
        for (row, col) in cells {
            self.evaluate_cell(ws, &sheet, row, col, params, errors)?;
        }

        let comments: Vec<(u32, u16)> = ws
            .comments()
            .filter(|((row, col), c)| templated(*row, *col) && has_placeholders(&c.text))
            .map(|(at, _)| at)
            .collect();
        for (row, col) in comments {
            let Some(text) = ws.comment_at(row, col).map(|c| c.text.clone()) else {
                continue;
            };
            let rendered = self.eval_string(&text, &sheet, row, col, params, errors);
            if let Some(comment) = ws.comment_at_mut(row, col) {
                comment.set_text(rendered);
            }
        }

        let links: Vec<(u32, u16)> = ws
            .hyperlinks()
            .filter(|((row, col), l)| templated(*row, *col) && has_placeholders(l.target()))
            .map(|(at, _)| at)
            .collect();
        for (row, col) in links {
            let Some(target) = ws.hyperlink_at(row, col).map(|l| l.target().to_string()) else {
                continue;
            };
            let rendered = self.eval_string(&target, &sheet, row, col, params, errors);
            if let Some(link) = ws.hyperlink_at_mut(row, col) {
                link.set_target(rendered);
            }
        }
        Ok(())
    }

    fn evaluate_cell(
        &self,
        ws: &mut Worksheet,
        sheet: &str,
        row: u32,
        col: u16,
        params: &[Parameter],
        errors: &mut TemplateErrors,
    ) -> ReportResult<()> {
        let value = ws.get_value_at(row, col);
        let Some(text) = cell_text(&value) else {
            return Ok(());
        };
        trace!(cell = %CellAddress::new(row, col), "evaluating cell");

        let formula = text.strip_prefix("&=");
        let result = self.evaluator.evaluate(formula.unwrap_or(&text), params);
        match (result, value) {
            (Ok(v), _) if formula.is_some() => ws.set_cell_formula_at(row, col, &v.to_text())?,
            (Ok(v), CellValue::RichText(mut rich)) => {
                rich.set_text(v.to_text());
                ws.set_cell_value_at(row, col, CellValue::RichText(rich))?;
            }
            (Ok(v), _) => ws.set_cell_value_at(row, col, to_cell_value(&v))?,
            (Err(e), _) => self.write_error(ws, sheet, row, col, &e, params.is_empty(), errors)?,
        }
        Ok(())
    }

    /// Replace a failing cell with its error message, in the error color
    #[allow(clippy::too_many_arguments)]
    fn write_error(
        &self,
        ws: &mut Worksheet,
        sheet: &str,
        row: u32,
        col: u16,
        error: &ExprError,
        top_level: bool,
        errors: &mut TemplateErrors,
    ) -> ReportResult<()> {
        let color = self.options.error_color;
        if top_level && error.unknown_identifier() == Some("item") {
            let hint_row = row.saturating_sub(1);
            ws.set_cell_value_at(hint_row, 0, LIST_RANGE_MISUSE)?;
            ws.set_font_color_at(hint_row, 0, color)?;
            errors.add(TemplateError::new(
                LIST_RANGE_MISUSE,
                sheet,
                CellRange::single(CellAddress::new(hint_row, 0)),
            ));
        }

        let message = error.to_string();
        ws.set_cell_value_at(row, col, message.as_str())?;
        ws.set_font_color_at(row, col, color)?;
        errors.add(TemplateError::new(
            message,
            sheet,
            CellRange::single(CellAddress::new(row, col)),
        ));
        Ok(())
    }

    /// Evaluate text that is not a cell value; failures yield the message
    fn eval_string(
        &self,
        text: &str,
        sheet: &str,
        row: u32,
        col: u16,
        params: &[Parameter],
        errors: &mut TemplateErrors,
    ) -> String {
        match self.evaluator.evaluate(text, params) {
            Ok(v) => v.to_text(),
            Err(e) => {
                let message = e.to_string();
                errors.add(TemplateError::new(
                    message.clone(),
                    sheet,
                    CellRange::single(CellAddress::new(row, col)),
                ));
                message
            }
        }
    }

    /// Expand one rectangle of a bound region
    ///
    /// Returns the rectangle's columns and the number of rows it grew by
    /// (negative when it shrank).
    #[allow(clippy::too_many_arguments)]
    fn expand_region(
        &self,
        workbook: &mut Workbook,
        sheet_index: usize,
        sheet: &str,
        region: &BoundRange,
        rect: CellRange,
        params: &[Parameter],
        errors: &mut TemplateErrors,
    ) -> ReportResult<ColumnShift> {
        let name = region.name.as_str();
        let items = &region.items;
        let ws = sheet_ref(workbook, sheet_index)?;
        let grown = ws.grow_to_merged(&rect);

        let options_row_empty = grown.options_row().map_or(true, |r| ws.is_range_blank(&r));
        if items.is_empty() && options_row_empty {
            debug!(region = name, range = %grown, "removing empty region");
            workbook.delete_rows_in(sheet_index, &grown)?;
            return Ok(ColumnShift::new(&grown, -(grown.row_count() as i64)));
        }
        if self.depth >= self.options.max_depth {
            errors.add(TemplateError::new(
                format!(
                    "Region '{}' is nested more than {} levels deep and was not expanded",
                    name, self.options.max_depth
                ),
                sheet,
                grown,
            ));
            return Ok(ColumnShift::new(&grown, 0));
        }

        let data = grown.data_rows();
        let template = RangeBuffer::extract(ws, &data);
        let options_template = grown.options_row().map(|r| RangeBuffer::extract(ws, &r));
        let inner = inner_names(workbook, sheet, name, &data);

        // Render every item on its own scratch sheet
        let mut buffer = RangeBuffer::new(grown.col_count());
        let mut generated: Vec<(String, CellRange)> = Vec::new();
        let item_range = CellRange::from_indices(0, 0, data.row_count() - 1, data.col_count() - 1);
        for item in items.iter() {
            let mut scratch = Workbook::empty();
            let scratch_index = scratch.add_worksheet_with_name(sheet)?;
            template.paste(sheet_mut(&mut scratch, scratch_index)?, CellAddress::new(0, 0))?;
            for (inner_name, ranges) in &inner {
                let ranges = ranges.iter().map(|r| SheetRange::new(sheet, *r)).collect();
                scratch.define_named_range(NamedRange::new(inner_name.clone(), ranges, NameScope::Workbook))?;
            }

            let mut nested = self.nested(name);
            let mut item_errors = TemplateErrors::new();
            let params = [Parameter::new("item", item.clone())];
            let rendered = nested.render(&mut scratch, scratch_index, item_range, &params, &mut item_errors)?;

            let block = RangeBuffer::extract(sheet_ref(&scratch, scratch_index)?, &rendered);
            let offset = buffer.append(&block);
            errors.extend_shifted(item_errors, sheet, grown.start.row + offset, grown.start.col);
            for named in scratch.named_ranges().iter() {
                for r in named.ranges_on(sheet).filter(|r| rendered.contains_range(r)) {
                    let at = translate(r, grown.start.row + offset, grown.start.col);
                    generated.push((named.name.clone(), at));
                }
            }
        }
        if let Some(options) = &options_template {
            buffer.append(options);
        }

        // Detach the stale rectangles before rows move under them
        let scope = workbook
            .get_named_range(name, sheet_index)
            .map(|n| n.scope.clone());
        let mut slot = None;
        if let Some(named) = region_name_mut(workbook, name, scope.as_ref()) {
            let mut ranges = named.ranges().to_vec();
            slot = ranges
                .iter()
                .position(|r| r.is_on(sheet) && r.range.relative() == rect);
            if let Some(at) = slot {
                ranges.remove(at);
                named.set_ranges(ranges);
            }
        }
        for named in workbook.named_ranges_mut().iter_mut() {
            let Some((_, stale)) = inner.iter().find(|(n, _)| n.eq_ignore_ascii_case(&named.name)) else {
                continue;
            };
            let stale: Vec<CellRange> = stale
                .iter()
                .map(|r| translate(r, data.start.row, data.start.col))
                .collect();
            let ranges = named
                .ranges()
                .iter()
                .filter(|r| !(r.is_on(sheet) && stale.contains(&r.range.relative())))
                .cloned()
                .collect();
            named.set_ranges(ranges);
        }

        // Splice the buffer over the rectangle
        let old_rows = grown.row_count();
        let new_rows = buffer.row_count();
        if new_rows > old_rows {
            workbook.insert_rows_in(
                sheet_index,
                grown.end.row,
                new_rows - old_rows,
                grown.start.col,
                grown.end.col,
            )?;
        } else if new_rows < old_rows {
            workbook.delete_rows_in(
                sheet_index,
                &CellRange::from_indices(
                    grown.start.row + new_rows,
                    grown.start.col,
                    grown.end.row,
                    grown.end.col,
                ),
            )?;
        }
        let mut delta = new_rows as i64 - old_rows as i64;
        let Some(target) = buffer.paste(sheet_mut(workbook, sheet_index)?, grown.start)? else {
            return Ok(ColumnShift::new(&grown, delta));
        };

        if let Some(named) = region_name_mut(workbook, name, scope.as_ref()) {
            let mut ranges = named.ranges().to_vec();
            let at = slot.unwrap_or(ranges.len()).min(ranges.len());
            ranges.insert(at, SheetRange::new(sheet, target));
            named.set_ranges(ranges);
        }
        for (inner_name, at) in generated {
            if let Some(named) = workbook
                .named_ranges_mut()
                .iter_mut()
                .find(|n| n.name.eq_ignore_ascii_case(&inner_name))
            {
                let mut ranges = named.ranges().to_vec();
                ranges.push(SheetRange::new(sheet, at));
                named.set_ranges(ranges);
            }
        }
        debug!(region = name, from = %grown, to = %target, items = items.len(), "expanded region");

        if grown.options_row().is_some() {
            let options_row = target.last_row();
            let mut options_params = vec![Parameter::new("items", Value::List(items.clone()))];
            options_params.extend(params.iter().cloned());
            self.evaluate_cells(workbook, sheet_index, &options_row, &[], &options_params, errors)?;

            let mut list = TagsList::new();
            let ws = sheet_mut(workbook, sheet_index)?;
            for cell in tagged_cells(ws, &options_row, &[]) {
                list.add_range(self.tags_evaluator.apply_tags_to(ws, cell, &target)?);
            }
            let mut context = ProcessingContext::new(workbook, sheet_index, target.data_rows());
            list.execute(&mut context, errors)?;

            if sheet_ref(workbook, sheet_index)?.is_range_blank(&options_row) {
                debug!(region = name, row = %options_row, "removing blank options row");
                workbook.delete_rows_in(sheet_index, &options_row)?;
                delta -= 1;
            }
        }

        if self.options.refresh_pivot_caches {
            workbook.refresh_pivot_caches(sheet_index);
        }
        Ok(ColumnShift::new(&grown, delta))
    }
}

fn region_name_mut<'a>(
    workbook: &'a mut Workbook,
    name: &str,
    scope: Option<&NameScope>,
) -> Option<&'a mut NamedRange> {
    workbook.named_ranges_mut().get_exact_mut(name, scope?)
}

fn sheet_name(workbook: &Workbook, sheet_index: usize) -> ReportResult<String> {
    sheet_ref(workbook, sheet_index).map(|ws| ws.name().to_string())
}

fn sheet_ref(workbook: &Workbook, sheet_index: usize) -> ReportResult<&Worksheet> {
    let count = workbook.sheet_count();
    workbook
        .worksheet(sheet_index)
        .ok_or(ReportError::Grid(tabula_core::Error::SheetOutOfBounds(sheet_index, count)))
}

fn sheet_mut(workbook: &mut Workbook, sheet_index: usize) -> ReportResult<&mut Worksheet> {
    let count = workbook.sheet_count();
    workbook
        .worksheet_mut(sheet_index)
        .ok_or(ReportError::Grid(tabula_core::Error::SheetOutOfBounds(sheet_index, count)))
}

/// Text a placeholder or directive may hide in
fn cell_text(value: &CellValue) -> Option<String> {
    match value {
        CellValue::String(s) => Some(s.as_str().to_string()),
        CellValue::RichText(rich) => Some(rich.text()),
        _ => None,
    }
}

/// Cells of `range` outside `skip` whose text or formula holds a directive
fn tagged_cells(ws: &Worksheet, range: &CellRange, skip: &[CellRange]) -> Vec<CellAddress> {
    ws.cells_in(range)
        .filter(|(row, col, _)| !skip.iter().any(|r| r.contains_cell(*row, *col)))
        .filter(|(_, _, data)| {
            let text = match &data.value {
                CellValue::Formula { text, .. } => Some(text.to_string()),
                other => cell_text(other),
            };
            text.map_or(false, |t| has_tag(&t))
        })
        .map(|(row, col, _)| CellAddress::new(row, col))
        .collect()
}

/// Current rectangles of region `name` on `sheet` inside `within`
fn region_rects(
    workbook: &Workbook,
    sheet_index: usize,
    sheet: &str,
    name: &str,
    within: &CellRange,
) -> Vec<CellRange> {
    workbook
        .get_named_range(name, sheet_index)
        .map(|named| {
            named
                .ranges_on(sheet)
                .map(CellRange::relative)
                .filter(|r| within.contains_range(r))
                .collect()
        })
        .unwrap_or_default()
}

/// Names other than `region` inside `data`, relative to its top-left corner
fn inner_names(
    workbook: &Workbook,
    sheet: &str,
    region: &str,
    data: &CellRange,
) -> Vec<(String, Vec<CellRange>)> {
    let mut inner: Vec<(String, Vec<CellRange>)> = Vec::new();
    for (name, r) in workbook.names_within(sheet, data) {
        if name.eq_ignore_ascii_case(region) {
            continue;
        }
        let relative = CellRange::from_indices(
            r.start.row - data.start.row,
            r.start.col - data.start.col,
            r.end.row - data.start.row,
            r.end.col - data.start.col,
        );
        match inner.iter_mut().find(|(n, _)| *n == name) {
            Some((_, ranges)) => ranges.push(relative),
            None => inner.push((name, vec![relative])),
        }
    }
    inner
}

fn translate(range: &CellRange, rows: u32, cols: u16) -> CellRange {
    CellRange::from_indices(
        range.start.row + rows,
        range.start.col + cols,
        range.end.row + rows,
        range.end.col + cols,
    )
}

/// Rows added (or removed) below a column span by one splice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnShift {
    first_col: u16,
    last_col: u16,
    rows: i64,
}

impl ColumnShift {
    fn new(range: &CellRange, rows: i64) -> Self {
        Self {
            first_col: range.start.col,
            last_col: range.end.col,
            rows,
        }
    }
}

/// How far the bottom of `range` moves after `shifts`
///
/// Shifts in the same columns add up; shifts in disjoint columns do not.
fn extent_delta(range: &CellRange, shifts: &[ColumnShift]) -> i64 {
    (range.start.col..=range.end.col)
        .map(|col| {
            shifts
                .iter()
                .filter(|s| s.first_col <= col && col <= s.last_col)
                .map(|s| s.rows)
                .sum::<i64>()
        })
        .max()
        .unwrap_or(0)
}

/// `range` with its last row moved by `delta`, never above its first row
fn resize_rows(range: CellRange, delta: i64) -> CellRange {
    let end = (range.end.row as i64 + delta).max(range.start.row as i64);
    CellRange::from_indices(range.start.row, range.start.col, end as u32, range.end.col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tabula_core::{CellComment, Color, Hyperlink, PivotCache};
    use tabula_expr::Record;

    fn order(name: &str, total: i64) -> Value {
        Record::new().with("Name", name).with("Total", total).into()
    }

    fn values(ws: &Worksheet, rows: u32, col: u16) -> Vec<CellValue> {
        (0..rows).map(|r| ws.get_value_at(r, col)).collect()
    }

    fn name_rects(wb: &Workbook, name: &str) -> Vec<String> {
        wb.get_named_range(name, 0)
            .map(|n| n.ranges().iter().map(|r| r.range.relative().to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_plain_cells() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value_at(0, 0, "{{title}}").unwrap();
        ws.set_cell_value_at(0, 1, "Total: {{1+2}}").unwrap();
        ws.set_cell_value_at(1, 0, "&=SUM(A{{row}}:A9)").unwrap();
        ws.set_comment_at(0, 0, CellComment::text_only("by {{title}}"));
        ws.set_hyperlink_at(0, 1, Hyperlink::external("https://x.test/{{title}}"));

        let mut interpreter = RangeInterpreter::new("", RenderOptions::default());
        interpreter.add_variable("title", "Q3");
        interpreter.add_variable("row", 5);
        let mut errors = TemplateErrors::new();
        interpreter
            .evaluate(&mut wb, 0, CellRange::from_indices(0, 0, 1, 1), &mut errors)
            .unwrap();

        let ws = wb.worksheet(0).unwrap();
        assert!(errors.is_empty());
        assert_eq!(ws.get_value_at(0, 0), CellValue::string("Q3"));
        assert_eq!(ws.get_value_at(0, 1), CellValue::string("Total: 3"));
        assert_eq!(ws.get_value_at(1, 0).formula_text(), Some("=SUM(A5:A9)"));
        assert_eq!(ws.comment_at(0, 0).unwrap().text, "by Q3");
        assert_eq!(ws.hyperlink_at(0, 1).unwrap().target(), "https://x.test/Q3");
    }

    #[test]
    fn test_item_outside_region() {
        let mut wb = Workbook::new();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_value_at(2, 1, "{{item.Name}}")
            .unwrap();

        let mut interpreter = RangeInterpreter::new("", RenderOptions::default());
        let mut errors = TemplateErrors::new();
        interpreter
            .evaluate(&mut wb, 0, CellRange::from_indices(0, 0, 2, 1), &mut errors)
            .unwrap();

        let ws = wb.worksheet(0).unwrap();
        assert_eq!(
            errors.messages(),
            vec![LIST_RANGE_MISUSE, "Unknown identifier 'item'"]
        );
        assert_eq!(ws.get_value_at(1, 0), CellValue::string(LIST_RANGE_MISUSE));
        assert_eq!(ws.get_value_at(2, 1), CellValue::string("Unknown identifier 'item'"));
        assert_eq!(ws.style_at(2, 1).font.color, Color::RED);
    }

    #[test]
    fn test_region_expansion_with_options_row() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value_at(0, 0, "Orders").unwrap();
        ws.set_cell_value_at(1, 0, "{{item.Name}}").unwrap();
        ws.set_cell_value_at(1, 1, "{{item.Total}}").unwrap();
        ws.set_cell_value_at(2, 0, "Count {{items.Count}}").unwrap();
        ws.set_cell_value_at(2, 1, "<<desc>>").unwrap();
        ws.set_cell_value_at(3, 0, "end").unwrap();
        wb.define_name("Orders", "Sheet1!$A$2:$B$3").unwrap();

        let mut interpreter = RangeInterpreter::new("", RenderOptions::default());
        interpreter.add_variable(
            "Orders",
            Value::list(vec![order("Ann", 5), order("Bob", 9), order("Cy", 7)]),
        );
        let mut errors = TemplateErrors::new();
        let extent = interpreter
            .evaluate(&mut wb, 0, CellRange::from_indices(0, 0, 3, 1), &mut errors)
            .unwrap();

        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(extent, CellRange::from_indices(0, 0, 5, 1));
        let ws = wb.worksheet(0).unwrap();
        assert_eq!(
            values(ws, 6, 0),
            vec![
                CellValue::string("Orders"),
                CellValue::string("Bob"),
                CellValue::string("Cy"),
                CellValue::string("Ann"),
                CellValue::string("Count 3"),
                CellValue::string("end"),
            ]
        );
        assert_eq!(ws.get_value_at(1, 1), CellValue::Number(9.0));
        assert_eq!(ws.get_value_at(4, 1), CellValue::Empty);
        assert_eq!(name_rects(&wb, "Orders"), vec!["A2:B5"]);
    }

    #[test]
    fn test_empty_region_removed() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value_at(0, 0, "{{item.Name}}").unwrap();
        ws.set_cell_value_at(2, 0, "after").unwrap();
        wb.define_name("Orders", "Sheet1!A1:B2").unwrap();

        let mut interpreter = RangeInterpreter::new("", RenderOptions::default());
        interpreter.add_variable("Orders", Value::list(Vec::new()));
        let mut errors = TemplateErrors::new();
        interpreter
            .evaluate(&mut wb, 0, CellRange::from_indices(0, 0, 2, 1), &mut errors)
            .unwrap();

        let ws = wb.worksheet(0).unwrap();
        assert_eq!(ws.get_value_at(0, 0), CellValue::string("after"));
        assert!(name_rects(&wb, "Orders").is_empty());
    }

    #[test]
    fn test_empty_region_keeps_options_row() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value_at(0, 0, "{{item.Name}}").unwrap();
        ws.set_cell_value_at(1, 0, "Count {{items.Count}}").unwrap();
        ws.set_cell_value_at(2, 0, "after").unwrap();
        wb.define_name("Orders", "Sheet1!A1:B2").unwrap();

        let mut interpreter = RangeInterpreter::new("", RenderOptions::default());
        interpreter.add_variable("Orders", Value::list(Vec::new()));
        let mut errors = TemplateErrors::new();
        interpreter
            .evaluate(&mut wb, 0, CellRange::from_indices(0, 0, 2, 1), &mut errors)
            .unwrap();

        let ws = wb.worksheet(0).unwrap();
        assert_eq!(
            values(ws, 3, 0),
            vec![
                CellValue::string("Count 0"),
                CellValue::string("after"),
                CellValue::Empty
            ]
        );
        assert_eq!(name_rects(&wb, "Orders"), vec!["A1:B1"]);
    }

    #[test]
    fn test_nested_regions() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value_at(0, 0, "{{item.Name}}").unwrap();
        ws.set_cell_value_at(1, 0, "{{item.Id}}").unwrap();
        ws.set_cell_value_at(1, 1, "{{item.Amount}}").unwrap();
        wb.define_name("Customers", "Sheet1!A1:B4").unwrap();
        wb.define_name("Customers_Orders", "Sheet1!A2:B3").unwrap();

        let line = |id: i64, amount: i64| -> Value {
            Record::new().with("Id", id).with("Amount", amount).into()
        };
        let customers = Value::list(vec![
            Record::new()
                .with("Name", "Ann")
                .with("Orders", Value::list(vec![line(1, 10), line(2, 20)]))
                .into(),
            Record::new()
                .with("Name", "Bob")
                .with("Orders", Value::list(Vec::new()))
                .into(),
        ]);

        let mut interpreter = RangeInterpreter::new("", RenderOptions::default());
        interpreter.add_variable("Customers", customers);
        let mut errors = TemplateErrors::new();
        interpreter
            .evaluate(&mut wb, 0, CellRange::from_indices(0, 0, 3, 1), &mut errors)
            .unwrap();

        assert!(errors.is_empty(), "{:?}", errors);
        let ws = wb.worksheet(0).unwrap();
        assert_eq!(
            values(ws, 5, 0),
            vec![
                CellValue::string("Ann"),
                CellValue::Number(1.0),
                CellValue::Number(2.0),
                CellValue::string("Bob"),
                CellValue::Empty,
            ]
        );
        assert_eq!(ws.get_value_at(2, 1), CellValue::Number(20.0));
        assert_eq!(name_rects(&wb, "Customers"), vec!["A1:B4"]);
        assert_eq!(name_rects(&wb, "Customers_Orders"), vec!["A2:B3"]);
    }

    #[test]
    fn test_pivot_cache_follows_region() {
        let mut wb = Workbook::new();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_value_at(0, 0, "{{item}}")
            .unwrap();
        wb.define_name("Numbers", "Sheet1!A1").unwrap();
        wb.add_pivot_cache(PivotCache::from_name("Totals", "Numbers"));

        let mut interpreter = RangeInterpreter::new("", RenderOptions::default());
        interpreter.add_variable(
            "Numbers",
            Value::list(vec![Value::from(1), Value::from(2), Value::from(3)]),
        );
        let mut errors = TemplateErrors::new();
        interpreter
            .evaluate(&mut wb, 0, CellRange::from_indices(0, 0, 0, 0), &mut errors)
            .unwrap();

        let cache = &wb.pivot_caches()[0];
        assert_eq!(cache.refresh_count(), 1);
        assert_eq!(cache.resolved()[0].range.to_string(), "A1:A3");
    }

    #[test]
    fn test_max_depth() {
        let mut wb = Workbook::new();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_value_at(0, 0, "{{item}}")
            .unwrap();
        wb.define_name("Numbers", "Sheet1!A1").unwrap();

        let options = RenderOptions {
            max_depth: 0,
            ..RenderOptions::default()
        };
        let mut interpreter = RangeInterpreter::new("", options);
        interpreter.add_variable("Numbers", Value::list(vec![Value::from(1), Value::from(2)]));
        let mut errors = TemplateErrors::new();
        interpreter
            .evaluate(&mut wb, 0, CellRange::from_indices(0, 0, 0, 0), &mut errors)
            .unwrap();

        assert_eq!(errors.len(), 1);
        assert_eq!(
            wb.worksheet(0).unwrap().get_value_at(0, 0),
            CellValue::string("{{item}}")
        );
    }

    #[test]
    fn test_items_share_compiled_expressions() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value_at(0, 0, "{{item.Name}}").unwrap();
        ws.set_cell_value_at(0, 1, "{{item.Total * 2}}").unwrap();
        ws.set_cell_style_at(0, 0, &tabula_core::Style::new().bold(true)).unwrap();
        wb.define_name("Orders", "Sheet1!A1:B1").unwrap();

        let mut interpreter = RangeInterpreter::new("", RenderOptions::default());
        interpreter.add_variable(
            "Orders",
            Value::list(vec![order("Ann", 5), order("Bob", 9), order("Cy", 7)]),
        );
        let mut errors = TemplateErrors::new();
        interpreter
            .evaluate(&mut wb, 0, CellRange::from_indices(0, 0, 0, 1), &mut errors)
            .unwrap();

        assert!(errors.is_empty(), "{:?}", errors);
        // One compile per placeholder, however many items
        assert_eq!(interpreter.evaluator().cached_expressions(), 2);

        let ws = wb.worksheet(0).unwrap();
        assert_eq!(ws.get_value_at(2, 1), CellValue::Number(14.0));
        assert!((0..3).all(|row| ws.style_at(row, 0).font.bold));
    }

    #[test]
    fn test_side_by_side_regions_extent() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value_at(0, 0, "{{item}}").unwrap();
        ws.set_cell_value_at(0, 2, "{{item}}").unwrap();
        wb.define_name("Left", "Sheet1!A1").unwrap();
        wb.define_name("Right", "Sheet1!C1").unwrap();

        let mut interpreter = RangeInterpreter::new("", RenderOptions::default());
        interpreter.add_variable("Left", Value::list(vec![Value::from(1), Value::from(2), Value::from(3)]));
        interpreter.add_variable("Right", Value::list(vec![Value::from(7), Value::from(8)]));
        let mut errors = TemplateErrors::new();
        let extent = interpreter
            .evaluate(&mut wb, 0, CellRange::from_indices(0, 0, 0, 2), &mut errors)
            .unwrap();

        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(extent, CellRange::from_indices(0, 0, 2, 2));
        let ws = wb.worksheet(0).unwrap();
        assert_eq!(
            values(ws, 3, 0),
            vec![CellValue::Number(1.0), CellValue::Number(2.0), CellValue::Number(3.0)]
        );
        assert_eq!(
            values(ws, 3, 2),
            vec![CellValue::Number(7.0), CellValue::Number(8.0), CellValue::Empty]
        );
    }

    #[test]
    fn test_stacked_shifts_add_up() {
        let range = CellRange::from_indices(0, 0, 4, 3);
        let shifts = [
            ColumnShift { first_col: 0, last_col: 1, rows: 2 },
            ColumnShift { first_col: 0, last_col: 1, rows: 3 },
            ColumnShift { first_col: 2, last_col: 3, rows: 4 },
        ];
        assert_eq!(extent_delta(&range, &shifts), 5);
        assert_eq!(extent_delta(&range, &shifts[2..]), 4);
        assert_eq!(extent_delta(&range, &[ColumnShift { first_col: 0, last_col: 3, rows: -2 }]), -2);
        // An untouched column keeps the bottom where it was
        assert_eq!(extent_delta(&range, &[ColumnShift { first_col: 0, last_col: 1, rows: -2 }]), 0);
    }
}

//! `<<sort>>`, `<<asc>>` and `<<desc>>`
//!
//! Each tag sorts the rows of the context range by the column it was written
//! in. All sort tags of one list run together: the first one to execute
//! collects its siblings, orders them by `num` then column, sorts once and
//! disables them all. Blank cells go last in both directions.

use tabula_core::{CellRange, SortKey};
use tracing::trace;

use super::{OptionTag, TagKind, TagsList};
use crate::context::ProcessingContext;
use crate::error::{ReportError, ReportResult};

fn is_descending(tag: &OptionTag) -> bool {
    tag.name() == "desc" || tag.has_parameter("desc")
}

/// Check a tag can take part in a sort of `range`
fn validate(tag: &OptionTag, range: &CellRange) -> ReportResult<i32> {
    let num = tag.int_parameter("num")?.unwrap_or(i32::MAX);
    if !range.contains_cell(range.start.row, tag.column()) {
        return Err(ReportError::directive(
            format!(
                "Tag '{}' at {} is outside the sorted range {}",
                tag.name(),
                tag.cell(),
                range
            ),
            CellRange::single(tag.cell()),
        ));
    }
    Ok(num)
}

pub(crate) fn execute(
    index: usize,
    list: &mut TagsList,
    context: &mut ProcessingContext<'_>,
) -> ReportResult<()> {
    let range = context.range;
    if let Some(tag) = list.get(index) {
        validate(tag, &range)?;
    }

    // Malformed siblings stay enabled and fail on their own turn
    let mut fields: Vec<(usize, i32, SortKey)> = list
        .get_all_of(TagKind::Sort)
        .into_iter()
        .filter_map(|(i, tag)| {
            let num = validate(tag, &range).ok()?;
            let key = SortKey {
                column: tag.column(),
                descending: is_descending(tag),
            };
            Some((i, num, key))
        })
        .collect();
    fields.sort_by_key(|&(_, num, key)| (num, key.column));

    let keys: Vec<SortKey> = fields.iter().map(|&(_, _, key)| key).collect();
    trace!(range = %range, keys = keys.len(), "sorting rows");
    context
        .workbook
        .sort_rows(context.sheet_index, &range, &keys)?;

    for (i, _, _) in fields {
        list.disable(i);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemplateErrors;
    use crate::tags::TagParameters;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use tabula_core::{CellAddress, CellValue, Workbook};

    fn tag(name: &str, col: u16, params: &[(&str, Option<&str>)]) -> OptionTag {
        let mut parameters = TagParameters::new();
        for (k, v) in params {
            parameters.insert(k, v.map(str::to_string));
        }
        OptionTag::new(
            name,
            TagKind::Sort,
            parameters,
            CellAddress::new(5, col),
            CellRange::from_indices(0, 0, 5, 1),
        )
    }

    fn column_workbook(values: &[Option<f64>]) -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        for (row, v) in values.iter().enumerate() {
            if let Some(v) = v {
                ws.set_cell_value_at(row as u32, 0, *v).unwrap();
            }
            ws.set_cell_value_at(row as u32, 1, format!("r{}", row)).unwrap();
        }
        wb
    }

    fn column(wb: &Workbook, rows: u32, col: u16) -> Vec<CellValue> {
        let ws = wb.worksheet(0).unwrap();
        (0..rows).map(|r| ws.get_value_at(r, col)).collect()
    }

    fn run(wb: &mut Workbook, rows: u32, tags: Vec<OptionTag>) -> (TagsList, TemplateErrors) {
        let mut list = TagsList::new();
        list.add_range(tags);
        let mut errors = TemplateErrors::new();
        let mut context = ProcessingContext::new(wb, 0, CellRange::from_indices(0, 0, rows - 1, 1));
        list.execute(&mut context, &mut errors).unwrap();
        (list, errors)
    }

    fn numbers(values: &[Option<f64>]) -> Vec<CellValue> {
        values
            .iter()
            .map(|v| v.map_or(CellValue::Empty, CellValue::Number))
            .collect()
    }

    #[test]
    fn test_blanks_last_both_directions() {
        let input = [Some(5.0), None, Some(2.0), None, Some(9.0)];

        let mut wb = column_workbook(&input);
        run(&mut wb, 5, vec![tag("sort", 0, &[])]);
        assert_eq!(
            column(&wb, 5, 0),
            numbers(&[Some(2.0), Some(5.0), Some(9.0), None, None])
        );

        let mut wb = column_workbook(&input);
        run(&mut wb, 5, vec![tag("desc", 0, &[])]);
        assert_eq!(
            column(&wb, 5, 0),
            numbers(&[Some(9.0), Some(5.0), Some(2.0), None, None])
        );
    }

    #[test]
    fn test_rows_move_together() {
        let mut wb = column_workbook(&[Some(3.0), Some(1.0), Some(2.0)]);
        run(&mut wb, 3, vec![tag("asc", 0, &[])]);
        assert_eq!(
            column(&wb, 3, 1),
            vec![
                CellValue::string("r1"),
                CellValue::string("r2"),
                CellValue::string("r0")
            ]
        );
    }

    #[test]
    fn test_num_orders_keys() {
        // Column B is the primary key because of num=1
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        for (row, (a, b)) in [(1.0, "y"), (2.0, "x"), (3.0, "x")].iter().enumerate() {
            ws.set_cell_value_at(row as u32, 0, *a).unwrap();
            ws.set_cell_value_at(row as u32, 1, *b).unwrap();
        }

        let (list, errors) = run(
            &mut wb,
            3,
            vec![
                tag("sort", 0, &[("desc", None)]),
                tag("sort", 1, &[("num", Some("1"))]),
            ],
        );
        assert!(errors.is_empty());
        assert!(list.iter().all(|t| !t.is_enabled()));
        assert_eq!(
            column(&wb, 3, 0),
            numbers(&[Some(3.0), Some(2.0), Some(1.0)])
        );
    }

    #[test]
    fn test_malformed_num_isolated() {
        let mut wb = column_workbook(&[Some(3.0), Some(1.0), Some(2.0)]);
        let (_, errors) = run(
            &mut wb,
            3,
            vec![
                tag("sort", 0, &[]),
                tag("sort", 1, &[("num", Some("two"))]),
            ],
        );

        assert_eq!(
            errors.messages(),
            vec!["Parameter 'num' of tag 'sort' must be an integer, got 'two'"]
        );
        assert_eq!(
            column(&wb, 3, 0),
            numbers(&[Some(1.0), Some(2.0), Some(3.0)])
        );
    }

    #[test]
    fn test_column_outside_range() {
        let mut wb = column_workbook(&[Some(2.0), Some(1.0)]);
        let (_, errors) = run(&mut wb, 2, vec![tag("sort", 4, &[])]);
        assert_eq!(errors.len(), 1);
        assert_eq!(column(&wb, 2, 0), numbers(&[Some(2.0), Some(1.0)]));
    }

    proptest! {
        #[test]
        fn prop_sort_is_idempotent(
            values in prop::collection::vec(prop::option::of(-50i32..50), 1..12),
            descending in any::<bool>(),
        ) {
            let values: Vec<Option<f64>> = values.into_iter().map(|v| v.map(f64::from)).collect();
            let rows = values.len() as u32;
            let name = if descending { "desc" } else { "asc" };

            let mut wb = column_workbook(&values);
            run(&mut wb, rows, vec![tag(name, 0, &[])]);
            let once = column(&wb, rows, 0);
            run(&mut wb, rows, vec![tag(name, 0, &[])]);
            prop_assert_eq!(&once, &column(&wb, rows, 0));

            let blanks = values.iter().filter(|v| v.is_none()).count();
            prop_assert!(once[once.len() - blanks..].iter().all(CellValue::is_blank));
        }
    }
}

//! End-to-end rendering of workbook and CSV templates

use pretty_assertions::assert_eq;
use tabula::prelude::*;
use tabula::{Color, LIST_RANGE_MISUSE};

fn column(ws: &Worksheet, col: u16, rows: u32) -> Vec<CellValue> {
    (0..rows).map(|r| ws.get_value_at(r, col)).collect()
}

fn names(values: &[&str]) -> Vec<CellValue> {
    values
        .iter()
        .map(|v| if v.is_empty() { CellValue::Empty } else { CellValue::string(*v) })
        .collect()
}

fn player(name: &str, score: Option<i64>) -> Value {
    Record::new()
        .with("Name", name)
        .with("Score", score.map_or(Value::Null, Value::from))
        .into()
}

fn render(workbook: Workbook, variables: Vec<(&str, Value)>) -> (Workbook, TemplateErrors) {
    let mut report = ReportTemplate::new(workbook);
    for (name, value) in variables {
        report.add_variable(name, value);
    }
    let errors = report.render().unwrap();
    (report.into_workbook(), errors)
}

#[test]
fn test_placeholders_keep_type() {
    let mut wb = Workbook::new();
    let ws = wb.worksheet_mut(0).unwrap();
    ws.set_cell_value("A1", "{{2*3}}").unwrap();
    ws.set_cell_value("A2", "n={{2*3}}").unwrap();
    ws.set_cell_value("A3", "{{1 > 0}}").unwrap();
    ws.set_cell_value("A4", r#"{{np(customer.Manager.Name, "-")}}"#).unwrap();
    ws.set_cell_value("A5", "{{missing}}").unwrap();

    let customer = Record::new().with("Name", "Ann");
    let (wb, errors) = render(wb, vec![("customer", customer.into())]);

    let ws = wb.worksheet(0).unwrap();
    assert_eq!(
        column(ws, 0, 5),
        vec![
            CellValue::Number(6.0),
            CellValue::string("n=6"),
            CellValue::Boolean(true),
            CellValue::string("-"),
            CellValue::string("Unknown identifier 'missing'"),
        ]
    );
    assert_eq!(errors.messages(), vec!["Unknown identifier 'missing'"]);
    let error = errors.iter().next().unwrap();
    assert_eq!(error.sheet, "Sheet1");
    assert_eq!(error.range.to_string(), "A5");
    assert_eq!(ws.style_at(4, 0).font.color, Color::RED);
}

#[test]
fn test_items_stack_and_name_is_rebound() {
    let mut wb = Workbook::new();
    let ws = wb.worksheet_mut(0).unwrap();
    ws.set_cell_value("A1", "Players").unwrap();
    ws.set_cell_value("A2", "{{item.Name}}").unwrap();
    ws.set_cell_value("B2", "{{item.Score * 10}}").unwrap();
    ws.set_cell_value("A3", "Footer").unwrap();
    wb.define_name("Players", "Sheet1!A2:B2").unwrap();

    let players = Value::list(vec![
        player("Ann", Some(1)),
        player("Bob", Some(2)),
        player("Cy", Some(3)),
    ]);
    let (wb, errors) = render(wb, vec![("Players", players)]);

    assert!(errors.is_empty());
    let ws = wb.worksheet(0).unwrap();
    assert_eq!(
        column(ws, 0, 5),
        names(&["Players", "Ann", "Bob", "Cy", "Footer"])
    );
    assert_eq!(ws.get_value_at(3, 1), CellValue::Number(30.0));

    let rebound = wb.get_named_range("Players", 0).unwrap();
    let ranges: Vec<String> = rebound
        .ranges()
        .iter()
        .map(|r| r.range.relative().to_string())
        .collect();
    assert_eq!(ranges, vec!["A2:B4"]);
}

#[test]
fn test_sort_puts_blanks_last() {
    let scores = [Some(5), None, Some(2), None, Some(9)];
    for (tag, expected) in [
        ("<<sort>>", ["Id2", "Id0", "Id4"]),
        ("<<desc>>", ["Id4", "Id0", "Id2"]),
    ] {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", "{{item.Name}}").unwrap();
        ws.set_cell_value("B1", "{{item.Score}}").unwrap();
        ws.set_cell_value("B2", tag).unwrap();
        wb.define_name("Rows", "Sheet1!A1:B2").unwrap();

        let rows = Value::list(
            scores
                .iter()
                .enumerate()
                .map(|(i, s)| player(&format!("Id{}", i), *s)),
        );
        let (wb, errors) = render(wb, vec![("Rows", rows)]);

        assert!(errors.is_empty());
        let ws = wb.worksheet(0).unwrap();
        assert_eq!(&column(ws, 0, 3), &names(&expected));
        assert!(ws.get_value_at(3, 1).is_blank());
        assert!(ws.get_value_at(4, 1).is_blank());
        // The blank options row is gone
        assert_eq!(ws.get_value_at(5, 0), CellValue::Empty);
    }
}

#[test]
fn test_malformed_sort_is_isolated() {
    let mut wb = Workbook::new();
    let ws = wb.worksheet_mut(0).unwrap();
    ws.set_cell_value("A1", "{{item.Name}}").unwrap();
    ws.set_cell_value("B1", "{{item.Score}}").unwrap();
    ws.set_cell_value("A2", "<<sort num=first>>").unwrap();
    ws.set_cell_value("B2", "<<desc>>").unwrap();
    wb.define_name("Rows", "Sheet1!A1:B2").unwrap();

    let rows = Value::list(vec![
        player("Ann", Some(1)),
        player("Bob", Some(3)),
        player("Cy", Some(2)),
    ]);
    let (wb, errors) = render(wb, vec![("Rows", rows)]);

    assert_eq!(errors.len(), 1);
    assert_eq!(errors.iter().next().unwrap().range.to_string(), "A4");
    let ws = wb.worksheet(0).unwrap();
    assert_eq!(column(ws, 0, 3), names(&["Bob", "Cy", "Ann"]));
}

#[test]
fn test_empty_data() {
    // Empty options row: the whole region goes
    let mut wb = Workbook::new();
    let ws = wb.worksheet_mut(0).unwrap();
    ws.set_cell_value("A1", "{{item.Name}}").unwrap();
    ws.set_cell_value("A3", "after").unwrap();
    wb.define_name("Rows", "Sheet1!A1:B2").unwrap();
    let (wb, _) = render(wb, vec![("Rows", Value::list(Vec::new()))]);
    assert_eq!(column(wb.worksheet(0).unwrap(), 0, 2), names(&["after", ""]));

    // Options row with content: only it survives
    let mut wb = Workbook::new();
    let ws = wb.worksheet_mut(0).unwrap();
    ws.set_cell_value("A1", "{{item.Name}}").unwrap();
    ws.set_cell_value("A2", "Total: {{items.Count}}").unwrap();
    ws.set_cell_value("A3", "after").unwrap();
    wb.define_name("Rows", "Sheet1!A1:B2").unwrap();
    let (wb, _) = render(wb, vec![("Rows", Value::list(Vec::new()))]);
    assert_eq!(
        column(wb.worksheet(0).unwrap(), 0, 3),
        names(&["Total: 0", "after", ""])
    );
}

#[test]
fn test_item_outside_region() {
    let mut wb = Workbook::new();
    wb.worksheet_mut(0)
        .unwrap()
        .set_cell_value("B3", "{{item.Name}}")
        .unwrap();
    let (wb, errors) = render(wb, Vec::new());

    assert_eq!(errors.len(), 2);
    assert_eq!(
        wb.worksheet(0).unwrap().get_value_at(1, 0),
        CellValue::string(LIST_RANGE_MISUSE)
    );
}

#[test]
fn test_json_data() {
    let mut wb = Workbook::new();
    let ws = wb.worksheet_mut(0).unwrap();
    ws.set_cell_value("A1", "{{item.name}}").unwrap();
    ws.set_cell_value("B1", "{{item.tags.Count}}").unwrap();
    wb.define_name("people", "Sheet1!A1:B1").unwrap();

    let data: serde_json::Value = serde_json::from_str(
        r#"{"people": [{"name": "Ann", "tags": ["a", "b"]}, {"name": "Bob", "tags": []}]}"#,
    )
    .unwrap();
    let Value::Record(data) = Value::from(data) else {
        panic!("expected an object");
    };
    let variables = data
        .fields()
        .map(|(k, v)| (k, v.clone()))
        .collect::<Vec<_>>();

    let mut report = ReportTemplate::new(wb);
    for (name, value) in variables {
        report.add_variable(name, value);
    }
    assert!(report.render().unwrap().is_empty());

    let ws = report.workbook().worksheet(0).unwrap();
    assert_eq!(column(ws, 0, 2), names(&["Ann", "Bob"]));
    assert_eq!(column(ws, 1, 2), vec![CellValue::Number(2.0), CellValue::Number(0.0)]);
}

#[test]
fn test_csv_template_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.csv");
    let output = dir.path().join("report.csv");
    std::fs::write(
        &template,
        "Report for {{owner}},\n{{item.Name}},{{item.Score}}\n,<<desc>>\nend,\n",
    )
    .unwrap();

    let mut wb = Workbook::open(&template).unwrap();
    wb.define_name("Rows", "Sheet1!A2:B3").unwrap();
    let rows = Value::list(vec![player("Ann", Some(1)), player("Bob", Some(4))]);
    let (wb, errors) = render(wb, vec![("owner", Value::from("Kim")), ("Rows", rows)]);
    assert!(errors.is_empty());

    wb.save(&output).unwrap();
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "Report for Kim,\nBob,4\nAnn,1\nend,\n"
    );
}

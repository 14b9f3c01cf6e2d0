//! Load a template from disk, edit it, write it back

use pretty_assertions::assert_eq;
use tabula_core::CellValue;
use tabula_csv::{CsvReadOptions, CsvReader, CsvWriteOptions, CsvWriter, LineTerminator};
use tempfile::tempdir;

#[test]
fn test_file_roundtrip() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("template.csv");
    let output = dir.path().join("out.csv");
    std::fs::write(&input, "Title;{{title}}\n2;true\n").unwrap();

    let read_options = CsvReadOptions::default().with_delimiter(';').unwrap();
    let mut wb = CsvReader::read_file(&input, &read_options).unwrap();
    let ws = wb.worksheet_mut(0).unwrap();
    assert_eq!(ws.get_value_at(1, 0), CellValue::Number(2.0));
    ws.set_cell_value_at(0, 1, "Orders").unwrap();

    let write_options = CsvWriteOptions {
        line_terminator: LineTerminator::CRLF,
        ..CsvWriteOptions::default().with_delimiter(';').unwrap()
    };
    CsvWriter::write_file(wb.worksheet(0).unwrap(), &output, &write_options).unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written, "Title;Orders\r\n2;TRUE\r\n");
}

//! CSV reader

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tabula_core::{CellValue, Workbook, Worksheet};
use tracing::debug;

use crate::error::CsvResult;
use crate::options::CsvReadOptions;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// CSV template reader
pub struct CsvReader;

impl CsvReader {
    /// Load a CSV file as a one-sheet workbook
    pub fn read_file<P: AsRef<Path>>(path: P, options: &CsvReadOptions) -> CsvResult<Workbook> {
        let file = File::open(path)?;
        Self::read(file, options)
    }

    /// Load CSV from a reader as a one-sheet workbook
    pub fn read<R: Read>(reader: R, options: &CsvReadOptions) -> CsvResult<Workbook> {
        let worksheet = Self::read_sheet(reader, options)?;
        let mut workbook = Workbook::empty();
        workbook.add_existing_worksheet(worksheet)?;
        Ok(workbook)
    }

    /// Load CSV from a reader into a worksheet
    ///
    /// Every record is a row starting at column A; records may differ in
    /// length. Empty fields leave the cell blank.
    pub fn read_sheet<R: Read>(reader: R, options: &CsvReadOptions) -> CsvResult<Worksheet> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut worksheet = Worksheet::new(options.sheet_name.as_str());
        let mut rows = 0u32;
        for (row, result) in csv_reader.records().enumerate() {
            let record = result?;
            for (col, field) in record.iter().enumerate() {
                let value = if options.auto_detect_types {
                    Self::detect_type(field)
                } else if field.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::string(field)
                };
                if !value.is_empty() {
                    worksheet.set_cell_value_at(row as u32, col as u16, value)?;
                }
            }
            rows += 1;
        }
        debug!(sheet = %worksheet.name(), rows, "loaded csv");
        Ok(worksheet)
    }

    /// Detect the type of a field value
    ///
    /// Fields holding placeholders or directives are always text.
    fn detect_type(field: &str) -> CellValue {
        if field.trim().is_empty() {
            return CellValue::Empty;
        }
        if field.contains("{{") || field.contains("<<") {
            return CellValue::string(field);
        }
        if field.starts_with('=') && field.len() > 1 {
            return CellValue::formula(field);
        }

        let trimmed = field.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return CellValue::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return CellValue::Boolean(false);
        }

        let numeric = trimmed
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
        if numeric {
            if let Ok(n) = trimmed.parse::<f64>() {
                if n.is_finite() {
                    return CellValue::Number(n);
                }
            }
        }

        if let Some(dt) = parse_datetime(trimmed) {
            return CellValue::DateTime(dt);
        }
        CellValue::string(field)
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_type() {
        assert_eq!(CsvReader::detect_type("42"), CellValue::Number(42.0));
        assert_eq!(CsvReader::detect_type("-1.5"), CellValue::Number(-1.5));
        assert_eq!(CsvReader::detect_type("TRUE"), CellValue::Boolean(true));
        assert_eq!(CsvReader::detect_type("1"), CellValue::Number(1.0));
        assert_eq!(CsvReader::detect_type("inf"), CellValue::string("inf"));
        assert_eq!(CsvReader::detect_type("=A1*2"), CellValue::formula("=A1*2"));
        assert_eq!(CsvReader::detect_type("  "), CellValue::Empty);
        assert_eq!(
            CsvReader::detect_type("{{item.Total}}"),
            CellValue::string("{{item.Total}}")
        );
        assert_eq!(
            CsvReader::detect_type("2024-03-01"),
            CellValue::DateTime(
                NaiveDate::from_ymd_opt(2024, 3, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_ragged_records() {
        let input = "Name,Total\n{{item.Name}}\n,,<<sort>>\n";
        let wb = CsvReader::read(input.as_bytes(), &CsvReadOptions::default()).unwrap();
        let ws = wb.worksheet(0).unwrap();

        assert_eq!(ws.name(), "Sheet1");
        assert_eq!(ws.get_value_at(0, 1), CellValue::string("Total"));
        assert_eq!(ws.get_value_at(1, 0), CellValue::string("{{item.Name}}"));
        assert_eq!(ws.get_value_at(2, 0), CellValue::Empty);
        assert_eq!(ws.get_value_at(2, 2), CellValue::string("<<sort>>"));
    }

    #[test]
    fn test_text_only() {
        let options = CsvReadOptions {
            auto_detect_types: false,
            delimiter: b';',
            ..CsvReadOptions::default()
        };
        let wb = CsvReader::read("7;true".as_bytes(), &options).unwrap();
        let ws = wb.worksheet(0).unwrap();
        assert_eq!(ws.get_value_at(0, 0), CellValue::string("7"));
        assert_eq!(ws.get_value_at(0, 1), CellValue::string("true"));
    }
}

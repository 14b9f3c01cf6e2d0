//! CSV writer

use std::fs::File;
use std::io::Write;
use std::path::Path;

use tabula_core::Worksheet;

use crate::error::CsvResult;
use crate::options::{CsvWriteOptions, LineTerminator};

/// CSV file writer
pub struct CsvWriter;

impl CsvWriter {
    /// Write a worksheet to a CSV file
    pub fn write_file<P: AsRef<Path>>(
        worksheet: &Worksheet,
        path: P,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let file = File::create(path)?;
        Self::write(worksheet, file, options)
    }

    /// Write a worksheet to a writer
    ///
    /// Output starts at A1 so cell positions survive a round trip; every
    /// record has the width of the used range.
    pub fn write<W: Write>(
        worksheet: &Worksheet,
        writer: W,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let terminator = match options.line_terminator {
            LineTerminator::LF => csv::Terminator::Any(b'\n'),
            LineTerminator::CRLF => csv::Terminator::CRLF,
        };

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .terminator(terminator)
            .from_writer(writer);

        if let Some(range) = worksheet.used_range() {
            for row in 0..=range.end.row {
                let record: Vec<String> = (0..=range.end.col)
                    .map(|col| worksheet.get_value_at(row, col).to_string())
                    .collect();
                csv_writer.write_record(&record)?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Render a worksheet to a CSV string
    pub fn write_string(worksheet: &Worksheet, options: &CsvWriteOptions) -> CsvResult<String> {
        let mut out = Vec::new();
        Self::write(worksheet, &mut out, options)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_writes_from_a1() {
        let mut ws = Worksheet::new("Sheet1");
        ws.set_cell_value_at(1, 1, "a,b").unwrap();
        ws.set_cell_value_at(2, 0, 3.5).unwrap();
        ws.set_cell_formula_at(2, 1, "SUM(A1:A2)").unwrap();

        let out = CsvWriter::write_string(&ws, &CsvWriteOptions::default()).unwrap();
        assert_eq!(out, ",\n,\"a,b\"\n3.5,=SUM(A1:A2)\n");
    }

    #[test]
    fn test_empty_sheet() {
        let ws = Worksheet::new("Sheet1");
        let out = CsvWriter::write_string(&ws, &CsvWriteOptions::default()).unwrap();
        assert_eq!(out, "");
    }
}

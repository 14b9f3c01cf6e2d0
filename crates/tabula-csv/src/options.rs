//! CSV options

use crate::error::{CsvError, CsvResult};

/// Options for loading a CSV template
#[derive(Debug, Clone)]
pub struct CsvReadOptions {
    /// Field delimiter (default: comma)
    pub delimiter: u8,
    /// Quote character (default: double quote)
    pub quote: u8,
    /// Name of the sheet the rows land on (default: `Sheet1`)
    pub sheet_name: String,
    /// Turn numbers, booleans and dates into typed cells; otherwise every
    /// field stays text
    pub auto_detect_types: bool,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            sheet_name: "Sheet1".to_string(),
            auto_detect_types: true,
        }
    }
}

impl CsvReadOptions {
    /// Set the delimiter from a character, as given on a command line
    pub fn with_delimiter(mut self, delimiter: char) -> CsvResult<Self> {
        self.delimiter = ascii_byte("delimiter", delimiter)?;
        Ok(self)
    }
}

/// Options for writing a rendered sheet
#[derive(Debug, Clone)]
pub struct CsvWriteOptions {
    /// Field delimiter (default: comma)
    pub delimiter: u8,
    /// Quote character (default: double quote)
    pub quote: u8,
    /// Line terminator (default: LF)
    pub line_terminator: LineTerminator,
}

impl Default for CsvWriteOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            line_terminator: LineTerminator::LF,
        }
    }
}

impl CsvWriteOptions {
    pub fn with_delimiter(mut self, delimiter: char) -> CsvResult<Self> {
        self.delimiter = ascii_byte("delimiter", delimiter)?;
        Ok(self)
    }
}

/// Line terminator type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTerminator {
    /// Unix-style (LF)
    LF,
    /// Windows-style (CRLF)
    CRLF,
}

fn ascii_byte(what: &'static str, c: char) -> CsvResult<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(CsvError::InvalidByte {
            what,
            value: c.to_string(),
        })
    }
}

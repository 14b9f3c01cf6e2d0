//! Directive marker parsing
//!
//! Markers are `<<...>>` spans anywhere in a cell's text or formula. The body
//! is `name [key[=value]]...`, whitespace separated; a value may be quoted
//! with `"` to hold spaces (`""` inside quotes is a literal quote).

use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;

use lazy_regex::regex;
use tabula_core::{CellAddress, CellRange, CellValue, Worksheet};
use tracing::trace;

use super::{global_tag_registry, OptionTag, TagParameters, TagRegistry};
use crate::error::ReportResult;

/// Does the text hold at least one directive marker?
pub fn has_tag(text: &str) -> bool {
    regex!(r"<<.+?>>").is_match(text)
}

/// Extracts directives from template cells
#[derive(Debug, Clone)]
pub struct TagsEvaluator {
    registry: Arc<TagRegistry>,
}

impl Default for TagsEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl TagsEvaluator {
    /// Create an evaluator over the process-wide directive registry
    pub fn new() -> Self {
        Self::with_registry(global_tag_registry())
    }

    pub fn with_registry(registry: Arc<TagRegistry>) -> Self {
        Self { registry }
    }

    /// Strip the markers from one cell and return the directives they define
    ///
    /// `&=` text and formula cells keep their formula slot. A value cell left
    /// with no text becomes blank but keeps its style.
    pub fn apply_tags_to(
        &self,
        ws: &mut Worksheet,
        cell: CellAddress,
        range: &CellRange,
    ) -> ReportResult<Vec<OptionTag>> {
        let (row, col) = (cell.row, cell.col);
        let (tags, residual, is_formula) = match ws.get_value_at(row, col) {
            CellValue::Formula { text, .. } => {
                let (tags, residual) = self.parse(&text, cell, range);
                (tags, residual, true)
            }
            CellValue::String(s) => match s.as_str().strip_prefix("&=") {
                Some(formula) => {
                    let (tags, residual) = self.parse(formula, cell, range);
                    (tags, residual, true)
                }
                None => {
                    let (tags, residual) = self.parse(s.as_str(), cell, range);
                    (tags, residual, false)
                }
            },
            CellValue::RichText(rt) => {
                let (tags, residual) = self.parse(&rt.text(), cell, range);
                (tags, residual, false)
            }
            _ => return Ok(Vec::new()),
        };

        let residual_formula = residual.trim_start_matches('=');
        if is_formula && !residual_formula.is_empty() {
            ws.set_cell_formula_at(row, col, &residual)?;
        } else if residual.is_empty() || is_formula {
            ws.set_cell_value_at(row, col, CellValue::Empty)?;
        } else {
            ws.set_cell_value_at(row, col, CellValue::string(residual))?;
        }
        Ok(tags)
    }

    /// Parse every marker in `text`
    ///
    /// Returns the known directives and the text with all markers removed and
    /// trimmed. Unknown directive names are stripped without a trace.
    pub fn parse(&self, text: &str, cell: CellAddress, range: &CellRange) -> (Vec<OptionTag>, String) {
        let mut tags = Vec::new();
        let mut residual = text.to_string();

        let is_options_row = range.row_count() > 1 && cell.row == range.end.row;
        for m in regex!(r"<<.+?>>").find_iter(text) {
            let marker = m.as_str();
            residual = residual.replace(marker, "");

            let Some((name, parameters)) = parse_body(&marker[2..marker.len() - 2]) else {
                continue;
            };
            let Some(tag) = self.registry.create(&name, parameters, cell, *range) else {
                trace!(name = %name, cell = %cell, "dropping unknown tag");
                continue;
            };
            let tag = if is_options_row {
                tag.with_options_row(range.last_row())
            } else {
                tag
            };
            tags.push(tag);
        }

        (tags, residual.trim().to_string())
    }
}

/// Split a marker body into a name and its parameters
fn parse_body(body: &str) -> Option<(String, TagParameters)> {
    let mut chars = body.chars().peekable();
    skip_whitespace(&mut chars);
    let name = read_word(&mut chars, false);
    if name.is_empty() {
        return None;
    }

    let mut parameters = TagParameters::new();
    loop {
        skip_whitespace(&mut chars);
        if chars.peek().is_none() {
            break;
        }
        let key = read_word(&mut chars, true);
        let value = if chars.peek() == Some(&'=') {
            chars.next();
            Some(read_value(&mut chars))
        } else {
            None
        };
        if key.is_empty() {
            // A stray `=` without a key
            continue;
        }
        parameters.insert(&key, value);
    }
    Some((name, parameters))
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().map_or(false, |c| c.is_whitespace()) {
        chars.next();
    }
}

fn read_word(chars: &mut Peekable<Chars<'_>>, stop_at_equals: bool) -> String {
    let mut word = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || (stop_at_equals && c == '=') {
            break;
        }
        word.push(c);
        chars.next();
    }
    word
}

fn read_value(chars: &mut Peekable<Chars<'_>>) -> String {
    if chars.peek() != Some(&'"') {
        return read_word(chars, false);
    }
    chars.next(); // Skip opening quote

    let mut value = String::new();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                value.push('"');
                continue;
            }
            break;
        }
        value.push(c);
    }
    value
}

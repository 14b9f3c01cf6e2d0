//! Conversions between expression values and cell values

use tabula_core::CellValue;
use tabula_expr::Value;

/// Largest integer a cell number holds exactly
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Store an expression result in a cell
///
/// Lists and records have no cell representation and are written as text.
pub fn to_cell_value(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Bool(b) => CellValue::Boolean(*b),
        Value::Int(i) => CellValue::Number(*i as f64),
        Value::Float(f) => CellValue::Number(*f),
        Value::String(s) if s.is_empty() => CellValue::Empty,
        Value::String(s) => CellValue::string(s.as_str()),
        Value::DateTime(dt) => CellValue::DateTime(*dt),
        Value::List(_) | Value::Record(_) => CellValue::string(value.to_text()),
    }
}

/// Read a cell as an expression value
///
/// Integral numbers come back as integers; formulas yield their cached
/// result when there is one.
pub fn from_cell_value(value: &CellValue) -> Value {
    match value {
        CellValue::Empty => Value::Null,
        CellValue::Boolean(b) => Value::Bool(*b),
        CellValue::Number(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT_INT => Value::Int(*n as i64),
        CellValue::Number(n) => Value::Float(*n),
        CellValue::String(s) => Value::from(s.as_str()),
        CellValue::DateTime(dt) => Value::DateTime(*dt),
        CellValue::Formula {
            cached_value: Some(cached),
            ..
        } => from_cell_value(cached),
        CellValue::Formula { text, .. } => Value::from(text.as_str()),
        CellValue::RichText(rt) => Value::String(rt.text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_to_cell_value() {
        assert_eq!(to_cell_value(&Value::Int(5)), CellValue::Number(5.0));
        assert_eq!(to_cell_value(&Value::Null), CellValue::Empty);
        assert_eq!(to_cell_value(&Value::from("")), CellValue::Empty);
        assert_eq!(
            to_cell_value(&Value::list(vec![1.into(), 2.into()])),
            CellValue::string("[1, 2]")
        );
    }

    #[test]
    fn test_from_cell_value() {
        assert_eq!(from_cell_value(&CellValue::Number(3.0)), Value::Int(3));
        assert_eq!(from_cell_value(&CellValue::Number(0.5)), Value::Float(0.5));
        assert_eq!(from_cell_value(&CellValue::formula("=A1")), Value::from("=A1"));
    }
}

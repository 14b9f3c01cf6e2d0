//! Operator semantics shared by the evaluator and the sequence operators

use std::cmp::Ordering;

use crate::ast::BinaryOperator;
use crate::error::{ExprError, ExprResult};
use crate::value::Value;

/// Equality as the `==` operator sees it
///
/// Integers and floats compare numerically; null equals only null.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (x, y) if x.is_number() && y.is_number() => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering used by comparisons and by `OrderBy`/`Min`/`Max`
///
/// Null sorts before everything. Returns `None` for values of unrelated types.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (x, y) if x.is_number() && y.is_number() => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Strictly typed binary operators (everything except `&&`, `||` and `??`)
pub fn binary(op: BinaryOperator, left: &Value, right: &Value) -> ExprResult<Value> {
    use BinaryOperator::*;

    match op {
        Add => add(left, right),
        Subtract | Multiply | Divide | Modulo => arithmetic(op, left, right),
        Equal => Ok(Value::Bool(values_equal(left, right))),
        NotEqual => Ok(Value::Bool(!values_equal(left, right))),
        LessThan | LessEqual | GreaterThan | GreaterEqual => compare(op, left, right),
        And | Or | Coalesce => Err(ExprError::evaluation(format!(
            "operator '{}' must be evaluated lazily",
            op.symbol()
        ))),
    }
}

fn incompatible(op: BinaryOperator, left: &Value, right: &Value) -> ExprError {
    ExprError::IncompatibleOperands {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

fn add(left: &Value, right: &Value) -> ExprResult<Value> {
    match (left, right) {
        (Value::String(_), _) | (_, Value::String(_)) => {
            Ok(Value::String(format!("{}{}", left.to_text(), right.to_text())))
        }
        _ => arithmetic(BinaryOperator::Add, left, right),
    }
}

fn arithmetic(op: BinaryOperator, left: &Value, right: &Value) -> ExprResult<Value> {
    use BinaryOperator::*;

    match (left, right) {
        // Lifted operators: a null operand gives null
        (Value::Null, r) if r.is_number() || r.is_null() => Ok(Value::Null),
        (l, Value::Null) if l.is_number() => Ok(Value::Null),

        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                Add => a.checked_add(b),
                Subtract => a.checked_sub(b),
                Multiply => a.checked_mul(b),
                Divide | Modulo if b == 0 => return Err(ExprError::DivideByZero),
                Divide => a.checked_div(b),
                Modulo => a.checked_rem(b),
                _ => return Err(incompatible(op, left, right)),
            };
            match result {
                Some(i) => Ok(Value::Int(i)),
                // Overflow promotes to floating point
                None => float_arithmetic(op, a as f64, b as f64),
            }
        }

        (l, r) if l.is_number() && r.is_number() => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => float_arithmetic(op, a, b),
            _ => Err(incompatible(op, left, right)),
        },

        _ => Err(incompatible(op, left, right)),
    }
}

fn float_arithmetic(op: BinaryOperator, a: f64, b: f64) -> ExprResult<Value> {
    use BinaryOperator::*;

    let result = match op {
        Add => a + b,
        Subtract => a - b,
        Multiply => a * b,
        Divide => a / b,
        Modulo => a % b,
        _ => {
            return Err(ExprError::evaluation(format!(
                "operator '{}' is not arithmetic",
                op.symbol()
            )))
        }
    };
    Ok(Value::Float(result))
}

fn compare(op: BinaryOperator, left: &Value, right: &Value) -> ExprResult<Value> {
    use BinaryOperator::*;

    // Lifted comparisons with null are false
    if left.is_null() || right.is_null() {
        return Ok(Value::Bool(false));
    }
    let ordering = compare_values(left, right).ok_or_else(|| incompatible(op, left, right))?;
    let result = match op {
        LessThan => ordering == Ordering::Less,
        LessEqual => ordering != Ordering::Greater,
        GreaterThan => ordering == Ordering::Greater,
        GreaterEqual => ordering != Ordering::Less,
        _ => return Err(incompatible(op, left, right)),
    };
    Ok(Value::Bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        use BinaryOperator::*;
        assert_eq!(binary(Add, &2.into(), &3.into()).unwrap(), Value::Int(5));
        assert_eq!(binary(Divide, &7.into(), &2.into()).unwrap(), Value::Int(3));
        assert_eq!(binary(Modulo, &7.into(), &2.into()).unwrap(), Value::Int(1));
        assert_eq!(binary(Multiply, &2.into(), &1.5.into()).unwrap(), Value::Float(3.0));
        assert_eq!(
            binary(Add, &Value::Int(i64::MAX), &1.into()).unwrap(),
            Value::Float(i64::MAX as f64 + 1.0)
        );
        assert_eq!(binary(Divide, &1.into(), &0.into()), Err(ExprError::DivideByZero));
    }

    #[test]
    fn test_string_concatenation() {
        use BinaryOperator::*;
        assert_eq!(
            binary(Add, &"Hello ".into(), &Value::Null).unwrap(),
            Value::from("Hello ")
        );
        assert_eq!(binary(Add, &"n".into(), &1.into()).unwrap(), Value::from("n1"));
        assert!(binary(Subtract, &"n".into(), &1.into()).is_err());
    }

    #[test]
    fn test_comparisons() {
        use BinaryOperator::*;
        assert_eq!(binary(Equal, &1.into(), &1.0.into()).unwrap(), Value::Bool(true));
        assert_eq!(binary(Equal, &Value::Null, &Value::Null).unwrap(), Value::Bool(true));
        assert_eq!(binary(NotEqual, &"a".into(), &Value::Null).unwrap(), Value::Bool(true));
        assert_eq!(binary(LessThan, &1.into(), &2.5.into()).unwrap(), Value::Bool(true));
        assert_eq!(binary(GreaterEqual, &Value::Null, &1.into()).unwrap(), Value::Bool(false));
        assert!(binary(LessThan, &"a".into(), &1.into()).is_err());
    }
}

//! Sequence operators on list values (`items.Where(i => i.Id > 3).Count()`)
//!
//! Arguments of a sequence operator are not evaluated up front. The
//! evaluator hands them over as [`SequenceArgs`], and the operator decides
//! whether an argument is a plain value (`Take(3)`) or a per-element
//! function (`Where(i => i.Id > 3)`, or `Where(Id > 3)` with an implicit
//! element).

use std::cmp::Ordering;

use crate::error::{ExprError, ExprResult};
use crate::ops::{compare_values, values_equal};
use crate::value::Value;

use super::check_arity;

/// Deferred arguments of a sequence operator call
pub trait SequenceArgs {
    /// Number of arguments at the call site
    fn len(&self) -> usize;

    /// Evaluate an argument on its own
    fn value(&mut self, index: usize) -> ExprResult<Value>;

    /// Evaluate an argument against one element of the sequence
    fn apply(&mut self, index: usize, item: &Value) -> ExprResult<Value>;
}

/// Sequence operator implementation signature
pub type SequenceImpl = fn(&[Value], &mut dyn SequenceArgs) -> ExprResult<Value>;

/// Sequence operator definition
pub struct SequenceMethod {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub implementation: SequenceImpl,
}

impl SequenceMethod {
    /// Check the argument count, then run the operator
    pub fn call(&self, items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
        check_arity(self.name, self.min_args, Some(self.max_args), args.len())?;
        (self.implementation)(items, args)
    }
}

macro_rules! method {
    ($name:literal, $min:literal, $max:literal, $f:ident) => {
        SequenceMethod {
            name: $name,
            min_args: $min,
            max_args: $max,
            implementation: $f,
        }
    };
}

static SEQUENCE_METHODS: &[SequenceMethod] = &[
    method!("Count", 0, 1, seq_count),
    method!("Any", 0, 1, seq_any),
    method!("All", 1, 1, seq_all),
    method!("Where", 1, 1, seq_where),
    method!("Select", 1, 1, seq_select),
    method!("Sum", 0, 1, seq_sum),
    method!("Min", 0, 1, seq_min),
    method!("Max", 0, 1, seq_max),
    method!("Average", 0, 1, seq_average),
    method!("First", 0, 1, seq_first),
    method!("FirstOrDefault", 0, 1, seq_first_or_default),
    method!("Last", 0, 1, seq_last),
    method!("LastOrDefault", 0, 1, seq_last_or_default),
    method!("Take", 1, 1, seq_take),
    method!("Skip", 1, 1, seq_skip),
    method!("OrderBy", 0, 1, seq_order_by),
    method!("OrderByDescending", 0, 1, seq_order_by_descending),
    method!("Distinct", 0, 0, seq_distinct),
    method!("Contains", 1, 1, seq_contains),
    method!("Reverse", 0, 0, seq_reverse),
    method!("ToList", 0, 0, seq_to_list),
    method!("ToArray", 0, 0, seq_to_list),
];

/// Look up a sequence operator (case-insensitive)
pub fn lookup(name: &str) -> Option<&'static SequenceMethod> {
    SEQUENCE_METHODS
        .iter()
        .find(|m| m.name.eq_ignore_ascii_case(name))
}

// === Argument helpers ===

fn predicate(args: &mut dyn SequenceArgs, item: &Value) -> ExprResult<bool> {
    match args.apply(0, item)? {
        Value::Bool(b) => Ok(b),
        other => Err(ExprError::evaluation(format!(
            "Expression of type 'Boolean' expected, got '{}'",
            other.type_name()
        ))),
    }
}

/// Elements matching the optional predicate argument
fn filtered(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Vec<Value>> {
    if args.len() == 0 {
        return Ok(items.to_vec());
    }
    let mut out = Vec::new();
    for item in items {
        if predicate(args, item)? {
            out.push(item.clone());
        }
    }
    Ok(out)
}

/// Elements mapped through the optional selector argument
fn selected(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Vec<Value>> {
    if args.len() == 0 {
        return Ok(items.to_vec());
    }
    items.iter().map(|item| args.apply(0, item)).collect()
}

fn count_arg(args: &mut dyn SequenceArgs, method: &str) -> ExprResult<usize> {
    let value = args.value(0)?;
    value
        .as_i64()
        .map(|n| n.max(0) as usize)
        .ok_or_else(|| {
            ExprError::evaluation(format!(
                "{}: count must be an integer, got {}",
                method,
                value.type_name()
            ))
        })
}

fn no_elements() -> ExprError {
    ExprError::evaluation("Sequence contains no elements")
}

// === Operators ===

fn seq_count(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    Ok(Value::from(filtered(items, args)?.len()))
}

fn seq_any(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    if args.len() == 0 {
        return Ok(Value::Bool(!items.is_empty()));
    }
    for item in items {
        if predicate(args, item)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn seq_all(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    for item in items {
        if !predicate(args, item)? {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn seq_where(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    Ok(Value::from(filtered(items, args)?))
}

fn seq_select(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    Ok(Value::from(selected(items, args)?))
}

fn seq_sum(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    let mut total = Value::Int(0);
    for value in selected(items, args)? {
        if value.is_null() {
            continue;
        }
        if !value.is_number() {
            return Err(ExprError::evaluation(format!(
                "Sum: element of type '{}' is not a number",
                value.type_name()
            )));
        }
        total = crate::ops::binary(crate::ast::BinaryOperator::Add, &total, &value)?;
    }
    Ok(total)
}

fn extreme(items: &[Value], args: &mut dyn SequenceArgs, want: Ordering) -> ExprResult<Value> {
    let values = selected(items, args)?;
    let mut best: Option<Value> = None;
    for value in values.into_iter().filter(|v| !v.is_null()) {
        best = Some(match best {
            None => value,
            Some(current) => match compare_values(&value, &current) {
                Some(ord) if ord == want => value,
                Some(_) => current,
                None => {
                    return Err(ExprError::evaluation(format!(
                        "cannot compare '{}' with '{}'",
                        value.type_name(),
                        current.type_name()
                    )))
                }
            },
        });
    }
    best.ok_or_else(no_elements)
}

fn seq_min(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    extreme(items, args, Ordering::Less)
}

fn seq_max(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    extreme(items, args, Ordering::Greater)
}

fn seq_average(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    let values: Vec<Value> = selected(items, args)?
        .into_iter()
        .filter(|v| !v.is_null())
        .collect();
    if values.is_empty() {
        return Err(no_elements());
    }
    let mut sum = 0.0;
    for value in &values {
        sum += value.as_f64().ok_or_else(|| {
            ExprError::evaluation(format!(
                "Average: element of type '{}' is not a number",
                value.type_name()
            ))
        })?;
    }
    Ok(Value::Float(sum / values.len() as f64))
}

fn seq_first(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    seq_first_or_default(items, args).and_then(|v| match v {
        Value::Null if !items.iter().any(|i| i.is_null()) => Err(no_elements()),
        v => Ok(v),
    })
}

fn seq_first_or_default(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    if args.len() == 0 {
        return Ok(items.first().cloned().unwrap_or_default());
    }
    for item in items {
        if predicate(args, item)? {
            return Ok(item.clone());
        }
    }
    Ok(Value::Null)
}

fn seq_last(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    seq_last_or_default(items, args).and_then(|v| match v {
        Value::Null if !items.iter().any(|i| i.is_null()) => Err(no_elements()),
        v => Ok(v),
    })
}

fn seq_last_or_default(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    Ok(filtered(items, args)?.pop().unwrap_or_default())
}

fn seq_take(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    let n = count_arg(args, "Take")?;
    Ok(Value::list(items.iter().take(n).cloned()))
}

fn seq_skip(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    let n = count_arg(args, "Skip")?;
    Ok(Value::list(items.iter().skip(n).cloned()))
}

fn order(items: &[Value], args: &mut dyn SequenceArgs, descending: bool) -> ExprResult<Value> {
    let keys = selected(items, args)?;
    let mut order: Vec<usize> = (0..items.len()).collect();
    let mut failure = None;
    order.sort_by(|&a, &b| {
        let ord = compare_values(&keys[a], &keys[b]).unwrap_or_else(|| {
            failure.get_or_insert((keys[a].type_name(), keys[b].type_name()));
            Ordering::Equal
        });
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
    if let Some((left, right)) = failure {
        return Err(ExprError::evaluation(format!(
            "cannot order '{}' against '{}'",
            left, right
        )));
    }
    Ok(Value::list(order.into_iter().map(|i| items[i].clone())))
}

fn seq_order_by(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    order(items, args, false)
}

fn seq_order_by_descending(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    order(items, args, true)
}

fn seq_distinct(items: &[Value], _args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    let mut out: Vec<Value> = Vec::new();
    for item in items {
        if !out.iter().any(|seen| values_equal(seen, item)) {
            out.push(item.clone());
        }
    }
    Ok(Value::from(out))
}

fn seq_contains(items: &[Value], args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    let needle = args.value(0)?;
    Ok(Value::Bool(items.iter().any(|item| values_equal(item, &needle))))
}

fn seq_reverse(items: &[Value], _args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    Ok(Value::list(items.iter().rev().cloned()))
}

fn seq_to_list(items: &[Value], _args: &mut dyn SequenceArgs) -> ExprResult<Value> {
    Ok(Value::list(items.iter().cloned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Arguments backed by plain closures over the element
    struct FnArgs(Vec<Box<dyn Fn(&Value) -> Value>>);

    impl SequenceArgs for FnArgs {
        fn len(&self) -> usize {
            self.0.len()
        }

        fn value(&mut self, index: usize) -> ExprResult<Value> {
            Ok(self.0[index](&Value::Null))
        }

        fn apply(&mut self, index: usize, item: &Value) -> ExprResult<Value> {
            Ok(self.0[index](item))
        }
    }

    fn call(name: &str, items: &[Value], args: Vec<Box<dyn Fn(&Value) -> Value>>) -> ExprResult<Value> {
        lookup(name).unwrap().call(items, &mut FnArgs(args))
    }

    fn numbers() -> Vec<Value> {
        vec![3.into(), 1.into(), 2.into(), 3.into()]
    }

    #[test]
    fn test_count_and_filter() {
        assert_eq!(call("count", &numbers(), vec![]).unwrap(), Value::Int(4));
        let over_one: Box<dyn Fn(&Value) -> Value> =
            Box::new(|v| Value::Bool(v.as_i64().unwrap_or(0) > 1));
        assert_eq!(call("Count", &numbers(), vec![over_one]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_predicate_must_be_boolean() {
        let not_bool: Box<dyn Fn(&Value) -> Value> = Box::new(|v| v.clone());
        assert!(call("Where", &numbers(), vec![not_bool]).is_err());
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(call("Sum", &numbers(), vec![]).unwrap(), Value::Int(9));
        assert_eq!(call("Min", &numbers(), vec![]).unwrap(), Value::Int(1));
        assert_eq!(call("Max", &numbers(), vec![]).unwrap(), Value::Int(3));
        assert_eq!(call("Average", &numbers(), vec![]).unwrap(), Value::Float(2.25));
        assert!(call("Max", &[], vec![]).is_err());
    }

    #[test]
    fn test_first_on_empty_fails() {
        assert_eq!(call("FirstOrDefault", &[], vec![]).unwrap(), Value::Null);
        assert!(call("First", &[], vec![]).is_err());
        assert_eq!(call("Last", &numbers(), vec![]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_ordering_is_stable() {
        let items = vec![
            Value::list(vec![2.into(), "a".into()]),
            Value::list(vec![1.into(), "b".into()]),
            Value::list(vec![2.into(), "c".into()]),
        ];
        let key: Box<dyn Fn(&Value) -> Value> =
            Box::new(|v| v.as_list().and_then(|l| l.first()).cloned().unwrap_or_default());
        let sorted = call("OrderByDescending", &items, vec![key]).unwrap();
        let tags: Vec<String> = sorted
            .as_list()
            .unwrap()
            .iter()
            .map(|v| v.as_list().unwrap()[1].to_text())
            .collect();
        assert_eq!(tags, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_take_skip_distinct() {
        let two: Box<dyn Fn(&Value) -> Value> = Box::new(|_| Value::Int(2));
        assert_eq!(
            call("Skip", &numbers(), vec![two]).unwrap(),
            Value::list(vec![2.into(), 3.into()])
        );
        assert_eq!(
            call("Distinct", &numbers(), vec![]).unwrap(),
            Value::list(vec![3.into(), 1.into(), 2.into()])
        );
        assert!(lookup("Explode").is_none());
    }
}

//! String functions: the `string` static type and methods on string values

use super::{arg, check_arity, int_arg, string_arg, FunctionDef, FunctionRegistry, StaticMember};
use crate::error::{ExprError, ExprResult};
use crate::value::Value;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register_static("string", "Empty", StaticMember::Constant(Value::from("")));

    let functions = [
        FunctionDef {
            name: "Join",
            min_args: 1,
            max_args: None,
            implementation: fn_join,
        },
        FunctionDef {
            name: "Concat",
            min_args: 0,
            max_args: None,
            implementation: fn_concat,
        },
        FunctionDef {
            name: "IsNullOrEmpty",
            min_args: 1,
            max_args: Some(1),
            implementation: fn_is_null_or_empty,
        },
        FunctionDef {
            name: "IsNullOrWhiteSpace",
            min_args: 1,
            max_args: Some(1),
            implementation: fn_is_null_or_white_space,
        },
        FunctionDef {
            name: "Format",
            min_args: 1,
            max_args: None,
            implementation: fn_format,
        },
    ];
    for def in functions {
        registry.register_static("string", def.name, StaticMember::Function(def));
    }
}

/// Values to join: list arguments are flattened one level
fn flatten(args: &[Value]) -> Vec<&Value> {
    args.iter()
        .flat_map(|v| match v {
            Value::List(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

/// string.Join(separator, values...)
fn fn_join(args: &[Value]) -> ExprResult<Value> {
    let separator = arg(args, 0).to_text();
    let parts: Vec<String> = flatten(args.get(1..).unwrap_or_default()).iter().map(|v| v.to_text()).collect();
    Ok(Value::String(parts.join(&separator)))
}

/// string.Concat(values...)
fn fn_concat(args: &[Value]) -> ExprResult<Value> {
    Ok(Value::String(
        flatten(args).iter().map(|v| v.to_text()).collect(),
    ))
}

fn fn_is_null_or_empty(args: &[Value]) -> ExprResult<Value> {
    Ok(Value::Bool(match arg(args, 0) {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }))
}

fn fn_is_null_or_white_space(args: &[Value]) -> ExprResult<Value> {
    Ok(Value::Bool(match arg(args, 0) {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }))
}

/// string.Format("{0} of {1}", a, b)
fn fn_format(args: &[Value]) -> ExprResult<Value> {
    let template = string_arg("Format", args, 0)?;
    let values = args.get(1..).unwrap_or_default();
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut index = String::new();
                for d in chars.by_ref() {
                    if d == '}' {
                        break;
                    }
                    index.push(d);
                }
                let (index, format) = match index.split_once(':') {
                    Some((i, f)) => (i, Some(f)),
                    None => (index.as_str(), None),
                };
                let value = index
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| values.get(i))
                    .ok_or_else(|| {
                        ExprError::evaluation(format!(
                            "Format: index '{}' is out of range",
                            index
                        ))
                    })?;
                match format {
                    Some(f) => out.push_str(&format_with(value, f)?),
                    None => out.push_str(&value.to_text()),
                }
            }
            other => out.push(other),
        }
    }
    Ok(Value::String(out))
}

/// Apply a format string to a number or date; other values ignore it
fn format_with(value: &Value, format: &str) -> ExprResult<String> {
    match value {
        Value::Int(_) | Value::Float(_) => super::number::format_number(value, format),
        Value::DateTime(dt) => Ok(super::date::format_datetime(dt, format)),
        other => Ok(other.to_text()),
    }
}

/// Properties of a string value
pub fn member(s: &str, name: &str) -> Option<Value> {
    match name.to_ascii_lowercase().as_str() {
        "length" => Some(Value::from(s.chars().count())),
        _ => None,
    }
}

/// Methods of a string value; `None` when the method does not exist
pub fn call_method(s: &str, name: &str, args: &[Value]) -> Option<ExprResult<Value>> {
    let method = name.to_ascii_lowercase();
    let (min, max) = match method.as_str() {
        "toupper" | "tolower" | "trim" | "trimstart" | "trimend" | "tostring" => (0, 0),
        "contains" | "startswith" | "endswith" | "indexof" | "split" => (1, 1),
        "substring" | "padleft" | "padright" => (1, 2),
        "replace" => (2, 2),
        _ => return None,
    };
    if let Err(e) = check_arity(name, min, Some(max), args.len()) {
        return Some(Err(e));
    }
    Some(string_method(s, &method, args))
}

fn string_method(s: &str, method: &str, args: &[Value]) -> ExprResult<Value> {
    let text = |i: usize| arg(args, i).to_text();

    Ok(match method {
        "toupper" => Value::String(s.to_uppercase()),
        "tolower" => Value::String(s.to_lowercase()),
        "trim" => Value::from(s.trim()),
        "trimstart" => Value::from(s.trim_start()),
        "trimend" => Value::from(s.trim_end()),
        "tostring" => Value::from(s),
        "contains" => Value::Bool(s.contains(&text(0))),
        "startswith" => Value::Bool(s.starts_with(&text(0))),
        "endswith" => Value::Bool(s.ends_with(&text(0))),
        "indexof" => {
            let needle = text(0);
            Value::Int(
                s.find(&needle)
                    .map(|byte| s[..byte].chars().count() as i64)
                    .unwrap_or(-1),
            )
        }
        "split" => Value::list(s.split(&text(0)).map(Value::from)),
        "replace" => Value::String(s.replace(&text(0), &text(1))),
        "substring" => {
            let len = s.chars().count() as i64;
            let start = int_arg("Substring", args, 0)?;
            let count = match args.get(1) {
                Some(_) => int_arg("Substring", args, 1)?,
                None => len - start,
            };
            if start < 0 || count < 0 || start + count > len {
                return Err(ExprError::evaluation(format!(
                    "Substring: index and length must refer to a location within the string (start {}, length {})",
                    start, count
                )));
            }
            Value::String(s.chars().skip(start as usize).take(count as usize).collect())
        }
        "padleft" | "padright" => {
            let width = int_arg(method, args, 0)?.max(0) as usize;
            let pad = match args.get(1) {
                Some(v) => v.to_text().chars().next().unwrap_or(' '),
                None => ' ',
            };
            let missing = width.saturating_sub(s.chars().count());
            let padding: String = std::iter::repeat(pad).take(missing).collect();
            if method == "padleft" {
                Value::String(padding + s)
            } else {
                Value::String(s.to_string() + &padding)
            }
        }
        other => {
            return Err(ExprError::UnknownMethod {
                method: other.to_string(),
                type_name: "String".into(),
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(s: &str, name: &str, args: &[Value]) -> Value {
        call_method(s, name, args).unwrap().unwrap()
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(call("abc", "ToUpper", &[]), Value::from("ABC"));
        assert_eq!(call("  x ", "Trim", &[]), Value::from("x"));
        assert_eq!(call("hello", "Substring", &[1.into(), 3.into()]), Value::from("ell"));
        assert_eq!(call("hello", "Substring", &[2.into()]), Value::from("llo"));
        assert_eq!(call("a-b", "Replace", &["-".into(), "+".into()]), Value::from("a+b"));
        assert_eq!(call("héllo", "IndexOf", &["l".into()]), Value::Int(2));
        assert_eq!(call("7", "PadLeft", &[3.into(), "0".into()]), Value::from("007"));
        assert_eq!(member("héllo", "Length"), Some(Value::Int(5)));
    }

    #[test]
    fn test_string_method_errors() {
        assert!(call_method("abc", "Explode", &[]).is_none());
        assert!(matches!(
            call_method("abc", "Contains", &[]),
            Some(Err(ExprError::ArgumentCount { .. }))
        ));
        assert!(call_method("abc", "Substring", &[2.into(), 5.into()])
            .unwrap()
            .is_err());
    }

    #[test]
    fn test_static_string_functions() {
        assert_eq!(
            fn_join(&[", ".into(), Value::list(vec![1.into(), "b".into()])]).unwrap(),
            Value::from("1, b")
        );
        assert_eq!(
            fn_format(&["{0} of {1:F1} {{x}}".into(), 2.into(), 3.into()]).unwrap(),
            Value::from("2 of 3.0 {x}")
        );
        assert_eq!(fn_is_null_or_empty(&[Value::Null]).unwrap(), Value::Bool(true));
    }
}

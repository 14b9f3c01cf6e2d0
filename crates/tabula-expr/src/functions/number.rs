//! Numeric functions: the `Math` and `Convert` static types, number formatting

use super::{arg, check_arity, int_arg, number_arg, FunctionDef, FunctionRegistry, StaticMember};
use crate::error::{ExprError, ExprResult};
use crate::ops::compare_values;
use crate::value::Value;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register_static("Math", "PI", StaticMember::Constant(Value::Float(std::f64::consts::PI)));

    let math = [
        ("Round", 1, Some(2), fn_round as super::FunctionImpl),
        ("Abs", 1, Some(1), fn_abs),
        ("Min", 2, Some(2), fn_min),
        ("Max", 2, Some(2), fn_max),
        ("Floor", 1, Some(1), fn_floor),
        ("Ceiling", 1, Some(1), fn_ceiling),
        ("Truncate", 1, Some(1), fn_truncate),
        ("Pow", 2, Some(2), fn_pow),
        ("Sqrt", 1, Some(1), fn_sqrt),
    ];
    for (name, min_args, max_args, implementation) in math {
        registry.register_static(
            "Math",
            name,
            StaticMember::Function(FunctionDef {
                name,
                min_args,
                max_args,
                implementation,
            }),
        );
    }

    let convert = [
        ("ToInt32", fn_to_int as super::FunctionImpl),
        ("ToInt64", fn_to_int),
        ("ToDouble", fn_to_double),
        ("ToDecimal", fn_to_double),
        ("ToString", fn_to_string),
    ];
    for (name, implementation) in convert {
        registry.register_static(
            "Convert",
            name,
            StaticMember::Function(FunctionDef {
                name,
                min_args: 1,
                max_args: Some(1),
                implementation,
            }),
        );
    }
}

/// Round half to even, the default midpoint rule of `Math.Round`
fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 && rounded % 2.0 != 0.0 {
        rounded - x.signum()
    } else {
        rounded
    }
}

fn fn_round(args: &[Value]) -> ExprResult<Value> {
    if let (Value::Int(i), None) = (arg(args, 0), args.get(1)) {
        return Ok(Value::Int(*i));
    }
    let x = number_arg("Round", args, 0)?;
    let digits = match args.get(1) {
        Some(_) => int_arg("Round", args, 1)?,
        None => 0,
    };
    if !(0..=15).contains(&digits) {
        return Err(ExprError::evaluation(
            "Round: digits must be between 0 and 15",
        ));
    }
    let factor = 10f64.powi(digits as i32);
    Ok(Value::Float(round_half_even(x * factor) / factor))
}

fn fn_abs(args: &[Value]) -> ExprResult<Value> {
    match arg(args, 0) {
        Value::Int(i) => Ok(i
            .checked_abs()
            .map(Value::Int)
            .unwrap_or(Value::Float((*i as f64).abs()))),
        _ => Ok(Value::Float(number_arg("Abs", args, 0)?.abs())),
    }
}

fn pick(name: &str, args: &[Value], want: std::cmp::Ordering) -> ExprResult<Value> {
    number_arg(name, args, 0)?;
    number_arg(name, args, 1)?;
    let (a, b) = (arg(args, 0), arg(args, 1));
    Ok(if compare_values(b, a) == Some(want) {
        b.clone()
    } else {
        a.clone()
    })
}

fn fn_min(args: &[Value]) -> ExprResult<Value> {
    pick("Min", args, std::cmp::Ordering::Less)
}

fn fn_max(args: &[Value]) -> ExprResult<Value> {
    pick("Max", args, std::cmp::Ordering::Greater)
}

fn fn_floor(args: &[Value]) -> ExprResult<Value> {
    Ok(Value::Float(number_arg("Floor", args, 0)?.floor()))
}

fn fn_ceiling(args: &[Value]) -> ExprResult<Value> {
    Ok(Value::Float(number_arg("Ceiling", args, 0)?.ceil()))
}

fn fn_truncate(args: &[Value]) -> ExprResult<Value> {
    Ok(Value::Float(number_arg("Truncate", args, 0)?.trunc()))
}

fn fn_pow(args: &[Value]) -> ExprResult<Value> {
    Ok(Value::Float(
        number_arg("Pow", args, 0)?.powf(number_arg("Pow", args, 1)?),
    ))
}

fn fn_sqrt(args: &[Value]) -> ExprResult<Value> {
    Ok(Value::Float(number_arg("Sqrt", args, 0)?.sqrt()))
}

fn fn_to_int(args: &[Value]) -> ExprResult<Value> {
    match arg(args, 0) {
        Value::Null => Ok(Value::Int(0)),
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Int(round_half_even(*f) as i64)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::String(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            ExprError::evaluation(format!("Input string '{}' was not in a correct format", s))
        }),
        other => Err(ExprError::evaluation(format!(
            "Cannot convert {} to an integer",
            other.type_name()
        ))),
    }
}

fn fn_to_double(args: &[Value]) -> ExprResult<Value> {
    match arg(args, 0) {
        Value::Null => Ok(Value::Float(0.0)),
        Value::String(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            ExprError::evaluation(format!("Input string '{}' was not in a correct format", s))
        }),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        _ => Ok(Value::Float(number_arg("ToDouble", args, 0)?)),
    }
}

fn fn_to_string(args: &[Value]) -> ExprResult<Value> {
    Ok(Value::String(arg(args, 0).to_text()))
}

/// Methods of a number value; `None` when the method does not exist
pub fn call_method(value: &Value, name: &str, args: &[Value]) -> Option<ExprResult<Value>> {
    if !name.eq_ignore_ascii_case("ToString") {
        return None;
    }
    if let Err(e) = check_arity(name, 0, Some(1), args.len()) {
        return Some(Err(e));
    }
    Some(match args.first() {
        None => Ok(Value::String(value.to_text())),
        Some(Value::String(format)) => format_number(value, format).map(Value::String),
        Some(other) => Err(ExprError::evaluation(format!(
            "ToString: format must be a string, got {}",
            other.type_name()
        ))),
    })
}

/// Format a number with a standard (`F2`, `N0`, `P1`, `D4`) or custom
/// (`0.00`, `#,##0.0`) format string
pub fn format_number(value: &Value, format: &str) -> ExprResult<String> {
    let x = value
        .as_f64()
        .ok_or_else(|| ExprError::evaluation(format!("cannot format {} as a number", value.type_name())))?;

    let mut chars = format.chars();
    let spec = chars.next().map(|c| c.to_ascii_uppercase());
    let precision: Option<usize> = chars.as_str().parse().ok();
    let is_standard = format.len() <= 3 && (format.len() == 1 || precision.is_some());

    if is_standard {
        match spec {
            Some('F') => return Ok(fixed(x, precision.unwrap_or(2), false)),
            Some('N') => return Ok(fixed(x, precision.unwrap_or(2), true)),
            Some('P') => return Ok(format!("{} %", fixed(x * 100.0, precision.unwrap_or(2), true))),
            Some('D') => {
                let i = value.as_i64().ok_or_else(|| {
                    ExprError::evaluation("format 'D' is only supported for integers")
                })?;
                let digits = format!("{:0width$}", i.unsigned_abs(), width = precision.unwrap_or(1));
                return Ok(if i < 0 { format!("-{}", digits) } else { digits });
            }
            _ => {}
        }
    }
    Ok(custom(x, format))
}

fn fixed(x: f64, decimals: usize, grouped: bool) -> String {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (x.abs() * factor).round() / factor;
    let text = format!("{:.*}", decimals, rounded);
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (text.clone(), None),
    };
    let int_part = if grouped { group_thousands(&int_part) } else { int_part };
    let sign = if x < 0.0 && rounded != 0.0 { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, int_part, f),
        None => format!("{}{}", sign, int_part),
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `0` is a required digit, `#` an optional one, `,` before the point groups
/// thousands; anything else is copied through as a literal prefix or suffix
fn custom(x: f64, format: &str) -> String {
    let is_pattern = |c: char| matches!(c, '0' | '#' | ',' | '.');
    let Some(start) = format.find(is_pattern) else {
        return format.to_string();
    };
    let end = format.rfind(is_pattern).map_or(format.len(), |i| i + 1);
    let (prefix, pattern, suffix) = (&format[..start], &format[start..end], &format[end..]);

    let (int_pattern, frac_pattern) = pattern.split_once('.').unwrap_or((pattern, ""));
    let required = frac_pattern.chars().filter(|c| *c == '0').count();
    let optional = frac_pattern.chars().filter(|c| *c == '#').count();
    let min_int = int_pattern.chars().filter(|c| *c == '0').count();
    let grouped = int_pattern.contains(',');

    let mut body = fixed(x.abs(), required + optional, false);
    if optional > 0 {
        if let Some(dot) = body.find('.') {
            let keep = body.trim_end_matches('0').len().max(dot + 1 + required);
            body.truncate(keep);
            if body.ends_with('.') {
                body.pop();
            }
        }
    }
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (body, None),
    };
    let mut int_part = if int_part == "0" && min_int == 0 { String::new() } else { int_part };
    while int_part.len() < min_int {
        int_part.insert(0, '0');
    }
    if grouped {
        int_part = group_thousands(&int_part);
    }
    let sign = if x < 0.0 { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{}{}{}.{}{}", prefix, sign, int_part, f, suffix),
        None => format!("{}{}{}{}", prefix, sign, int_part, suffix),
    }
}

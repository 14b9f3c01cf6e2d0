//! Date functions: the `DateTime` static type and members of date values

use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use super::{arg, check_arity, int_arg, number_arg, FunctionDef, FunctionRegistry, StaticMember};
use crate::error::{ExprError, ExprResult};
use crate::value::Value;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register_static("DateTime", "Today", StaticMember::Property(today));
    registry.register_static("DateTime", "Now", StaticMember::Property(now));
    registry.register_static(
        "DateTime",
        "MinValue",
        StaticMember::Constant(Value::from(NaiveDate::MIN)),
    );
    registry.register_static(
        "DateTime",
        "Parse",
        StaticMember::Function(FunctionDef {
            name: "Parse",
            min_args: 1,
            max_args: Some(1),
            implementation: fn_parse,
        }),
    );
}

fn today() -> Value {
    Value::from(Local::now().date_naive())
}

fn now() -> Value {
    Value::DateTime(Local::now().naive_local())
}

fn fn_parse(args: &[Value]) -> ExprResult<Value> {
    let text = arg(args, 0).to_text();
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::default())))
        .map(Value::DateTime)
        .map_err(|_| {
            ExprError::evaluation(format!("String '{}' was not recognized as a valid DateTime", text))
        })
}

/// Properties of a date value
pub fn member(dt: &NaiveDateTime, name: &str) -> Option<Value> {
    let value = match name.to_ascii_lowercase().as_str() {
        "year" => Value::Int(dt.year() as i64),
        "month" => Value::from(dt.month()),
        "day" => Value::from(dt.day()),
        "hour" => Value::from(dt.hour()),
        "minute" => Value::from(dt.minute()),
        "second" => Value::from(dt.second()),
        "dayofyear" => Value::from(dt.ordinal()),
        "dayofweek" => Value::from(dt.weekday().to_string()),
        "date" => Value::from(dt.date()),
        _ => return None,
    };
    Some(value)
}

/// Methods of a date value; `None` when the method does not exist
pub fn call_method(dt: &NaiveDateTime, name: &str, args: &[Value]) -> Option<ExprResult<Value>> {
    let method = name.to_ascii_lowercase();
    let (min, max) = match method.as_str() {
        "adddays" | "addhours" | "addminutes" | "addmonths" | "addyears" => (1, 1),
        "tostring" => (0, 1),
        _ => return None,
    };
    if let Err(e) = check_arity(name, min, Some(max), args.len()) {
        return Some(Err(e));
    }
    Some(date_method(dt, &method, args))
}

fn date_method(dt: &NaiveDateTime, method: &str, args: &[Value]) -> ExprResult<Value> {
    let overflow = || ExprError::evaluation(format!("{}: the resulting date is out of range", method));

    let shifted = match method {
        "adddays" => add_duration(dt, number_arg(method, args, 0)? * 86_400.0),
        "addhours" => add_duration(dt, number_arg(method, args, 0)? * 3_600.0),
        "addminutes" => add_duration(dt, number_arg(method, args, 0)? * 60.0),
        "addmonths" => add_months(dt, int_arg(method, args, 0)?),
        "addyears" => add_months(dt, int_arg(method, args, 0)?.saturating_mul(12)),
        "tostring" => {
            return Ok(Value::String(match args.first() {
                Some(format) => format_datetime(dt, &format.to_text()),
                None => Value::DateTime(*dt).to_text(),
            }))
        }
        other => {
            return Err(ExprError::UnknownMethod {
                method: other.to_string(),
                type_name: "DateTime".into(),
            })
        }
    };
    shifted.map(Value::DateTime).ok_or_else(overflow)
}

fn add_duration(dt: &NaiveDateTime, seconds: f64) -> Option<NaiveDateTime> {
    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return None;
    }
    dt.checked_add_signed(Duration::milliseconds(millis as i64))
}

fn add_months(dt: &NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        dt.checked_add_months(Months::new(magnitude))
    } else {
        dt.checked_sub_months(Months::new(magnitude))
    }
}

/// Format a date with a .NET-style pattern (`dd.MM.yyyy`, `yyyy-MM-dd HH:mm`)
///
/// Text in single or double quotes is copied literally, as is any character
/// that is not a pattern letter.
pub fn format_datetime(dt: &NaiveDateTime, format: &str) -> String {
    let chars: Vec<char> = format.chars().collect();
    let mut out = String::with_capacity(format.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' || c == '"' {
            i += 1;
            while i < chars.len() && chars[i] != c {
                out.push(chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }
        if c == '\\' && i + 1 < chars.len() {
            out.push(chars[i + 1]);
            i += 2;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&d| d == c).count();
        let piece = match (c, run) {
            ('y', 1) => format!("{}", dt.year() % 100),
            ('y', 2) => format!("{:02}", dt.year() % 100),
            ('y', _) => format!("{:0width$}", dt.year(), width = run),
            ('M', 1) => dt.month().to_string(),
            ('M', 2) => format!("{:02}", dt.month()),
            ('M', 3) => dt.format("%b").to_string(),
            ('M', _) => dt.format("%B").to_string(),
            ('d', 1) => dt.day().to_string(),
            ('d', 2) => format!("{:02}", dt.day()),
            ('d', 3) => dt.format("%a").to_string(),
            ('d', _) => dt.format("%A").to_string(),
            ('H', 1) => dt.hour().to_string(),
            ('H', _) => format!("{:02}", dt.hour()),
            ('h', 1) => dt.hour12().1.to_string(),
            ('h', _) => format!("{:02}", dt.hour12().1),
            ('m', 1) => dt.minute().to_string(),
            ('m', _) => format!("{:02}", dt.minute()),
            ('s', 1) => dt.second().to_string(),
            ('s', _) => format!("{:02}", dt.second()),
            ('f', n) => {
                let millis = format!("{:09}", dt.nanosecond());
                millis.chars().take(n.min(9)).collect()
            }
            ('t', 1) => dt.format("%p").to_string().chars().take(1).collect(),
            ('t', _) => dt.format("%p").to_string(),
            (other, n) => std::iter::repeat(other).take(n).collect(),
        };
        out.push_str(&piece);
        i += run;
    }
    out
}

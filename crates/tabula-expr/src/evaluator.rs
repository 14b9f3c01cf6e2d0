//! Template text evaluation
//!
//! An [`Evaluator`] turns cell text such as `"Total: {{items.Sum(i => i.Price)}}"`
//! into a [`Value`]. Each distinct `{{...}}` placeholder is evaluated once and
//! spliced into the text; a placeholder that makes up the whole remaining text
//! yields its typed value instead of a string.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ahash::AHashMap;
use lazy_regex::regex;
use tracing::trace;

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{ExprError, ExprResult};
use crate::functions::sequence::{self, SequenceArgs};
use crate::functions::{date, global_registry, number, text, FunctionRegistry, StaticMember};
use crate::ops;
use crate::parser::parse_expression;
use crate::value::Value;

/// A named value supplied for one evaluation (`item` inside a list region)
///
/// When the value is a record, a region interpreter also publishes its fields
/// as `alias_Field` names; `alias` overrides the prefix it would pick.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
    pub alias: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Does the text contain a placeholder opening?
pub fn has_placeholders(text: &str) -> bool {
    text.contains("{{")
}

/// Case-insensitive variable bindings, optionally layered over a parent scope
///
/// A lookup that misses this layer falls through to the parent. Creating a
/// child never copies the parent's bindings.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    /// Keys are lower-cased
    values: AHashMap<String, Value>,
    parent: Option<Rc<Variables>>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty layer over `parent`
    pub fn child(parent: &Rc<Variables>) -> Self {
        Self {
            values: AHashMap::new(),
            parent: Some(parent.clone()),
        }
    }

    /// Add or replace a binding in this layer
    pub fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_lowercase(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.get_lower(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn get_lower(&self, key: &str) -> Option<&Value> {
        self.values
            .get(key)
            .or_else(|| self.parent.as_deref().and_then(|p| p.get_lower(key)))
    }
}

/// Placeholder evaluator with a variable environment and an expression cache
///
/// Clones and [`scoped`](Evaluator::scoped) children share one compile cache.
#[derive(Debug, Clone)]
pub struct Evaluator {
    variables: Rc<Variables>,
    registry: Arc<FunctionRegistry>,
    cache: Rc<RefCell<AHashMap<String, Arc<Expr>>>>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Create an evaluator over the process-wide function registry
    pub fn new() -> Self {
        Self::with_registry(global_registry())
    }

    /// Create an evaluator over an explicit registry
    pub fn with_registry(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            variables: Rc::new(Variables::new()),
            registry,
            cache: Rc::new(RefCell::new(AHashMap::new())),
        }
    }

    /// Evaluator whose variables are layered over this one's
    ///
    /// Variables added to the child stay in the child.
    pub fn scoped(&self) -> Self {
        Self {
            variables: Rc::new(Variables::child(&self.variables)),
            registry: self.registry.clone(),
            cache: self.cache.clone(),
        }
    }

    /// Add or replace a variable (names are case-insensitive)
    pub fn add_variable(&mut self, name: &str, value: impl Into<Value>) {
        Rc::make_mut(&mut self.variables).insert(name, value.into());
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Number of distinct expressions compiled so far
    pub fn cached_expressions(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// Evaluate template text
    ///
    /// # Example
    /// ```rust
    /// use tabula_expr::{Evaluator, Parameter, Value};
    ///
    /// let evaluator = Evaluator::new();
    /// let params = [Parameter::new("a", 2), Parameter::new("b", 3)];
    /// assert_eq!(evaluator.evaluate("{{a+b}}", &params).unwrap(), Value::Int(5));
    /// assert_eq!(
    ///     evaluator.evaluate("{{a}}+{{b}}={{a+b}}", &params).unwrap(),
    ///     Value::from("2+3=5")
    /// );
    /// ```
    pub fn evaluate(&self, text: &str, params: &[Parameter]) -> ExprResult<Value> {
        let mut placeholders: Vec<&str> = Vec::new();
        for m in regex!(r"(?s)\{\{.+?\}\}").find_iter(text) {
            if !placeholders.contains(&m.as_str()) {
                placeholders.push(m.as_str());
            }
        }
        if placeholders.is_empty() {
            return Ok(Value::from(text));
        }

        let mut current = text.to_string();
        for placeholder in placeholders {
            let inner = &placeholder[2..placeholder.len() - 2];
            let value = self.eval_expression(inner.trim(), params)?;
            if current == placeholder {
                return Ok(value);
            }
            current = current.replace(placeholder, &value.to_text());
        }
        Ok(Value::String(current))
    }

    /// Evaluate template text, discarding the failure reason
    pub fn try_evaluate(&self, text: &str, params: &[Parameter]) -> Option<Value> {
        self.evaluate(text, params).ok()
    }

    /// Evaluate a bare expression (no braces)
    pub fn eval_expression(&self, expr_text: &str, params: &[Parameter]) -> ExprResult<Value> {
        let expr = self.compile(expr_text)?;
        Scope::new(self, params).eval(&expr)
    }

    /// Parse an expression, reusing an earlier parse of the same text
    pub fn compile(&self, expr_text: &str) -> ExprResult<Arc<Expr>> {
        if let Some(expr) = self.cache.borrow().get(expr_text) {
            return Ok(expr.clone());
        }
        trace!(expression = expr_text, "compiling expression");
        let expr = Arc::new(parse_expression(expr_text)?);
        self.cache
            .borrow_mut()
            .insert(expr_text.to_string(), expr.clone());
        Ok(expr)
    }
}

/// Name bindings for one evaluation
struct Scope<'a> {
    evaluator: &'a Evaluator,
    params: &'a [Parameter],
    /// Lambda parameters, innermost last
    locals: Vec<(String, Value)>,
    /// Implicit elements, innermost last
    it: Vec<Value>,
    /// Inside `np(...)`: absent links evaluate to null
    null_safe: bool,
}

impl<'a> Scope<'a> {
    fn new(evaluator: &'a Evaluator, params: &'a [Parameter]) -> Self {
        Self {
            evaluator,
            params,
            locals: Vec::new(),
            it: Vec::new(),
            null_safe: false,
        }
    }

    fn registry(&self) -> &'a FunctionRegistry {
        &self.evaluator.registry
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some((_, v)) = self
            .locals
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            return Some(v.clone());
        }
        if let Some(value) = self.it.last().and_then(Value::as_record).and_then(|r| r.get(name)) {
            return Some(value.clone());
        }
        let bare = name.strip_prefix('@').unwrap_or(name);
        if let Some(p) = self
            .params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name) || p.name.eq_ignore_ascii_case(bare))
        {
            return Some(p.value.clone());
        }
        self.evaluator
            .variable(name)
            .or_else(|| self.evaluator.variable(bare))
            .cloned()
    }

    /// Static type named by a bare identifier that is not a data name
    fn static_target(&self, target: &Expr) -> Option<&'a crate::functions::StaticType> {
        match target {
            Expr::Ident(name) if self.lookup(name).is_none() => self.registry().static_type(name),
            _ => None,
        }
    }

    fn eval(&mut self, expr: &Expr) -> ExprResult<Value> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Boolean(b) => Ok(Value::Bool(*b)),
            Expr::Integer(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::String(s) => Ok(Value::from(s.as_str())),

            Expr::Ident(name) => self
                .lookup(name)
                .ok_or_else(|| ExprError::UnknownIdentifier(name.clone())),

            Expr::It => self.it.last().cloned().ok_or_else(|| {
                ExprError::evaluation("'it' is only valid inside a sequence operator argument")
            }),

            Expr::Member { target, name } => {
                if let Some(static_type) = self.static_target(target) {
                    return match static_type.member(name) {
                        Some(StaticMember::Constant(value)) => Ok(value.clone()),
                        Some(StaticMember::Property(get)) => Ok(get()),
                        Some(StaticMember::Function(def)) => Err(ExprError::evaluation(format!(
                            "'{}' is a method and must be called",
                            def.name
                        ))),
                        None => Err(ExprError::UnknownMember {
                            member: name.clone(),
                            type_name: type_label(target),
                        }),
                    };
                }
                let value = self.eval(target)?;
                self.member(&value, name)
            }

            Expr::Index { target, index } => {
                let value = self.eval(target)?;
                let index = self.eval(index)?;
                self.index(&value, &index)
            }

            Expr::Call { name, args } => self.call(name, args),

            Expr::MethodCall { target, name, args } => self.method_call(target, name, args),

            Expr::Lambda { param, .. } => Err(ExprError::evaluation(format!(
                "Lambda '{} => ...' is only valid as a sequence operator argument",
                param
            ))),

            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                unary(*op, value)
            }

            Expr::Binary { op, left, right } => self.binary(*op, left, right),

            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if self.condition(condition)? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn condition(&mut self, expr: &Expr) -> ExprResult<bool> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(ExprError::evaluation(format!(
                "Expression of type 'Boolean' expected, got '{}'",
                other.type_name()
            ))),
        }
    }

    fn binary(&mut self, op: BinaryOperator, left: &Expr, right: &Expr) -> ExprResult<Value> {
        match op {
            BinaryOperator::And => Ok(Value::Bool(self.condition(left)? && self.condition(right)?)),
            BinaryOperator::Or => Ok(Value::Bool(self.condition(left)? || self.condition(right)?)),
            BinaryOperator::Coalesce => match self.eval(left)? {
                Value::Null => self.eval(right),
                value => Ok(value),
            },
            _ => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                ops::binary(op, &l, &r)
            }
        }
    }

    fn member(&self, value: &Value, name: &str) -> ExprResult<Value> {
        let found = match value {
            Value::Null if self.null_safe => return Ok(Value::Null),
            Value::Null => return Err(ExprError::NullReference(name.to_string())),
            Value::Record(record) => record.get(name).cloned(),
            Value::List(items) => match name.to_ascii_lowercase().as_str() {
                "count" | "length" => Some(Value::from(items.len())),
                _ => None,
            },
            Value::String(s) => text::member(s, name),
            Value::DateTime(dt) => date::member(dt, name),
            _ => None,
        };
        match found {
            Some(v) => Ok(v),
            None if self.null_safe => Ok(Value::Null),
            None => Err(ExprError::UnknownMember {
                member: name.to_string(),
                type_name: value.type_name().to_string(),
            }),
        }
    }

    fn index(&self, value: &Value, index: &Value) -> ExprResult<Value> {
        let out_of_range = || ExprError::evaluation("Index was outside the bounds of the array");
        match (value, index) {
            (Value::Null, _) if self.null_safe => Ok(Value::Null),
            (Value::Null, _) => Err(ExprError::NullReference(format!("[{}]", index))),
            (Value::List(items), i) if i.as_i64().is_some() => {
                let i = i.as_i64().unwrap_or(-1);
                usize::try_from(i)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or_else(out_of_range)
            }
            (Value::String(s), i) if i.as_i64().is_some() => {
                let i = i.as_i64().unwrap_or(-1);
                usize::try_from(i)
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::String(c.to_string()))
                    .ok_or_else(out_of_range)
            }
            (Value::Record(_), Value::String(key)) => self.member(value, key),
            _ => Err(ExprError::evaluation(format!(
                "Cannot index '{}' with '{}'",
                value.type_name(),
                index.type_name()
            ))),
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> ExprResult<Vec<Value>> {
        args.iter().map(|a| self.eval(a)).collect()
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> ExprResult<Value> {
        match name.to_ascii_lowercase().as_str() {
            "iif" => {
                crate::functions::check_arity("Iif", 3, Some(3), args.len())?;
                if self.condition(&args[0])? {
                    self.eval(&args[1])
                } else {
                    self.eval(&args[2])
                }
            }
            "np" | "nullpropagate" => {
                crate::functions::check_arity(name, 1, Some(2), args.len())?;
                let outer = std::mem::replace(&mut self.null_safe, true);
                let result = self.eval(&args[0]);
                self.null_safe = outer;
                match result? {
                    Value::Null => match args.get(1) {
                        Some(default) => self.eval(default),
                        None => Ok(Value::Null),
                    },
                    value => Ok(value),
                }
            }
            _ => {
                let registry = self.registry();
                let def = registry
                    .function(name)
                    .ok_or_else(|| ExprError::UnknownFunction(name.to_string()))?;
                let values = self.eval_args(args)?;
                def.call(&values)
            }
        }
    }

    fn method_call(&mut self, target: &Expr, name: &str, args: &[Expr]) -> ExprResult<Value> {
        if let Some(static_type) = self.static_target(target) {
            return match static_type.member(name) {
                Some(StaticMember::Function(def)) => {
                    let values = self.eval_args(args)?;
                    def.call(&values)
                }
                _ => Err(ExprError::UnknownMethod {
                    method: name.to_string(),
                    type_name: type_label(target),
                }),
            };
        }

        let receiver = self.eval(target)?;
        match &receiver {
            Value::Null if self.null_safe => return Ok(Value::Null),
            Value::Null => return Err(ExprError::NullReference(format!("{}()", name))),
            Value::List(items) => {
                if let Some(method) = sequence::lookup(name) {
                    let items = items.clone();
                    let mut deferred = DeferredArgs { scope: self, args };
                    return method.call(&items, &mut deferred);
                }
            }
            _ => {}
        }

        let values = self.eval_args(args)?;
        let builtin = match &receiver {
            Value::String(s) => text::call_method(s, name, &values),
            Value::DateTime(dt) => date::call_method(dt, name, &values),
            Value::Int(_) | Value::Float(_) => number::call_method(&receiver, name, &values),
            _ if name.eq_ignore_ascii_case("ToString") && values.is_empty() => {
                Some(Ok(Value::String(receiver.to_text())))
            }
            _ => None,
        };
        if let Some(result) = builtin {
            return result;
        }

        match self.registry().extension(name) {
            Some(def) => {
                let mut with_receiver = Vec::with_capacity(values.len() + 1);
                with_receiver.push(receiver);
                with_receiver.extend(values);
                def.call(&with_receiver)
            }
            None => Err(ExprError::UnknownMethod {
                method: name.to_string(),
                type_name: receiver.type_name().to_string(),
            }),
        }
    }
}

/// Sequence operator arguments evaluated on demand in the caller's scope
struct DeferredArgs<'s, 'a> {
    scope: &'s mut Scope<'a>,
    args: &'s [Expr],
}

impl SequenceArgs for DeferredArgs<'_, '_> {
    fn len(&self) -> usize {
        self.args.len()
    }

    fn value(&mut self, index: usize) -> ExprResult<Value> {
        match self.args.get(index) {
            Some(Expr::Lambda { param, .. }) => Err(ExprError::evaluation(format!(
                "Lambda '{} => ...' is not valid here; a value is expected",
                param
            ))),
            Some(expr) => self.scope.eval(expr),
            None => Ok(Value::Null),
        }
    }

    fn apply(&mut self, index: usize, item: &Value) -> ExprResult<Value> {
        match self.args.get(index) {
            Some(Expr::Lambda { param, body }) => {
                self.scope.locals.push((param.clone(), item.clone()));
                let result = self.scope.eval(body);
                self.scope.locals.pop();
                result
            }
            Some(expr) => {
                self.scope.it.push(item.clone());
                let result = self.scope.eval(expr);
                self.scope.it.pop();
                result
            }
            None => Ok(item.clone()),
        }
    }
}

fn unary(op: UnaryOperator, value: Value) -> ExprResult<Value> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOperator::Negate, Value::Int(i)) => Ok(i
            .checked_neg()
            .map(Value::Int)
            .unwrap_or(Value::Float(-(i as f64)))),
        (UnaryOperator::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, other) => Err(ExprError::evaluation(format!(
            "Operator '{}' incompatible with operand type '{}'",
            match op {
                UnaryOperator::Negate => "-",
                UnaryOperator::Not => "!",
            },
            other.type_name()
        ))),
    }
}

fn type_label(target: &Expr) -> String {
    match target {
        Expr::Ident(name) => name.clone(),
        _ => "expression".to_string(),
    }
}

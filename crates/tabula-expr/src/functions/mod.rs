//! Built-in functions, static types and value methods
//!
//! The [`FunctionRegistry`] holds everything a name can resolve to besides
//! data: global functions (`Name(args)`), static types with members
//! (`Math.Round(x)`, `string.Empty`) and extension methods, which are called
//! as `receiver.Name(args)` on any value with the receiver passed first.
//! Methods that belong to a value's own type (string, date, number and
//! sequence operators) live in the submodules and are not user-extensible.

pub mod date;
pub mod number;
pub mod sequence;
pub mod text;

use std::fmt;
use std::sync::{Arc, OnceLock};

use ahash::AHashMap;

use crate::error::{ExprError, ExprResult};
use crate::value::Value;

/// Function implementation signature
pub type FunctionImpl = fn(&[Value]) -> ExprResult<Value>;

/// Function definition
#[derive(Clone)]
pub struct FunctionDef {
    /// Function name
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish_non_exhaustive()
    }
}

impl FunctionDef {
    /// Check the argument count, then run the implementation
    pub fn call(&self, args: &[Value]) -> ExprResult<Value> {
        check_arity(self.name, self.min_args, self.max_args, args.len())?;
        (self.implementation)(args)
    }
}

pub(crate) fn check_arity(
    name: &str,
    min_args: usize,
    max_args: Option<usize>,
    actual: usize,
) -> ExprResult<()> {
    let too_many = max_args.map_or(false, |max| actual > max);
    if actual < min_args || too_many {
        let expected = match max_args {
            Some(max) if max == min_args => min_args.to_string(),
            Some(max) => format!("{}..{}", min_args, max),
            None => format!("at least {}", min_args),
        };
        return Err(ExprError::ArgumentCount {
            function: name.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// A member of a static type
#[derive(Debug, Clone)]
pub enum StaticMember {
    /// A fixed value (`string.Empty`)
    Constant(Value),
    /// Computed on every access without arguments (`DateTime.Today`)
    Property(fn() -> Value),
    /// Called with arguments (`Math.Round(x, 2)`)
    Function(FunctionDef),
}

/// A named type whose members are reachable as `Type.Member`
#[derive(Debug, Clone, Default)]
pub struct StaticType {
    members: AHashMap<String, StaticMember>,
}

impl StaticType {
    /// Look up a member (case-insensitive)
    pub fn member(&self, name: &str) -> Option<&StaticMember> {
        self.members.get(&name.to_uppercase())
    }
}

/// Function registry
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
    static_types: AHashMap<String, StaticType>,
    extensions: AHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in static types
    pub fn new() -> Self {
        let mut registry = Self::empty();

        text::register(&mut registry);
        number::register(&mut registry);
        date::register(&mut registry);

        registry
    }

    /// Create a registry with nothing in it
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register a global function
    pub fn register_function(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    /// Register a member on a static type, creating the type if needed
    pub fn register_static(&mut self, type_name: &str, member: &str, value: StaticMember) {
        self.static_types
            .entry(type_name.to_uppercase())
            .or_default()
            .members
            .insert(member.to_uppercase(), value);
    }

    /// Register an extension method; the receiver is passed as the first argument
    pub fn register_extension(&mut self, def: FunctionDef) {
        self.extensions.insert(def.name.to_uppercase(), def);
    }

    /// Look up a global function by name
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Look up a static type by name
    pub fn static_type(&self, name: &str) -> Option<&StaticType> {
        self.static_types.get(&name.to_uppercase())
    }

    /// Look up an extension method by name
    pub fn extension(&self, name: &str) -> Option<&FunctionDef> {
        self.extensions.get(&name.to_uppercase())
    }
}

/// Process-wide registry (installed once, immutable afterwards)
static FUNCTION_REGISTRY: OnceLock<Arc<FunctionRegistry>> = OnceLock::new();

/// Install the process-wide registry
///
/// Must happen before the first evaluator is created; fails once a registry
/// is in place, whether installed or defaulted.
pub fn install(registry: FunctionRegistry) -> ExprResult<()> {
    FUNCTION_REGISTRY
        .set(Arc::new(registry))
        .map_err(|_| ExprError::evaluation("function registry is already installed"))
}

/// The process-wide registry, defaulting to [`FunctionRegistry::new`]
pub fn global_registry() -> Arc<FunctionRegistry> {
    FUNCTION_REGISTRY
        .get_or_init(|| Arc::new(FunctionRegistry::new()))
        .clone()
}

// === Argument helpers shared by the built-ins ===

static NULL: Value = Value::Null;

pub(crate) fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&NULL)
}

pub(crate) fn number_arg(function: &str, args: &[Value], index: usize) -> ExprResult<f64> {
    arg(args, index).as_f64().ok_or_else(|| {
        ExprError::evaluation(format!(
            "{}: argument {} must be a number, got {}",
            function,
            index + 1,
            arg(args, index).type_name()
        ))
    })
}

pub(crate) fn int_arg(function: &str, args: &[Value], index: usize) -> ExprResult<i64> {
    arg(args, index).as_i64().ok_or_else(|| {
        ExprError::evaluation(format!(
            "{}: argument {} must be an integer, got {}",
            function,
            index + 1,
            arg(args, index).type_name()
        ))
    })
}

pub(crate) fn string_arg<'a>(function: &str, args: &'a [Value], index: usize) -> ExprResult<&'a str> {
    match arg(args, index) {
        Value::String(s) => Ok(s),
        other => Err(ExprError::evaluation(format!(
            "{}: argument {} must be a string, got {}",
            function,
            index + 1,
            other.type_name()
        ))),
    }
}

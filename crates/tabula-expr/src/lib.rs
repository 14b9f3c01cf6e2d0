//! # tabula-expr
//!
//! Placeholder expression language for the tabula template engine.
//!
//! This crate provides:
//! - Expression parsing (text → AST)
//! - Template text evaluation with `{{ expr }}` placeholders
//! - Built-in static types (`string`, `Math`, `DateTime`), value
//!   methods and sequence operators with lambdas
//! - A process-wide [`FunctionRegistry`] for custom functions
//!
//! ## Example
//!
//! ```rust
//! use tabula_expr::{Evaluator, Parameter, Record, Value};
//!
//! let mut evaluator = Evaluator::new();
//! evaluator.add_variable("title", "Orders");
//!
//! let item = Record::new().with("Name", "Ann").with("Total", 12.5);
//! let value = evaluator
//!     .evaluate("{{title}}: {{item.Name}} owes {{item.Total}}", &[Parameter::new("item", item)])
//!     .unwrap();
//! assert_eq!(value, Value::from("Orders: Ann owes 12.5"));
//! ```

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod ops;
pub mod parser;
pub mod value;

pub use ast::{BinaryOperator, Expr, UnaryOperator};
pub use error::{ExprError, ExprResult};
pub use evaluator::{has_placeholders, Evaluator, Parameter, Variables};
pub use functions::{global_registry, install, FunctionDef, FunctionRegistry, StaticMember};
pub use parser::parse_expression;
pub use value::{Record, Value};

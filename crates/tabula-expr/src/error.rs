//! Expression error types

use thiserror::Error;

/// Result type for expression operations
pub type ExprResult<T> = std::result::Result<T, ExprError>;

/// Errors that can occur while parsing or evaluating an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// Expression parse error
    #[error("{0}")]
    Parse(String),

    /// A bare name that is neither a parameter, a variable nor a static type
    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),

    /// Member lookup on a value that has no such member
    #[error("No property or field '{member}' exists in type '{type_name}'")]
    UnknownMember { member: String, type_name: String },

    /// Method call on a value that has no such method
    #[error("No applicable method '{method}' exists in type '{type_name}'")]
    UnknownMethod { method: String, type_name: String },

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Operand types an operator cannot combine
    #[error("Operator '{op}' incompatible with operand types '{left}' and '{right}'")]
    IncompatibleOperands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    /// Member access through a null link
    #[error("Cannot access '{0}' of a null value")]
    NullReference(String),

    /// Integer division by zero
    #[error("Attempted to divide by zero")]
    DivideByZero,

    /// Any other evaluation failure
    #[error("{0}")]
    Evaluation(String),
}

impl ExprError {
    /// Create an evaluation error with a message
    pub fn evaluation<S: Into<String>>(msg: S) -> Self {
        ExprError::Evaluation(msg.into())
    }

    /// The unresolved name, when this is an unknown-identifier failure
    pub fn unknown_identifier(&self) -> Option<&str> {
        match self {
            ExprError::UnknownIdentifier(name) => Some(name),
            _ => None,
        }
    }
}

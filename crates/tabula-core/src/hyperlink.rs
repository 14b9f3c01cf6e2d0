//! Cell hyperlinks

use std::fmt;

/// A hyperlink attached to a cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hyperlink {
    /// Link to an external address (URL, file path, mailto:)
    External(String),
    /// Link to a location inside the workbook (e.g. "Sheet2!A1")
    Internal(String),
}

impl Hyperlink {
    /// Create an external link
    pub fn external(address: impl Into<String>) -> Self {
        Hyperlink::External(address.into())
    }

    /// Create an internal link
    pub fn internal(location: impl Into<String>) -> Self {
        Hyperlink::Internal(location.into())
    }

    /// Is this an external link
    pub fn is_external(&self) -> bool {
        matches!(self, Hyperlink::External(_))
    }

    /// The link target
    pub fn target(&self) -> &str {
        match self {
            Hyperlink::External(s) | Hyperlink::Internal(s) => s,
        }
    }

    /// Replace the link target, keeping the link kind
    pub fn set_target(&mut self, target: impl Into<String>) {
        match self {
            Hyperlink::External(s) | Hyperlink::Internal(s) => *s = target.into(),
        }
    }
}

impl fmt::Display for Hyperlink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target())
    }
}

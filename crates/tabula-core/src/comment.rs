//! Cell comments (notes)
//!
//! Comment text may itself contain placeholders; it is rendered independently
//! of the cell's value.
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{CellComment, Worksheet};
//!
//! let mut sheet = Worksheet::new("Report");
//! sheet.set_comment_at(0, 0, CellComment::new("Author", "Generated for {{customer}}"));
//! assert!(sheet.comment_at(0, 0).is_some());
//! ```

/// A cell comment/note
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellComment {
    /// Author of the comment
    pub author: String,
    /// Comment text content
    pub text: String,
    /// Whether the comment box is visible by default
    pub visible: bool,
}

impl CellComment {
    /// Create a new comment with the given author and text
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            visible: false,
        }
    }

    /// Create a comment with just text (empty author)
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(String::new(), text)
    }

    /// Set whether the comment is visible by default
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Replace the comment text, keeping author and visibility
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Check if this comment has an author
    pub fn has_author(&self) -> bool {
        !self.author.is_empty()
    }
}

impl std::fmt::Display for CellComment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_author() {
            write!(f, "[{}]: {}", self.author, self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

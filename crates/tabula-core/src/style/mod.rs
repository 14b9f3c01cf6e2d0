//! Cell styling types
//!
//! Templates carry their formatting through rendering untouched; the engine
//! itself only ever changes the font color of cells it marks as errors.

mod color;
mod font;
mod pool;

pub use color::Color;
pub use font::FontStyle;
pub use pool::StylePool;

/// Complete cell style
///
/// Styles are deduplicated per worksheet via [`StylePool`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Style {
    pub font: FontStyle,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.font.bold = bold;
        self
    }

    pub fn font_color(mut self, color: Color) -> Self {
        self.font.color = color;
        self
    }
}

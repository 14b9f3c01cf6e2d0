//! Render options

use tabula_core::Color;

/// Options for rendering a template
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Deepest region nesting that is still expanded (default: 16)
    pub max_depth: usize,
    /// Font color of cells that received an error message (default: red)
    pub error_color: Color,
    /// Refresh pivot caches after every expanded region (default: true)
    pub refresh_pivot_caches: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_depth: 16,
            error_color: Color::RED,
            refresh_pivot_caches: true,
        }
    }
}

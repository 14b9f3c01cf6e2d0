//! Style pool for deduplication

use super::Style;
use ahash::AHashMap;

/// Style pool for deduplicating styles
///
/// Cells reference styles by index; index 0 is always the default style.
#[derive(Debug)]
pub struct StylePool {
    styles: Vec<Style>,
    index_map: AHashMap<Style, u32>,
}

impl StylePool {
    /// Create a new style pool with default style at index 0
    pub fn new() -> Self {
        let mut index_map = AHashMap::with_capacity(16);
        index_map.insert(Style::default(), 0);
        Self {
            styles: vec![Style::default()],
            index_map,
        }
    }

    /// Get or create a style, returning its index
    pub fn get_or_insert(&mut self, style: Style) -> u32 {
        if let Some(&idx) = self.index_map.get(&style) {
            return idx;
        }
        let idx = self.styles.len() as u32;
        self.index_map.insert(style.clone(), idx);
        self.styles.push(style);
        idx
    }

    /// Get a style by index
    pub fn get(&self, index: u32) -> Option<&Style> {
        self.styles.get(index as usize)
    }

    /// Get the number of styles (including the default)
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Check if the pool holds only the default style
    pub fn is_empty(&self) -> bool {
        self.styles.len() <= 1
    }
}

impl Default for StylePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;

    #[test]
    fn test_deduplication() {
        let mut pool = StylePool::new();
        assert_eq!(pool.get_or_insert(Style::default()), 0);

        let red = Style::new().font_color(Color::RED);
        let a = pool.get_or_insert(red.clone());
        let b = pool.get_or_insert(red);
        assert_eq!(a, b);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(a).map(|s| s.font.color), Some(Color::RED));
    }
}

//! Directive name registry

use std::sync::{Arc, OnceLock};

use ahash::AHashMap;
use tabula_core::{CellAddress, CellRange};

use super::{OptionTag, TagKind, TagParameters};

/// Maps directive names (case-insensitive) onto behaviors
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    tags: AHashMap<String, TagKind>,
}

impl TagRegistry {
    /// Create a registry with the built-in directives
    pub fn new() -> Self {
        let mut registry = Self::default();

        registry.register("sort", TagKind::Sort);
        registry.register("asc", TagKind::Sort);
        registry.register("desc", TagKind::Sort);

        registry
    }

    /// Register a directive name, replacing an earlier registration
    pub fn register(&mut self, name: &str, kind: TagKind) {
        self.tags.insert(name.to_lowercase(), kind);
    }

    pub fn kind(&self, name: &str) -> Option<TagKind> {
        self.tags.get(&name.to_lowercase()).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kind(name).is_some()
    }

    /// Instantiate a directive; `None` for unknown names
    pub fn create(
        &self,
        name: &str,
        parameters: TagParameters,
        cell: CellAddress,
        range: CellRange,
    ) -> Option<OptionTag> {
        let kind = self.kind(name)?;
        Some(OptionTag::new(name.to_lowercase(), kind, parameters, cell, range))
    }
}

static TAG_REGISTRY: OnceLock<Arc<TagRegistry>> = OnceLock::new();

/// The process-wide directive registry
pub fn global_tag_registry() -> Arc<TagRegistry> {
    TAG_REGISTRY
        .get_or_init(|| Arc::new(TagRegistry::new()))
        .clone()
}

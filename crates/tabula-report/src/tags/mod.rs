//! Directives (tags)
//!
//! A directive is written into a template cell as `<<name key=value flag>>`.
//! Parsing strips the marker and leaves an [`OptionTag`] bound to its cell
//! and to the range it configures; a [`TagsList`] later runs the tags of one
//! range in priority order.
//!
//! The set of directive behaviors is closed ([`TagKind`]); the
//! [`TagRegistry`] maps names onto kinds.

pub mod list;
pub mod parser;
pub mod registry;
pub mod sort;

pub use list::TagsList;
pub use parser::TagsEvaluator;
pub use registry::{global_tag_registry, TagRegistry};

use tabula_core::{CellAddress, CellRange};

use crate::context::ProcessingContext;
use crate::error::{ReportError, ReportResult};

/// Priority of tags that run after the others
pub const PRIORITY_LOW: i32 = 0;
/// Default priority
pub const PRIORITY_NORMAL: i32 = 100;
/// Priority of tags that run first
pub const PRIORITY_HIGH: i32 = 200;

/// Directive behaviors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// `<<sort>>`, `<<asc>>`, `<<desc>>`: order the rows of the range
    Sort,
}

impl TagKind {
    /// Priority a tag of this kind gets unless it says otherwise
    pub fn default_priority(self) -> i32 {
        match self {
            TagKind::Sort => PRIORITY_NORMAL,
        }
    }

    /// Run the tag at `index` of `list`
    pub(crate) fn execute(
        self,
        index: usize,
        list: &mut TagsList,
        context: &mut ProcessingContext<'_>,
    ) -> ReportResult<()> {
        match self {
            TagKind::Sort => sort::execute(index, list, context),
        }
    }
}

/// Parameters of a directive, in the order they were written
///
/// Keys are lower-case. A key given without `=` is a flag and has no value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagParameters {
    entries: Vec<(String, Option<String>)>,
}

impl TagParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter
    pub fn insert(&mut self, key: &str, value: Option<String>) {
        let key = key.to_lowercase();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.entries.iter().any(|(k, _)| *k == key)
    }

    /// Value of a parameter; `None` for absent keys and flags
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed directive
#[derive(Debug, Clone, PartialEq)]
pub struct OptionTag {
    name: String,
    kind: TagKind,
    parameters: TagParameters,
    cell: CellAddress,
    range: CellRange,
    options_row: Option<CellRange>,
    enabled: bool,
    priority: i32,
}

impl OptionTag {
    /// Create a tag anchored at `cell` and configuring `range`
    ///
    /// A numeric `priority` parameter overrides the kind's default priority.
    pub fn new(
        name: impl Into<String>,
        kind: TagKind,
        parameters: TagParameters,
        cell: CellAddress,
        range: CellRange,
    ) -> Self {
        let priority = parameters
            .get("priority")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or_else(|| kind.default_priority());
        Self {
            name: name.into(),
            kind,
            parameters,
            cell,
            range,
            options_row: None,
            enabled: true,
            priority,
        }
    }

    /// Mark the tag as coming from the options row of its range
    pub fn with_options_row(mut self, row: CellRange) -> Self {
        self.options_row = Some(row);
        self
    }

    /// Lower-case directive name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn parameters(&self) -> &TagParameters {
        &self.parameters
    }

    pub fn has_parameter(&self, key: &str) -> bool {
        self.parameters.contains(key)
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key)
    }

    /// Integer parameter; a value that is present but not an integer is an error
    pub fn int_parameter(&self, key: &str) -> ReportResult<Option<i32>> {
        match self.parameters.get(key) {
            None if self.parameters.contains(key) => Err(self.malformed(key, "")),
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.malformed(key, raw)),
        }
    }

    fn malformed(&self, key: &str, raw: &str) -> ReportError {
        ReportError::directive(
            format!(
                "Parameter '{}' of tag '{}' must be an integer, got '{}'",
                key, self.name, raw
            ),
            CellRange::single(self.cell),
        )
    }

    /// The cell the marker was written in
    pub fn cell(&self) -> CellAddress {
        self.cell
    }

    /// The range the tag configures
    pub fn range(&self) -> CellRange {
        self.range
    }

    /// The options row the marker sat in, for tags of multi-row ranges
    pub fn options_row(&self) -> Option<CellRange> {
        self.options_row
    }

    /// Column of the anchoring cell
    pub fn column(&self) -> u16 {
        self.cell.col
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Same tag, configuring another range
    pub(crate) fn rebound(&self, range: CellRange) -> Self {
        let mut tag = self.clone();
        tag.range = range;
        if tag.options_row.is_some() {
            tag.options_row = range.options_row();
        }
        tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tag(params: &[(&str, Option<&str>)]) -> OptionTag {
        let mut parameters = TagParameters::new();
        for (k, v) in params {
            parameters.insert(k, v.map(str::to_string));
        }
        OptionTag::new(
            "sort",
            TagKind::Sort,
            parameters,
            CellAddress::new(3, 1),
            CellRange::from_indices(1, 0, 3, 2),
        )
    }

    #[test]
    fn test_parameters() {
        let t = tag(&[("Desc", None), ("num", Some("2"))]);
        assert!(t.has_parameter("desc"));
        assert_eq!(t.parameter("desc"), None);
        assert_eq!(t.int_parameter("NUM").unwrap(), Some(2));
        assert_eq!(t.int_parameter("missing").unwrap(), None);
    }

    #[test]
    fn test_malformed_int_parameter() {
        let t = tag(&[("num", Some("two"))]);
        let err = t.int_parameter("num").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter 'num' of tag 'sort' must be an integer, got 'two'"
        );
        assert!(tag(&[("num", None)]).int_parameter("num").is_err());
    }

    #[test]
    fn test_priority_override() {
        assert_eq!(tag(&[]).priority(), PRIORITY_NORMAL);
        assert_eq!(tag(&[("priority", Some("7"))]).priority(), 7);
        assert_eq!(tag(&[("priority", Some("high"))]).priority(), PRIORITY_NORMAL);
    }

    #[test]
    fn test_rebound_moves_options_row() {
        let t = tag(&[]).with_options_row(CellRange::from_indices(3, 0, 3, 2));
        let moved = t.rebound(CellRange::from_indices(10, 0, 14, 2));
        assert_eq!(moved.options_row(), Some(CellRange::from_indices(14, 0, 14, 2)));
        assert_eq!(moved.cell(), t.cell());
    }
}

//! Ordered directive worklist

use std::cmp::Ordering;

use tabula_core::CellRange;
use tracing::trace;

use super::{OptionTag, TagKind};
use crate::context::ProcessingContext;
use crate::error::{ReportError, ReportResult, TemplateError, TemplateErrors};

/// The directives of one range, kept in execution order
///
/// Order is priority (highest first), then the anchoring cell's row, then its
/// column. Tags comparing equal stay in insertion order.
#[derive(Debug, Clone, Default)]
pub struct TagsList {
    tags: Vec<OptionTag>,
}

fn compare(a: &OptionTag, b: &OptionTag) -> Ordering {
    b.priority()
        .cmp(&a.priority())
        .then(a.cell().row.cmp(&b.cell().row))
        .then(a.cell().col.cmp(&b.cell().col))
}

impl TagsList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag after every tag that does not order after it
    pub fn add(&mut self, tag: OptionTag) {
        let at = self
            .tags
            .partition_point(|t| compare(t, &tag) != Ordering::Greater);
        self.tags.insert(at, tag);
    }

    pub fn add_range<I: IntoIterator<Item = OptionTag>>(&mut self, tags: I) {
        for tag in tags {
            self.add(tag);
        }
    }

    pub fn get(&self, index: usize) -> Option<&OptionTag> {
        self.tags.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut OptionTag> {
        self.tags.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// All tags in execution order
    pub fn iter(&self) -> std::slice::Iter<'_, OptionTag> {
        self.tags.iter()
    }

    /// Enabled tags of one kind, with their indices
    pub fn get_all_of(&self, kind: TagKind) -> Vec<(usize, &OptionTag)> {
        self.tags
            .iter()
            .enumerate()
            .filter(|(_, t)| t.kind() == kind && t.is_enabled())
            .collect()
    }

    /// Tags with any of the given names, enabled or not
    pub fn get_all(&self, names: &[&str]) -> Vec<(usize, &OptionTag)> {
        self.tags
            .iter()
            .enumerate()
            .filter(|(_, t)| names.iter().any(|n| n.eq_ignore_ascii_case(t.name())))
            .collect()
    }

    /// Like [`TagsList::get_all`] but skipping the tag at `exclude`
    pub fn get_all_except(&self, exclude: usize, names: &[&str]) -> Vec<(usize, &OptionTag)> {
        self.get_all(names)
            .into_iter()
            .filter(|(i, _)| *i != exclude)
            .collect()
    }

    /// Re-enable every tag
    pub fn reset(&mut self) {
        for tag in &mut self.tags {
            tag.set_enabled(true);
        }
    }

    /// Is there a tag with this name (case-insensitive)
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn disable(&mut self, index: usize) {
        if let Some(tag) = self.tags.get_mut(index) {
            tag.set_enabled(false);
        }
    }

    /// A copy of every tag bound to `range` instead
    pub fn copy_to(&self, range: CellRange) -> TagsList {
        TagsList {
            tags: self.tags.iter().map(|t| t.rebound(range)).collect(),
        }
    }

    /// Run every enabled tag, re-querying the first enabled one after each run
    ///
    /// Directive and expression failures are recorded in `errors` and the
    /// failing tag is disabled. Grid failures abort.
    pub fn execute(
        &mut self,
        context: &mut ProcessingContext<'_>,
        errors: &mut TemplateErrors,
    ) -> ReportResult<()> {
        while let Some(index) = self.tags.iter().position(OptionTag::is_enabled) {
            let tag = &self.tags[index];
            let (kind, cell) = (tag.kind(), tag.cell());
            trace!(tag = tag.name(), cell = %cell, range = %context.range, "executing tag");

            let result = kind.execute(index, self, context);
            self.disable(index);
            match result {
                Ok(()) => {}
                Err(ReportError::Directive { message, range }) => {
                    errors.add(TemplateError::new(message, context.sheet_name(), range));
                }
                Err(ReportError::Expression(e)) => {
                    errors.add(TemplateError::new(
                        e.to_string(),
                        context.sheet_name(),
                        CellRange::single(cell),
                    ));
                }
                Err(e @ ReportError::Grid(_)) => return Err(e),
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a TagsList {
    type Item = &'a OptionTag;
    type IntoIter = std::slice::Iter<'a, OptionTag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{TagParameters, PRIORITY_HIGH};
    use pretty_assertions::assert_eq;
    use tabula_core::{CellAddress, Workbook};

    fn tag(row: u32, col: u16, params: &[(&str, &str)]) -> OptionTag {
        let mut parameters = TagParameters::new();
        for (k, v) in params {
            parameters.insert(k, Some(v.to_string()));
        }
        OptionTag::new(
            "sort",
            TagKind::Sort,
            parameters,
            CellAddress::new(row, col),
            CellRange::from_indices(0, 0, 9, 9),
        )
    }

    fn addresses(list: &TagsList) -> Vec<String> {
        list.iter().map(|t| t.cell().to_string()).collect()
    }

    #[test]
    fn test_equal_priority_orders_by_address() {
        let mut list = TagsList::new();
        // Constructed in reverse address order
        list.add(tag(3, 2, &[]));
        list.add(tag(3, 0, &[]));
        list.add(tag(1, 5, &[]));
        list.add(tag(1, 1, &[]));

        assert_eq!(addresses(&list), vec!["B2", "F2", "A4", "C4"]);
    }

    #[test]
    fn test_execute_runs_in_priority_then_address_order() {
        let mut list = TagsList::new();
        // Equal priorities inserted in reverse address order
        list.add(tag(3, 2, &[("num", "c4")]));
        list.add(tag(3, 0, &[("num", "a4")]));
        list.add(tag(1, 5, &[("num", "f2")]));
        list.add(tag(1, 1, &[("num", "b2")]));
        list.add(tag(9, 9, &[("priority", "200"), ("num", "j10")]));

        let mut wb = Workbook::new();
        let mut errors = TemplateErrors::new();
        let mut context = ProcessingContext::new(&mut wb, 0, CellRange::from_indices(0, 0, 9, 9));
        list.execute(&mut context, &mut errors).unwrap();

        let got: Vec<&str> = errors
            .messages()
            .into_iter()
            .map(|m| m.rsplit('\'').nth(1).unwrap_or_default())
            .collect();
        assert_eq!(got, vec!["j10", "b2", "f2", "a4", "c4"]);
        let ranges: Vec<String> = errors.iter().map(|e| e.range.to_string()).collect();
        assert_eq!(ranges, vec!["J10", "B2", "F2", "A4", "C4"]);
        assert!(list.iter().all(|t| !t.is_enabled()));
    }

    #[test]
    fn test_priority_first_and_ties_kept() {
        let mut list = TagsList::new();
        list.add(tag(0, 0, &[("num", "1")]));
        list.add(tag(5, 5, &[("priority", "200")]));
        list.add(tag(0, 0, &[("num", "2")]));

        assert_eq!(list.len(), 3);
        assert_eq!(list.get(0).unwrap().priority(), PRIORITY_HIGH);
        assert_eq!(list.get(1).unwrap().parameter("num"), Some("1"));
        assert_eq!(list.get(2).unwrap().parameter("num"), Some("2"));
    }

    #[test]
    fn test_queries() {
        let mut list = TagsList::new();
        list.add_range(vec![tag(0, 0, &[]), tag(0, 1, &[])]);
        list.disable(0);

        assert_eq!(list.get_all_of(TagKind::Sort).len(), 1);
        assert_eq!(list.get_all(&["SORT"]).len(), 2);
        assert_eq!(list.get_all_except(1, &["sort"]).len(), 1);
        assert!(list.has_tag("Sort"));
        assert!(!list.has_tag("group"));

        list.reset();
        assert!(list.iter().all(OptionTag::is_enabled));
    }

    #[test]
    fn test_copy_to_rebinds_range() {
        let mut list = TagsList::new();
        list.add(tag(2, 1, &[]));
        let target = CellRange::from_indices(20, 0, 25, 3);

        let copy = list.copy_to(target);
        assert_eq!(copy.get(0).unwrap().range(), target);
        assert_eq!(list.get(0).unwrap().range(), CellRange::from_indices(0, 0, 9, 9));
    }
}

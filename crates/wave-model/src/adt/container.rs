//! Locating collection containers.

use crate::doc_op::Attributes;
use crate::listeners::DocumentEngine;

/// The first child of `parent` tagged `tag`, appending one if there is
/// none.
pub fn get_or_create_container<D: DocumentEngine>(
    doc: &D,
    parent: &D::Element,
    tag: &str,
) -> D::Element {
    match doc.first_child_element_with_tag(parent, tag) {
        Some(existing) => existing,
        None => doc.create_child_element(parent, tag, &Attributes::new()),
    }
}

/// Attributes of a fresh entry element.
pub(crate) fn entry_attributes(pairs: &[(&str, String)]) -> Attributes {
    let mut entries: Vec<(String, String)> = pairs
        .iter()
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| ((*name).to_owned(), value.clone()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.dedup_by(|a, b| a.0 == b.0);
    Attributes::from_pairs_unchecked(entries)
}

//! Read-only document view used by the automaton.

use crate::doc_op::{AnnotationMap, Attributes};

/// Structural queries over a document of `length()` items.
///
/// Positions index items. An insertion point `ip` sits before item `ip`.
pub trait AutomatonDocument {
    fn length(&self) -> usize;

    /// Annotations of item `pos`; empty past the end.
    fn annotations_at(&self, pos: usize) -> &AnnotationMap;

    /// Attributes when item `pos` is an element start.
    fn attributes_at(&self, pos: usize) -> Option<&Attributes>;

    /// The character when item `pos` is a character.
    fn char_at(&self, pos: usize) -> Option<char>;

    /// Tag when item `pos` is an element start.
    fn element_starting_at(&self, pos: usize) -> Option<&str>;

    /// Tag when item `pos` is an element end.
    fn element_ending_at(&self, pos: usize) -> Option<&str>;

    /// Tag of the element enclosing `insertion_point`, `depth` levels out.
    /// `None` at top level.
    fn nth_enclosing_element_tag(&self, insertion_point: usize, depth: usize) -> Option<&str>;

    /// Consecutive characters starting at `insertion_point`.
    fn remaining_characters_in_element(&self, insertion_point: usize) -> usize;

    fn get_annotation(&self, pos: usize, key: &str) -> Option<&str> {
        self.annotations_at(pos).get(key)
    }

    /// First position in `start..end` whose value for `key` is not
    /// `from_value`.
    fn first_annotation_change(
        &self,
        start: usize,
        end: usize,
        key: &str,
        from_value: Option<&str>,
    ) -> Option<usize> {
        (start..end).find(|&pos| self.get_annotation(pos, key) != from_value)
    }
}

/// The document with no items. Validating against it checks only what can
/// be checked without a document.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDocument;

impl AutomatonDocument for EmptyDocument {
    fn length(&self) -> usize {
        0
    }

    fn annotations_at(&self, _pos: usize) -> &AnnotationMap {
        AnnotationMap::empty()
    }

    fn attributes_at(&self, _pos: usize) -> Option<&Attributes> {
        None
    }

    fn char_at(&self, _pos: usize) -> Option<char> {
        None
    }

    fn element_starting_at(&self, _pos: usize) -> Option<&str> {
        None
    }

    fn element_ending_at(&self, _pos: usize) -> Option<&str> {
        None
    }

    fn nth_enclosing_element_tag(&self, _insertion_point: usize, _depth: usize) -> Option<&str> {
        None
    }

    fn remaining_characters_in_element(&self, _insertion_point: usize) -> usize {
        0
    }

    fn first_annotation_change(
        &self,
        _start: usize,
        _end: usize,
        _key: &str,
        _from_value: Option<&str>,
    ) -> Option<usize> {
        None
    }
}

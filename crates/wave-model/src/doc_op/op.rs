//! `DocOp` and `DocInitialization`.
//!
//! A `DocOp` is an ordered, 0-indexed sequence of [`DocOpComponent`]s. It
//! remembers whether it has already passed well-formedness validation so the
//! check runs at most once per instance.

use std::cell::Cell;
use std::fmt;
use std::ops::Deref;

use thiserror::Error;

use super::annotations::AnnotationBoundaryMap;
use super::attributes::{Attributes, AttributesUpdate};
use super::component::{ComponentType, DocOpComponent};
use super::cursor::{DocInitializationCursor, DocOpCursor};
use crate::automaton::validator;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocOpError {
    #[error("{0}")]
    IllFormed(String),
    #[error("component {index} ({component}) is not allowed in an initialization")]
    NotInitialization {
        index: usize,
        component: ComponentType,
    },
}

// ── DocOp ──────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct DocOp {
    components: Vec<DocOpComponent>,
    known_well_formed: Cell<bool>,
}

impl DocOp {
    /// Wraps `components` without validating them.
    pub fn new_unchecked(components: Vec<DocOpComponent>) -> Self {
        Self {
            components,
            known_well_formed: Cell::new(false),
        }
    }

    /// Wraps `components`, rejecting an ill-formed sequence.
    pub fn from_components(components: Vec<DocOpComponent>) -> Result<Self, DocOpError> {
        let op = Self::new_unchecked(components);
        validator::check_well_formed(&op)?;
        Ok(op)
    }

    pub fn size(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[DocOpComponent] {
        &self.components
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocOpComponent> {
        self.components.iter()
    }

    pub fn into_components(self) -> Vec<DocOpComponent> {
        self.components
    }

    /// # Panics
    ///
    /// Panics if `i >= self.size()`.
    pub fn component(&self, i: usize) -> &DocOpComponent {
        &self.components[i]
    }

    pub fn component_type(&self, i: usize) -> ComponentType {
        self.components[i].component_type()
    }

    pub fn retain_item_count(&self, i: usize) -> Option<usize> {
        match &self.components[i] {
            DocOpComponent::Retain(n) => Some(*n),
            _ => None,
        }
    }

    pub fn characters_string(&self, i: usize) -> Option<&str> {
        match &self.components[i] {
            DocOpComponent::Characters(s) => Some(s),
            _ => None,
        }
    }

    pub fn delete_characters_string(&self, i: usize) -> Option<&str> {
        match &self.components[i] {
            DocOpComponent::DeleteCharacters(s) => Some(s),
            _ => None,
        }
    }

    /// Tag of an element start or delete element start.
    pub fn element_tag(&self, i: usize) -> Option<&str> {
        match &self.components[i] {
            DocOpComponent::ElementStart { tag, .. } | DocOpComponent::DeleteElementStart { tag, .. } => {
                Some(tag)
            }
            _ => None,
        }
    }

    /// Attributes of an element start or delete element start.
    pub fn element_attributes(&self, i: usize) -> Option<&Attributes> {
        match &self.components[i] {
            DocOpComponent::ElementStart { attributes, .. }
            | DocOpComponent::DeleteElementStart { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    pub fn replace_attributes(&self, i: usize) -> Option<(&Attributes, &Attributes)> {
        match &self.components[i] {
            DocOpComponent::ReplaceAttributes { old, new } => Some((old, new)),
            _ => None,
        }
    }

    pub fn attributes_update(&self, i: usize) -> Option<&AttributesUpdate> {
        match &self.components[i] {
            DocOpComponent::UpdateAttributes(update) => Some(update),
            _ => None,
        }
    }

    pub fn annotation_boundary(&self, i: usize) -> Option<&AnnotationBoundaryMap> {
        match &self.components[i] {
            DocOpComponent::AnnotationBoundary(map) => Some(map),
            _ => None,
        }
    }

    /// Feeds every component to `cursor`, in order.
    pub fn apply<C: DocOpCursor + ?Sized>(&self, cursor: &mut C) {
        for component in &self.components {
            component.apply(cursor);
        }
    }

    /// Same as `self.component(i).apply(cursor)`.
    pub fn apply_component<C: DocOpCursor + ?Sized>(&self, i: usize, cursor: &mut C) {
        self.components[i].apply(cursor);
    }

    pub fn is_initialization(&self) -> bool {
        self.components.iter().all(DocOpComponent::is_initialization)
    }

    pub fn is_known_well_formed(&self) -> bool {
        self.known_well_formed.get()
    }

    pub(crate) fn mark_well_formed(&self) {
        self.known_well_formed.set(true);
    }
}

impl PartialEq for DocOp {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for DocOp {}

impl fmt::Debug for DocOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocOp({})", super::concise::to_concise_string(self))
    }
}

impl fmt::Display for DocOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::concise::to_concise_string(self))
    }
}

impl<'a> IntoIterator for &'a DocOp {
    type Item = &'a DocOpComponent;
    type IntoIter = std::slice::Iter<'a, DocOpComponent>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}

// ── DocInitialization ──────────────────────────────────────────────────────

/// A `DocOp` made only of characters, element starts/ends and annotation
/// boundaries.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DocInitialization(DocOp);

impl DocInitialization {
    pub fn try_from_op(op: DocOp) -> Result<Self, DocOpError> {
        if let Some(index) = op.iter().position(|c| !c.is_initialization()) {
            return Err(DocOpError::NotInitialization {
                index,
                component: op.component_type(index),
            });
        }
        Ok(Self(op))
    }

    pub(crate) fn from_op_unchecked(op: DocOp) -> Self {
        Self(op)
    }

    pub fn as_op(&self) -> &DocOp {
        &self.0
    }

    pub fn into_op(self) -> DocOp {
        self.0
    }

    /// Feeds every component to an initialization cursor.
    pub fn apply<C: DocInitializationCursor + ?Sized>(&self, cursor: &mut C) {
        for component in self.0.iter() {
            component.apply_initialization(cursor);
        }
    }
}

impl Deref for DocInitialization {
    type Target = DocOp;

    fn deref(&self) -> &DocOp {
        &self.0
    }
}

impl From<DocInitialization> for DocOp {
    fn from(init: DocInitialization) -> DocOp {
        init.0
    }
}

impl TryFrom<DocOp> for DocInitialization {
    type Error = DocOpError;

    fn try_from(op: DocOp) -> Result<Self, DocOpError> {
        Self::try_from_op(op)
    }
}

impl fmt::Debug for DocInitialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocInitialization({})", super::concise::to_concise_string(&self.0))
    }
}

impl fmt::Display for DocInitialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc_op::builder::DocOpBuilder;

    #[derive(Default)]
    struct Trace(Vec<String>);

    impl DocInitializationCursor for Trace {
        fn annotation_boundary(&mut self, _map: &AnnotationBoundaryMap) {
            self.0.push("boundary".into());
        }
        fn characters(&mut self, chars: &str) {
            self.0.push(format!("chars {chars}"));
        }
        fn element_start(&mut self, tag: &str, _attributes: &Attributes) {
            self.0.push(format!("start {tag}"));
        }
        fn element_end(&mut self) {
            self.0.push("end".into());
        }
    }

    impl DocOpCursor for Trace {
        fn retain(&mut self, item_count: usize) {
            self.0.push(format!("retain {item_count}"));
        }
        fn delete_characters(&mut self, chars: &str) {
            self.0.push(format!("del {chars}"));
        }
        fn delete_element_start(&mut self, tag: &str, _attributes: &Attributes) {
            self.0.push(format!("del start {tag}"));
        }
        fn delete_element_end(&mut self) {
            self.0.push("del end".into());
        }
        fn replace_attributes(&mut self, _old: &Attributes, _new: &Attributes) {
            self.0.push("replace".into());
        }
        fn update_attributes(&mut self, _update: &AttributesUpdate) {
            self.0.push("update".into());
        }
    }

    fn sample() -> DocOp {
        DocOpBuilder::new()
            .retain(2)
            .characters("hi")
            .element_start("p", Attributes::new())
            .element_end()
            .delete_characters("x")
            .build_unchecked()
    }

    #[test]
    fn apply_component_matches_direct_apply() {
        let op = sample();
        for i in 0..op.size() {
            let mut via_op = Trace::default();
            let mut direct = Trace::default();
            op.apply_component(i, &mut via_op);
            op.component(i).clone().apply(&mut direct);
            assert_eq!(via_op.0, direct.0);
        }
    }

    #[test]
    fn typed_accessors() {
        let op = sample();
        assert_eq!(op.size(), 5);
        assert_eq!(op.retain_item_count(0), Some(2));
        assert_eq!(op.retain_item_count(1), None);
        assert_eq!(op.characters_string(1), Some("hi"));
        assert_eq!(op.element_tag(2), Some("p"));
        assert_eq!(op.delete_characters_string(4), Some("x"));
        assert_eq!(op.component_type(3), ComponentType::ElementEnd);
    }

    #[test]
    fn equality_ignores_well_formed_cache() {
        let a = sample();
        let b = sample();
        a.mark_well_formed();
        assert!(a.is_known_well_formed());
        assert!(!b.is_known_well_formed());
        assert_eq!(a, b);
    }

    #[test]
    fn initialization_rejects_retain() {
        let err = DocInitialization::try_from_op(sample()).unwrap_err();
        assert_eq!(
            err,
            DocOpError::NotInitialization {
                index: 0,
                component: ComponentType::Retain
            }
        );
    }

    #[test]
    fn initialization_applies_to_init_cursor() {
        let op = DocOpBuilder::new()
            .element_start("p", Attributes::new())
            .characters("a")
            .element_end()
            .build_unchecked();
        let init = DocInitialization::try_from_op(op).unwrap();
        let mut trace = Trace::default();
        init.apply(&mut trace);
        assert_eq!(trace.0, vec!["start p", "chars a", "end"]);
    }
}

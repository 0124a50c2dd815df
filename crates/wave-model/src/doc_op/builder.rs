//! Buffers and fluent builders for [`DocOp`] and [`DocInitialization`].
//!
//! A buffer is a cursor that records every call as a component. `finish`
//! validates well-formedness; `finish_unchecked` skips the check and exists
//! for tests and for callers that validate later against a document.

use super::annotations::AnnotationBoundaryMap;
use super::attributes::{Attributes, AttributesUpdate};
use super::component::DocOpComponent;
use super::cursor::{DocInitializationCursor, DocOpCursor};
use super::op::{DocInitialization, DocOp, DocOpError};
use crate::automaton::validator;

// ── Buffers ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct DocOpBuffer {
    components: Vec<DocOpComponent>,
}

impl DocOpBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, component: DocOpComponent) {
        self.components.push(component);
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn finish(self) -> Result<DocOp, DocOpError> {
        let op = self.finish_unchecked();
        validator::check_well_formed(&op)?;
        Ok(op)
    }

    pub fn finish_unchecked(self) -> DocOp {
        DocOp::new_unchecked(self.components)
    }
}

impl DocInitializationCursor for DocOpBuffer {
    fn annotation_boundary(&mut self, map: &AnnotationBoundaryMap) {
        self.push(DocOpComponent::AnnotationBoundary(map.clone()));
    }

    fn characters(&mut self, chars: &str) {
        self.push(DocOpComponent::Characters(chars.to_owned()));
    }

    fn element_start(&mut self, tag: &str, attributes: &Attributes) {
        self.push(DocOpComponent::element_start(tag, attributes.clone()));
    }

    fn element_end(&mut self) {
        self.push(DocOpComponent::ElementEnd);
    }
}

impl DocOpCursor for DocOpBuffer {
    fn retain(&mut self, item_count: usize) {
        self.push(DocOpComponent::Retain(item_count));
    }

    fn delete_characters(&mut self, chars: &str) {
        self.push(DocOpComponent::DeleteCharacters(chars.to_owned()));
    }

    fn delete_element_start(&mut self, tag: &str, attributes: &Attributes) {
        self.push(DocOpComponent::delete_element_start(tag, attributes.clone()));
    }

    fn delete_element_end(&mut self) {
        self.push(DocOpComponent::DeleteElementEnd);
    }

    fn replace_attributes(&mut self, old: &Attributes, new: &Attributes) {
        self.push(DocOpComponent::ReplaceAttributes {
            old: old.clone(),
            new: new.clone(),
        });
    }

    fn update_attributes(&mut self, update: &AttributesUpdate) {
        self.push(DocOpComponent::UpdateAttributes(update.clone()));
    }
}

/// Records initialization components only.
#[derive(Debug, Clone, Default)]
pub struct DocInitializationBuffer {
    inner: DocOpBuffer,
}

impl DocInitializationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> Result<DocInitialization, DocOpError> {
        DocInitialization::try_from_op(self.inner.finish()?)
    }

    pub fn finish_unchecked(self) -> DocInitialization {
        // Only initialization components can be pushed through this cursor.
        DocInitialization::from_op_unchecked(self.inner.finish_unchecked())
    }
}

impl DocInitializationCursor for DocInitializationBuffer {
    fn annotation_boundary(&mut self, map: &AnnotationBoundaryMap) {
        self.inner.annotation_boundary(map);
    }

    fn characters(&mut self, chars: &str) {
        self.inner.characters(chars);
    }

    fn element_start(&mut self, tag: &str, attributes: &Attributes) {
        self.inner.element_start(tag, attributes);
    }

    fn element_end(&mut self) {
        self.inner.element_end();
    }
}

// ── Builders ───────────────────────────────────────────────────────────────

/// Fluent builder over [`DocOpBuffer`].
///
/// ```
/// use wave_model::doc_op::{Attributes, DocOpBuilder};
///
/// let op = DocOpBuilder::new()
///     .element_start("p", Attributes::new())
///     .characters("hello")
///     .element_end()
///     .build()
///     .unwrap();
/// assert_eq!(op.size(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DocOpBuilder {
    buffer: DocOpBuffer,
}

impl DocOpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retain(mut self, item_count: usize) -> Self {
        self.buffer.retain(item_count);
        self
    }

    pub fn characters(mut self, chars: impl AsRef<str>) -> Self {
        self.buffer.characters(chars.as_ref());
        self
    }

    pub fn delete_characters(mut self, chars: impl AsRef<str>) -> Self {
        self.buffer.delete_characters(chars.as_ref());
        self
    }

    pub fn element_start(mut self, tag: impl Into<String>, attributes: Attributes) -> Self {
        self.buffer
            .push(DocOpComponent::element_start(tag, attributes));
        self
    }

    pub fn element_end(mut self) -> Self {
        self.buffer.element_end();
        self
    }

    pub fn delete_element_start(mut self, tag: impl Into<String>, attributes: Attributes) -> Self {
        self.buffer
            .push(DocOpComponent::delete_element_start(tag, attributes));
        self
    }

    pub fn delete_element_end(mut self) -> Self {
        self.buffer.delete_element_end();
        self
    }

    pub fn replace_attributes(mut self, old: Attributes, new: Attributes) -> Self {
        self.buffer.push(DocOpComponent::ReplaceAttributes { old, new });
        self
    }

    pub fn update_attributes(mut self, update: AttributesUpdate) -> Self {
        self.buffer.push(DocOpComponent::UpdateAttributes(update));
        self
    }

    pub fn annotation_boundary(mut self, map: AnnotationBoundaryMap) -> Self {
        self.buffer.push(DocOpComponent::AnnotationBoundary(map));
        self
    }

    pub fn component(mut self, component: DocOpComponent) -> Self {
        self.buffer.push(component);
        self
    }

    pub fn build(self) -> Result<DocOp, DocOpError> {
        self.buffer.finish()
    }

    pub fn build_unchecked(self) -> DocOp {
        self.buffer.finish_unchecked()
    }
}

/// Fluent builder for initializations. Only construction components are
/// offered.
#[derive(Debug, Clone, Default)]
pub struct DocInitializationBuilder {
    buffer: DocInitializationBuffer,
}

impl DocInitializationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn characters(mut self, chars: impl AsRef<str>) -> Self {
        self.buffer.characters(chars.as_ref());
        self
    }

    pub fn element_start(mut self, tag: impl Into<String>, attributes: Attributes) -> Self {
        self.buffer
            .inner
            .push(DocOpComponent::element_start(tag, attributes));
        self
    }

    pub fn element_end(mut self) -> Self {
        self.buffer.element_end();
        self
    }

    pub fn annotation_boundary(mut self, map: AnnotationBoundaryMap) -> Self {
        self.buffer
            .inner
            .push(DocOpComponent::AnnotationBoundary(map));
        self
    }

    pub fn build(self) -> Result<DocInitialization, DocOpError> {
        self.buffer.finish()
    }

    pub fn build_unchecked(self) -> DocInitialization {
        self.buffer.finish_unchecked()
    }
}

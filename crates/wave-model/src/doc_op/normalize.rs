//! Normalization and document-length metrics.

use log::debug;

use super::annotations::AnnotationBoundaryMap;
use super::component::DocOpComponent;
use super::op::{DocInitialization, DocOp};

/// Number of items an operation expects the document to have.
pub fn initial_document_length(op: &DocOp) -> usize {
    op.iter().map(DocOpComponent::initial_len).sum()
}

/// Number of items the document has after applying `op`.
pub fn resulting_document_length(op: &DocOp) -> usize {
    op.iter().map(DocOpComponent::resulting_len).sum()
}

/// Canonical form of `op`.
///
/// Adjacent retains, characters and deleted characters are merged, adjacent
/// annotation boundaries are composed into one, and components that do
/// nothing (zero retains, empty text, empty boundaries) are dropped. A pair
/// of boundaries that cannot be composed is kept as is.
pub fn normalize(op: &DocOp) -> DocOp {
    let mut n = Normalizer::default();
    for component in op {
        n.push(component);
    }
    DocOp::new_unchecked(n.finish())
}

pub fn normalize_initialization(init: &DocInitialization) -> DocInitialization {
    DocInitialization::from_op_unchecked(normalize(init))
}

#[derive(Default)]
struct Normalizer {
    out: Vec<DocOpComponent>,
    boundary: Option<AnnotationBoundaryMap>,
}

impl Normalizer {
    fn push(&mut self, component: &DocOpComponent) {
        match component {
            DocOpComponent::AnnotationBoundary(map) => self.push_boundary(map),
            DocOpComponent::Retain(0) => {}
            DocOpComponent::Characters(s) | DocOpComponent::DeleteCharacters(s) if s.is_empty() => {}
            other => {
                self.flush_boundary();
                self.push_merged(other);
            }
        }
    }

    fn push_boundary(&mut self, map: &AnnotationBoundaryMap) {
        let merged = match self.boundary.take() {
            None => map.clone(),
            Some(prev) => match prev.compose(map) {
                Ok(merged) => merged,
                Err(err) => {
                    debug!(target: "wave_model::doc_op", "keeping adjacent boundaries apart: {err}");
                    self.boundary = Some(prev);
                    self.flush_boundary();
                    map.clone()
                }
            },
        };
        self.boundary = Some(merged);
    }

    fn flush_boundary(&mut self) {
        if let Some(map) = self.boundary.take() {
            if !map.is_empty() {
                self.out.push(DocOpComponent::AnnotationBoundary(map));
            }
        }
    }

    fn push_merged(&mut self, component: &DocOpComponent) {
        if let Some(last) = self.out.last_mut() {
            match (last, component) {
                (DocOpComponent::Retain(a), DocOpComponent::Retain(b)) => {
                    *a += b;
                    return;
                }
                (DocOpComponent::Characters(a), DocOpComponent::Characters(b))
                | (DocOpComponent::DeleteCharacters(a), DocOpComponent::DeleteCharacters(b)) => {
                    a.push_str(b);
                    return;
                }
                _ => {}
            }
        }
        self.out.push(component.clone());
    }

    fn finish(mut self) -> Vec<DocOpComponent> {
        self.flush_boundary();
        self.out
    }
}

//! Operation components.
//!
//! One variant per atomic edit. `Retain` and the deletion and attribute
//! variants only make sense against an existing document; the remaining four
//! form the initialization subset.

use std::fmt;

use super::annotations::AnnotationBoundaryMap;
use super::attributes::{Attributes, AttributesUpdate};
use super::cursor::{unsupported, DocInitializationCursor, DocOpCursor};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocOpComponent {
    Retain(usize),
    Characters(String),
    DeleteCharacters(String),
    ElementStart {
        tag: String,
        attributes: Attributes,
    },
    ElementEnd,
    DeleteElementStart {
        tag: String,
        attributes: Attributes,
    },
    DeleteElementEnd,
    ReplaceAttributes {
        old: Attributes,
        new: Attributes,
    },
    UpdateAttributes(AttributesUpdate),
    AnnotationBoundary(AnnotationBoundaryMap),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Retain,
    Characters,
    DeleteCharacters,
    ElementStart,
    ElementEnd,
    DeleteElementStart,
    DeleteElementEnd,
    ReplaceAttributes,
    UpdateAttributes,
    AnnotationBoundary,
}

impl ComponentType {
    pub fn name(self) -> &'static str {
        match self {
            ComponentType::Retain => "retain",
            ComponentType::Characters => "characters",
            ComponentType::DeleteCharacters => "deleteCharacters",
            ComponentType::ElementStart => "elementStart",
            ComponentType::ElementEnd => "elementEnd",
            ComponentType::DeleteElementStart => "deleteElementStart",
            ComponentType::DeleteElementEnd => "deleteElementEnd",
            ComponentType::ReplaceAttributes => "replaceAttributes",
            ComponentType::UpdateAttributes => "updateAttributes",
            ComponentType::AnnotationBoundary => "annotationBoundary",
        }
    }

    pub fn is_initialization(self) -> bool {
        matches!(
            self,
            ComponentType::Characters
                | ComponentType::ElementStart
                | ComponentType::ElementEnd
                | ComponentType::AnnotationBoundary
        )
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl DocOpComponent {
    pub fn element_start(tag: impl Into<String>, attributes: Attributes) -> Self {
        DocOpComponent::ElementStart {
            tag: tag.into(),
            attributes,
        }
    }

    pub fn delete_element_start(tag: impl Into<String>, attributes: Attributes) -> Self {
        DocOpComponent::DeleteElementStart {
            tag: tag.into(),
            attributes,
        }
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            DocOpComponent::Retain(_) => ComponentType::Retain,
            DocOpComponent::Characters(_) => ComponentType::Characters,
            DocOpComponent::DeleteCharacters(_) => ComponentType::DeleteCharacters,
            DocOpComponent::ElementStart { .. } => ComponentType::ElementStart,
            DocOpComponent::ElementEnd => ComponentType::ElementEnd,
            DocOpComponent::DeleteElementStart { .. } => ComponentType::DeleteElementStart,
            DocOpComponent::DeleteElementEnd => ComponentType::DeleteElementEnd,
            DocOpComponent::ReplaceAttributes { .. } => ComponentType::ReplaceAttributes,
            DocOpComponent::UpdateAttributes(_) => ComponentType::UpdateAttributes,
            DocOpComponent::AnnotationBoundary(_) => ComponentType::AnnotationBoundary,
        }
    }

    pub fn is_initialization(&self) -> bool {
        self.component_type().is_initialization()
    }

    /// Items of the document this component consumes.
    pub fn initial_len(&self) -> usize {
        match self {
            DocOpComponent::Retain(n) => *n,
            DocOpComponent::DeleteCharacters(s) => s.chars().count(),
            DocOpComponent::DeleteElementStart { .. }
            | DocOpComponent::DeleteElementEnd
            | DocOpComponent::ReplaceAttributes { .. }
            | DocOpComponent::UpdateAttributes(_) => 1,
            DocOpComponent::Characters(_)
            | DocOpComponent::ElementStart { .. }
            | DocOpComponent::ElementEnd
            | DocOpComponent::AnnotationBoundary(_) => 0,
        }
    }

    /// Items of the resulting document this component produces.
    pub fn resulting_len(&self) -> usize {
        match self {
            DocOpComponent::Retain(n) => *n,
            DocOpComponent::Characters(s) => s.chars().count(),
            DocOpComponent::ElementStart { .. }
            | DocOpComponent::ElementEnd
            | DocOpComponent::ReplaceAttributes { .. }
            | DocOpComponent::UpdateAttributes(_) => 1,
            DocOpComponent::DeleteCharacters(_)
            | DocOpComponent::DeleteElementStart { .. }
            | DocOpComponent::DeleteElementEnd
            | DocOpComponent::AnnotationBoundary(_) => 0,
        }
    }

    pub fn apply<C: DocOpCursor + ?Sized>(&self, cursor: &mut C) {
        match self {
            DocOpComponent::Retain(n) => cursor.retain(*n),
            DocOpComponent::Characters(s) => cursor.characters(s),
            DocOpComponent::DeleteCharacters(s) => cursor.delete_characters(s),
            DocOpComponent::ElementStart { tag, attributes } => cursor.element_start(tag, attributes),
            DocOpComponent::ElementEnd => cursor.element_end(),
            DocOpComponent::DeleteElementStart { tag, attributes } => {
                cursor.delete_element_start(tag, attributes)
            }
            DocOpComponent::DeleteElementEnd => cursor.delete_element_end(),
            DocOpComponent::ReplaceAttributes { old, new } => cursor.replace_attributes(old, new),
            DocOpComponent::UpdateAttributes(update) => cursor.update_attributes(update),
            DocOpComponent::AnnotationBoundary(map) => cursor.annotation_boundary(map),
        }
    }

    /// Applies an initialization component.
    ///
    /// # Panics
    ///
    /// Panics if the component is a retain, deletion or attribute change.
    #[track_caller]
    pub fn apply_initialization<C: DocInitializationCursor + ?Sized>(&self, cursor: &mut C) {
        match self {
            DocOpComponent::Characters(s) => cursor.characters(s),
            DocOpComponent::ElementStart { tag, attributes } => cursor.element_start(tag, attributes),
            DocOpComponent::ElementEnd => cursor.element_end(),
            DocOpComponent::AnnotationBoundary(map) => cursor.annotation_boundary(map),
            other => unsupported(other.component_type().name()),
        }
    }
}

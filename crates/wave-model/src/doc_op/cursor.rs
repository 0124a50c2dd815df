//! Cursor protocol used to apply operations.
//!
//! A cursor receives one call per component, in order. An initialization
//! cursor only understands the four components that build content.

use super::annotations::AnnotationBoundaryMap;
use super::attributes::{Attributes, AttributesUpdate};

pub trait DocInitializationCursor {
    fn annotation_boundary(&mut self, map: &AnnotationBoundaryMap);
    fn characters(&mut self, chars: &str);
    fn element_start(&mut self, tag: &str, attributes: &Attributes);
    fn element_end(&mut self);
}

pub trait DocOpCursor: DocInitializationCursor {
    fn retain(&mut self, item_count: usize);
    fn delete_characters(&mut self, chars: &str);
    fn delete_element_start(&mut self, tag: &str, attributes: &Attributes);
    fn delete_element_end(&mut self);
    fn replace_attributes(&mut self, old: &Attributes, new: &Attributes);
    fn update_attributes(&mut self, update: &AttributesUpdate);
}

/// Reports a non-initialization component reaching an initialization cursor.
///
/// This is a broken caller contract, not bad data, so it does not return.
#[track_caller]
pub(crate) fn unsupported(component: &str) -> ! {
    panic!("unsupported operation: {component} applied to an initialization cursor")
}

/// Lets an initialization cursor stand where a full cursor is expected.
/// Retains, deletions and attribute changes panic.
pub struct InitializationOnly<'a, C: ?Sized>(pub &'a mut C);

impl<C: DocInitializationCursor + ?Sized> DocInitializationCursor for InitializationOnly<'_, C> {
    fn annotation_boundary(&mut self, map: &AnnotationBoundaryMap) {
        self.0.annotation_boundary(map);
    }

    fn characters(&mut self, chars: &str) {
        self.0.characters(chars);
    }

    fn element_start(&mut self, tag: &str, attributes: &Attributes) {
        self.0.element_start(tag, attributes);
    }

    fn element_end(&mut self) {
        self.0.element_end();
    }
}

impl<C: DocInitializationCursor + ?Sized> DocOpCursor for InitializationOnly<'_, C> {
    fn retain(&mut self, _item_count: usize) {
        unsupported("retain")
    }

    fn delete_characters(&mut self, _chars: &str) {
        unsupported("deleteCharacters")
    }

    fn delete_element_start(&mut self, _tag: &str, _attributes: &Attributes) {
        unsupported("deleteElementStart")
    }

    fn delete_element_end(&mut self) {
        unsupported("deleteElementEnd")
    }

    fn replace_attributes(&mut self, _old: &Attributes, _new: &Attributes) {
        unsupported("replaceAttributes")
    }

    fn update_attributes(&mut self, _update: &AttributesUpdate) {
        unsupported("updateAttributes")
    }
}

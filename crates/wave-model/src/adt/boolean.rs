//! Document-based boolean.
//!
//! True while the first tagged child of the container exists and its value
//! attribute is not `"false"`. An element without the attribute reads as
//! true, as older documents wrote bare marker elements.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::trace;

use super::container::entry_attributes;
use super::layout::ValueLayout;
use super::singleton::ValueChanged;
use crate::listeners::{
    DocumentEngine, ElementListener, ListenerId, ListenerSet, Point, WeakElementListener,
};

const FALSE: &str = "false";
const TRUE: &str = "true";

struct BooleanCore<D: DocumentEngine> {
    doc: D,
    container: D::Element,
    tag: String,
    value_attr: String,
    value: Cell<bool>,
    listeners: RefCell<ListenerSet<ValueChanged<bool>>>,
}

impl<D: DocumentEngine> BooleanCore<D> {
    fn tagged(&self) -> Vec<D::Element> {
        self.doc
            .child_elements(&self.container)
            .into_iter()
            .filter(|e| self.doc.tag_name(e) == self.tag)
            .collect()
    }

    fn compute(&self) -> bool {
        self.doc
            .first_child_element_with_tag(&self.container, &self.tag)
            .is_some_and(|e| self.doc.attribute(&e, &self.value_attr).as_deref() != Some(FALSE))
    }

    fn refresh(&self, element: &D::Element) {
        if self.doc.tag_name(element) != self.tag {
            return;
        }
        let new_value = self.compute();
        let old_value = self.value.replace(new_value);
        if old_value == new_value {
            return;
        }
        trace!(target: "wave_model::adt", "{}: {old_value} -> {new_value}", self.tag);
        let event = ValueChanged {
            old_value,
            new_value,
        };
        let listeners = self.listeners.borrow().snapshot();
        for listener in listeners {
            listener(&event);
        }
    }
}

impl<D: DocumentEngine> ElementListener<D::Element> for BooleanCore<D> {
    fn on_element_added(&self, element: &D::Element) {
        self.refresh(element);
    }

    fn on_element_removed(&self, element: &D::Element) {
        self.refresh(element);
    }

    fn on_attribute_changed(&self, element: &D::Element, name: &str, _: Option<&str>, _: Option<&str>) {
        if name == self.value_attr {
            self.refresh(element);
        }
    }
}

/// A flag stored as the presence of a tagged element.
pub struct DocumentBasedBoolean<D: DocumentEngine> {
    core: Rc<BooleanCore<D>>,
    listener_id: ListenerId,
}

impl<D: DocumentEngine> DocumentBasedBoolean<D> {
    pub fn new(doc: D, container: D::Element, layout: &ValueLayout) -> Self {
        let core = Rc::new(BooleanCore {
            doc: doc.clone(),
            container: container.clone(),
            tag: layout.entry_tag.clone(),
            value_attr: layout.value_attr.clone(),
            value: Cell::new(false),
            listeners: RefCell::new(ListenerSet::new()),
        });
        core.value.set(core.compute());
        let listener_id = doc.add_listener(
            &container,
            Rc::new(WeakElementListener(Rc::downgrade(&core))),
        );
        Self { core, listener_id }
    }

    pub fn get(&self) -> bool {
        self.core.value.get()
    }

    /// Leaves exactly one element when `value` is true and none otherwise.
    pub fn set(&self, value: bool) {
        let core = &self.core;
        for element in core.tagged().into_iter().skip(1) {
            core.doc.delete_element(&element);
        }
        if value {
            if !core.value.get() {
                let attributes = entry_attributes(&[(core.value_attr.as_str(), TRUE.to_owned())]);
                core.doc
                    .create_element(Point::Start(core.container.clone()), &core.tag, &attributes);
                for element in core.tagged().into_iter().skip(1) {
                    core.doc.delete_element(&element);
                }
            }
        } else {
            for element in core.tagged() {
                core.doc.delete_element(&element);
            }
        }
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ValueChanged<bool>) + 'static,
    {
        self.core.listeners.borrow_mut().add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.core.listeners.borrow_mut().remove(id)
    }
}

impl<D: DocumentEngine> Drop for DocumentBasedBoolean<D> {
    fn drop(&mut self) {
        self.core
            .doc
            .remove_listener(&self.core.container, self.listener_id);
        self.core.listeners.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc_op::Attributes;
    use crate::tree::{NodeId, TreeDocument};

    fn setup() -> (TreeDocument, NodeId, DocumentBasedBoolean<TreeDocument>) {
        let doc = TreeDocument::new();
        let root = doc.document_element();
        let container = doc.create_child_element(&root, "flags", &Attributes::new());
        let flag = DocumentBasedBoolean::new(doc.clone(), container, &ValueLayout::new("seen", "value"));
        (doc, container, flag)
    }

    #[test]
    fn bare_element_reads_as_true() {
        let (doc, container, flag) = setup();
        assert!(!flag.get());
        doc.create_child_element(&container, "seen", &Attributes::new());
        assert!(flag.get());
    }

    #[test]
    fn false_marker_reads_as_false() {
        let (doc, container, flag) = setup();
        let attrs = Attributes::from_pairs([("value", "false")]).unwrap();
        let e = doc.create_child_element(&container, "seen", &attrs);
        assert!(!flag.get());
        doc.set_attribute(&e, "value", Some("true"));
        assert!(flag.get());
    }

    #[test]
    fn set_fires_once_per_transition() {
        let (doc, container, flag) = setup();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        flag.add_listener(move |e| sink.borrow_mut().push((e.old_value, e.new_value)));
        doc.create_child_element(&container, "seen", &Attributes::from_pairs([("value", "false")]).unwrap());
        flag.set(true);
        flag.set(true);
        assert_eq!(doc.to_xml(), r#"<flags><seen value="true"/></flags>"#);
        flag.set(false);
        assert_eq!(doc.to_xml(), "<flags/>");
        assert_eq!(*events.borrow(), vec![(false, true), (true, false)]);
    }
}

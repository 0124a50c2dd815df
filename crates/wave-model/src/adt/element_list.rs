//! Document-based element list.
//!
//! An ordered list of values, one per tagged child element of the container,
//! in document order. Values are built from their element by an
//! [`ElementFactory`]; new elements get their attributes from the same
//! factory. Unlike the map and set there is no conflict resolution: every
//! tagged child is a member.

use std::cell::RefCell;
use std::fmt::{Debug, Display};
use std::rc::Rc;
use std::str::FromStr;

use log::{trace, warn};

use super::layout::ValueLayout;
use super::singleton::{AttributeValueFactory, ElementFactory};
use crate::listeners::{
    DocumentEngine, ElementListener, ListenerId, ListenerSet, Point, WeakElementListener,
};

/// A membership change of an element list. Values compare by identity, so
/// the event carries the same `Rc` the list hands out.
#[derive(Debug, Clone)]
pub enum ListEvent<T> {
    Added(Rc<T>),
    Removed(Rc<T>),
}

struct ListCore<D: DocumentEngine, F: ElementFactory<D>> {
    doc: D,
    container: D::Element,
    tag: String,
    factory: F,
    /// Members in document order.
    items: RefCell<Vec<(D::Element, Rc<F::Value>)>>,
    listeners: RefCell<ListenerSet<ListEvent<F::Value>>>,
}

impl<D: DocumentEngine, F: ElementFactory<D>> ListCore<D, F> {
    fn fire(&self, event: ListEvent<F::Value>) {
        let listeners = self.listeners.borrow().snapshot();
        for listener in listeners {
            listener(&event);
        }
    }

    fn value_of(&self, element: &D::Element) -> Option<Rc<F::Value>> {
        self.items
            .borrow()
            .iter()
            .find(|(e, _)| e == element)
            .map(|(_, v)| v.clone())
    }

    fn element_of(&self, value: &Rc<F::Value>) -> Option<D::Element> {
        self.items
            .borrow()
            .iter()
            .find(|(_, v)| Rc::ptr_eq(v, value))
            .map(|(e, _)| e.clone())
    }

    /// Index just after the closest preceding sibling already in the list.
    fn insertion_index(&self, items: &[(D::Element, Rc<F::Value>)], element: &D::Element) -> usize {
        let siblings = self.doc.child_elements(&self.container);
        let Some(pos) = siblings.iter().position(|e| e == element) else {
            return items.len();
        };
        siblings[..pos]
            .iter()
            .rev()
            .find_map(|prev| items.iter().position(|(e, _)| e == prev))
            .map_or(0, |i| i + 1)
    }
}

impl<D: DocumentEngine, F: ElementFactory<D>> ElementListener<D::Element> for ListCore<D, F> {
    fn on_element_added(&self, element: &D::Element) {
        if self.doc.tag_name(element) != self.tag {
            return;
        }
        let Some(value) = self.factory.adapt(&self.doc, element) else {
            warn!(target: "wave_model::adt", "ignoring unreadable {} element", self.tag);
            return;
        };
        let value = Rc::new(value);
        {
            let mut items = self.items.borrow_mut();
            let index = self.insertion_index(&items, element);
            trace!(target: "wave_model::adt", "{} added at {index}: {value:?}", self.tag);
            items.insert(index, (element.clone(), value.clone()));
        }
        self.fire(ListEvent::Added(value));
    }

    fn on_element_removed(&self, element: &D::Element) {
        let removed = {
            let mut items = self.items.borrow_mut();
            let Some(index) = items.iter().position(|(e, _)| e == element) else {
                return;
            };
            items.remove(index).1
        };
        trace!(target: "wave_model::adt", "{} removed: {removed:?}", self.tag);
        self.fire(ListEvent::Removed(removed));
    }
}

/// An ordered list of values backed by the tagged children of a container.
pub struct DocumentBasedElementList<D: DocumentEngine, F: ElementFactory<D>> {
    core: Rc<ListCore<D, F>>,
    listener_id: ListenerId,
}

impl<D: DocumentEngine, F: ElementFactory<D>> DocumentBasedElementList<D, F> {
    pub fn new(doc: D, container: D::Element, tag: &str, factory: F) -> Self {
        let core = Rc::new(ListCore {
            doc: doc.clone(),
            container: container.clone(),
            tag: tag.to_owned(),
            factory,
            items: RefCell::new(Vec::new()),
            listeners: RefCell::new(ListenerSet::new()),
        });
        let listener_id = doc.add_listener(
            &container,
            Rc::new(WeakElementListener(Rc::downgrade(&core))),
        );
        for element in doc.child_elements(&container) {
            core.on_element_added(&element);
        }
        Self { core, listener_id }
    }

    /// Appends a fresh element built from `init`. Returns its value, or
    /// `None` when the factory cannot read back what it wrote.
    pub fn add(&self, init: F::Init) -> Option<Rc<F::Value>> {
        self.create(Point::End(self.core.container.clone()), &init)
    }

    /// Inserts a fresh element so that its value lands at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&self, index: usize, init: F::Init) -> Option<Rc<F::Value>> {
        let len = self.len();
        assert!(index <= len, "insertion index (is {index}) should be <= len (is {len})");
        if index == len {
            return self.add(init);
        }
        let next = self.core.items.borrow()[index].0.clone();
        self.create(Point::Before(next), &init)
    }

    fn create(&self, point: Point<D::Element>, init: &F::Init) -> Option<Rc<F::Value>> {
        let attributes = self.core.factory.initial_attributes(init);
        let element = self.core.doc.create_element(point, &self.core.tag, &attributes);
        self.core.value_of(&element)
    }

    pub fn get(&self, index: usize) -> Option<Rc<F::Value>> {
        self.core.items.borrow().get(index).map(|(_, v)| v.clone())
    }

    pub fn index_of(&self, value: &Rc<F::Value>) -> Option<usize> {
        self.core
            .items
            .borrow()
            .iter()
            .position(|(_, v)| Rc::ptr_eq(v, value))
    }

    pub fn values(&self) -> Vec<Rc<F::Value>> {
        self.core.items.borrow().iter().map(|(_, v)| v.clone()).collect()
    }

    /// Deletes the element holding `value`. False if it is not a member.
    pub fn remove(&self, value: &Rc<F::Value>) -> bool {
        let Some(element) = self.core.element_of(value) else {
            return false;
        };
        self.core.doc.delete_element(&element);
        true
    }

    pub fn clear(&self) {
        let elements: Vec<D::Element> = self
            .core
            .items
            .borrow()
            .iter()
            .map(|(e, _)| e.clone())
            .collect();
        for element in &elements {
            self.core.doc.delete_element(element);
        }
    }

    pub fn len(&self) -> usize {
        self.core.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.items.borrow().is_empty()
    }

    pub fn add_listener<L>(&self, listener: L) -> ListenerId
    where
        L: Fn(&ListEvent<F::Value>) + 'static,
    {
        self.core.listeners.borrow_mut().add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.core.listeners.borrow_mut().remove(id)
    }
}

impl<D, T> DocumentBasedElementList<D, AttributeValueFactory<T>>
where
    D: DocumentEngine,
    T: FromStr + Display + Debug + 'static,
{
    /// A list of values stored in one attribute per the layout.
    pub fn with_layout(doc: D, container: D::Element, layout: &ValueLayout) -> Self {
        Self::new(
            doc,
            container,
            &layout.entry_tag,
            AttributeValueFactory::new(&layout.value_attr),
        )
    }
}

impl<D: DocumentEngine, F: ElementFactory<D>> Drop for DocumentBasedElementList<D, F> {
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

    type Words = DocumentBasedElementList<TreeDocument, AttributeValueFactory<String>>;

    const WORDS: [&str; 3] = ["lah", "dee", "dah"];

    fn layout() -> ValueLayout {
        ValueLayout::new("foo", "bar")
    }

    fn fresh() -> (TreeDocument, NodeId, Words) {
        let doc = TreeDocument::new();
        let root = doc.document_element();
        let container = doc.create_child_element(&root, "blank", &Attributes::new());
        let list = Words::with_layout(doc.clone(), container, &layout());
        (doc, container, list)
    }

    /// A container holding an unrelated element and then `0`, `1`, `2`.
    fn prepopulated() -> (TreeDocument, NodeId, Words) {
        let doc = TreeDocument::new();
        let root = doc.document_element();
        let container = doc.create_child_element(&root, "prepopulated", &Attributes::new());
        let other = Attributes::from_pairs([("foo", "1"), ("flubble", "huh")]).unwrap();
        doc.create_child_element(&container, "random", &other);
        for i in 0..3 {
            let attrs = Attributes::from_pairs([("bar", i.to_string())]).unwrap();
            doc.create_child_element(&container, "foo", &attrs);
        }
        let list = Words::with_layout(doc.clone(), container, &layout());
        (doc, container, list)
    }

    fn strings(list: &Words) -> Vec<String> {
        list.values().iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn add_appends_in_order() {
        let (doc, _, list) = fresh();
        assert!(list.is_empty());
        for (i, word) in WORDS.iter().enumerate() {
            let value = list.add((*word).to_owned()).unwrap();
            assert_eq!(value.as_str(), *word);
            assert_eq!(list.len(), i + 1);
            assert!(Rc::ptr_eq(&list.get(i).unwrap(), &value));
        }
        assert_eq!(strings(&list), WORDS);
        assert_eq!(
            doc.to_xml(),
            r#"<blank><foo bar="lah"/><foo bar="dee"/><foo bar="dah"/></blank>"#
        );
    }

    #[test]
    fn loads_tagged_children_only() {
        let (_, _, list) = prepopulated();
        assert_eq!(strings(&list), ["0", "1", "2"]);
        for i in 0..3 {
            let value = list.get(i).unwrap();
            assert_eq!(list.index_of(&value), Some(i));
        }
        assert!(list.get(3).is_none());
    }

    #[test]
    fn index_of_uses_identity() {
        let (_, _, list) = prepopulated();
        let (_, _, other) = fresh();
        let last = list.add("3".to_owned()).unwrap();
        assert_eq!(list.index_of(&last), Some(3));
        assert_eq!(other.index_of(&last), None);
        assert_eq!(list.index_of(&Rc::new("3".to_owned())), None);
    }

    #[test]
    fn insert_places_values_at_the_index() {
        let (_, _, empty) = fresh();
        let only = empty.insert(0, "x".to_owned()).unwrap();
        assert!(Rc::ptr_eq(&empty.get(0).unwrap(), &only));

        let (doc, container, list) = prepopulated();
        let old_second = list.get(1).unwrap();
        let new_second = list.insert(1, "a".to_owned()).unwrap();
        assert!(Rc::ptr_eq(&list.get(1).unwrap(), &new_second));
        assert!(Rc::ptr_eq(&list.get(2).unwrap(), &old_second));

        let old_first = list.get(0).unwrap();
        let new_first = list.insert(0, "b".to_owned()).unwrap();
        assert!(Rc::ptr_eq(&list.get(0).unwrap(), &new_first));
        assert!(Rc::ptr_eq(&list.get(1).unwrap(), &old_first));
        assert_eq!(strings(&list), ["b", "0", "a", "1", "2"]);
        // The unrelated element stays ahead of the list.
        assert_eq!(doc.tag_name(&doc.child_elements(&container)[0]), "random");
    }

    #[test]
    #[should_panic(expected = "should be <= len")]
    fn insert_past_the_end_panics() {
        let (_, _, list) = prepopulated();
        list.insert(4, "x".to_owned());
    }

    #[test]
    fn remove_and_clear() {
        let (_, _, list) = fresh();
        let value = list.add("x".to_owned()).unwrap();
        assert!(list.remove(&value));
        assert!(list.is_empty());
        assert!(!list.remove(&value));

        let (doc, container, list) = prepopulated();
        list.clear();
        assert!(list.is_empty());
        assert_eq!(doc.child_elements(&container).len(), 1);
    }

    #[test]
    fn remote_elements_take_their_document_position() {
        let (doc, container, list) = prepopulated();
        let children = doc.child_elements(&container);
        let attrs = Attributes::from_pairs([("bar", "r")]).unwrap();
        doc.create_element(Point::Before(children[2]), "foo", &attrs);
        assert_eq!(strings(&list), ["0", "r", "1", "2"]);
        doc.delete_element(&children[1]);
        assert_eq!(strings(&list), ["r", "1", "2"]);
    }

    #[test]
    fn listeners_see_adds_and_removes() {
        let (_, _, list) = fresh();
        let bob = Rc::new(RefCell::new(String::from("bob")));
        let ann = Rc::new(RefCell::new(String::from("ann")));
        let record = |log: &Rc<RefCell<String>>| {
            let log = log.clone();
            move |e: &ListEvent<String>| {
                log.borrow_mut().push(match e {
                    ListEvent::Added(_) => 'a',
                    ListEvent::Removed(_) => 'r',
                })
            }
        };
        let bob_id = list.add_listener(record(&bob));
        list.add("1".to_owned());
        let ann_id = list.add_listener(record(&ann));
        let two = list.add("2".to_owned()).unwrap();
        list.remove(&two);
        assert_eq!(*bob.borrow(), "bobaar");
        assert_eq!(*ann.borrow(), "annar");
        assert!(list.remove_listener(bob_id));
        list.add("3".to_owned());
        assert!(list.remove_listener(ann_id));
        list.add("4".to_owned());
        assert_eq!(*bob.borrow(), "bobaar");
        assert_eq!(*ann.borrow(), "annara");
        assert_eq!(list.len(), 3);
    }
}

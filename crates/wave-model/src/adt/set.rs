//! Document-based set.
//!
//! One entry element per value. When concurrent adds leave duplicates, the
//! earliest entry in the document represents the value and the others are
//! obsolete until the next local write deletes them.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::rc::Rc;
use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use log::{debug, trace, warn};

use super::container::entry_attributes;
use super::layout::SetLayout;
use super::serializer::{Serializer, TextSerializer};
use crate::listeners::{DocumentEngine, ElementListener, ListenerId, ListenerSet, WeakElementListener};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetEvent<T> {
    Added(T),
    Removed(T),
}

struct SetState<E, T> {
    values: IndexMap<T, E>,
    obsolete: IndexSet<E>,
    doomed: HashSet<E>,
}

struct SetCore<D: DocumentEngine, T> {
    doc: D,
    container: D::Element,
    entry_tag: String,
    value_attr: String,
    serializer: Box<dyn Serializer<T>>,
    state: RefCell<SetState<D::Element, T>>,
    listeners: RefCell<ListenerSet<SetEvent<T>>>,
}

impl<D, T> SetCore<D, T>
where
    D: DocumentEngine,
    T: Clone + Eq + Hash + Debug + 'static,
{
    fn value_of(&self, element: &D::Element) -> Option<T> {
        let text = self.doc.attribute(element, &self.value_attr).unwrap_or_default();
        let value = self.serializer.from_string(&text);
        if value.is_none() {
            warn!(target: "wave_model::adt", "ignoring {} entry {text:?}", self.entry_tag);
        }
        value
    }

    fn fire(&self, event: SetEvent<T>) {
        trace!(target: "wave_model::adt", "{event:?}");
        let listeners = self.listeners.borrow().snapshot();
        for listener in listeners {
            listener(&event);
        }
    }

    fn delete_obsolete(&self) {
        let doomed: Vec<D::Element> = {
            let mut state = self.state.borrow_mut();
            let doomed: Vec<_> = state.obsolete.drain(..).collect();
            state.doomed.extend(doomed.iter().cloned());
            doomed
        };
        if !doomed.is_empty() {
            debug!(target: "wave_model::adt", "deleting {} duplicate set entries", doomed.len());
        }
        for element in &doomed {
            self.doc.delete_element(element);
        }
        self.state.borrow_mut().doomed.clear();
    }

    /// The earliest remaining entry for `value`.
    fn first_surviving(&self, state: &SetState<D::Element, T>, value: &T) -> Option<D::Element> {
        self.doc
            .child_elements(&self.container)
            .into_iter()
            .filter(|e| !state.doomed.contains(e))
            .filter(|e| self.doc.tag_name(e) == self.entry_tag)
            .find(|e| self.value_of(e).as_ref() == Some(value))
    }
}

impl<D, T> ElementListener<D::Element> for SetCore<D, T>
where
    D: DocumentEngine,
    T: Clone + Eq + Hash + Debug + 'static,
{
    fn on_element_added(&self, element: &D::Element) {
        if self.doc.tag_name(element) != self.entry_tag {
            return;
        }
        let Some(value) = self.value_of(element) else {
            return;
        };
        {
            let mut state = self.state.borrow_mut();
            match state.values.get(&value).cloned() {
                None => {
                    state.values.insert(value.clone(), element.clone());
                }
                Some(existing) if self.doc.location(&existing) < self.doc.location(element) => {
                    state.obsolete.insert(element.clone());
                    return;
                }
                Some(existing) => {
                    state.obsolete.insert(existing);
                    state.values.insert(value, element.clone());
                    return;
                }
            }
        }
        self.fire(SetEvent::Added(value));
    }

    fn on_element_removed(&self, element: &D::Element) {
        if self.doc.tag_name(element) != self.entry_tag {
            return;
        }
        let removed = {
            let mut state = self.state.borrow_mut();
            if state.obsolete.shift_remove(element) || state.doomed.contains(element) {
                return;
            }
            let Some(index) = state.values.values().position(|e| e == element) else {
                return;
            };
            let Some((value, _)) = state.values.shift_remove_index(index) else {
                return;
            };
            match self.first_surviving(&state, &value) {
                Some(survivor) => {
                    state.obsolete.shift_remove(&survivor);
                    state.values.insert(value, survivor);
                    None
                }
                None => Some(value),
            }
        };
        if let Some(value) = removed {
            self.fire(SetEvent::Removed(value));
        }
    }
}

/// A set stored as entry elements of a container.
pub struct DocumentBasedSet<D, T>
where
    D: DocumentEngine,
    T: Clone + Eq + Hash + Debug + 'static,
{
    core: Rc<SetCore<D, T>>,
    listener_id: ListenerId,
}

impl<D, T> DocumentBasedSet<D, T>
where
    D: DocumentEngine,
    T: Clone + Eq + Hash + Debug + 'static,
{
    pub fn new(doc: D, container: D::Element, layout: &SetLayout) -> Self
    where
        T: FromStr + Display,
    {
        Self::with_serializer(doc, container, layout, TextSerializer::new())
    }

    pub fn with_serializer(
        doc: D,
        container: D::Element,
        layout: &SetLayout,
        serializer: impl Serializer<T> + 'static,
    ) -> Self {
        let core = Rc::new(SetCore {
            doc: doc.clone(),
            container: container.clone(),
            entry_tag: layout.entry_tag.clone(),
            value_attr: layout.value_attr.clone(),
            serializer: Box::new(serializer),
            state: RefCell::new(SetState {
                values: IndexMap::new(),
                obsolete: IndexSet::new(),
                doomed: HashSet::new(),
            }),
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

    pub fn contains(&self, value: &T) -> bool {
        self.core.state.borrow().values.contains_key(value)
    }

    /// Values in the order they became members.
    pub fn values(&self) -> Vec<T> {
        self.core.state.borrow().values.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.core.state.borrow().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns false when the value is already a member.
    pub fn add(&self, value: T) -> bool {
        if self.contains(&value) {
            return false;
        }
        let attributes = entry_attributes(&[(
            self.core.value_attr.as_str(),
            self.core.serializer.to_string(&value),
        )]);
        self.core
            .doc
            .create_child_element(&self.core.container, &self.core.entry_tag, &attributes);
        self.core.delete_obsolete();
        true
    }

    pub fn remove(&self, value: &T) -> bool {
        if !self.contains(value) {
            return false;
        }
        self.core.delete_obsolete();
        let element = self.core.state.borrow().values.get(value).cloned();
        if let Some(element) = element {
            self.core.doc.delete_element(&element);
        }
        true
    }

    pub fn clear(&self) {
        if self.is_empty() {
            return;
        }
        self.core.delete_obsolete();
        let elements: Vec<D::Element> = self.core.state.borrow().values.values().cloned().collect();
        for element in elements {
            self.core.doc.delete_element(&element);
        }
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SetEvent<T>) + 'static,
    {
        self.core.listeners.borrow_mut().add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.core.listeners.borrow_mut().remove(id)
    }
}

impl<D, T> Drop for DocumentBasedSet<D, T>
where
    D: DocumentEngine,
    T: Clone + Eq + Hash + Debug + 'static,
{
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
    use crate::listeners::Point;
    use crate::tree::{NodeId, TreeDocument};

    fn setup(values: &[&str]) -> (TreeDocument, NodeId, DocumentBasedSet<TreeDocument, String>) {
        let doc = TreeDocument::new();
        let root = doc.document_element();
        let container = doc.create_child_element(&root, "tags", &Attributes::new());
        for v in values {
            let attrs = Attributes::from_pairs([("value", *v)]).unwrap();
            doc.create_child_element(&container, "entry", &attrs);
        }
        let set = DocumentBasedSet::new(doc.clone(), container, &SetLayout::default());
        (doc, container, set)
    }

    fn record(set: &DocumentBasedSet<TreeDocument, String>) -> Rc<RefCell<Vec<SetEvent<String>>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        set.add_listener(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn duplicates_collapse_to_one_member() {
        let (doc, _, set) = setup(&["a", "b", "a"]);
        assert_eq!(set.values(), vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(
            doc.to_xml(),
            r#"<tags><entry value="a"/><entry value="b"/><entry value="a"/></tags>"#
        );
        assert!(set.add("c".into()));
        assert_eq!(
            doc.to_xml(),
            r#"<tags><entry value="a"/><entry value="b"/><entry value="c"/></tags>"#
        );
    }

    #[test]
    fn add_twice_writes_once() {
        let (doc, _, set) = setup(&[]);
        let events = record(&set);
        assert!(set.add("x".into()));
        assert!(!set.add("x".into()));
        assert_eq!(doc.to_xml(), r#"<tags><entry value="x"/></tags>"#);
        assert_eq!(*events.borrow(), vec![SetEvent::Added("x".to_owned())]);
    }

    #[test]
    fn removing_a_duplicate_is_silent() {
        let (doc, container, set) = setup(&["a"]);
        let events = record(&set);
        let attrs = Attributes::from_pairs([("value", "a")]).unwrap();
        let early = doc.create_element(Point::Start(container), "entry", &attrs);
        assert!(events.borrow().is_empty());
        doc.delete_element(&early);
        assert!(set.contains(&"a".to_owned()));
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn remove_and_clear_fire_removed() {
        let (doc, _, set) = setup(&["a", "b", "a"]);
        let events = record(&set);
        assert!(set.remove(&"a".to_owned()));
        assert!(!set.remove(&"a".to_owned()));
        set.clear();
        assert!(set.is_empty());
        assert_eq!(doc.to_xml(), "<tags/>");
        assert_eq!(
            *events.borrow(),
            vec![
                SetEvent::Removed("a".to_owned()),
                SetEvent::Removed("b".to_owned())
            ]
        );
    }
}

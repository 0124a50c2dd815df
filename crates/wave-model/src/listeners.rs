//! The tree document seam used by the document-based collections.
//!
//! [`DocumentEngine`] is the mutable, observable document a collection is
//! adapted onto. Handles are cheap clones sharing one document; every method
//! takes `&self`. Listeners run synchronously once a mutation is complete and
//! must not mutate the document they observe.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::doc_op::Attributes;

pub type ListenerId = u64;

/// Where a new node goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Point<E> {
    /// Before the first child of the element.
    Start(E),
    /// After the last child of the element.
    End(E),
    /// Immediately before a sibling element.
    Before(E),
}

/// Child events of one container element.
pub trait ElementListener<E> {
    fn on_element_added(&self, element: &E);

    fn on_element_removed(&self, element: &E);

    fn on_attribute_changed(&self, _element: &E, _name: &str, _old: Option<&str>, _new: Option<&str>) {}
}

pub trait DocumentEngine: Clone + 'static {
    type Element: Clone + Eq + Hash + Debug + 'static;

    /// The root. Its children are the top level of the document.
    fn document_element(&self) -> Self::Element;

    /// Readable for removed elements too.
    fn tag_name(&self, element: &Self::Element) -> String;

    /// Readable for removed elements too.
    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;

    fn parent_element(&self, element: &Self::Element) -> Option<Self::Element>;

    fn child_elements(&self, parent: &Self::Element) -> Vec<Self::Element>;

    /// Position of the element start in the item sequence. Gives a total
    /// order over the elements of one document.
    fn location(&self, element: &Self::Element) -> usize;

    fn create_element(
        &self,
        point: Point<Self::Element>,
        tag: &str,
        attributes: &Attributes,
    ) -> Self::Element;

    /// Deletes the element and everything inside it.
    fn delete_element(&self, element: &Self::Element);

    /// `None` removes the attribute.
    fn set_attribute(&self, element: &Self::Element, name: &str, value: Option<&str>);

    /// Subscribes to events about the direct children of `container`.
    fn add_listener(
        &self,
        container: &Self::Element,
        listener: Rc<dyn ElementListener<Self::Element>>,
    ) -> ListenerId;

    fn remove_listener(&self, container: &Self::Element, id: ListenerId) -> bool;

    fn create_child_element(
        &self,
        parent: &Self::Element,
        tag: &str,
        attributes: &Attributes,
    ) -> Self::Element {
        self.create_element(Point::End(parent.clone()), tag, attributes)
    }

    fn first_child_element_with_tag(&self, parent: &Self::Element, tag: &str) -> Option<Self::Element> {
        self.child_elements(parent)
            .into_iter()
            .find(|e| self.tag_name(e) == tag)
    }
}

// ── ListenerSet ────────────────────────────────────────────────────────────

/// Callbacks keyed by registration id.
///
/// Dispatch iterates a snapshot, so a callback may add or remove listeners
/// while an event is being delivered.
pub struct ListenerSet<Ev: ?Sized> {
    next_id: ListenerId,
    listeners: BTreeMap<ListenerId, Rc<dyn Fn(&Ev)>>,
}

impl<Ev: ?Sized> Default for ListenerSet<Ev> {
    fn default() -> Self {
        Self {
            next_id: 1,
            listeners: BTreeMap::new(),
        }
    }
}

impl<Ev: ?Sized> ListenerSet<Ev> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&Ev) + 'static,
    {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        self.listeners.insert(id, Rc::new(listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Rc<dyn Fn(&Ev)>> {
        self.listeners.values().cloned().collect()
    }
}

/// Forwards element events to a target that may already be gone.
pub(crate) struct WeakElementListener<T>(pub Weak<T>);

impl<E, T: ElementListener<E>> ElementListener<E> for WeakElementListener<T> {
    fn on_element_added(&self, element: &E) {
        if let Some(target) = self.0.upgrade() {
            target.on_element_added(element);
        }
    }

    fn on_element_removed(&self, element: &E) {
        if let Some(target) = self.0.upgrade() {
            target.on_element_removed(element);
        }
    }

    fn on_attribute_changed(&self, element: &E, name: &str, old: Option<&str>, new: Option<&str>) {
        if let Some(target) = self.0.upgrade() {
            target.on_attribute_changed(element, name, old, new);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn listener_ids_are_stable() {
        let mut set: ListenerSet<u32> = ListenerSet::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let a = {
            let seen = seen.clone();
            set.add(move |v| seen.borrow_mut().push(("a", *v)))
        };
        let b = {
            let seen = seen.clone();
            set.add(move |v| seen.borrow_mut().push(("b", *v)))
        };
        assert_eq!((a, b), (1, 2));
        for l in set.snapshot() {
            l(&7);
        }
        assert!(set.remove(a));
        assert!(!set.remove(a));
        for l in set.snapshot() {
            l(&8);
        }
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7), ("b", 8)]);
        assert_eq!(set.len(), 1);
    }
}

//! Document-based singleton.
//!
//! The value lives in the first child element of the container bearing the
//! entry tag. Later elements with that tag are redundant and are deleted by
//! the next local write.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt::{Debug, Display};
use std::marker::PhantomData;
use std::rc::Rc;
use std::str::FromStr;

use indexmap::IndexSet;
use log::{debug, trace, warn};

use super::container::entry_attributes;
use super::layout::ValueLayout;
use super::serializer::{Serializer, TextSerializer};
use crate::doc_op::Attributes;
use crate::listeners::{
    DocumentEngine, ElementListener, ListenerId, ListenerSet, Point, WeakElementListener,
};

/// A value transition reported by single-valued collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueChanged<T> {
    pub old_value: T,
    pub new_value: T,
}

/// Adapts elements to values and builds the attributes of fresh elements.
/// Shared by the singleton and the element list.
pub trait ElementFactory<D: DocumentEngine>: 'static {
    type Value: Debug + 'static;
    type Init;

    /// `None` when the element does not hold a valid value.
    fn adapt(&self, doc: &D, element: &D::Element) -> Option<Self::Value>;

    fn initial_attributes(&self, init: &Self::Init) -> Attributes;
}

/// A singleton whose value is one serialized attribute.
pub struct AttributeValueFactory<T, S = TextSerializer<T>> {
    value_attr: String,
    serializer: S,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromStr + Display> AttributeValueFactory<T> {
    pub fn new(value_attr: &str) -> Self {
        Self::with_serializer(value_attr, TextSerializer::new())
    }
}

impl<T, S: Serializer<T>> AttributeValueFactory<T, S> {
    pub fn with_serializer(value_attr: &str, serializer: S) -> Self {
        Self {
            value_attr: value_attr.to_owned(),
            serializer,
            _marker: PhantomData,
        }
    }
}

impl<D, T, S> ElementFactory<D> for AttributeValueFactory<T, S>
where
    D: DocumentEngine,
    T: Debug + 'static,
    S: Serializer<T> + 'static,
{
    type Value = T;
    type Init = T;

    fn adapt(&self, doc: &D, element: &D::Element) -> Option<T> {
        self.serializer
            .from_string(&doc.attribute(element, &self.value_attr)?)
    }

    fn initial_attributes(&self, init: &T) -> Attributes {
        entry_attributes(&[(self.value_attr.as_str(), self.serializer.to_string(init))])
    }
}

type Current<E, V> = Option<(E, Rc<V>)>;

struct SingletonState<E, V> {
    canonical: Current<E, V>,
    obsolete: IndexSet<E>,
    doomed: HashSet<E>,
    suppress_events: bool,
}

type SingletonEvent<V> = ValueChanged<Option<Rc<V>>>;

struct SingletonCore<D: DocumentEngine, F: ElementFactory<D>> {
    doc: D,
    container: D::Element,
    tag: String,
    factory: F,
    state: RefCell<SingletonState<D::Element, F::Value>>,
    listeners: RefCell<ListenerSet<SingletonEvent<F::Value>>>,
}

impl<D: DocumentEngine, F: ElementFactory<D>> SingletonCore<D, F> {
    fn adapt(&self, element: &D::Element) -> Option<Rc<F::Value>> {
        let value = self.factory.adapt(&self.doc, element);
        if value.is_none() {
            warn!(target: "wave_model::adt", "ignoring unreadable {} element", self.tag);
        }
        value.map(Rc::new)
    }

    fn get(&self) -> Option<Rc<F::Value>> {
        self.state.borrow().canonical.as_ref().map(|(_, v)| v.clone())
    }

    fn fire(&self, old_value: Option<Rc<F::Value>>, new_value: Option<Rc<F::Value>>) {
        if self.state.borrow().suppress_events {
            return;
        }
        let unchanged = match (&old_value, &new_value) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        };
        if unchanged {
            return;
        }
        trace!(target: "wave_model::adt", "{}: {old_value:?} -> {new_value:?}", self.tag);
        let event = ValueChanged {
            old_value,
            new_value,
        };
        let listeners = self.listeners.borrow().snapshot();
        for listener in listeners {
            listener(&event);
        }
    }

    fn cleanup(&self) {
        let doomed: Vec<D::Element> = {
            let mut state = self.state.borrow_mut();
            let doomed: Vec<_> = state.obsolete.drain(..).collect();
            state.doomed.extend(doomed.iter().cloned());
            doomed
        };
        if !doomed.is_empty() {
            debug!(target: "wave_model::adt", "deleting {} redundant {} elements", doomed.len(), self.tag);
        }
        for element in &doomed {
            self.doc.delete_element(element);
        }
        self.state.borrow_mut().doomed.clear();
    }

    fn first_surviving(
        &self,
        state: &SingletonState<D::Element, F::Value>,
    ) -> Current<D::Element, F::Value> {
        self.doc
            .child_elements(&self.container)
            .into_iter()
            .filter(|e| !state.doomed.contains(e) && self.doc.tag_name(e) == self.tag)
            .find_map(|e| self.adapt(&e).map(|v| (e, v)))
    }
}

impl<D: DocumentEngine, F: ElementFactory<D>> ElementListener<D::Element>
    for SingletonCore<D, F>
{
    fn on_element_added(&self, element: &D::Element) {
        if self.doc.tag_name(element) != self.tag {
            return;
        }
        let Some(value) = self.adapt(element) else {
            return;
        };
        let old_value = {
            let mut state = self.state.borrow_mut();
            let takes_over = match &state.canonical {
                None => true,
                Some((current, _)) => self.doc.location(element) < self.doc.location(current),
            };
            if !takes_over {
                debug!(target: "wave_model::adt", "redundant {} element", self.tag);
                state.obsolete.insert(element.clone());
                return;
            }
            let old = state.canonical.replace((element.clone(), value.clone()));
            old.map(|(e, v)| {
                state.obsolete.insert(e);
                v
            })
        };
        self.fire(old_value, Some(value));
    }

    fn on_element_removed(&self, element: &D::Element) {
        if self.doc.tag_name(element) != self.tag {
            return;
        }
        let (old_value, new_value) = {
            let mut state = self.state.borrow_mut();
            if state.obsolete.shift_remove(element) || state.doomed.contains(element) {
                return;
            }
            let old_value = match &state.canonical {
                Some((current, value)) if current == element => value.clone(),
                _ => return,
            };
            let promoted = self.first_surviving(&state);
            if let Some((e, _)) = &promoted {
                state.obsolete.shift_remove(e);
            }
            let new_value = promoted.as_ref().map(|(_, v)| v.clone());
            state.canonical = promoted;
            (old_value, new_value)
        };
        self.fire(Some(old_value), new_value);
    }
}

/// A single optional value held by the first tagged element of a
/// container.
pub struct DocumentBasedSingleton<D: DocumentEngine, F: ElementFactory<D>> {
    core: Rc<SingletonCore<D, F>>,
    listener_id: ListenerId,
}

impl<D: DocumentEngine, F: ElementFactory<D>> DocumentBasedSingleton<D, F> {
    pub fn new(doc: D, container: D::Element, tag: &str, factory: F) -> Self {
        let core = Rc::new(SingletonCore {
            doc: doc.clone(),
            container: container.clone(),
            tag: tag.to_owned(),
            factory,
            state: RefCell::new(SingletonState {
                canonical: None,
                obsolete: IndexSet::new(),
                doomed: HashSet::new(),
                suppress_events: false,
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

    pub fn has_value(&self) -> bool {
        self.core.state.borrow().canonical.is_some()
    }

    pub fn get(&self) -> Option<Rc<F::Value>> {
        self.core.get()
    }

    /// Replaces the value with a fresh element built from `init` and
    /// returns the new value. Fires one change event.
    pub fn set(&self, init: F::Init) -> Option<Rc<F::Value>> {
        let old_value = self.core.get();
        self.core.state.borrow_mut().suppress_events = true;
        let attributes = self.core.factory.initial_attributes(&init);
        self.core.doc.create_element(
            Point::Start(self.core.container.clone()),
            &self.core.tag,
            &attributes,
        );
        self.core.cleanup();
        self.core.state.borrow_mut().suppress_events = false;
        let new_value = self.core.get();
        self.core.fire(old_value, new_value.clone());
        new_value
    }

    /// Deletes every element of the singleton. Fires at most one event.
    pub fn clear(&self) {
        self.core.cleanup();
        let canonical = self
            .core
            .state
            .borrow()
            .canonical
            .as_ref()
            .map(|(e, _)| e.clone());
        if let Some(element) = canonical {
            self.core.doc.delete_element(&element);
        }
    }

    pub fn add_listener<L>(&self, listener: L) -> ListenerId
    where
        L: Fn(&ValueChanged<Option<Rc<F::Value>>>) + 'static,
    {
        self.core.listeners.borrow_mut().add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.core.listeners.borrow_mut().remove(id)
    }
}

impl<D, T> DocumentBasedSingleton<D, AttributeValueFactory<T>>
where
    D: DocumentEngine,
    T: FromStr + Display + Debug + 'static,
{
    /// A singleton storing one attribute per the layout.
    pub fn with_layout(doc: D, container: D::Element, layout: &ValueLayout) -> Self {
        Self::new(
            doc,
            container,
            &layout.entry_tag,
            AttributeValueFactory::new(&layout.value_attr),
        )
    }
}

impl<D: DocumentEngine, F: ElementFactory<D>> Drop for DocumentBasedSingleton<D, F> {
    fn drop(&mut self) {
        self.core
            .doc
            .remove_listener(&self.core.container, self.listener_id);
        self.core.listeners.borrow_mut().clear();
    }
}

//! Document-based maps.
//!
//! Each entry is a child element of the container carrying a key attribute
//! and a value attribute. Replicas may transiently hold several entries for
//! one key; a [`ReplacePolicy`] picks the canonical one from document content
//! alone, so every replica picks the same. Losing entries are marked
//! obsolete and deleted on the next local write, never in reaction to a
//! remote event.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::rc::Rc;
use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use log::{debug, trace, warn};

use super::container::entry_attributes;
use super::layout::MapLayout;
use super::serializer::{Serializer, TextSerializer};
use crate::listeners::{
    DocumentEngine, ElementListener, ListenerId, ListenerSet, Point, WeakElementListener,
};

/// Decides which of two entries for the same key is canonical.
pub trait ReplacePolicy<V>: 'static {
    /// Whether the candidate entry takes over from the current one.
    fn can_replace(
        &self,
        current_location: usize,
        current_value: &V,
        candidate_location: usize,
        candidate_value: &V,
    ) -> bool;

    /// Whether writing `new` over `current` would change nothing.
    fn is_redundant_put(&self, current: Option<&V>, new: &V) -> bool;
}

/// The entry later in the document wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaterEntryWins;

impl<V: PartialEq> ReplacePolicy<V> for LaterEntryWins {
    fn can_replace(&self, current_location: usize, _: &V, candidate_location: usize, _: &V) -> bool {
        candidate_location > current_location
    }

    fn is_redundant_put(&self, current: Option<&V>, new: &V) -> bool {
        current == Some(new)
    }
}

/// The greater value wins; values never decrease. Equal values fall back to
/// the later entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreaterValueWins;

impl<V: PartialOrd> ReplacePolicy<V> for GreaterValueWins {
    fn can_replace(
        &self,
        current_location: usize,
        current_value: &V,
        candidate_location: usize,
        candidate_value: &V,
    ) -> bool {
        candidate_value > current_value
            || (candidate_value == current_value && candidate_location > current_location)
    }

    fn is_redundant_put(&self, current: Option<&V>, new: &V) -> bool {
        current.is_some_and(|c| new <= c)
    }
}

/// One logical change of the value for `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySet<K, V> {
    pub key: K,
    pub old_value: Option<V>,
    pub new_value: Option<V>,
}

#[derive(Debug, Clone)]
struct Canonical<E, V> {
    element: E,
    value: V,
}

struct MapState<E, K, V> {
    entries: IndexMap<K, Canonical<E, V>>,
    obsolete: IndexSet<E>,
    /// Obsolete entries this map is deleting right now.
    doomed: HashSet<E>,
    suppress_events: bool,
}

pub(crate) struct MapCore<D: DocumentEngine, K, V, P> {
    doc: D,
    container: D::Element,
    entry_tag: String,
    /// Absent for single-valued maps.
    key_attr: Option<String>,
    value_attr: String,
    key_serializer: Box<dyn Serializer<K>>,
    value_serializer: Box<dyn Serializer<V>>,
    policy: P,
    state: RefCell<MapState<D::Element, K, V>>,
    listeners: RefCell<ListenerSet<EntrySet<K, V>>>,
}

impl<D, K, V, P> MapCore<D, K, V, P>
where
    D: DocumentEngine,
    K: Clone + Eq + Hash + Debug + 'static,
    V: Clone + PartialEq + Debug + 'static,
    P: ReplacePolicy<V>,
{
    fn read_entry(&self, element: &D::Element) -> Option<(K, V)> {
        let key_text = match &self.key_attr {
            Some(attr) => self.doc.attribute(element, attr).unwrap_or_default(),
            None => String::new(),
        };
        let value_text = self.doc.attribute(element, &self.value_attr).unwrap_or_default();
        match (
            self.key_serializer.from_string(&key_text),
            self.value_serializer.from_string(&value_text),
        ) {
            (Some(key), Some(value)) => Some((key, value)),
            _ => {
                warn!(
                    target: "wave_model::adt",
                    "ignoring {} entry with key {key_text:?} and value {value_text:?}",
                    self.entry_tag
                );
                None
            }
        }
    }

    fn is_entry(&self, element: &D::Element) -> bool {
        self.doc.tag_name(element) == self.entry_tag
    }

    /// The best entry for `key` still in the document, skipping entries
    /// about to be deleted.
    fn best_surviving(
        &self,
        state: &MapState<D::Element, K, V>,
        key: &K,
    ) -> Option<Canonical<D::Element, V>> {
        let mut best: Option<(usize, Canonical<D::Element, V>)> = None;
        for element in self.doc.child_elements(&self.container) {
            if state.doomed.contains(&element) || !self.is_entry(&element) {
                continue;
            }
            let Some((k, value)) = self.read_entry(&element) else {
                continue;
            };
            if k != *key {
                continue;
            }
            let location = self.doc.location(&element);
            let better = match &best {
                None => true,
                Some((l, c)) => self.policy.can_replace(*l, &c.value, location, &value),
            };
            if better {
                best = Some((location, Canonical { element, value }));
            }
        }
        best.map(|(_, c)| c)
    }

    fn fire(&self, event: EntrySet<K, V>) {
        if self.state.borrow().suppress_events || event.old_value == event.new_value {
            return;
        }
        trace!(
            target: "wave_model::adt",
            "{:?}: {:?} -> {:?}",
            event.key,
            event.old_value,
            event.new_value
        );
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
            debug!(
                target: "wave_model::adt",
                "deleting {} obsolete {} entries",
                doomed.len(),
                self.entry_tag
            );
        }
        for element in &doomed {
            self.doc.delete_element(element);
        }
        self.state.borrow_mut().doomed.clear();
    }

    fn get(&self, key: &K) -> Option<V> {
        self.state.borrow().entries.get(key).map(|c| c.value.clone())
    }

    fn put(&self, key: K, value: V) -> bool {
        let current = self.get(&key);
        if self.policy.is_redundant_put(current.as_ref(), &value) {
            return false;
        }
        {
            let mut state = self.state.borrow_mut();
            state.suppress_events = true;
            if let Some(old) = state.entries.shift_remove(&key) {
                state.obsolete.insert(old.element);
            }
        }
        let key_text = self.key_serializer.to_string(&key);
        let value_text = self.value_serializer.to_string(&value);
        let key_attr = self.key_attr.as_deref().unwrap_or("");
        let attributes =
            entry_attributes(&[(key_attr, key_text), (self.value_attr.as_str(), value_text)]);
        self.doc.create_element(
            Point::Start(self.container.clone()),
            &self.entry_tag,
            &attributes,
        );
        self.cleanup();
        self.state.borrow_mut().suppress_events = false;
        let new_value = self.get(&key);
        self.fire(EntrySet {
            key,
            old_value: current,
            new_value,
        });
        true
    }

    fn remove(&self, key: &K) {
        self.cleanup();
        let element = self.state.borrow().entries.get(key).map(|c| c.element.clone());
        if let Some(element) = element {
            self.doc.delete_element(&element);
        }
    }

    fn clear(&self) {
        self.cleanup();
        let elements: Vec<D::Element> = self
            .state
            .borrow()
            .entries
            .values()
            .map(|c| c.element.clone())
            .collect();
        for element in elements {
            self.doc.delete_element(&element);
        }
    }
}

impl<D, K, V, P> ElementListener<D::Element> for MapCore<D, K, V, P>
where
    D: DocumentEngine,
    K: Clone + Eq + Hash + Debug + 'static,
    V: Clone + PartialEq + Debug + 'static,
    P: ReplacePolicy<V>,
{
    fn on_element_added(&self, element: &D::Element) {
        if !self.is_entry(element) {
            return;
        }
        let Some((key, value)) = self.read_entry(element) else {
            return;
        };
        let location = self.doc.location(element);
        let event = {
            let mut state = self.state.borrow_mut();
            let replace = match state.entries.get(&key) {
                None => true,
                Some(current) => self.policy.can_replace(
                    self.doc.location(&current.element),
                    &current.value,
                    location,
                    &value,
                ),
            };
            if replace {
                let canonical = Canonical {
                    element: element.clone(),
                    value: value.clone(),
                };
                let old_value = state.entries.insert(key.clone(), canonical).map(|old| {
                    debug!(target: "wave_model::adt", "entry for {key:?} superseded");
                    state.obsolete.insert(old.element);
                    old.value
                });
                Some(EntrySet {
                    key,
                    old_value,
                    new_value: Some(value),
                })
            } else {
                debug!(target: "wave_model::adt", "redundant entry for {key:?}");
                state.obsolete.insert(element.clone());
                None
            }
        };
        if let Some(event) = event {
            self.fire(event);
        }
    }

    fn on_element_removed(&self, element: &D::Element) {
        if !self.is_entry(element) {
            return;
        }
        let event = {
            let mut state = self.state.borrow_mut();
            if state.obsolete.shift_remove(element) || state.doomed.contains(element) {
                return;
            }
            let Some(index) = state.entries.values().position(|c| c.element == *element) else {
                return;
            };
            let Some((key, removed)) = state.entries.shift_remove_index(index) else {
                return;
            };
            let promoted = self.best_surviving(&state, &key);
            let new_value = promoted.map(|p| {
                state.obsolete.shift_remove(&p.element);
                let value = p.value.clone();
                state.entries.insert(key.clone(), p);
                value
            });
            EntrySet {
                key,
                old_value: Some(removed.value),
                new_value,
            }
        };
        self.fire(event);
    }
}

/// A map stored as entry elements of a container.
///
/// Not `Send`; all calls and callbacks happen on the caller's thread.
/// Listeners must not write to the document.
pub struct DocumentBasedMap<D, K, V, P>
where
    D: DocumentEngine,
    K: Clone + Eq + Hash + Debug + 'static,
    V: Clone + PartialEq + Debug + 'static,
    P: ReplacePolicy<V>,
{
    core: Rc<MapCore<D, K, V, P>>,
    listener_id: ListenerId,
}

/// Last writer wins.
pub type DocumentBasedBasicMap<D, K, V> = DocumentBasedMap<D, K, V, LaterEntryWins>;

/// Per-key values only grow.
pub type DocumentBasedMonotonicMap<D, K, V> = DocumentBasedMap<D, K, V, GreaterValueWins>;

impl<D, K, V, P> DocumentBasedMap<D, K, V, P>
where
    D: DocumentEngine,
    K: Clone + Eq + Hash + Debug + 'static,
    V: Clone + PartialEq + Debug + 'static,
    P: ReplacePolicy<V>,
{
    /// Adapts the entries under `container`, using text serialization.
    pub fn new(doc: D, container: D::Element, layout: &MapLayout) -> Self
    where
        K: FromStr + Display,
        V: FromStr + Display,
        P: Default,
    {
        Self::with_serializers(
            doc,
            container,
            layout,
            TextSerializer::new(),
            TextSerializer::new(),
            P::default(),
        )
    }

    pub fn with_serializers(
        doc: D,
        container: D::Element,
        layout: &MapLayout,
        key_serializer: impl Serializer<K> + 'static,
        value_serializer: impl Serializer<V> + 'static,
        policy: P,
    ) -> Self {
        Self::create(
            doc,
            container,
            layout.entry_tag.clone(),
            Some(layout.key_attr.clone()),
            layout.value_attr.clone(),
            Box::new(key_serializer),
            Box::new(value_serializer),
            policy,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create(
        doc: D,
        container: D::Element,
        entry_tag: String,
        key_attr: Option<String>,
        value_attr: String,
        key_serializer: Box<dyn Serializer<K>>,
        value_serializer: Box<dyn Serializer<V>>,
        policy: P,
    ) -> Self {
        let core = Rc::new(MapCore {
            doc: doc.clone(),
            container: container.clone(),
            entry_tag,
            key_attr,
            value_attr,
            key_serializer,
            value_serializer,
            policy,
            state: RefCell::new(MapState {
                entries: IndexMap::new(),
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

    pub fn get(&self, key: &K) -> Option<V> {
        self.core.get(key)
    }

    /// Writes `value` for `key`. Returns false, writing nothing, when the
    /// put would not change the map.
    pub fn put(&self, key: K, value: V) -> bool {
        self.core.put(key, value)
    }

    pub fn remove(&self, key: &K) {
        self.core.remove(key)
    }

    pub fn clear(&self) {
        self.core.clear()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.core.state.borrow().entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<K> {
        self.core.state.borrow().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.core.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries known to be superseded and not yet deleted.
    pub fn obsolete_count(&self) -> usize {
        self.core.state.borrow().obsolete.len()
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&EntrySet<K, V>) + 'static,
    {
        self.core.listeners.borrow_mut().add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.core.listeners.borrow_mut().remove(id)
    }
}

impl<D, K, V, P> Drop for DocumentBasedMap<D, K, V, P>
where
    D: DocumentEngine,
    K: Clone + Eq + Hash + Debug + 'static,
    V: Clone + PartialEq + Debug + 'static,
    P: ReplacePolicy<V>,
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
    use crate::tree::{NodeId, TreeDocument};

    const KEY1: &str = "bEefFaCe*2";
    const KEY2: &str = "caFeBabE*9";

    fn layout() -> MapLayout {
        MapLayout::new("read", "blipId", "version")
    }

    fn entry_xml(entries: &[(&str, i64)]) -> String {
        let body: String = entries
            .iter()
            .map(|(k, v)| format!(r#"<read blipId="{k}" version="{v}"/>"#))
            .collect();
        if body.is_empty() {
            "<supplement/>".to_owned()
        } else {
            format!("<supplement>{body}</supplement>")
        }
    }

    fn substrate(entries: &[(&str, i64)]) -> (TreeDocument, NodeId) {
        let doc = TreeDocument::new();
        let root = doc.document_element();
        let container = doc.create_child_element(&root, "supplement", &Attributes::new());
        for (k, v) in entries {
            add_entry(&doc, container, k, *v, false);
        }
        (doc, container)
    }

    fn add_entry(doc: &TreeDocument, container: NodeId, key: &str, value: i64, at_start: bool) {
        let attrs = Attributes::from_pairs([("blipId", key.to_owned()), ("version", value.to_string())])
            .unwrap();
        let point = if at_start {
            Point::Start(container)
        } else {
            Point::End(container)
        };
        doc.create_element(point, "read", &attrs);
    }

    fn remove_entries(doc: &TreeDocument, container: NodeId, key: &str) {
        for e in doc.child_elements(&container) {
            if doc.attribute(&e, "blipId").as_deref() == Some(key) {
                doc.delete_element(&e);
            }
        }
    }

    fn basic(entries: &[(&str, i64)]) -> (TreeDocument, NodeId, DocumentBasedBasicMap<TreeDocument, String, i64>) {
        let (doc, container) = substrate(entries);
        let map = DocumentBasedBasicMap::new(doc.clone(), container, &layout());
        (doc, container, map)
    }

    fn record(map: &DocumentBasedBasicMap<TreeDocument, String, i64>) -> Rc<RefCell<Vec<EntrySet<String, i64>>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        map.add_listener(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn put_on_empty_map() {
        let (doc, _, map) = basic(&[]);
        assert!(map.put(KEY1.into(), 10));
        assert_eq!(map.get(&KEY1.to_owned()), Some(10));
        assert_eq!(doc.to_xml(), entry_xml(&[(KEY1, 10)]));
    }

    #[test]
    fn load_leaves_overridden_entries_but_cleans_on_write() {
        let (doc, _, map) = basic(&[(KEY1, 10), (KEY2, 20), (KEY1, 30)]);
        assert_eq!(map.get(&KEY1.to_owned()), Some(30));
        assert_eq!(map.obsolete_count(), 1);
        assert_eq!(doc.to_xml(), entry_xml(&[(KEY1, 10), (KEY2, 20), (KEY1, 30)]));
        map.put(KEY2.into(), 50);
        assert_eq!(doc.to_xml(), entry_xml(&[(KEY2, 50), (KEY1, 30)]));
        assert_eq!(map.obsolete_count(), 0);
    }

    #[test]
    fn later_puts_replace_older_values() {
        let (doc, _, map) = basic(&[(KEY1, 10), (KEY2, 20)]);
        map.put(KEY1.into(), 5);
        assert_eq!(map.get(&KEY1.to_owned()), Some(5));
        assert_eq!(doc.to_xml(), entry_xml(&[(KEY1, 5), (KEY2, 20)]));
        map.put(KEY1.into(), 30);
        assert_eq!(doc.to_xml(), entry_xml(&[(KEY1, 30), (KEY2, 20)]));
    }

    #[test]
    fn remote_replacement_is_cleaned_on_next_write() {
        let (doc, container, map) = basic(&[(KEY1, 30), (KEY2, 20)]);
        remove_entries(&doc, container, KEY1);
        add_entry(&doc, container, KEY1, 10, true);
        assert_eq!(map.get(&KEY1.to_owned()), Some(10));
        map.put(KEY2.into(), 50);
        assert_eq!(doc.to_xml(), entry_xml(&[(KEY2, 50), (KEY1, 10)]));
    }

    #[test]
    fn replacement_fires_a_single_event() {
        let (_, _, map) = basic(&[]);
        map.put(KEY1.into(), 10);
        let events = record(&map);
        map.put(KEY1.into(), 5);
        assert!(!map.put(KEY1.into(), 5));
        assert_eq!(
            *events.borrow(),
            vec![EntrySet {
                key: KEY1.to_owned(),
                old_value: Some(10),
                new_value: Some(5)
            }]
        );
    }

    #[test]
    fn removing_canonical_promotes_surviving_duplicate() {
        let (doc, container, map) = basic(&[(KEY1, 1), (KEY1, 2)]);
        let events = record(&map);
        assert_eq!(map.get(&KEY1.to_owned()), Some(2));
        let later = doc.child_elements(&container)[1];
        doc.delete_element(&later);
        assert_eq!(map.get(&KEY1.to_owned()), Some(1));
        assert_eq!(map.obsolete_count(), 0);
        assert_eq!(events.borrow().len(), 1);
        assert_eq!(events.borrow()[0].new_value, Some(1));
    }

    #[test]
    fn remove_and_clear() {
        let (doc, _, map) = basic(&[(KEY1, 1), (KEY2, 2), (KEY1, 3)]);
        let events = record(&map);
        map.remove(&KEY1.to_owned());
        assert_eq!(map.keys(), vec![KEY2.to_owned()]);
        assert_eq!(doc.to_xml(), entry_xml(&[(KEY2, 2)]));
        map.clear();
        assert!(map.is_empty());
        assert_eq!(doc.to_xml(), entry_xml(&[]));
        let removed: Vec<_> = events.borrow().iter().map(|e| e.key.clone()).collect();
        assert_eq!(removed, vec![KEY1.to_owned(), KEY2.to_owned()]);
    }

    #[test]
    fn unparseable_entries_are_ignored() {
        let (doc, container) = substrate(&[]);
        let attrs = Attributes::from_pairs([("blipId", "k"), ("version", "nope")]).unwrap();
        doc.create_child_element(&container, "read", &attrs);
        let map: DocumentBasedBasicMap<TreeDocument, String, i64> =
            DocumentBasedBasicMap::new(doc.clone(), container, &layout());
        assert!(map.is_empty());
    }

    #[test]
    fn monotonic_put_never_decreases() {
        let (doc, container) = substrate(&[(KEY1, 10)]);
        let map: DocumentBasedMonotonicMap<TreeDocument, String, i64> =
            DocumentBasedMonotonicMap::new(doc.clone(), container, &layout());
        assert!(!map.put(KEY1.into(), 5));
        assert!(!map.put(KEY1.into(), 10));
        assert_eq!(doc.to_xml(), entry_xml(&[(KEY1, 10)]));
        assert!(map.put(KEY1.into(), 20));
        assert_eq!(doc.to_xml(), entry_xml(&[(KEY1, 20)]));
        add_entry(&doc, container, KEY1, 15, false);
        assert_eq!(map.get(&KEY1.to_owned()), Some(20));
        assert_eq!(map.obsolete_count(), 1);
    }

    #[test]
    fn equal_monotonic_values_resolve_by_position() {
        assert!(GreaterValueWins.can_replace(0, &7, 3, &7));
        assert!(!GreaterValueWins.can_replace(3, &7, 0, &7));
        assert!(!GreaterValueWins.can_replace(0, &8, 3, &7));

        let (doc, container) = substrate(&[]);
        let map: DocumentBasedMonotonicMap<TreeDocument, String, i64> =
            DocumentBasedMonotonicMap::new(doc.clone(), container, &layout());
        add_entry(&doc, container, KEY1, 7, false);
        add_entry(&doc, container, KEY1, 7, true);
        let later = doc.child_elements(&container)[1];
        assert_eq!(map.obsolete_count(), 1);
        map.put(KEY2.into(), 1);
        let children = doc.child_elements(&container);
        assert_eq!(children.len(), 2);
        assert_eq!(children[1], later);
        assert_eq!(map.get(&KEY1.to_owned()), Some(7));
    }

    #[test]
    fn dropping_the_map_unsubscribes() {
        let (doc, container, map) = basic(&[]);
        drop(map);
        add_entry(&doc, container, KEY1, 1, false);
        assert_eq!(doc.to_xml(), entry_xml(&[(KEY1, 1)]));
    }
}

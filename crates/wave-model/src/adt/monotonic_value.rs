//! Document-based monotonic value: a single slot whose value only grows.

use std::fmt::{Debug, Display};
use std::str::FromStr;

use super::layout::ValueLayout;
use super::map::{DocumentBasedMonotonicMap, GreaterValueWins};
use super::serializer::{Serializer, TextSerializer, UnitSerializer};
use super::singleton::ValueChanged;
use crate::listeners::{DocumentEngine, ListenerId};

/// The keyless projection of a monotonic map.
pub struct DocumentBasedMonotonicValue<D, V>
where
    D: DocumentEngine,
    V: Clone + PartialOrd + Debug + 'static,
{
    map: DocumentBasedMonotonicMap<D, (), V>,
}

impl<D, V> DocumentBasedMonotonicValue<D, V>
where
    D: DocumentEngine,
    V: Clone + PartialOrd + Debug + 'static,
{
    pub fn new(doc: D, container: D::Element, layout: &ValueLayout) -> Self
    where
        V: FromStr + Display,
    {
        Self::with_serializer(doc, container, layout, TextSerializer::new())
    }

    pub fn with_serializer(
        doc: D,
        container: D::Element,
        layout: &ValueLayout,
        serializer: impl Serializer<V> + 'static,
    ) -> Self {
        let map = DocumentBasedMonotonicMap::create(
            doc,
            container,
            layout.entry_tag.clone(),
            None,
            layout.value_attr.clone(),
            Box::new(UnitSerializer),
            Box::new(serializer),
            GreaterValueWins,
        );
        Self { map }
    }

    pub fn get(&self) -> Option<V> {
        self.map.get(&())
    }

    /// Writes `value` if it exceeds the current one. Returns whether it did.
    pub fn set(&self, value: V) -> bool {
        self.map.put((), value)
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ValueChanged<Option<V>>) + 'static,
    {
        self.map.add_listener(move |e| {
            listener(&ValueChanged {
                old_value: e.old_value.clone(),
                new_value: e.new_value.clone(),
            })
        })
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.map.remove_listener(id)
    }
}

//! Replicated collections stored as child elements of a container element.
//!
//! Each collection indexes the container's children on creation and keeps
//! the index current from element-added and element-removed callbacks.
//! Conflicting entries left by concurrent writes are resolved from document
//! content alone (position or value order), so replicas holding the same
//! document agree on the visible state.

pub mod boolean;
pub mod container;
pub mod element_list;
pub mod layout;
pub mod map;
pub mod monotonic_value;
pub mod serializer;
pub mod set;
pub mod singleton;

pub use boolean::DocumentBasedBoolean;
pub use container::get_or_create_container;
pub use element_list::{DocumentBasedElementList, ListEvent};
pub use layout::{MapLayout, SetLayout, ValueLayout};
pub use map::{
    DocumentBasedBasicMap, DocumentBasedMap, DocumentBasedMonotonicMap, EntrySet,
    GreaterValueWins, LaterEntryWins, ReplacePolicy,
};
pub use monotonic_value::DocumentBasedMonotonicValue;
pub use serializer::{Serializer, TextSerializer};
pub use set::{DocumentBasedSet, SetEvent};
pub use singleton::{AttributeValueFactory, DocumentBasedSingleton, ElementFactory, ValueChanged};

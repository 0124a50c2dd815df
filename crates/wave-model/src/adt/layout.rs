//! Element and attribute names used by the collections.
//!
//! Layouts are plain data with defaults, so they can be written inline or
//! loaded from configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapLayout {
    pub entry_tag: String,
    pub key_attr: String,
    pub value_attr: String,
}

impl Default for MapLayout {
    fn default() -> Self {
        Self {
            entry_tag: "entry".to_owned(),
            key_attr: "key".to_owned(),
            value_attr: "value".to_owned(),
        }
    }
}

impl MapLayout {
    pub fn new(entry_tag: &str, key_attr: &str, value_attr: &str) -> Self {
        Self {
            entry_tag: entry_tag.to_owned(),
            key_attr: key_attr.to_owned(),
            value_attr: value_attr.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SetLayout {
    pub entry_tag: String,
    pub value_attr: String,
}

impl Default for SetLayout {
    fn default() -> Self {
        Self {
            entry_tag: "entry".to_owned(),
            value_attr: "value".to_owned(),
        }
    }
}

impl SetLayout {
    pub fn new(entry_tag: &str, value_attr: &str) -> Self {
        Self {
            entry_tag: entry_tag.to_owned(),
            value_attr: value_attr.to_owned(),
        }
    }
}

/// Layout of single-valued collections: boolean, monotonic value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValueLayout {
    pub entry_tag: String,
    pub value_attr: String,
}

impl Default for ValueLayout {
    fn default() -> Self {
        Self {
            entry_tag: "value".to_owned(),
            value_attr: "value".to_owned(),
        }
    }
}

impl ValueLayout {
    pub fn new(entry_tag: &str, value_attr: &str) -> Self {
        Self {
            entry_tag: entry_tag.to_owned(),
            value_attr: value_attr.to_owned(),
        }
    }
}

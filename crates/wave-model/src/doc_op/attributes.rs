//! Element attributes and attribute updates.
//!
//! `Attributes` is an immutable name → value map kept sorted by name.
//! `AttributesUpdate` is an ordered list of per-name `old → new` changes,
//! `None` meaning absent.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributesError {
    #[error("duplicate attribute key {0:?}")]
    DuplicateKey(String),
    #[error("attribute {key:?}: expected old value {expected:?}, found {actual:?}")]
    OldValueMismatch {
        key: String,
        expected: Option<String>,
        actual: Option<String>,
    },
}

/// One `old → new` change of a keyed value. Shared by attribute updates and
/// annotation boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValueChange {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl ValueChange {
    pub fn new(key: impl Into<String>, old_value: Option<&str>, new_value: Option<&str>) -> Self {
        Self {
            key: key.into(),
            old_value: old_value.map(str::to_owned),
            new_value: new_value.map(str::to_owned),
        }
    }
}

// ── Attributes ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

static EMPTY_ATTRIBUTES: Attributes = Attributes::EMPTY;

impl Attributes {
    pub const EMPTY: Attributes = Attributes { entries: Vec::new() };

    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> &'static Attributes {
        &EMPTY_ATTRIBUTES
    }

    /// Builds a sorted attribute map, rejecting repeated names.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, AttributesError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entries: Vec<(String, String)> =
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(w) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(AttributesError::DuplicateKey(w[0].0.clone()));
        }
        Ok(Self { entries })
    }

    /// Keeps the caller's order and duplicates as given. Such maps are
    /// rejected by validation if they are not strictly sorted.
    pub fn from_pairs_unchecked(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Same name → value content, regardless of stored order.
    pub fn same_content(&self, other: &Attributes) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }

    /// Applies `update`, checking that each old value matches.
    pub fn update_with(&self, update: &AttributesUpdate) -> Result<Attributes, AttributesError> {
        for change in update.changes() {
            let actual = self.get(&change.key);
            if actual != change.old_value.as_deref() {
                return Err(AttributesError::OldValueMismatch {
                    key: change.key.clone(),
                    expected: change.old_value.clone(),
                    actual: actual.map(str::to_owned),
                });
            }
        }
        Ok(self.update_with_unchecked(update))
    }

    /// Applies `update` using only its new values.
    pub fn update_with_unchecked(&self, update: &AttributesUpdate) -> Attributes {
        let mut entries = self.entries.clone();
        for change in update.changes() {
            entries.retain(|(k, _)| *k != change.key);
            if let Some(value) = &change.new_value {
                entries.push((change.key.clone(), value.clone()));
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Attributes { entries }
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v:?}")?;
        }
        f.write_str("}")
    }
}

// ── AttributesUpdate ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AttributesUpdate {
    changes: Vec<ValueChange>,
}

impl AttributesUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an update sorted by key, rejecting repeated keys.
    pub fn from_changes<I>(changes: I) -> Result<Self, AttributesError>
    where
        I: IntoIterator<Item = ValueChange>,
    {
        let mut changes: Vec<ValueChange> = changes.into_iter().collect();
        changes.sort_by(|a, b| a.key.cmp(&b.key));
        if let Some(w) = changes.windows(2).find(|w| w[0].key == w[1].key) {
            return Err(AttributesError::DuplicateKey(w[0].key.clone()));
        }
        Ok(Self { changes })
    }

    pub fn from_changes_unchecked(changes: Vec<ValueChange>) -> Self {
        Self { changes }
    }

    /// The update that turns `old` into `new`.
    pub fn between(old: &Attributes, new: &Attributes) -> Self {
        let mut changes = Vec::new();
        for (k, v) in old.iter() {
            match new.get(k) {
                Some(nv) if nv == v => {}
                nv => changes.push(ValueChange::new(k, Some(v), nv)),
            }
        }
        for (k, v) in new.iter() {
            if !old.contains_key(k) {
                changes.push(ValueChange::new(k, None, Some(v)));
            }
        }
        changes.sort_by(|a, b| a.key.cmp(&b.key));
        Self { changes }
    }

    /// Sequential composition: `self` then `next`.
    pub fn compose_with(&self, next: &AttributesUpdate) -> Result<Self, AttributesError> {
        let mut changes = self.changes.clone();
        for change in next.changes() {
            match changes.iter_mut().find(|c| c.key == change.key) {
                Some(existing) => {
                    if existing.new_value != change.old_value {
                        return Err(AttributesError::OldValueMismatch {
                            key: change.key.clone(),
                            expected: change.old_value.clone(),
                            actual: existing.new_value.clone(),
                        });
                    }
                    existing.new_value = change.new_value.clone();
                }
                None => changes.push(change.clone()),
            }
        }
        changes.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(Self { changes })
    }

    pub fn changes(&self) -> &[ValueChange] {
        &self.changes
    }

    pub fn get(&self, key: &str) -> Option<&ValueChange> {
        self.changes.iter().find(|c| c.key == key)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

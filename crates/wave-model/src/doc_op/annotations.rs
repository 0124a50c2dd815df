//! Annotation boundaries, running annotation updates and per-item
//! annotation maps.

use std::collections::BTreeMap;

use thiserror::Error;

use super::attributes::ValueChange;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationError {
    #[error("annotation key {0:?} appears more than once")]
    DuplicateKey(String),
    #[error("annotation key {0:?} both ends and changes at one boundary")]
    EndAndChange(String),
}

// ── AnnotationBoundaryMap ──────────────────────────────────────────────────

/// What happens to annotations at one position of an operation: a sorted
/// list of keys that end and a sorted list of keys that change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AnnotationBoundaryMap {
    end_keys: Vec<String>,
    changes: Vec<ValueChange>,
}

impl AnnotationBoundaryMap {
    pub fn builder() -> AnnotationBoundaryMapBuilder {
        AnnotationBoundaryMapBuilder::default()
    }

    /// Raw constructor for data that has not been checked. The validator
    /// reports unsorted, duplicate or conflicting keys.
    pub fn new_unchecked(end_keys: Vec<String>, changes: Vec<ValueChange>) -> Self {
        Self { end_keys, changes }
    }

    pub fn end_keys(&self) -> &[String] {
        &self.end_keys
    }

    pub fn changes(&self) -> &[ValueChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.end_keys.is_empty() && self.changes.is_empty()
    }

    /// First key that both ends and changes, if any.
    pub fn end_change_conflict(&self) -> Option<&str> {
        self.changes
            .iter()
            .map(|c| c.key.as_str())
            .find(|k| self.end_keys.iter().any(|e| e == k))
    }

    /// Merges two boundaries at the same position so that applying the
    /// result equals applying `self` then `next`.
    ///
    /// A key changed by `next` takes `next`'s change; a key ended by `next`
    /// ends; a key touched only by `self` keeps `self`'s entry.
    pub fn compose(&self, next: &AnnotationBoundaryMap) -> Result<Self, AnnotationError> {
        for map in [self, next] {
            if let Some(key) = map.end_change_conflict() {
                return Err(AnnotationError::EndAndChange(key.to_owned()));
            }
        }
        let touched_by_next = |key: &str| {
            next.end_keys.iter().any(|k| k == key) || next.changes.iter().any(|c| c.key == key)
        };
        let mut builder = AnnotationBoundaryMapBuilder::default();
        for key in self.end_keys.iter().filter(|k| !touched_by_next(k)) {
            builder = builder.end(key);
        }
        for change in self.changes.iter().filter(|c| !touched_by_next(&c.key)) {
            builder = builder.push_change(change.clone());
        }
        for key in &next.end_keys {
            builder = builder.end(key);
        }
        for change in &next.changes {
            builder = builder.push_change(change.clone());
        }
        builder.build()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnnotationBoundaryMapBuilder {
    end_keys: Vec<String>,
    changes: Vec<ValueChange>,
}

impl AnnotationBoundaryMapBuilder {
    pub fn end(mut self, key: impl Into<String>) -> Self {
        self.end_keys.push(key.into());
        self
    }

    pub fn change(self, key: impl Into<String>, old_value: Option<&str>, new_value: Option<&str>) -> Self {
        self.push_change(ValueChange::new(key, old_value, new_value))
    }

    /// Shorthand for an initialization, where the old value is always absent.
    pub fn initialization_value(self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.change(key, None, value)
    }

    fn push_change(mut self, change: ValueChange) -> Self {
        self.changes.push(change);
        self
    }

    pub fn build(mut self) -> Result<AnnotationBoundaryMap, AnnotationError> {
        self.end_keys.sort();
        self.changes.sort_by(|a, b| a.key.cmp(&b.key));
        if let Some(w) = self.end_keys.windows(2).find(|w| w[0] == w[1]) {
            return Err(AnnotationError::DuplicateKey(w[0].clone()));
        }
        if let Some(w) = self.changes.windows(2).find(|w| w[0].key == w[1].key) {
            return Err(AnnotationError::DuplicateKey(w[0].key.clone()));
        }
        let map = AnnotationBoundaryMap {
            end_keys: self.end_keys,
            changes: self.changes,
        };
        if let Some(key) = map.end_change_conflict() {
            return Err(AnnotationError::EndAndChange(key.to_owned()));
        }
        Ok(map)
    }
}

// ── AnnotationsUpdate ──────────────────────────────────────────────────────

/// The annotation changes that are open at some point while walking an
/// operation, sorted by key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnnotationsUpdate {
    changes: Vec<ValueChange>,
}

impl AnnotationsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// The open set after passing `boundary`.
    pub fn compose_with(&self, boundary: &AnnotationBoundaryMap) -> AnnotationsUpdate {
        let mut changes: Vec<ValueChange> = self
            .changes
            .iter()
            .filter(|c| {
                !boundary.end_keys().contains(&c.key)
                    && !boundary.changes().iter().any(|b| b.key == c.key)
            })
            .cloned()
            .collect();
        changes.extend(boundary.changes().iter().cloned());
        changes.sort_by(|a, b| a.key.cmp(&b.key));
        AnnotationsUpdate { changes }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&ValueChange> {
        self.changes.iter().find(|c| c.key == key)
    }

    pub fn changes(&self) -> &[ValueChange] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

// ── AnnotationMap ──────────────────────────────────────────────────────────

static EMPTY_ANNOTATIONS: AnnotationMap = AnnotationMap {
    values: BTreeMap::new(),
};

/// Annotations carried by one document item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AnnotationMap {
    values: BTreeMap<String, String>,
}

impl AnnotationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> &'static AnnotationMap {
        &EMPTY_ANNOTATIONS
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Applies the new values of `update`; `None` removes the key.
    pub fn update_with(&self, update: &AnnotationsUpdate) -> AnnotationMap {
        let mut values = self.values.clone();
        for change in update.changes() {
            match &change.new_value {
                Some(v) => {
                    values.insert(change.key.clone(), v.clone());
                }
                None => {
                    values.remove(&change.key);
                }
            }
        }
        AnnotationMap { values }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AnnotationMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sorts_and_rejects_conflicts() {
        let map = AnnotationBoundaryMap::builder()
            .change("z", None, Some("1"))
            .change("b", None, Some("2"))
            .end("y")
            .end("a")
            .build()
            .unwrap();
        assert_eq!(map.end_keys(), ["a".to_string(), "y".to_string()]);
        assert_eq!(map.changes()[0].key, "b");

        let err = AnnotationBoundaryMap::builder()
            .end("k")
            .change("k", None, Some("v"))
            .build();
        assert_eq!(err, Err(AnnotationError::EndAndChange("k".into())));

        let dup = AnnotationBoundaryMap::builder().end("k").end("k").build();
        assert_eq!(dup, Err(AnnotationError::DuplicateKey("k".into())));
    }

    #[test]
    fn compose_resolves_key_cases() {
        let first = AnnotationBoundaryMap::builder()
            .end("ended-then-changed")
            .change("changed-twice", None, Some("1"))
            .change("changed-then-ended", None, Some("1"))
            .change("only-first", None, Some("x"))
            .build()
            .unwrap();
        let second = AnnotationBoundaryMap::builder()
            .change("ended-then-changed", None, Some("2"))
            .change("changed-twice", None, Some("2"))
            .end("changed-then-ended")
            .build()
            .unwrap();
        let composed = first.compose(&second).unwrap();
        assert_eq!(composed.end_keys(), ["changed-then-ended".to_string()]);
        let keys: Vec<&str> = composed.changes().iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["changed-twice", "ended-then-changed", "only-first"]);
        assert_eq!(composed.changes()[0].new_value.as_deref(), Some("2"));
    }

    #[test]
    fn compose_rejects_conflicting_input() {
        let bad = AnnotationBoundaryMap::new_unchecked(
            vec!["k".into()],
            vec![ValueChange::new("k", None, Some("v"))],
        );
        let fine = AnnotationBoundaryMap::default();
        assert!(bad.compose(&fine).is_err());
        assert!(fine.compose(&bad).is_err());
    }

    #[test]
    fn update_tracks_open_keys() {
        let open = AnnotationsUpdate::new().compose_with(
            &AnnotationBoundaryMap::builder()
                .change("a", None, Some("1"))
                .change("b", None, Some("2"))
                .build()
                .unwrap(),
        );
        assert_eq!(open.len(), 2);
        let closed = open.compose_with(&AnnotationBoundaryMap::builder().end("a").build().unwrap());
        assert!(!closed.contains_key("a"));
        assert!(closed.contains_key("b"));
    }

    #[test]
    fn annotation_map_applies_new_values() {
        let map: AnnotationMap = [("a", "1"), ("b", "2")].into_iter().collect();
        let update = AnnotationsUpdate::new().compose_with(
            &AnnotationBoundaryMap::builder()
                .change("a", Some("1"), None)
                .change("c", None, Some("3"))
                .build()
                .unwrap(),
        );
        let next = map.update_with(&update);
        assert_eq!(next.get("a"), None);
        assert_eq!(next.get("b"), Some("2"));
        assert_eq!(next.get("c"), Some("3"));
        assert!(AnnotationMap::empty().is_empty());
    }
}

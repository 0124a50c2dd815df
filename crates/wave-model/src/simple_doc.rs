//! A linear snapshot document.
//!
//! [`SimpleDocument`] stores the item sequence directly: one entry per
//! character, element start and element end, each with its annotations. It
//! answers the automaton's structural queries and applies operations after
//! validating them.

use std::collections::BTreeMap;

use log::debug;
use thiserror::Error;

use crate::automaton::{
    validate, AutomatonDocument, DocumentSchema, NoSchema, ValidationResult, ViolationCollector,
};
use crate::doc_op::{
    AnnotationBoundaryMap, AnnotationMap, AnnotationsUpdate, Attributes, AttributesUpdate,
    DocInitialization, DocInitializationBuffer, DocInitializationCursor, DocOp, DocOpCursor,
    ValueChange,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsumeError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    SchemaViolation(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Character(char),
    ElementStart { tag: String, attributes: Attributes },
    /// Keeps the tag of the matching start.
    ElementEnd(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    item: Item,
    annotations: AnnotationMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleDocument {
    entries: Vec<Entry>,
}

impl SimpleDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_initialization(init: &DocInitialization) -> Result<Self, ConsumeError> {
        let mut doc = Self::new();
        doc.consume(init.as_op())?;
        Ok(doc)
    }

    /// Applies `op` if it is valid against this document. Nothing changes on
    /// failure.
    pub fn consume(&mut self, op: &DocOp) -> Result<(), ConsumeError> {
        self.consume_with_schema(&NoSchema, op)
    }

    pub fn consume_with_schema(
        &mut self,
        schema: &dyn DocumentSchema,
        op: &DocOp,
    ) -> Result<(), ConsumeError> {
        let mut collector = ViolationCollector::new();
        let result = validate(&mut collector, schema, &*self, op);
        let message = || collector.first_description().unwrap_or_default();
        match result {
            ValidationResult::Valid => {}
            ValidationResult::IllFormed => return Err(ConsumeError::Invalid(message())),
            ValidationResult::InvalidSchema => return Err(ConsumeError::SchemaViolation(message())),
        }
        let mut applier = Applier::new(&self.entries);
        op.apply(&mut applier);
        let entries = applier.finish();
        debug!(
            target: "wave_model::simple_doc",
            "consumed {} components, length {} -> {}",
            op.size(),
            self.entries.len(),
            entries.len()
        );
        self.entries = entries;
        Ok(())
    }

    /// The document as an initialization. Annotations are rendered as
    /// boundaries where their values change.
    pub fn to_initialization(&self) -> DocInitialization {
        let mut buffer = DocInitializationBuffer::new();
        let mut text = String::new();
        let mut current: BTreeMap<&str, &str> = BTreeMap::new();
        for entry in &self.entries {
            let next: BTreeMap<&str, &str> = entry.annotations.iter().collect();
            if let Some(boundary) = boundary_between(&current, &next) {
                flush_text(&mut buffer, &mut text);
                buffer.annotation_boundary(&boundary);
            }
            current = next;
            match &entry.item {
                Item::Character(c) => text.push(*c),
                Item::ElementStart { tag, attributes } => {
                    flush_text(&mut buffer, &mut text);
                    buffer.element_start(tag, attributes);
                }
                Item::ElementEnd(_) => {
                    flush_text(&mut buffer, &mut text);
                    buffer.element_end();
                }
            }
        }
        flush_text(&mut buffer, &mut text);
        if let Some(boundary) = boundary_between(&current, &BTreeMap::new()) {
            buffer.annotation_boundary(&boundary);
        }
        buffer.finish_unchecked()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Concatenated characters, ignoring markup.
    pub fn text(&self) -> String {
        self.entries
            .iter()
            .filter_map(|e| match e.item {
                Item::Character(c) => Some(c),
                _ => None,
            })
            .collect()
    }
}

fn flush_text(buffer: &mut DocInitializationBuffer, text: &mut String) {
    if !text.is_empty() {
        buffer.characters(text);
        text.clear();
    }
}

fn boundary_between(
    current: &BTreeMap<&str, &str>,
    next: &BTreeMap<&str, &str>,
) -> Option<AnnotationBoundaryMap> {
    let end_keys: Vec<String> = current
        .keys()
        .filter(|k| !next.contains_key(*k))
        .map(|k| (*k).to_owned())
        .collect();
    let changes: Vec<ValueChange> = next
        .iter()
        .filter(|(k, v)| current.get(*k) != Some(*v))
        .map(|(k, v)| ValueChange::new(*k, None, Some(v)))
        .collect();
    if end_keys.is_empty() && changes.is_empty() {
        None
    } else {
        Some(AnnotationBoundaryMap::new_unchecked(end_keys, changes))
    }
}

impl AutomatonDocument for SimpleDocument {
    fn length(&self) -> usize {
        self.entries.len()
    }

    fn annotations_at(&self, pos: usize) -> &AnnotationMap {
        self.entries
            .get(pos)
            .map_or(AnnotationMap::empty(), |e| &e.annotations)
    }

    fn attributes_at(&self, pos: usize) -> Option<&Attributes> {
        match &self.entries.get(pos)?.item {
            Item::ElementStart { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    fn char_at(&self, pos: usize) -> Option<char> {
        match self.entries.get(pos)?.item {
            Item::Character(c) => Some(c),
            _ => None,
        }
    }

    fn element_starting_at(&self, pos: usize) -> Option<&str> {
        match &self.entries.get(pos)?.item {
            Item::ElementStart { tag, .. } => Some(tag),
            _ => None,
        }
    }

    fn element_ending_at(&self, pos: usize) -> Option<&str> {
        match &self.entries.get(pos)?.item {
            Item::ElementEnd(tag) => Some(tag),
            _ => None,
        }
    }

    fn nth_enclosing_element_tag(&self, insertion_point: usize, depth: usize) -> Option<&str> {
        let end = insertion_point.min(self.entries.len());
        let mut remaining = depth;
        let mut nesting = 0usize;
        for entry in self.entries[..end].iter().rev() {
            match &entry.item {
                Item::ElementEnd(_) => nesting += 1,
                Item::ElementStart { tag, .. } if nesting == 0 => {
                    if remaining == 0 {
                        return Some(tag);
                    }
                    remaining -= 1;
                }
                Item::ElementStart { .. } => nesting -= 1,
                Item::Character(_) => {}
            }
        }
        None
    }

    fn remaining_characters_in_element(&self, insertion_point: usize) -> usize {
        self.entries
            .iter()
            .skip(insertion_point)
            .take_while(|e| matches!(e.item, Item::Character(_)))
            .count()
    }
}

// ── Applier ────────────────────────────────────────────────────────────────

/// Builds the new entry list while walking a validated operation.
struct Applier<'a> {
    old: &'a [Entry],
    pos: usize,
    out: Vec<Entry>,
    update: AnnotationsUpdate,
    inserted_tags: Vec<String>,
}

impl<'a> Applier<'a> {
    fn new(old: &'a [Entry]) -> Self {
        Self {
            old,
            pos: 0,
            out: Vec::with_capacity(old.len()),
            update: AnnotationsUpdate::new(),
            inserted_tags: Vec::new(),
        }
    }

    fn finish(self) -> Vec<Entry> {
        self.out
    }

    fn insert(&mut self, item: Item) {
        let inherited = match self.pos {
            0 => AnnotationMap::empty(),
            p => self.old.get(p - 1).map_or(AnnotationMap::empty(), |e| &e.annotations),
        };
        let annotations = inherited.update_with(&self.update);
        self.out.push(Entry { item, annotations });
    }

    fn keep(&mut self, change: impl FnOnce(&mut Item)) {
        if let Some(entry) = self.old.get(self.pos) {
            let mut item = entry.item.clone();
            change(&mut item);
            let annotations = entry.annotations.update_with(&self.update);
            self.out.push(Entry { item, annotations });
        }
        self.pos += 1;
    }
}

impl DocInitializationCursor for Applier<'_> {
    fn annotation_boundary(&mut self, map: &AnnotationBoundaryMap) {
        self.update = self.update.compose_with(map);
    }

    fn characters(&mut self, chars: &str) {
        for c in chars.chars() {
            self.insert(Item::Character(c));
        }
    }

    fn element_start(&mut self, tag: &str, attributes: &Attributes) {
        self.inserted_tags.push(tag.to_owned());
        self.insert(Item::ElementStart {
            tag: tag.to_owned(),
            attributes: attributes.clone(),
        });
    }

    fn element_end(&mut self) {
        let tag = self.inserted_tags.pop().unwrap_or_default();
        self.insert(Item::ElementEnd(tag));
    }
}

impl DocOpCursor for Applier<'_> {
    fn retain(&mut self, item_count: usize) {
        for _ in 0..item_count {
            self.keep(|_| {});
        }
    }

    fn delete_characters(&mut self, chars: &str) {
        self.pos += chars.chars().count();
    }

    fn delete_element_start(&mut self, _tag: &str, _attributes: &Attributes) {
        self.pos += 1;
    }

    fn delete_element_end(&mut self) {
        self.pos += 1;
    }

    fn replace_attributes(&mut self, _old: &Attributes, new: &Attributes) {
        self.keep(|item| {
            if let Item::ElementStart { attributes, .. } = item {
                *attributes = new.clone();
            }
        });
    }

    fn update_attributes(&mut self, update: &AttributesUpdate) {
        self.keep(|item| {
            if let Item::ElementStart { attributes, .. } = item {
                *attributes = attributes.update_with_unchecked(update);
            }
        });
    }
}

//! The operation automaton.
//!
//! The automaton walks an operation against an [`AutomatonDocument`] one
//! component at a time. For every component, `check` inspects the current
//! state and reports the first violation it finds without changing anything;
//! `apply` then advances the state. Splitting the two lets a caller stop at
//! the first ill-formed component while still walking past components that
//! merely do not fit the document.

use log::trace;
use wave_model_util::{is_good_rich_text, is_valid_text, is_xml_name};

use super::document::AutomatonDocument;
use super::result::{Violation, ViolationKind};
use super::schema::{DocumentSchema, PermittedCharacters};
use crate::doc_op::{
    AnnotationBoundaryMap, AnnotationMap, AnnotationsUpdate, Attributes, AttributesUpdate,
    DocOpComponent,
};

pub type Check = Result<(), Violation>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocSymbol {
    Character,
    Open,
    Close,
    End,
}

fn show(value: Option<&str>) -> &str {
    value.unwrap_or("null")
}

pub struct DocOpAutomaton<'a> {
    doc: &'a dyn AutomatonDocument,
    schema: &'a dyn DocumentSchema,
    effective_pos: usize,
    resulting_pos: usize,
    insertion_stack: Vec<String>,
    deletion_depth: usize,
    next_required_element: Option<String>,
    annotations_update: AnnotationsUpdate,
    after_annotation_boundary: bool,
    /// Annotations a deletion must leave behind at the current position.
    /// `None` once the walk has run past the end of the document.
    target_annotations_for_deletion: Option<AnnotationMap>,
}

impl<'a> DocOpAutomaton<'a> {
    pub fn new(doc: &'a dyn AutomatonDocument, schema: &'a dyn DocumentSchema) -> Self {
        Self {
            doc,
            schema,
            effective_pos: 0,
            resulting_pos: 0,
            insertion_stack: Vec::new(),
            deletion_depth: 0,
            next_required_element: schema.required_first_child(None).map(str::to_owned),
            annotations_update: AnnotationsUpdate::new(),
            after_annotation_boundary: false,
            target_annotations_for_deletion: Some(AnnotationMap::new()),
        }
    }

    // ── Violations ─────────────────────────────────────────────────────────

    fn violation(&self, kind: ViolationKind, message: impl Into<String>) -> Violation {
        Violation {
            kind,
            message: message.into(),
            original_pos: self.effective_pos,
            resulting_pos: self.resulting_pos,
        }
    }

    fn ill_formed(&self, message: impl Into<String>) -> Check {
        Err(self.violation(ViolationKind::IllFormed, message))
    }

    fn invalid(&self, message: impl Into<String>) -> Check {
        Err(self.violation(ViolationKind::InvalidDocument, message))
    }

    fn schema_violation(&self, message: impl Into<String>) -> Check {
        Err(self.violation(ViolationKind::Schema, message))
    }

    fn old_annotation_differs(&self, key: &str, old: Option<&str>, actual: Option<&str>) -> Check {
        self.invalid(format!(
            "old annotations differ from document: purported old value for key {key} is {}, \
             actual value in document is {}",
            show(old),
            show(actual)
        ))
    }

    // ── Queries ────────────────────────────────────────────────────────────

    pub fn effective_pos(&self) -> usize {
        self.effective_pos
    }

    pub fn resulting_pos(&self) -> usize {
        self.resulting_pos
    }

    /// Items that can still be retained.
    pub fn max_retain_item_count(&self) -> usize {
        self.doc.length().saturating_sub(self.effective_pos)
    }

    /// Keys with an annotation change open at this point of the walk.
    pub fn open_annotations(&self) -> impl Iterator<Item = &str> {
        self.annotations_update.changes().iter().map(|c| c.key.as_str())
    }

    fn effective_doc_symbol(&self) -> DocSymbol {
        let pos = self.effective_pos;
        if pos >= self.doc.length() {
            DocSymbol::End
        } else if self.doc.element_starting_at(pos).is_some() {
            DocSymbol::Open
        } else if self.doc.element_ending_at(pos).is_some() {
            DocSymbol::Close
        } else {
            DocSymbol::Character
        }
    }

    fn effective_enclosing_element_tag(&self) -> Option<&str> {
        if let Some(tag) = self.insertion_stack.last() {
            return Some(tag);
        }
        if self.effective_pos > self.doc.length() {
            return None;
        }
        self.doc.nth_enclosing_element_tag(self.effective_pos, 0)
    }

    fn inherited_annotations(&self) -> &'a AnnotationMap {
        let doc: &'a dyn AutomatonDocument = self.doc;
        if self.effective_pos == 0 || self.effective_pos > doc.length() {
            AnnotationMap::empty()
        } else {
            doc.annotations_at(self.effective_pos - 1)
        }
    }

    fn update_deletion_target_annotations(&mut self) {
        self.target_annotations_for_deletion = if self.effective_pos > self.doc.length() {
            None
        } else {
            Some(self.inherited_annotations().update_with(&self.annotations_update))
        };
    }

    fn is_at_first_child(&self) -> bool {
        self.effective_pos == 0 || self.doc.element_starting_at(self.effective_pos - 1).is_some()
    }

    // ── Shared checks ──────────────────────────────────────────────────────

    fn check_annotations_for_retain(&self, item_count: usize) -> Check {
        let start = self.effective_pos;
        for change in self.annotations_update.changes() {
            let old = change.old_value.as_deref();
            if let Some(pos) = self
                .doc
                .first_annotation_change(start, start + item_count, &change.key, old)
            {
                return self.old_annotation_differs(
                    &change.key,
                    old,
                    self.doc.get_annotation(pos, &change.key),
                );
            }
        }
        Ok(())
    }

    fn check_annotations_for_insertion(&self) -> Check {
        if self.effective_pos > self.doc.length() {
            return Ok(());
        }
        for change in self.annotations_update.changes() {
            let old = change.old_value.as_deref();
            let inherited = match self.effective_pos {
                0 => None,
                pos => self.doc.get_annotation(pos - 1, &change.key),
            };
            if old != inherited {
                return self.old_annotation_differs(&change.key, old, inherited);
            }
        }
        Ok(())
    }

    fn check_annotations_for_deletion(&self, item_count: usize) -> Check {
        let Some(target) = &self.target_annotations_for_deletion else {
            return Ok(());
        };
        let start = self.effective_pos;
        for change in self.annotations_update.changes() {
            let old = change.old_value.as_deref();
            if let Some(pos) = self
                .doc
                .first_annotation_change(start, start + item_count, &change.key, old)
            {
                return self.old_annotation_differs(
                    &change.key,
                    old,
                    self.doc.get_annotation(pos, &change.key),
                );
            }
            if change.new_value.as_deref() != target.get(&change.key) {
                return self.invalid("new annotation value incorrect for deletion");
            }
        }
        for pos in start..start + item_count {
            let here = self.doc.annotations_at(pos);
            let doc_keys = here.keys();
            let target_keys = target.keys();
            for key in doc_keys.chain(target_keys) {
                let in_doc = here.get(key);
                let required = target.get(key);
                if in_doc != required && !self.annotations_update.contains_key(key) {
                    return self.invalid(format!(
                        "deletion does not reset value for key {key} from {} to {}",
                        show(in_doc),
                        show(required)
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_for_insertion_before_required_child(&self) -> Check {
        if self.effective_pos < self.doc.length() && self.insertion_stack.is_empty() {
            let parent = self.doc.nth_enclosing_element_tag(self.effective_pos, 0);
            if self.is_at_first_child() && self.schema.required_first_child(parent).is_some() {
                return self.schema_violation("attempt to insert before required child");
            }
        }
        Ok(())
    }

    fn check_annotation_key(&self, key: &str) -> Check {
        if key.contains(['?', '@']) {
            return self.ill_formed(format!("invalid character in annotation key: {key}"));
        }
        if !is_valid_text(key) {
            return self.ill_formed("annotation key contains invalid unicode");
        }
        Ok(())
    }

    fn check_annotation_value(&self, value: Option<&str>) -> Check {
        match value {
            Some(v) if !is_valid_text(v) => self.ill_formed("annotation value contains invalid unicode"),
            _ => Ok(()),
        }
    }

    fn check_attributes_well_formed(&self, attributes: &Attributes) -> Check {
        let mut previous: Option<&str> = None;
        for (name, value) in attributes.iter() {
            if !is_xml_name(name) {
                return self.ill_formed(format!("attribute name is not an XML Name: \"{name}\""));
            }
            if !is_valid_text(value) {
                return self.ill_formed("attribute value contains invalid unicode");
            }
            if let Some(prev) = previous.filter(|p| *p >= name) {
                return self.ill_formed(format!(
                    "attribute keys not strictly monotonic: {prev} >= {name}"
                ));
            }
            previous = Some(name);
        }
        Ok(())
    }

    fn check_attributes_update_well_formed(&self, update: &AttributesUpdate) -> Check {
        let mut previous: Option<&str> = None;
        for change in update.changes() {
            let key = change.key.as_str();
            if !is_xml_name(key) {
                return self.ill_formed(format!("attribute name is not an XML Name: \"{key}\""));
            }
            if let Some(prev) = previous.filter(|p| *p >= key) {
                return self.ill_formed(format!(
                    "attribute keys not strictly monotonic: {prev} >= {key}"
                ));
            }
            let values = [change.old_value.as_deref(), change.new_value.as_deref()];
            if values.into_iter().flatten().any(|v| !is_valid_text(v)) {
                return self.ill_formed("attribute value contains invalid unicode");
            }
            previous = Some(key);
        }
        Ok(())
    }

    fn check_attributes_permitted(&self, element_type: &str, attributes: &Attributes) -> Check {
        for (name, value) in attributes.iter() {
            if !self.schema.permits_attribute(element_type, name, value) {
                return self.invalid_attribute(element_type, name, value);
            }
        }
        Ok(())
    }

    fn invalid_attribute(&self, element_type: &str, name: &str, value: &str) -> Check {
        self.schema_violation(format!(
            "type {element_type} does not permit attribute {name} with value {value}"
        ))
    }

    /// Tag and attributes of the element start under the cursor.
    fn element_start_here(&self) -> Option<(&'a str, &'a Attributes)> {
        let doc: &'a dyn AutomatonDocument = self.doc;
        if self.effective_doc_symbol() != DocSymbol::Open {
            return None;
        }
        let tag = doc.element_starting_at(self.effective_pos)?;
        let attributes = doc.attributes_at(self.effective_pos).unwrap_or(Attributes::empty());
        Some((tag, attributes))
    }

    // ── Retain ─────────────────────────────────────────────────────────────

    pub fn check_retain(&self, item_count: usize) -> Check {
        if item_count == 0 {
            return self.ill_formed("retain item count not positive");
        }
        if !self.insertion_stack.is_empty() || self.deletion_depth > 0 {
            return self.ill_formed("retain inside insert or delete");
        }
        if item_count > self.max_retain_item_count() {
            return self.invalid(format!(
                "retain past end of document, document length {}, retain item count {item_count}",
                self.doc.length()
            ));
        }
        self.check_annotations_for_retain(item_count)
    }

    pub fn do_retain(&mut self, item_count: usize) {
        self.effective_pos += item_count;
        self.update_deletion_target_annotations();
        self.resulting_pos += item_count;
        self.next_required_element = None;
        self.after_annotation_boundary = false;
    }

    // ── Annotation boundary ────────────────────────────────────────────────

    pub fn check_annotation_boundary(&self, map: &AnnotationBoundaryMap) -> Check {
        if self.after_annotation_boundary {
            return self.ill_formed("adjacent annotation boundaries");
        }
        let end_keys = map.end_keys();
        for (i, key) in end_keys.iter().enumerate() {
            self.check_annotation_key(key)?;
            if i > 0 && end_keys[i - 1] >= *key {
                return self.ill_formed(format!(
                    "annotation keys not strictly monotonic: {} >= {key}",
                    end_keys[i - 1]
                ));
            }
            if !self.annotations_update.contains_key(key) {
                return self.ill_formed(format!("annotation of key {key} ends without having started"));
            }
        }
        let changes = map.changes();
        for (i, change) in changes.iter().enumerate() {
            let key = &change.key;
            self.check_annotation_key(key)?;
            self.check_annotation_value(change.old_value.as_deref())?;
            self.check_annotation_value(change.new_value.as_deref())?;
            if i > 0 && changes[i - 1].key >= *key {
                return self.ill_formed(format!(
                    "annotation keys not strictly monotonic: {} >= {key}",
                    changes[i - 1].key
                ));
            }
            if end_keys.contains(key) {
                return self.ill_formed(format!("annotation boundary contains duplicate key {key}"));
            }
        }
        Ok(())
    }

    pub fn do_annotation_boundary(&mut self, map: &AnnotationBoundaryMap) {
        self.annotations_update = self.annotations_update.compose_with(map);
        self.after_annotation_boundary = true;
    }

    // ── Insertions ─────────────────────────────────────────────────────────

    pub fn check_characters(&self, chars: &str) -> Check {
        if chars.is_empty() {
            return self.ill_formed("characters is empty");
        }
        if !is_valid_text(chars) {
            return self.ill_formed("characters component contains invalid unicode");
        }
        if self.deletion_depth > 0 {
            return self.ill_formed("insertion inside deletion");
        }
        self.check_annotations_for_insertion()?;
        if let Some(required) = &self.next_required_element {
            return self.schema_violation(format!("child element required, expected type {required}"));
        }
        self.check_for_insertion_before_required_child()?;
        let enclosing = self.effective_enclosing_element_tag();
        match self.schema.permitted_characters(enclosing) {
            PermittedCharacters::None => self.schema_violation(format!(
                "element type {} does not allow text content",
                show(enclosing)
            )),
            PermittedCharacters::BlipText if !is_good_rich_text(chars) => {
                self.schema_violation(format!(
                    "element type {} only allows blip text content, not arbitrary characters",
                    show(enclosing)
                ))
            }
            PermittedCharacters::BlipText | PermittedCharacters::Any => Ok(()),
        }
    }

    pub fn do_characters(&mut self, chars: &str) {
        self.update_deletion_target_annotations();
        self.resulting_pos += chars.chars().count();
        self.after_annotation_boundary = false;
    }

    pub fn check_element_start(&self, tag: &str, attributes: &Attributes) -> Check {
        if !is_xml_name(tag) {
            return self.ill_formed(format!("element type is not an XML Name: \"{tag}\""));
        }
        self.check_attributes_well_formed(attributes)?;
        if self.deletion_depth > 0 {
            return self.ill_formed("insertion inside deletion");
        }
        self.check_annotations_for_insertion()?;
        self.check_attributes_permitted(tag, attributes)?;
        let parent = self.effective_enclosing_element_tag();
        if !self.schema.permits_child(parent, tag) {
            return match parent {
                None => self.schema_violation(format!("element type {tag} not permitted at top level")),
                Some(parent) => self.schema_violation(format!(
                    "element type {parent} does not permit subelement type {tag}"
                )),
            };
        }
        self.check_for_insertion_before_required_child()?;
        match &self.next_required_element {
            Some(required) if required != tag => {
                self.schema_violation(format!("element of type {required} required, not {tag}"))
            }
            _ => Ok(()),
        }
    }

    pub fn do_element_start(&mut self, tag: &str, _attributes: &Attributes) {
        self.update_deletion_target_annotations();
        self.insertion_stack.push(tag.to_owned());
        self.next_required_element = self.schema.required_first_child(Some(tag)).map(str::to_owned);
        self.resulting_pos += 1;
        self.after_annotation_boundary = false;
    }

    pub fn check_element_end(&self) -> Check {
        if self.deletion_depth > 0 {
            return self.ill_formed("insertion inside deletion");
        }
        if self.insertion_stack.is_empty() {
            return self.ill_formed("elementEnd with no matching elementStart");
        }
        self.check_annotations_for_insertion()?;
        if let Some(required) = &self.next_required_element {
            return self.schema_violation(format!("child element required, expected type {required}"));
        }
        Ok(())
    }

    pub fn do_element_end(&mut self) {
        self.update_deletion_target_annotations();
        self.insertion_stack.pop();
        self.resulting_pos += 1;
        self.after_annotation_boundary = false;
    }

    // ── Deletions ──────────────────────────────────────────────────────────

    pub fn check_delete_characters(&self, chars: &str) -> Check {
        if chars.is_empty() {
            return self.ill_formed("characters is empty");
        }
        if !is_valid_text(chars) {
            return self.ill_formed("delete characters component contains invalid unicode");
        }
        if !self.insertion_stack.is_empty() {
            return self.ill_formed("deletion inside insertion");
        }
        let attempted = chars.chars().count();
        let len = self.doc.length();
        for (offset, expected) in chars.chars().enumerate() {
            let pos = self.effective_pos + offset;
            let here = if pos < len { self.doc.char_at(pos) } else { None };
            match here {
                None => {
                    return self.invalid(format!(
                        "cannot delete {attempted} characters, only {offset} available"
                    ))
                }
                Some(actual) if actual != expected => {
                    return self.invalid(format!(
                        "attempt to delete character {expected} when the actual character is {actual}"
                    ))
                }
                Some(_) => {}
            }
        }
        self.check_annotations_for_deletion(attempted)
    }

    pub fn do_delete_characters(&mut self, chars: &str) {
        self.effective_pos += chars.chars().count();
        self.after_annotation_boundary = false;
    }

    pub fn check_delete_element_start(&self, tag: &str, attributes: &Attributes) -> Check {
        if !is_xml_name(tag) {
            return self.ill_formed(format!("element type is not an XML Name: \"{tag}\""));
        }
        self.check_attributes_well_formed(attributes)?;
        if !self.insertion_stack.is_empty() {
            return self.ill_formed("deletion inside insertion");
        }
        let Some((actual_tag, actual_attributes)) = self.element_start_here() else {
            return self.invalid("no element start to delete here");
        };
        if actual_tag != tag {
            return self.invalid("old element type differs from document");
        }
        if !attributes.same_content(actual_attributes) {
            return self.invalid("old attributes differ from document");
        }
        self.check_annotations_for_deletion(1)?;
        if self.deletion_depth == 0 && self.effective_pos < self.doc.length() {
            let parent = self.doc.nth_enclosing_element_tag(self.effective_pos, 0);
            if self.is_at_first_child() && self.schema.required_first_child(parent).is_some() {
                return self.schema_violation("attempt to delete required child");
            }
        }
        Ok(())
    }

    pub fn do_delete_element_start(&mut self, _tag: &str, _attributes: &Attributes) {
        self.deletion_depth += 1;
        self.effective_pos += 1;
        self.after_annotation_boundary = false;
    }

    pub fn check_delete_element_end(&self) -> Check {
        if !self.insertion_stack.is_empty() {
            return self.ill_formed("deletion inside insertion");
        }
        if self.deletion_depth == 0 {
            return self.ill_formed("deleteElementEnd with no matching deleteElementStart");
        }
        if self.effective_doc_symbol() != DocSymbol::Close {
            return self.invalid("no element end to delete here");
        }
        self.check_annotations_for_deletion(1)
    }

    pub fn do_delete_element_end(&mut self) {
        self.deletion_depth = self.deletion_depth.saturating_sub(1);
        self.effective_pos += 1;
        self.after_annotation_boundary = false;
    }

    // ── Attribute changes ──────────────────────────────────────────────────

    pub fn check_update_attributes(&self, update: &AttributesUpdate) -> Check {
        self.check_attributes_update_well_formed(update)?;
        if self.deletion_depth > 0 || !self.insertion_stack.is_empty() {
            return self.ill_formed("attribute change inside insert or delete");
        }
        let Some((tag, old_attributes)) = self.element_start_here() else {
            return self.invalid("no element start to change attributes here");
        };
        for change in update.changes() {
            if change.old_value.as_deref() != old_attributes.get(&change.key) {
                return self.invalid("old attributes differ from document");
            }
        }
        self.check_annotations_for_retain(1)?;
        for change in update.changes() {
            if let Some(value) = &change.new_value {
                if !self.schema.permits_attribute(tag, &change.key, value) {
                    return self.invalid_attribute(tag, &change.key, value);
                }
            }
        }
        Ok(())
    }

    pub fn do_update_attributes(&mut self, _update: &AttributesUpdate) {
        self.do_retain(1);
    }

    pub fn check_replace_attributes(&self, old: &Attributes, new: &Attributes) -> Check {
        self.check_attributes_well_formed(old)?;
        self.check_attributes_well_formed(new)?;
        if self.deletion_depth > 0 || !self.insertion_stack.is_empty() {
            return self.ill_formed("attribute change inside insert or delete");
        }
        let Some((tag, actual)) = self.element_start_here() else {
            return self.invalid("no element start to change attributes here");
        };
        if !actual.same_content(old) {
            return self.invalid("old attributes differ from document");
        }
        self.check_annotations_for_retain(1)?;
        self.check_attributes_permitted(tag, new)
    }

    pub fn do_replace_attributes(&mut self, _old: &Attributes, _new: &Attributes) {
        self.do_retain(1);
    }

    // ── Dispatch ───────────────────────────────────────────────────────────

    pub fn check(&self, component: &DocOpComponent) -> Check {
        match component {
            DocOpComponent::Retain(n) => self.check_retain(*n),
            DocOpComponent::Characters(s) => self.check_characters(s),
            DocOpComponent::DeleteCharacters(s) => self.check_delete_characters(s),
            DocOpComponent::ElementStart { tag, attributes } => {
                self.check_element_start(tag, attributes)
            }
            DocOpComponent::ElementEnd => self.check_element_end(),
            DocOpComponent::DeleteElementStart { tag, attributes } => {
                self.check_delete_element_start(tag, attributes)
            }
            DocOpComponent::DeleteElementEnd => self.check_delete_element_end(),
            DocOpComponent::ReplaceAttributes { old, new } => self.check_replace_attributes(old, new),
            DocOpComponent::UpdateAttributes(update) => self.check_update_attributes(update),
            DocOpComponent::AnnotationBoundary(map) => self.check_annotation_boundary(map),
        }
    }

    pub fn apply(&mut self, component: &DocOpComponent) {
        trace!(
            target: "wave_model::automaton",
            "{} at {}/{}",
            component.component_type(),
            self.effective_pos,
            self.resulting_pos
        );
        match component {
            DocOpComponent::Retain(n) => self.do_retain(*n),
            DocOpComponent::Characters(s) => self.do_characters(s),
            DocOpComponent::DeleteCharacters(s) => self.do_delete_characters(s),
            DocOpComponent::ElementStart { tag, attributes } => self.do_element_start(tag, attributes),
            DocOpComponent::ElementEnd => self.do_element_end(),
            DocOpComponent::DeleteElementStart { tag, attributes } => {
                self.do_delete_element_start(tag, attributes)
            }
            DocOpComponent::DeleteElementEnd => self.do_delete_element_end(),
            DocOpComponent::ReplaceAttributes { old, new } => self.do_replace_attributes(old, new),
            DocOpComponent::UpdateAttributes(update) => self.do_update_attributes(update),
            DocOpComponent::AnnotationBoundary(map) => self.do_annotation_boundary(map),
        }
    }

    /// Checks the state after the last component.
    pub fn check_finish(&self) -> Check {
        if !self.insertion_stack.is_empty() {
            return self.ill_formed("elementStart with no matching elementEnd");
        }
        if self.deletion_depth > 0 {
            return self.ill_formed("deleteElementStart with no matching deleteElementEnd");
        }
        if let Some(change) = self.annotations_update.changes().first() {
            return self.ill_formed(format!(
                "annotation of key {} starts but never ends",
                change.key
            ));
        }
        if self.effective_pos != self.doc.length() {
            return self.invalid(format!(
                "operation shorter than document, document length {}, \
                 length of input of operation {}",
                self.doc.length(),
                self.effective_pos
            ));
        }
        Ok(())
    }
}

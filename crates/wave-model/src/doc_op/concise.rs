//! Concise single-line trace of an operation.
//!
//! Every component renders as a short token followed by `"; "`:
//!
//! | component | form |
//! |---|---|
//! | retain | `__5` |
//! | characters / delete characters | `++"abc"` / `--"abc"` |
//! | element start / delete element start | `<< p { a="1" }` / `x< p {}` |
//! | element end / delete element end | `>>` / `x>` |
//! | replace attributes | `r@ {} { a="1" }` |
//! | update attributes | `u@ { a: "1" -> null }` |
//! | annotation boundary | `\|\| { "end", "k": null -> "v" }` |
//!
//! The format is for diagnostics and golden tests. [`parse_concise`] reads it
//! back without validating the result.

use wave_model_util::strings::escape_literal;

use super::annotations::AnnotationBoundaryMap;
use super::attributes::{Attributes, AttributesUpdate, ValueChange};
use super::builder::DocOpBuffer;
use super::cursor::{DocInitializationCursor, DocOpCursor};
use super::op::DocOp;
use super::scanner::{ParseError, Scanner};

// ── Rendering ──────────────────────────────────────────────────────────────

pub fn to_concise_string(op: &DocOp) -> String {
    let mut out = String::new();
    op.apply(&mut ConciseWriter { out: &mut out });
    out
}

fn literal(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("\"{}\"", escape_literal(v)),
        None => "null".to_owned(),
    }
}

pub fn attributes_to_concise_string(attributes: &Attributes) -> String {
    if attributes.is_empty() {
        return "{}".to_owned();
    }
    let entries: Vec<String> = attributes
        .iter()
        .map(|(k, v)| format!("{k}={}", literal(Some(v))))
        .collect();
    format!("{{ {} }}", entries.join(", "))
}

pub fn update_to_concise_string(update: &AttributesUpdate) -> String {
    if update.is_empty() {
        return "{}".to_owned();
    }
    let entries: Vec<String> = update
        .changes()
        .iter()
        .map(|c| format!("{}: {}", c.key, change_values(c)))
        .collect();
    format!("{{ {} }}", entries.join(", "))
}

pub fn boundary_to_concise_string(map: &AnnotationBoundaryMap) -> String {
    if map.is_empty() {
        return "{}".to_owned();
    }
    let ends = map.end_keys().iter().map(|k| literal(Some(k)));
    let changes = map
        .changes()
        .iter()
        .map(|c| format!("{}: {}", literal(Some(&c.key)), change_values(c)));
    let entries: Vec<String> = ends.chain(changes).collect();
    format!("{{ {} }}", entries.join(", "))
}

fn change_values(change: &ValueChange) -> String {
    format!(
        "{} -> {}",
        literal(change.old_value.as_deref()),
        literal(change.new_value.as_deref())
    )
}

struct ConciseWriter<'a> {
    out: &'a mut String,
}

impl ConciseWriter<'_> {
    fn token(&mut self, token: &str) {
        self.out.push_str(token);
        self.out.push_str("; ");
    }
}

impl DocInitializationCursor for ConciseWriter<'_> {
    fn annotation_boundary(&mut self, map: &AnnotationBoundaryMap) {
        self.token(&format!("|| {}", boundary_to_concise_string(map)));
    }

    fn characters(&mut self, chars: &str) {
        self.token(&format!("++{}", literal(Some(chars))));
    }

    fn element_start(&mut self, tag: &str, attributes: &Attributes) {
        self.token(&format!("<< {tag} {}", attributes_to_concise_string(attributes)));
    }

    fn element_end(&mut self) {
        self.token(">>");
    }
}

impl DocOpCursor for ConciseWriter<'_> {
    fn retain(&mut self, item_count: usize) {
        self.token(&format!("__{item_count}"));
    }

    fn delete_characters(&mut self, chars: &str) {
        self.token(&format!("--{}", literal(Some(chars))));
    }

    fn delete_element_start(&mut self, tag: &str, attributes: &Attributes) {
        self.token(&format!("x< {tag} {}", attributes_to_concise_string(attributes)));
    }

    fn delete_element_end(&mut self) {
        self.token("x>");
    }

    fn replace_attributes(&mut self, old: &Attributes, new: &Attributes) {
        self.token(&format!(
            "r@ {} {}",
            attributes_to_concise_string(old),
            attributes_to_concise_string(new)
        ));
    }

    fn update_attributes(&mut self, update: &AttributesUpdate) {
        self.token(&format!("u@ {}", update_to_concise_string(update)));
    }
}

// ── Parsing ────────────────────────────────────────────────────────────────

/// Parses the output of [`to_concise_string`]. The result is not validated;
/// run it through the validator if it came from an untrusted source.
pub fn parse_concise(input: &str) -> Result<DocOp, ParseError> {
    let mut s = Scanner::new(input);
    let mut buffer = DocOpBuffer::new();
    loop {
        s.skip_whitespace();
        if s.is_at_end() {
            break;
        }
        parse_component(&mut s, &mut buffer)?;
        s.skip_whitespace();
        s.expect(';')?;
    }
    Ok(buffer.finish_unchecked())
}

fn parse_component(s: &mut Scanner<'_>, out: &mut DocOpBuffer) -> Result<(), ParseError> {
    if s.eat("__") {
        let n = s.parse_usize()?;
        out.retain(n);
    } else if s.eat("++") {
        let chars = s.parse_literal()?;
        out.characters(&chars);
    } else if s.eat("--") {
        let chars = s.parse_literal()?;
        out.delete_characters(&chars);
    } else if s.eat("<<") {
        let (tag, attributes) = parse_tag_and_attributes(s)?;
        out.element_start(&tag, &attributes);
    } else if s.eat(">>") {
        out.element_end();
    } else if s.eat("x<") {
        let (tag, attributes) = parse_tag_and_attributes(s)?;
        out.delete_element_start(&tag, &attributes);
    } else if s.eat("x>") {
        out.delete_element_end();
    } else if s.eat("r@") {
        s.skip_whitespace();
        let old = parse_attributes(s)?;
        s.skip_whitespace();
        let new = parse_attributes(s)?;
        out.replace_attributes(&old, &new);
    } else if s.eat("u@") {
        s.skip_whitespace();
        let changes = parse_braced(s, |s| {
            let key = parse_name(s)?;
            s.skip_whitespace();
            s.expect(':')?;
            parse_change_values(s, key)
        })?;
        out.update_attributes(&AttributesUpdate::from_changes_unchecked(changes));
    } else if s.eat("||") {
        s.skip_whitespace();
        let map = parse_boundary(s)?;
        out.annotation_boundary(&map);
    } else {
        return Err(s.unexpected());
    }
    Ok(())
}

fn is_name_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '=' | ':' | '{' | '}' | ',' | ';' | '"')
}

fn parse_name(s: &mut Scanner<'_>) -> Result<String, ParseError> {
    let name = s.take_while(is_name_char);
    if name.is_empty() {
        return Err(s.unexpected());
    }
    Ok(name.to_owned())
}

fn parse_tag_and_attributes(s: &mut Scanner<'_>) -> Result<(String, Attributes), ParseError> {
    s.skip_whitespace();
    let tag = parse_name(s)?;
    s.skip_whitespace();
    let attributes = parse_attributes(s)?;
    Ok((tag, attributes))
}

fn parse_attributes(s: &mut Scanner<'_>) -> Result<Attributes, ParseError> {
    let entries = parse_braced(s, |s| {
        let key = parse_name(s)?;
        s.expect('=')?;
        let value = s.parse_literal()?;
        Ok((key, value))
    })?;
    Ok(Attributes::from_pairs_unchecked(entries))
}

fn parse_change_values(s: &mut Scanner<'_>, key: String) -> Result<ValueChange, ParseError> {
    s.skip_whitespace();
    let old_value = s.parse_nullable_literal()?;
    s.skip_whitespace();
    s.expect_str("->")?;
    s.skip_whitespace();
    let new_value = s.parse_nullable_literal()?;
    Ok(ValueChange {
        key,
        old_value,
        new_value,
    })
}

enum BoundaryEntry {
    End(String),
    Change(ValueChange),
}

fn parse_boundary(s: &mut Scanner<'_>) -> Result<AnnotationBoundaryMap, ParseError> {
    let entries = parse_braced(s, |s| {
        let key = s.parse_literal()?;
        s.skip_whitespace();
        if s.eat(":") {
            parse_change_values(s, key).map(BoundaryEntry::Change)
        } else {
            Ok(BoundaryEntry::End(key))
        }
    })?;
    let mut end_keys = Vec::new();
    let mut changes = Vec::new();
    for entry in entries {
        match entry {
            BoundaryEntry::End(key) => end_keys.push(key),
            BoundaryEntry::Change(change) => changes.push(change),
        }
    }
    Ok(AnnotationBoundaryMap::new_unchecked(end_keys, changes))
}

/// `{}` or `{ item, item, ... }`.
fn parse_braced<T>(
    s: &mut Scanner<'_>,
    mut item: impl FnMut(&mut Scanner<'_>) -> Result<T, ParseError>,
) -> Result<Vec<T>, ParseError> {
    s.expect('{')?;
    let mut items = Vec::new();
    s.skip_whitespace();
    if s.eat("}") {
        return Ok(items);
    }
    loop {
        s.skip_whitespace();
        items.push(item(s)?);
        s.skip_whitespace();
        if s.eat(",") {
            continue;
        }
        s.expect('}')?;
        return Ok(items);
    }
}

//! XML rendering of initializations.
//!
//! Elements render as tags (`<p/>` when empty), characters as escaped text
//! and annotation changes as `<?a "key"="value" "ended"?>` processing
//! instructions. Only real changes are rendered: setting a key to the value
//! it already has, or ending a key that is not set, produces nothing. Two
//! initializations describing the same document therefore render the same
//! string, which makes the form usable for equality checks in tests.

use std::collections::{BTreeMap, HashMap};

use wave_model_util::strings::{
    annotation_escape, annotation_unescape, xml_attr_escape, xml_text_escape, xml_unescape,
};

use super::annotations::AnnotationBoundaryMap;
use super::attributes::Attributes;
use super::builder::DocInitializationBuffer;
use super::cursor::DocInitializationCursor;
use super::op::DocInitialization;
use super::scanner::{ParseError, Scanner};

/// Target of the annotation processing instruction.
pub const PI_TARGET: &str = "a";

// ── Rendering ──────────────────────────────────────────────────────────────

pub fn to_xml_string(init: &DocInitialization) -> String {
    let mut writer = XmlWriter::default();
    init.apply(&mut writer);
    writer.flush_pending(">");
    writer.out
}

/// `k="v"` pairs separated by spaces.
pub fn attribute_string(attributes: &Attributes) -> String {
    attributes
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", xml_attr_escape(v)))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Default)]
struct XmlWriter {
    out: String,
    current: HashMap<String, String>,
    tags: Vec<String>,
    /// Start tag whose closing `>` or `/>` depends on what follows.
    pending: Option<String>,
}

impl XmlWriter {
    fn flush_pending(&mut self, close: &str) {
        if let Some(part) = self.pending.take() {
            self.out.push_str(&part);
            self.out.push_str(close);
        }
    }
}

fn quoted_annotation(s: &str) -> String {
    format!("\"{}\"", xml_text_escape(&annotation_escape(s)))
}

impl DocInitializationCursor for XmlWriter {
    fn annotation_boundary(&mut self, map: &AnnotationBoundaryMap) {
        let mut changes: BTreeMap<&str, Option<&str>> = BTreeMap::new();
        for change in map.changes() {
            let new_value = change.new_value.as_deref();
            if self.current.get(&change.key).map(String::as_str) != new_value {
                match new_value {
                    Some(v) => self.current.insert(change.key.clone(), v.to_owned()),
                    None => self.current.remove(&change.key),
                };
                changes.insert(&change.key, new_value);
            }
        }
        for key in map.end_keys() {
            if self.current.remove(key).is_some() {
                changes.insert(key, None);
            }
        }
        if changes.is_empty() {
            return;
        }
        self.flush_pending(">");
        self.out.push_str("<?");
        self.out.push_str(PI_TARGET);
        for (key, value) in changes {
            self.out.push(' ');
            self.out.push_str(&quoted_annotation(key));
            if let Some(v) = value {
                self.out.push('=');
                self.out.push_str(&quoted_annotation(v));
            }
        }
        self.out.push_str("?>");
    }

    fn characters(&mut self, chars: &str) {
        self.flush_pending(">");
        self.out.push_str(&xml_text_escape(chars));
    }

    fn element_start(&mut self, tag: &str, attributes: &Attributes) {
        self.flush_pending(">");
        let part = if attributes.is_empty() {
            format!("<{tag}")
        } else {
            format!("<{tag} {}", attribute_string(attributes))
        };
        self.pending = Some(part);
        self.tags.push(tag.to_owned());
    }

    fn element_end(&mut self) {
        let tag = self.tags.pop();
        if self.pending.is_some() {
            self.flush_pending("/>");
        } else if let Some(tag) = tag {
            self.out.push_str(&format!("</{tag}>"));
        }
    }
}

// ── Parsing ────────────────────────────────────────────────────────────────

/// Parses the XML form back into an initialization.
///
/// An annotation set in a processing instruction becomes a change with no
/// old value; a bare key becomes an end. Tags must balance.
pub fn parse_xml(input: &str) -> Result<DocInitialization, ParseError> {
    let mut s = Scanner::new(input);
    let mut out = DocInitializationBuffer::new();
    let mut open: Vec<String> = Vec::new();
    while !s.is_at_end() {
        if s.eat("<?") {
            let map = parse_processing_instruction(&mut s)?;
            out.annotation_boundary(&map);
        } else if s.eat("</") {
            let tag = parse_tag_name(&mut s)?;
            s.skip_whitespace();
            s.expect('>')?;
            match open.pop() {
                Some(expected) if expected == tag => out.element_end(),
                _ => return Err(s.invalid(format!("unexpected closing tag </{tag}>"))),
            }
        } else if s.eat("<") {
            let tag = parse_tag_name(&mut s)?;
            let attributes = parse_xml_attributes(&mut s)?;
            out.element_start(&tag, &attributes);
            if s.eat("/>") {
                out.element_end();
            } else {
                s.expect('>')?;
                open.push(tag);
            }
        } else {
            let start = s.pos();
            let raw = s.take_while(|c| c != '<');
            let text = xml_unescape(raw).ok_or(ParseError::Invalid {
                message: "bad entity reference".into(),
                offset: start,
            })?;
            out.characters(&text);
        }
    }
    if let Some(tag) = open.last() {
        return Err(s.invalid(format!("element <{tag}> is never closed")));
    }
    Ok(out.finish_unchecked())
}

fn parse_tag_name(s: &mut Scanner<'_>) -> Result<String, ParseError> {
    let name = s.take_while(|c| !c.is_whitespace() && !matches!(c, '/' | '>' | '=' | '<'));
    if name.is_empty() {
        return Err(s.unexpected());
    }
    Ok(name.to_owned())
}

fn parse_xml_attributes(s: &mut Scanner<'_>) -> Result<Attributes, ParseError> {
    let mut pairs = Vec::new();
    loop {
        s.skip_whitespace();
        if s.peek_str("/>") || s.peek_str(">") {
            break;
        }
        let name = parse_tag_name(s)?;
        s.expect('=')?;
        s.expect('"')?;
        let start = s.pos();
        let raw = s.take_until("\"")?;
        s.expect('"')?;
        let value = xml_unescape(raw).ok_or(ParseError::Invalid {
            message: "bad entity reference".into(),
            offset: start,
        })?;
        pairs.push((name, value));
    }
    let offset = s.pos();
    Attributes::from_pairs(pairs).map_err(|e| ParseError::Invalid {
        message: e.to_string(),
        offset,
    })
}

fn parse_processing_instruction(s: &mut Scanner<'_>) -> Result<AnnotationBoundaryMap, ParseError> {
    s.expect_str(PI_TARGET)?;
    let mut builder = AnnotationBoundaryMap::builder();
    loop {
        s.skip_whitespace();
        if s.eat("?>") {
            break;
        }
        let key = parse_annotation_string(s)?;
        if s.eat("=") {
            let value = parse_annotation_string(s)?;
            builder = builder.initialization_value(key, Some(&value));
        } else {
            builder = builder.end(key);
        }
    }
    let offset = s.pos();
    builder.build().map_err(|e| ParseError::Invalid {
        message: e.to_string(),
        offset,
    })
}

/// A quoted, annotation-escaped and XML-escaped string.
fn parse_annotation_string(s: &mut Scanner<'_>) -> Result<String, ParseError> {
    let start = s.pos();
    s.expect('"')?;
    let mut raw = String::new();
    loop {
        match s.advance() {
            None => return Err(ParseError::UnclosedString(start)),
            Some('"') => break,
            Some('\\') => {
                raw.push('\\');
                match s.advance() {
                    Some(c) => raw.push(c),
                    None => return Err(ParseError::UnclosedString(start)),
                }
            }
            Some(c) => raw.push(c),
        }
    }
    xml_unescape(&raw)
        .and_then(|r| annotation_unescape(&r))
        .ok_or(ParseError::InvalidEscape(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc_op::annotations::AnnotationBoundaryMapBuilder;
    use crate::doc_op::builder::DocInitializationBuilder;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        Attributes::from_pairs(pairs.iter().copied()).unwrap()
    }

    fn boundary(
        f: impl FnOnce(AnnotationBoundaryMapBuilder) -> AnnotationBoundaryMapBuilder,
    ) -> AnnotationBoundaryMap {
        f(AnnotationBoundaryMap::builder()).build().unwrap()
    }

    #[test]
    fn renders_elements_text_and_annotations() {
        let init = DocInitializationBuilder::new()
            .element_start("body", Attributes::new())
            .element_start("line", attrs(&[("t", "h1")]))
            .element_end()
            .annotation_boundary(boundary(|b| b.initialization_value("style/weight", Some("bold"))))
            .characters("a < b")
            .annotation_boundary(boundary(|b| b.end("style/weight")))
            .element_end()
            .build()
            .unwrap();
        assert_eq!(
            to_xml_string(&init),
            "<body><line t=\"h1\"/><?a \"style/weight\"=\"bold\"?>a &lt; b<?a \"style/weight\"?></body>"
        );
    }

    #[test]
    fn redundant_annotation_changes_are_not_rendered() {
        let init = DocInitializationBuilder::new()
            .annotation_boundary(boundary(|b| b.initialization_value("k", Some("v"))))
            .characters("a")
            .annotation_boundary(boundary(|b| b.initialization_value("k", Some("v")).end("never-set")))
            .characters("b")
            .annotation_boundary(boundary(|b| b.end("k")))
            .build_unchecked();
        assert_eq!(to_xml_string(&init), "<?a \"k\"=\"v\"?>ab<?a \"k\"?>");
    }

    #[test]
    fn annotation_strings_are_escaped() {
        let init = DocInitializationBuilder::new()
            .annotation_boundary(boundary(|b| b.initialization_value("k", Some("why? <\"x\">"))))
            .characters("z")
            .annotation_boundary(boundary(|b| b.end("k")))
            .build()
            .unwrap();
        let xml = to_xml_string(&init);
        assert_eq!(xml, "<?a \"k\"=\"why\\q &lt;\\\"x\\\"&gt;\"?>z<?a \"k\"?>");
        assert_eq!(to_xml_string(&parse_xml(&xml).unwrap()), xml);
    }

    #[test]
    fn parse_reads_rendered_form() {
        let xml = "<body><p a=\"1\" b=\"&quot;x&quot;\">hi &amp; bye</p><br/></body>";
        let init = parse_xml(xml).unwrap();
        assert_eq!(init.size(), 7);
        assert_eq!(init.element_attributes(1).unwrap().get("b"), Some("\"x\""));
        assert_eq!(init.characters_string(2), Some("hi & bye"));
        assert_eq!(to_xml_string(&init), xml);
    }

    #[test]
    fn parse_rejects_unbalanced_tags() {
        assert!(matches!(parse_xml("<a></b>"), Err(ParseError::Invalid { .. })));
        assert!(matches!(parse_xml("<a>"), Err(ParseError::Invalid { .. })));
        assert!(matches!(parse_xml("text &bogus; here"), Err(ParseError::Invalid { .. })));
    }
}

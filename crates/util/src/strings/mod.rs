//! String escaping for the textual operation forms.
//!
//! The concise trace format quotes literals with `\`-escapes; the XML form
//! uses entity escapes for text and attributes and a backslash scheme for
//! annotation keys and values inside processing instructions.

mod escape;

pub use escape::{
    annotation_escape, annotation_unescape, escape_literal, xml_attr_escape, xml_text_escape,
    xml_unescape,
};

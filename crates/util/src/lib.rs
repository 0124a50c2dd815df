//! wave-model-util - leaf helpers for wave-model.
//!
//! Code point classification for document text and XML names, escaping for
//! the textual operation forms, and a seeded fuzzer for randomized tests.

pub mod code_points;
pub mod fuzzer;
pub mod strings;

pub use code_points::{is_good_rich_text, is_valid_text, is_xml_name, TextCodePoint};
pub use fuzzer::Fuzzer;

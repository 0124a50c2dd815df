//! Code point classification used by document validation.
//!
//! Document text is a sequence of Unicode scalar values, so surrogates never
//! reach these functions. What remains to reject are noncharacters, XML name
//! violations and the code points that are not allowed in rich text.

/// Why a code point is rejected from rich text content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCodePoint {
    Ok,
    Control,
    DeprecatedFormat,
    Bidi,
    Tag,
    Noncharacter,
}

/// Returns true for the 66 Unicode noncharacters.
pub fn is_noncharacter(c: char) -> bool {
    let cp = c as u32;
    let low = cp & 0xFFFF;
    low == 0xFFFE || low == 0xFFFF || (0xFDD0..=0xFDEF).contains(&cp)
}

/// A code point that may appear anywhere in document data.
pub fn is_valid_code_point(c: char) -> bool {
    !is_noncharacter(c)
}

pub fn classify_text_code_point(c: char) -> TextCodePoint {
    let cp = c as u32;
    if is_noncharacter(c) {
        return TextCodePoint::Noncharacter;
    }
    match cp {
        0x00..=0x1F | 0x7F..=0x9F => TextCodePoint::Control,
        0x206A..=0x206F => TextCodePoint::DeprecatedFormat,
        0x200E | 0x200F | 0x202A..=0x202E => TextCodePoint::Bidi,
        0xE0000..=0xE007F => TextCodePoint::Tag,
        _ => TextCodePoint::Ok,
    }
}

/// True when every code point of `s` is valid document data.
pub fn is_valid_text(s: &str) -> bool {
    s.chars().all(is_valid_code_point)
}

/// True when every code point of `s` is acceptable in rich text content.
///
/// Private use code points are permitted.
pub fn is_good_rich_text(s: &str) -> bool {
    s.chars()
        .all(|c| classify_text_code_point(c) == TextCodePoint::Ok)
}

pub fn is_xml_name_start_char(c: char) -> bool {
    let cp = c as u32;
    matches!(c, ':' | 'A'..='Z' | '_' | 'a'..='z')
        || (0xC0..=0xD6).contains(&cp)
        || (0xD8..=0xF6).contains(&cp)
        || (0xF8..=0x2FF).contains(&cp)
        || (0x370..=0x37D).contains(&cp)
        || (0x37F..=0x1FFF).contains(&cp)
        || (0x200C..=0x200D).contains(&cp)
        || (0x2070..=0x218F).contains(&cp)
        || (0x2C00..=0x2FEF).contains(&cp)
        || (0x3001..=0xD7FF).contains(&cp)
        || (0xF900..=0xFDCF).contains(&cp)
        || (0xFDF0..=0xFFFD).contains(&cp)
        || ((0x10000..=0xEFFFF).contains(&cp) && is_valid_code_point(c))
}

pub fn is_xml_name_char(c: char) -> bool {
    if !is_valid_code_point(c) {
        return false;
    }
    let cp = c as u32;
    is_xml_name_start_char(c)
        || matches!(c, '-' | '.' | '0'..='9')
        || cp == 0xB7
        || (0x0300..=0x036F).contains(&cp)
        || (0x203F..=0x2040).contains(&cp)
}

/// `Name ::= NameStartChar (NameChar)*`
pub fn is_xml_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if is_xml_name_start_char(first) => chars.all(is_xml_name_char),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noncharacters() {
        assert!(is_noncharacter('\u{FFFE}'));
        assert!(is_noncharacter('\u{FFFF}'));
        assert!(is_noncharacter('\u{FDD0}'));
        assert!(is_noncharacter('\u{FDEF}'));
        assert!(is_noncharacter('\u{1FFFE}'));
        assert!(is_noncharacter('\u{10FFFF}'));
        assert!(!is_noncharacter('\u{FDCF}'));
        assert!(!is_noncharacter('a'));
    }

    #[test]
    fn test_rich_text_classification() {
        assert_eq!(classify_text_code_point('a'), TextCodePoint::Ok);
        assert_eq!(classify_text_code_point('\n'), TextCodePoint::Control);
        assert_eq!(classify_text_code_point('\u{85}'), TextCodePoint::Control);
        assert_eq!(classify_text_code_point('\u{206B}'), TextCodePoint::DeprecatedFormat);
        assert_eq!(classify_text_code_point('\u{200F}'), TextCodePoint::Bidi);
        assert_eq!(classify_text_code_point('\u{202C}'), TextCodePoint::Bidi);
        assert_eq!(classify_text_code_point('\u{E0041}'), TextCodePoint::Tag);
        assert_eq!(classify_text_code_point('\u{FFFF}'), TextCodePoint::Noncharacter);
        assert_eq!(classify_text_code_point('\u{E000}'), TextCodePoint::Ok);
    }

    #[test]
    fn test_rich_text_strings() {
        assert!(is_good_rich_text("hello world"));
        assert!(is_good_rich_text("caf\u{E9} \u{1F600}"));
        assert!(!is_good_rich_text("line\nbreak"));
        assert!(is_valid_text("line\nbreak"));
        assert!(!is_valid_text("x\u{FDD5}"));
    }

    #[test]
    fn test_xml_names() {
        assert!(is_xml_name("p"));
        assert!(is_xml_name("body"));
        assert!(is_xml_name("_x-1.y"));
        assert!(is_xml_name("ns:tag"));
        assert!(is_xml_name("\u{E9}l\u{E9}ment"));
        assert!(!is_xml_name(""));
        assert!(!is_xml_name("<"));
        assert!(!is_xml_name("1abc"));
        assert!(!is_xml_name("-abc"));
        assert!(!is_xml_name("a b"));
        assert!(!is_xml_name("a\u{FFFE}"));
    }
}

/// Shared scan loop: replaces every char for which `map` returns an escape.
fn escape_with(s: &str, map: impl Fn(char) -> Option<&'static str>) -> String {
    let mut result = String::with_capacity(s.len());
    let mut last = 0;

    for (i, ch) in s.char_indices() {
        if let Some(esc) = map(ch) {
            result.push_str(&s[last..i]);
            result.push_str(esc);
            last = i + ch.len_utf8();
        }
    }

    result.push_str(&s[last..]);
    result
}

/// Escape a string for use inside a double-quoted literal of the concise
/// operation format. Only `\` and `"` are escaped.
///
/// # Examples
///
/// ```
/// use wave_model_util::strings::escape_literal;
///
/// assert_eq!(escape_literal("say \"hi\""), "say \\\"hi\\\"");
/// ```
pub fn escape_literal(s: &str) -> String {
    escape_with(s, |ch| match ch {
        '\\' => Some("\\\\"),
        '"' => Some("\\\""),
        _ => None,
    })
}

/// Escape XML character data: `&`, `<` and `>`.
pub fn xml_text_escape(s: &str) -> String {
    escape_with(s, |ch| match ch {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        _ => None,
    })
}

/// Escape a double-quoted XML attribute value.
pub fn xml_attr_escape(s: &str) -> String {
    escape_with(s, |ch| match ch {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '"' => Some("&quot;"),
        _ => None,
    })
}

/// Escape an annotation key or value for the `<?a ...?>` processing
/// instruction. `?` becomes `\q` so the instruction can never be closed early.
pub fn annotation_escape(s: &str) -> String {
    escape_with(s, |ch| match ch {
        '\\' => Some("\\\\"),
        '"' => Some("\\\""),
        '?' => Some("\\q"),
        _ => None,
    })
}

/// Reverse of [`xml_text_escape`] and [`xml_attr_escape`].
///
/// Understands the five predefined entities. Returns `None` on an unknown or
/// unterminated entity reference.
pub fn xml_unescape(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let semi = tail.find(';')?;
        let decoded = match &tail[..semi] {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => return None,
        };
        result.push(decoded);
        rest = &tail[semi + 1..];
    }
    result.push_str(rest);
    Some(result)
}

/// Reverse of [`annotation_escape`]. Returns `None` on a dangling or unknown
/// escape sequence.
pub fn annotation_unescape(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next()? {
            '\\' => result.push('\\'),
            '"' => result.push('"'),
            'q' => result.push('?'),
            _ => return None,
        }
    }
    Some(result)
}

/// Escapes text for HTML output.
///
/// With `encode` set, every ampersand is rewritten; otherwise an ampersand
/// that already starts a numeric or named character reference is left alone.
/// Code spans and code blocks use the encoding variant so their literal
/// entities survive.
pub(crate) fn escape(text: &str, encode: bool) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    for (idx, ch) in text.char_indices() {
        match ch {
            '&' => {
                if encode || !entity_follows(bytes, idx) {
                    out.push_str("&amp;");
                } else {
                    out.push('&');
                }
            }
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

// `&` at `idx` begins `&#?\w+;`.
fn entity_follows(bytes: &[u8], idx: usize) -> bool {
    let mut j = idx + 1;
    if j < bytes.len() && bytes[j] == b'#' {
        j += 1;
    }
    let start = j;
    while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
        j += 1;
    }
    j > start && j < bytes.len() && bytes[j] == b';'
}

#[cfg(test)]
mod tests {
    use super::escape;

    #[test]
    fn escapes_specials_once() {
        assert_eq!(escape("<a \"b\" & 'c'>", false), "&lt;a &quot;b&quot; &amp; &#39;c&#39;&gt;");
    }

    #[test]
    fn existing_entities_survive_unless_encoding() {
        assert_eq!(escape("fish &amp; chips", false), "fish &amp; chips");
        assert_eq!(escape("x &#39; y", false), "x &#39; y");
        assert_eq!(escape("fish &amp; chips", true), "fish &amp;amp; chips");
    }

    #[test]
    fn bare_ampersand_is_escaped() {
        assert_eq!(escape("a & b", false), "a &amp; b");
        assert_eq!(escape("a &b c", false), "a &amp;b c");
    }

    #[test]
    fn encoding_variant_is_not_idempotent() {
        let once = escape("a < b", true);
        assert_ne!(escape(&once, true), once);
    }
}

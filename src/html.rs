/// Tag allowlist and escaping shared by the parsers and the renderer
use std::borrow::Cow;

/// Tags that open a raw block when they begin a line. The block runs until
/// the matching close tag, nested instances included.
pub const BLOCK_TAGS: &[&str] = &[
    "blockquote", "details", "dl", "figure", "ol", "pre", "table", "ul",
];

/// Tags passed through verbatim when they appear inline
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "br", "caption", "cite", "code", "dd", "del", "dfn", "div", "dt", "em",
    "figcaption", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "ins", "kbd", "li",
    "mark", "p", "q", "s", "samp", "small", "span", "strike", "strong", "sub", "summary", "sup",
    "tbody", "td", "tfoot", "th", "thead", "tr", "tt", "u", "var",
];

pub fn is_block_tag(name: &str) -> bool {
    BLOCK_TAGS.contains(&name)
}

pub fn is_allowed_tag(name: &str) -> bool {
    is_block_tag(name) || INLINE_TAGS.contains(&name)
}

/// Escape `&`, `<` and `>` in text content
pub fn escape_text(text: &str) -> Cow<'_, str> {
    html_escape::encode_text(text)
}

/// Escape a value for use inside a double-quoted attribute
pub fn escape_attribute(value: &str) -> Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(value)
}

/// Encode every character as a numeric character reference, alternating
/// decimal and hexadecimal forms, so addresses are not plain text in the page.
pub fn obfuscate(text: &str) -> String {
    text.chars()
        .enumerate()
        .map(|(i, c)| {
            if i % 2 == 0 {
                format!("&#{};", c as u32)
            } else {
                format!("&#x{:x};", c as u32)
            }
        })
        .collect()
}

/// Tag or comment starting at the `<` at `start`: the lowercase tag name
/// (`None` for a comment) and the position after its closing `>`
pub fn scan_tag(chars: &[char], start: usize) -> Option<(Option<String>, usize)> {
    if chars.get(start) != Some(&'<') {
        return None;
    }
    // Comments pass through whole
    if chars[start + 1..].starts_with(&['!', '-', '-']) {
        let body_start = start + 4;
        let close = body_start
            + chars
                .get(body_start..)?
                .windows(3)
                .position(|window| window == ['-', '-', '>'])?;
        return Some((None, close + 3));
    }

    let mut i = start + 1;
    if chars.get(i) == Some(&'/') {
        i += 1;
    }
    let name_start = i;
    while i < chars.len() && (chars[i].is_ascii_alphabetic() || (i > name_start && chars[i].is_ascii_digit())) {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let name = chars[name_start..i].iter().collect::<String>().to_ascii_lowercase();
    match chars.get(i) {
        Some(&c) if c.is_whitespace() || c == '>' || c == '/' => {}
        _ => return None,
    }

    // Find the end of the tag, skipping quoted attribute values
    let mut quote: Option<char> = None;
    while i < chars.len() {
        match (quote, chars[i]) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, c @ ('"' | '\'')) => quote = Some(c),
            (None, '>') => break,
            (None, '<') => return None,
            _ => {}
        }
        i += 1;
    }
    if i >= chars.len() {
        return None;
    }
    Some((Some(name), i + 1))
}

/// Escape every tag in a raw HTML block whose name is not on the allowlist.
/// Allowed tags, comments and all other text are kept as written.
pub fn neutralize_tags(block: &str) -> String {
    let chars: Vec<char> = block.chars().collect();
    let mut out = String::with_capacity(block.len());
    let mut i = 0;
    while i < chars.len() {
        let Some((name, end)) = scan_tag(&chars, i) else {
            out.push(chars[i]);
            i += 1;
            continue;
        };
        let tag: String = chars[i..end].iter().collect();
        match name {
            Some(name) if !is_allowed_tag(&name) => {
                log::debug!("neutralized <{}> tag", name);
                out.push_str(&escape_text(&tag));
            }
            _ => out.push_str(&tag),
        }
        i = end;
    }
    out
}

/// Length in chars of a character reference starting at `start` (`&amp;`,
/// `&#167;`, `&#xA7;`), if there is one
pub fn entity_len(chars: &[char], start: usize) -> Option<usize> {
    if chars.get(start) != Some(&'&') {
        return None;
    }
    let after_amp = start + 1;
    let (body_start, max_len, valid): (usize, usize, fn(&char) -> bool) =
        if chars.get(after_amp) == Some(&'#') {
            if matches!(chars.get(after_amp + 1), Some('x' | 'X')) {
                (after_amp + 2, 6, char::is_ascii_hexdigit)
            } else {
                (after_amp + 1, 7, char::is_ascii_digit)
            }
        } else if chars.get(after_amp).is_some_and(char::is_ascii_alphabetic) {
            (after_amp, 32, char::is_ascii_alphanumeric)
        } else {
            return None;
        };

    let mut i = body_start;
    while i < chars.len() && valid(&chars[i]) {
        i += 1;
    }
    let body_len = i - body_start;
    if body_len == 0 || body_len > max_len || chars.get(i) != Some(&';') {
        return None;
    }
    Some(i + 1 - start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(text: &str) -> Option<usize> {
        let chars: Vec<char> = text.chars().collect();
        entity_len(&chars, 0)
    }

    #[test]
    fn recognizes_character_references() {
        assert_eq!(entity("&amp; rest"), Some(5));
        assert_eq!(entity("&sect;"), Some(6));
        assert_eq!(entity("&#167;"), Some(6));
        assert_eq!(entity("&#xA7;"), Some(6));
    }

    #[test]
    fn rejects_bare_ampersands() {
        assert_eq!(entity("& "), None);
        assert_eq!(entity("&amp"), None);
        assert_eq!(entity("&#;"), None);
        assert_eq!(entity("&#xZZ;"), None);
        assert_eq!(entity("&1abc;"), None);
    }

    #[test]
    fn allowlist() {
        assert!(is_allowed_tag("table"));
        assert!(is_allowed_tag("span"));
        assert!(!is_allowed_tag("script"));
        assert!(is_block_tag("blockquote"));
        assert!(!is_block_tag("span"));
    }

    #[test]
    fn scans_tags_and_comments() {
        let chars: Vec<char> = "<a href=\"x>y\">".chars().collect();
        assert_eq!(scan_tag(&chars, 0), Some((Some("a".to_string()), chars.len())));
        let chars: Vec<char> = "<!-- c -->".chars().collect();
        assert_eq!(scan_tag(&chars, 0), Some((None, chars.len())));
        let chars: Vec<char> = "< a>".chars().collect();
        assert_eq!(scan_tag(&chars, 0), None);
    }

    #[test]
    fn neutralizes_disallowed_tags_in_blocks() {
        assert_eq!(
            neutralize_tags("<table>\n<tr><td><script>alert(1)</script> &amp; 1 < 2</td></tr>\n</table>"),
            "<table>\n<tr><td>&lt;script&gt;alert(1)&lt;/script&gt; &amp; 1 < 2</td></tr>\n</table>"
        );
        assert_eq!(neutralize_tags("<ul>\n<li><!-- x --></li>\n</ul>"), "<ul>\n<li><!-- x --></li>\n</ul>");
    }

    #[test]
    fn obfuscation_alternates_reference_forms() {
        assert_eq!(obfuscate("a@b"), "&#97;&#x40;&#98;");
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_text("a < b & c > d"), "a &lt; b &amp; c &gt; d");
        assert_eq!(escape_attribute("say \"hi\""), "say &quot;hi&quot;");
    }
}

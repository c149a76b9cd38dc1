/// Documentation comment extraction. A documentation comment is a `/* ... */`
/// span whose opening matches the configured marker (`/**` by default); each
/// of its lines that starts with the decoration asterisk contributes the rest
/// of the line, verbatim, to the block text.
use regex::Regex;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct CommentExtractor {
    opening: Regex,
}

impl CommentExtractor {
    /// `marker` is matched against the text starting at a comment's `/*`
    pub fn new(marker: &str) -> Result<Self> {
        let opening = Regex::new(&format!("^(?:{})", marker))?;
        Ok(CommentExtractor { opening })
    }

    /// Lazily yields the text of each documentation comment in `source`
    pub fn blocks<'e, 's>(&'e self, source: &'s str) -> CommentBlocks<'e, 's> {
        CommentBlocks {
            opening: &self.opening,
            lines: source.lines(),
            pending: None,
        }
    }
}

pub struct CommentBlocks<'e, 's> {
    opening: &'e Regex,
    lines: std::str::Lines<'s>,
    /// Unscanned tail of a line after a comment closed on it
    pending: Option<&'s str>,
}

impl<'e, 's> CommentBlocks<'e, 's> {
    fn next_line(&mut self) -> Option<&'s str> {
        match self.pending.take() {
            Some(rest) => Some(rest),
            None => self.lines.next(),
        }
    }

    /// Skip an ordinary comment whose body continues past the current line
    fn skip_comment(&mut self) {
        for line in self.lines.by_ref() {
            if let Some(close) = line.find("*/") {
                self.pending = Some(&line[close + 2..]);
                return;
            }
        }
    }

    /// Collect the decorated lines of a comment until its closing `*/`
    fn collect_body(&mut self, first: &'s str) -> String {
        let mut body: Vec<&str> = Vec::new();
        if !first.trim().is_empty() {
            body.push(first);
        }

        for line in self.lines.by_ref() {
            let (content, closed) = match line.find("*/") {
                Some(close) => {
                    self.pending = Some(&line[close + 2..]);
                    (&line[..close], true)
                }
                None => (line, false),
            };
            if let Some(text) = strip_decoration(content) {
                body.push(text);
            }
            if closed {
                break;
            }
        }

        // Blank lines at either end carry no structure
        while body.last().is_some_and(|line| line.trim().is_empty()) {
            body.pop();
        }
        let leading = body.iter().take_while(|line| line.trim().is_empty()).count();
        body[leading..].join("\n")
    }
}

impl Iterator for CommentBlocks<'_, '_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let line = self.next_line()?;
            let Some(open) = find_comment_open(line) else {
                continue;
            };
            let body_start = open + 2;
            let close = line[body_start..].find("*/").map(|pos| body_start + pos);

            let Some(marker) = self.opening.find(&line[open..]) else {
                match close {
                    Some(close) => self.pending = Some(&line[close + 2..]),
                    None => self.skip_comment(),
                }
                continue;
            };
            let text_start = open + marker.end().max(2);

            match close {
                Some(close) => {
                    // A comment on a single line is a block of its own
                    self.pending = Some(&line[close + 2..]);
                    let text = line.get(text_start..close).unwrap_or("");
                    if !text.trim().is_empty() {
                        return Some(text.to_string());
                    }
                }
                None => {
                    let body = self.collect_body(line.get(text_start..).unwrap_or(""));
                    if !body.is_empty() {
                        return Some(body);
                    }
                }
            }
        }
    }
}

/// Byte offset of the first `/*` outside string and character literals,
/// unless a `//` line comment starts first
fn find_comment_open(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match (in_string, bytes[i]) {
            (true, b'\\') => i += 1,
            (true, b'"') => in_string = false,
            (false, b'"') => in_string = true,
            // `'"'` and `'\''`
            (false, b'\'') => {
                let len = if bytes.get(i + 1) == Some(&b'\\') { 3 } else { 2 };
                if bytes.get(i + len) == Some(&b'\'') {
                    i += len;
                }
            }
            (false, b'/') => match bytes.get(i + 1) {
                Some(b'/') => return None,
                Some(b'*') => return Some(i),
                _ => {}
            },
            _ => {}
        }
        i += 1;
    }
    None
}

/// Strip leading whitespace and the decoration asterisk; `None` for lines
/// that do not carry one
fn strip_decoration(line: &str) -> Option<&str> {
    line.trim_start().strip_prefix('*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(source: &str) -> Vec<String> {
        CommentExtractor::new(r"/\*\*")
            .unwrap()
            .blocks(source)
            .collect()
    }

    #[test]
    fn strips_decoration_and_keeps_blank_lines() {
        let source = "/**\n * Title\n *\n * Body  \n */\nint x;\n";
        assert_eq!(extract(source), vec![" Title\n\n Body  ".to_string()]);
    }

    #[test]
    fn keeps_whitespace_after_asterisk() {
        let source = "/**\n *\tcode\n *    more\n * \n */";
        assert_eq!(extract(source), vec!["\tcode\n    more".to_string()]);
    }

    #[test]
    fn ignores_lines_without_asterisk() {
        let source = "/**\n * kept\n   dropped\n * also kept\n */";
        assert_eq!(extract(source), vec![" kept\n also kept".to_string()]);
    }

    #[test]
    fn skips_plain_comments_and_code() {
        let source = "/* plain\n * not docs\n */\n// line comment /** nope */\nint main() {}\n";
        assert!(extract(source).is_empty());
    }

    #[test]
    fn slashes_inside_literals_do_not_hide_comments() {
        let source = "s = \"http://x\"; /** doc */\nc = '/'; d = '\"'; /** more */\n";
        assert_eq!(extract(source), vec![" doc ".to_string(), " more ".to_string()]);
        assert_eq!(find_comment_open("x = \"/* not */\";"), None);
        assert_eq!(find_comment_open("y(); // /** no */"), None);
    }

    #[test]
    fn single_line_comments_are_separate_blocks() {
        let source = "/** first */\ncode();\n\t/** second */ more(); /* skip */\n";
        assert_eq!(
            extract(source),
            vec![" first ".to_string(), " second ".to_string()]
        );
    }

    #[test]
    fn empty_doc_comment_yields_nothing() {
        assert!(extract("/**/\n/** */\n").is_empty());
    }

    #[test]
    fn text_after_opening_marker_is_kept() {
        let source = "/** Heading\n * body */";
        assert_eq!(extract(source), vec![" Heading\n body ".to_string()]);
    }

    #[test]
    fn custom_marker() {
        let extractor = CommentExtractor::new(r"/\*!").unwrap();
        let blocks: Vec<String> = extractor.blocks("/*! doc */\n/** not this */").collect();
        assert_eq!(blocks, vec![" doc ".to_string()]);
    }
}

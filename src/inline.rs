/// Inline formatting and the resolution pass, run once every definition is
/// in the reference tables. Footnotes are numbered here by first reference.
use std::collections::HashMap;

use crate::ast::{Block, Footnote, Inline, plain_text};
use crate::config::Options;
use crate::error::{Diagnostics, ReferenceKind, Result, Warning};
use crate::html;
use crate::parser::Parser;
use crate::refs::{LinkTarget, ReferenceTables, normalize_label};
use crate::toc::HeadingIndex;

/// A run of `*`, `_` or `~` that may open or close a span
#[derive(Debug, Clone, PartialEq)]
struct DelimiterRun {
    delimiter: char,
    count: usize,
    can_open: bool,
    can_close: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Span(Inline),
    Run(DelimiterRun),
}

#[derive(Debug, Clone)]
enum FootnoteSource {
    Defined(Vec<Block>),
    Inline(String),
}

#[derive(Debug, Clone)]
struct PendingFootnote {
    label: String,
    source: FootnoteSource,
}

pub struct InlineParser<'a> {
    options: &'a Options,
    tables: &'a ReferenceTables,
    headings: &'a HeadingIndex,
    // Footnote number n is footnotes[n - 1]
    footnotes: Vec<PendingFootnote>,
    footnote_numbers: HashMap<String, usize>,
    diagnostics: Diagnostics,
}

impl<'a> InlineParser<'a> {
    pub fn new(
        options: &'a Options,
        tables: &'a ReferenceTables,
        headings: &'a HeadingIndex,
        diagnostics: Diagnostics,
    ) -> Self {
        InlineParser {
            options,
            tables,
            headings,
            footnotes: Vec::new(),
            footnote_numbers: HashMap::new(),
            diagnostics,
        }
    }

    /// Fill the spans of every heading and paragraph in the tree
    pub fn resolve_blocks(&mut self, blocks: &mut [Block]) {
        for block in blocks {
            match block {
                Block::Heading { content, .. } | Block::Paragraph(content) => {
                    content.spans = self.parse(&content.source);
                }
                Block::List { items, .. } => {
                    for item in items {
                        self.resolve_blocks(&mut item.blocks);
                    }
                }
                Block::BlockQuote(children) => self.resolve_blocks(children),
                // Footnote bodies are resolved when referenced
                _ => {}
            }
        }
    }

    /// Resolve the bodies of all referenced footnotes in number order. A body
    /// may reference further footnotes; they are appended and resolved in turn.
    pub fn resolve_footnotes(&mut self, parser: &Parser<'_>) -> Result<Vec<Footnote>> {
        let mut resolved = Vec::new();
        let mut next = 0;

        while next < self.footnotes.len() {
            let pending = &self.footnotes[next];
            let label = pending.label.clone();
            let mut blocks = match &pending.source {
                FootnoteSource::Defined(blocks) => blocks.clone(),
                FootnoteSource::Inline(text) => parser.parse_fragment(text)?,
            };
            self.resolve_blocks(&mut blocks);
            resolved.push(Footnote {
                number: next + 1,
                label,
                blocks,
            });
            next += 1;
        }

        Ok(resolved)
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    /// Parse one span of raw text
    pub fn parse(&mut self, text: &str) -> Vec<Inline> {
        let chars: Vec<char> = text.chars().collect();
        let spans = self.parse_spans(&chars, true);
        self.expand_abbreviations(spans)
    }

    fn parse_spans(&mut self, chars: &[char], allow_links: bool) -> Vec<Inline> {
        let pieces = self.scan(chars, allow_links);
        process_emphasis(pieces)
    }

    /// Split text into literal spans, finished constructs and delimiter runs
    fn scan(&mut self, chars: &[char], allow_links: bool) -> Vec<Piece> {
        let mut pieces = Vec::new();
        let mut text = String::new();
        // Position right after a backslash escape, with the escaped character
        let mut escaped: Option<(usize, char)> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let after_escape = match escaped {
                Some((pos, ch)) if pos == i => Some(ch),
                _ => None,
            };

            match c {
                '\\' => match chars.get(i + 1).copied() {
                    // Backslash at the end of a line
                    Some('\n') => {
                        push_line_break(&mut pieces, &mut text);
                        i += 2;
                    }
                    Some(next) if next.is_ascii_punctuation() => {
                        text.push(next);
                        escaped = Some((i + 2, next));
                        i += 2;
                    }
                    _ => {
                        text.push('\\');
                        i += 1;
                    }
                },
                '`' => {
                    if let Some((code, next)) = try_code_span(chars, i) {
                        flush_text(&mut pieces, &mut text);
                        pieces.push(Piece::Span(Inline::Code(code)));
                        i = next;
                    } else {
                        // Unmatched backtick run is literal
                        let run = count_run(chars, i, '`');
                        text.extend(&chars[i..i + run]);
                        i += run;
                    }
                }
                '&' => match html::entity_len(chars, i) {
                    Some(len) => {
                        flush_text(&mut pieces, &mut text);
                        pieces.push(Piece::Span(Inline::Entity(chars[i..i + len].iter().collect())));
                        i += len;
                    }
                    None => {
                        text.push('&');
                        i += 1;
                    }
                },
                '<' => {
                    if let Some((span, next)) = try_autolink(chars, i).or_else(|| try_raw_html(chars, i)) {
                        flush_text(&mut pieces, &mut text);
                        pieces.push(Piece::Span(span));
                        i = next;
                    } else {
                        text.push('<');
                        i += 1;
                    }
                }
                '!' if allow_links && chars.get(i + 1) == Some(&'[') => {
                    if let Some((image, next)) = self.try_link(chars, i + 1, true) {
                        flush_text(&mut pieces, &mut text);
                        pieces.push(Piece::Span(image));
                        i = next;
                    } else {
                        text.push('!');
                        i += 1;
                    }
                }
                // An escaped `!` keeps the bracket that follows it literal
                '[' if allow_links && after_escape != Some('!') => {
                    let parsed = if chars.get(i + 1) == Some(&'^') {
                        self.try_footnote(chars, i)
                    } else {
                        self.try_link(chars, i, false)
                    };
                    match parsed {
                        Some((span, next)) => {
                            flush_text(&mut pieces, &mut text);
                            pieces.push(Piece::Span(span));
                            i = next;
                        }
                        None => {
                            text.push('[');
                            i += 1;
                        }
                    }
                }
                '*' | '_' | '~' => {
                    let count = count_run(chars, i, c);
                    match self.delimiter_run(chars, i, count, after_escape) {
                        Some(run) => {
                            flush_text(&mut pieces, &mut text);
                            pieces.push(Piece::Run(run));
                        }
                        None => text.extend(&chars[i..i + count]),
                    }
                    i += count;
                }
                // Two trailing spaces force a break
                '\n' if text.ends_with("  ") => {
                    push_line_break(&mut pieces, &mut text);
                    i += 1;
                }
                _ => {
                    text.push(c);
                    i += 1;
                }
            }
        }

        flush_text(&mut pieces, &mut text);
        pieces
    }

    /// Classify a delimiter run, or `None` when it can only be literal text
    fn delimiter_run(
        &self,
        chars: &[char],
        start: usize,
        count: usize,
        after_escape: Option<char>,
    ) -> Option<DelimiterRun> {
        let delimiter = chars[start];
        // `\**` is an escaped star followed by a literal one
        if after_escape == Some(delimiter) || (delimiter == '~' && count < 2) {
            return None;
        }

        let prev = start.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(start + count).copied();
        let left_flanking = next.is_some_and(|c| !c.is_whitespace());
        let right_flanking = prev.is_some_and(|c| !c.is_whitespace());

        let (can_open, can_close) = if delimiter == '_' && !self.options.classic_underscore() {
            // Underscores inside a word stay literal
            (
                left_flanking && !prev.is_some_and(char::is_alphanumeric),
                right_flanking && !next.is_some_and(char::is_alphanumeric),
            )
        } else {
            (left_flanking, right_flanking)
        };

        if !can_open && !can_close {
            return None;
        }
        Some(DelimiterRun {
            delimiter,
            count,
            can_open,
            can_close,
        })
    }

    /// `[^label]` referencing a definition, or `[^text]` defining an
    /// anonymous footnote in place when no definition matches
    fn try_footnote(&mut self, chars: &[char], start: usize) -> Option<(Inline, usize)> {
        let close = find_bracket_close(chars, start)?;
        let content: String = chars[start + 2..close].iter().collect();
        if content.trim().is_empty() {
            return None;
        }
        let next = close + 1;

        let key = normalize_label(&content);
        if let Some(&number) = self.footnote_numbers.get(&key) {
            let span = Inline::FootnoteRef {
                label: content,
                number,
                first: false,
            };
            return Some((span, next));
        }
        if let Some(blocks) = self.tables.footnote(&content) {
            let source = FootnoteSource::Defined(blocks.to_vec());
            let number = self.register_footnote(Some(&content), source);
            self.footnote_numbers.insert(key, number);
            let span = Inline::FootnoteRef {
                label: content,
                number,
                first: true,
            };
            return Some((span, next));
        }

        if is_footnote_label(&content) {
            self.diagnostics.warn(Warning::UnresolvedReference {
                kind: ReferenceKind::Footnote,
                label: content,
            });
            return None;
        }
        let number = self.register_footnote(None, FootnoteSource::Inline(content));
        let span = Inline::FootnoteRef {
            label: number.to_string(),
            number,
            first: true,
        };
        Some((span, next))
    }

    fn register_footnote(&mut self, label: Option<&str>, source: FootnoteSource) -> usize {
        let number = self.footnotes.len() + 1;
        self.footnotes.push(PendingFootnote {
            label: label.map_or_else(|| number.to_string(), str::to_string),
            source,
        });
        number
    }

    /// Inline `[text](url "title")`, reference `[text][label]`,
    /// `[text] [label]` and `[text][]`, or shortcut `[label]`.
    /// `open` is the position of the `[`.
    fn try_link(&mut self, chars: &[char], open: usize, image: bool) -> Option<(Inline, usize)> {
        let close = find_bracket_close(chars, open)?;
        let text_chars = &chars[open + 1..close];
        let text: String = text_chars.iter().collect();
        let after = close + 1;

        if chars.get(after) == Some(&'(')
            && let Some((url, title, next)) = parse_inline_destination(chars, after)
        {
            let target = LinkTarget { url, title };
            return Some((self.build_link(text_chars, target, image), next));
        }

        // Reference form; the label may be separated from the text by spaces
        let mut label_open = after;
        while chars.get(label_open) == Some(&' ') {
            label_open += 1;
        }
        if chars.get(label_open) == Some(&'[')
            && chars.get(label_open + 1) != Some(&'^')
            && let Some(label_close) = find_bracket_close(chars, label_open)
        {
            let label: String = chars[label_open + 1..label_close].iter().collect();
            let label = if label.trim().is_empty() { text } else { label };
            return match self.resolve_label(&label) {
                Some(target) => Some((self.build_link(text_chars, target, image), label_close + 1)),
                None => {
                    self.diagnostics.warn(Warning::UnresolvedReference {
                        kind: ReferenceKind::Link,
                        label,
                    });
                    None
                }
            };
        }

        // Shortcut form: only definitions, and an unknown label is plain text
        let target = self.tables.link(&text)?.clone();
        Some((self.build_link(text_chars, target, image), after))
    }

    fn build_link(&mut self, text_chars: &[char], target: LinkTarget, image: bool) -> Inline {
        let children = self.parse_spans(text_chars, false);
        if image {
            Inline::Image {
                target: target.url,
                title: target.title,
                alt: plain_text(&children),
            }
        } else {
            Inline::Link {
                target: target.url,
                title: target.title,
                children,
            }
        }
    }

    /// A reference definition, or failing that a heading named by its text
    /// or anchor
    fn resolve_label(&self, label: &str) -> Option<LinkTarget> {
        if let Some(target) = self.tables.link(label) {
            return Some(target.clone());
        }
        self.headings.anchor_for(label).map(|anchor| LinkTarget {
            url: format!("#{}", anchor),
            title: None,
        })
    }

    /// Wrap whole-word abbreviation matches in text spans. Code, raw HTML
    /// and autolinks are left alone.
    fn expand_abbreviations(&self, spans: Vec<Inline>) -> Vec<Inline> {
        let mut result = Vec::new();
        for span in spans {
            match span {
                Inline::Text(text) => {
                    let mut last = 0;
                    for (start, end, expansion) in self.tables.abbreviations_in(&text) {
                        if start > last {
                            result.push(Inline::Text(text[last..start].to_string()));
                        }
                        result.push(Inline::Abbreviation {
                            term: text[start..end].to_string(),
                            expansion: expansion.to_string(),
                        });
                        last = end;
                    }
                    if last < text.len() {
                        result.push(Inline::Text(text[last..].to_string()));
                    }
                }
                Inline::Emphasis(children) => result.push(Inline::Emphasis(self.expand_abbreviations(children))),
                Inline::Strong(children) => result.push(Inline::Strong(self.expand_abbreviations(children))),
                Inline::Strikethrough(children) => {
                    result.push(Inline::Strikethrough(self.expand_abbreviations(children)))
                }
                Inline::Link {
                    target,
                    title,
                    children,
                } => result.push(Inline::Link {
                    target,
                    title,
                    children: self.expand_abbreviations(children),
                }),
                other => result.push(other),
            }
        }
        result
    }
}

/// Pair closers with the nearest matching opener, innermost first.
/// Unpaired delimiters become literal text.
fn process_emphasis(mut pieces: Vec<Piece>) -> Vec<Inline> {
    let mut closer = 0;

    while closer < pieces.len() {
        let (delimiter, closer_count) = match &pieces[closer] {
            Piece::Run(run) if run.can_close && run.count > 0 => (run.delimiter, run.count),
            _ => {
                closer += 1;
                continue;
            }
        };
        // Strike-through always takes two
        if delimiter == '~' && closer_count < 2 {
            closer += 1;
            continue;
        }

        let opener = (0..closer).rev().find(|&idx| {
            matches!(&pieces[idx], Piece::Run(run)
                if run.delimiter == delimiter
                    && run.can_open
                    && run.count > 0
                    && (delimiter != '~' || run.count >= 2))
        });

        let Some(opener) = opener else {
            // Nothing to close; it may still open a later span
            if let Piece::Run(run) = &mut pieces[closer] {
                run.can_close = false;
            }
            closer += 1;
            continue;
        };

        let opener_count = match &pieces[opener] {
            Piece::Run(run) => run.count,
            Piece::Span(_) => 0,
        };
        let used = if delimiter == '~' || (opener_count >= 2 && closer_count >= 2) {
            2
        } else {
            1
        };

        let inner: Vec<Piece> = pieces.drain(opener + 1..closer).collect();
        let children = flatten(inner);
        let span = match (delimiter, used) {
            ('~', _) => Inline::Strikethrough(children),
            (_, 2) => Inline::Strong(children),
            _ => Inline::Emphasis(children),
        };
        pieces.insert(opener + 1, Piece::Span(span));

        if let Piece::Run(run) = &mut pieces[opener] {
            run.count -= used;
        }
        // The closer now sits right after the new span; it is examined
        // again in case delimiters remain
        closer = opener + 2;
        if let Piece::Run(run) = &mut pieces[closer] {
            run.count -= used;
        }
    }

    flatten(pieces)
}

/// Turn leftover runs into text and merge neighbouring text spans
fn flatten(pieces: Vec<Piece>) -> Vec<Inline> {
    let mut result: Vec<Inline> = Vec::new();
    for piece in pieces {
        match piece {
            Piece::Run(run) => {
                if run.count > 0 {
                    let literal: String = std::iter::repeat_n(run.delimiter, run.count).collect();
                    push_text(&mut result, &literal);
                }
            }
            Piece::Span(Inline::Text(text)) => push_text(&mut result, &text),
            Piece::Span(span) => result.push(span),
        }
    }
    result
}

fn push_text(spans: &mut Vec<Inline>, text: &str) {
    if let Some(Inline::Text(last)) = spans.last_mut() {
        last.push_str(text);
    } else {
        spans.push(Inline::Text(text.to_string()));
    }
}

fn flush_text(pieces: &mut Vec<Piece>, text: &mut String) {
    if !text.is_empty() {
        pieces.push(Piece::Span(Inline::Text(std::mem::take(text))));
    }
}

fn push_line_break(pieces: &mut Vec<Piece>, text: &mut String) {
    text.truncate(text.trim_end_matches(' ').len());
    flush_text(pieces, text);
    pieces.push(Piece::Span(Inline::LineBreak));
}

fn count_run(chars: &[char], start: usize, c: char) -> usize {
    chars[start..].iter().take_while(|&&ch| ch == c).count()
}

/// Footnote labels are single words; anything else is an inline footnote
fn is_footnote_label(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// Position of the `]` matching the `[` at `open`. Escapes and code spans
/// are skipped.
fn find_bracket_close(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0;
    let mut i = open;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                i += 2;
                continue;
            }
            '`' => {
                if let Some((_, next)) = try_code_span(chars, i) {
                    i = next;
                    continue;
                }
            }
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// `(url "title")` starting at the `(`. Returns the unescaped url, the
/// title and the position after the `)`.
fn parse_inline_destination(chars: &[char], open: usize) -> Option<(String, Option<String>, usize)> {
    let mut i = open + 1;
    skip_whitespace(chars, &mut i);

    let url = if chars.get(i) == Some(&'<') {
        let start = i + 1;
        let end = start + chars[start..].iter().position(|&c| c == '>' || c == '\n')?;
        if chars[end] != '>' {
            return None;
        }
        i = end + 1;
        chars[start..end].iter().collect()
    } else {
        let start = i;
        let mut depth = 0;
        while i < chars.len() {
            match chars[i] {
                '\\' if i + 1 < chars.len() => {
                    i += 2;
                    continue;
                }
                '(' => depth += 1,
                ')' if depth == 0 => break,
                ')' => depth -= 1,
                c if c.is_whitespace() => break,
                _ => {}
            }
            i += 1;
        }
        unescape(&chars[start..i.min(chars.len())])
    };

    skip_whitespace(chars, &mut i);

    let title = match chars.get(i).copied() {
        Some(quote @ ('"' | '\'' | '(')) => {
            let close = if quote == '(' { ')' } else { quote };
            let start = i + 1;
            let mut j = start;
            while j < chars.len() && chars[j] != close {
                if chars[j] == '\\' {
                    j += 1;
                }
                j += 1;
            }
            if j >= chars.len() {
                return None;
            }
            i = j + 1;
            Some(unescape(&chars[start..j]))
        }
        _ => None,
    };

    skip_whitespace(chars, &mut i);
    if chars.get(i) != Some(&')') {
        return None;
    }
    Some((url, title, i + 1))
}

fn skip_whitespace(chars: &[char], i: &mut usize) {
    while *i < chars.len() && chars[*i].is_whitespace() {
        *i += 1;
    }
}

/// Drop the backslash of every escaped punctuation character
fn unescape(chars: &[char]) -> String {
    let mut result = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && chars.get(i + 1).is_some_and(char::is_ascii_punctuation) {
            i += 1;
        }
        result.push(chars[i]);
        i += 1;
    }
    result
}

fn try_code_span(chars: &[char], start: usize) -> Option<(String, usize)> {
    let backtick_count = count_run(chars, start, '`');
    let content_start = start + backtick_count;
    let mut j = content_start;

    // Look for a closing run of exactly the same length
    while j < chars.len() {
        if chars[j] == '`' {
            let close_start = j;
            let close_count = count_run(chars, j, '`');
            j += close_count;

            if close_count == backtick_count {
                let mut content: String = chars[content_start..close_start].iter().collect();

                // Convert line endings to spaces
                content = content.replace(['\n', '\r'], " ");

                // Strip single leading and trailing space if present and content isn't all spaces
                if content.len() > 2
                    && content.starts_with(' ')
                    && content.ends_with(' ')
                    && !content.trim().is_empty()
                {
                    content = content[1..content.len() - 1].to_string();
                }

                return Some((content, j));
            }
        } else {
            j += 1;
        }
    }

    None
}

fn try_autolink(chars: &[char], start: usize) -> Option<(Inline, usize)> {
    // Collect content until '>' or newline
    let content_start = start + 1;
    let mut i = content_start;
    while i < chars.len() && chars[i] != '>' && chars[i] != '\n' && chars[i] != '<' {
        i += 1;
    }

    // Must end with '>'
    if i >= chars.len() || chars[i] != '>' {
        return None;
    }

    let content: String = chars[content_start..i].iter().collect();
    if content.is_empty() || content.contains(char::is_whitespace) {
        return None;
    }

    if is_email_address(&content) {
        return Some((
            Inline::Autolink {
                target: content,
                email: true,
            },
            i + 1,
        ));
    }
    if is_absolute_uri(&content) {
        return Some((
            Inline::Autolink {
                target: content,
                email: false,
            },
            i + 1,
        ));
    }

    None
}

fn is_absolute_uri(text: &str) -> bool {
    // Scheme: 2-32 chars, starts with letter, followed by letters/digits/+/./-
    let Some(colon_pos) = text.find(':') else {
        return false;
    };
    let scheme = &text[..colon_pos];

    if scheme.len() < 2 || scheme.len() > 32 {
        return false;
    }
    if !scheme.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return false;
    }
    if !scheme
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '.' | '-'))
    {
        return false;
    }

    // Must have something after colon
    colon_pos + 1 < text.len()
}

fn is_email_address(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };

    if local.is_empty()
        || !local
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ".!#$%&'*+/=?^_`{|}~-".contains(ch))
    {
        return false;
    }

    // Each domain label: alphanumeric at both ends, hyphens inside
    !domain.is_empty()
        && domain.split('.').all(|part| {
            !part.is_empty()
                && part.len() <= 63
                && part.starts_with(|c: char| c.is_ascii_alphanumeric())
                && part.ends_with(|c: char| c.is_ascii_alphanumeric())
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Inline tag or comment. Tags outside the allowlist become text.
fn try_raw_html(chars: &[char], start: usize) -> Option<(Inline, usize)> {
    let (name, end) = html::scan_tag(chars, start)?;
    let tag: String = chars[start..end].iter().collect();
    match name {
        Some(name) if !html::is_allowed_tag(&name) => {
            log::debug!("neutralized <{}> tag", name);
            Some((Inline::Text(tag), end))
        }
        _ => Some((Inline::RawHtml(tag), end)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::InlineText;
    use crate::config::EmphasisMode;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    fn parse_with(options: &Options, input: &str) -> Vec<Inline> {
        let tables = ReferenceTables::default();
        let headings = HeadingIndex::default();
        InlineParser::new(options, &tables, &headings, Diagnostics::new()).parse(input)
    }

    fn parse(input: &str) -> Vec<Inline> {
        parse_with(&Options::default(), input)
    }

    #[test]
    fn strong_and_word_internal_emphasis() {
        assert_eq!(
            parse("**bold** and *em*phasis"),
            vec![
                Inline::Strong(vec![text("bold")]),
                text(" and "),
                Inline::Emphasis(vec![text("em")]),
                text("phasis"),
            ]
        );
    }

    #[test]
    fn padded_markers_are_literal() {
        assert_eq!(parse("a * b * c"), vec![text("a * b * c")]);
        assert_eq!(parse("** not strong **"), vec![text("** not strong **")]);
    }

    #[test]
    fn word_internal_underscores() {
        assert_eq!(parse("snake_case_name"), vec![text("snake_case_name")]);
        assert_eq!(parse("_whole_"), vec![Inline::Emphasis(vec![text("whole")])]);

        let classic = Options {
            emphasis: EmphasisMode::Classic,
            ..Options::default()
        };
        assert_eq!(
            parse_with(&classic, "a_b_c"),
            vec![text("a"), Inline::Emphasis(vec![text("b")]), text("c")]
        );
    }

    #[test]
    fn nested_styles() {
        assert_eq!(
            parse("_You **can** mix `code`_"),
            vec![Inline::Emphasis(vec![
                text("You "),
                Inline::Strong(vec![text("can")]),
                text(" mix "),
                Inline::Code("code".to_string()),
            ])]
        );
    }

    #[test]
    fn escapes_suppress_emphasis() {
        assert_eq!(parse(r"\*not\* emphasized"), vec![text("*not* emphasized")]);
        assert_eq!(parse(r"\__literal\__"), vec![text("__literal__")]);
        assert_eq!(parse(r"\~~literal\~~"), vec![text("~~literal~~")]);
    }

    #[test]
    fn strikethrough() {
        assert_eq!(
            parse("~~gone~~ ~single~"),
            vec![Inline::Strikethrough(vec![text("gone")]), text(" ~single~")]
        );
    }

    #[test]
    fn code_spans() {
        assert_eq!(parse("``a`b``"), vec![Inline::Code("a`b".to_string())]);
        assert_eq!(
            parse("`*not em*` and ` `` `"),
            vec![
                Inline::Code("*not em*".to_string()),
                text(" and "),
                Inline::Code("``".to_string()),
            ]
        );
        assert_eq!(parse("a ` b"), vec![text("a ` b")]);
    }

    #[test]
    fn line_breaks() {
        assert_eq!(
            parse("one  \ntwo \\\nthree\nfour"),
            vec![
                text("one"),
                Inline::LineBreak,
                text("two"),
                Inline::LineBreak,
                text("three\nfour"),
            ]
        );
    }

    #[test]
    fn entities_and_raw_html() {
        assert_eq!(
            parse("a &amp; b <span class=\"x\">y</span> <script>"),
            vec![
                text("a "),
                Inline::Entity("&amp;".to_string()),
                text(" b "),
                Inline::RawHtml("<span class=\"x\">".to_string()),
                text("y"),
                Inline::RawHtml("</span>".to_string()),
                text(" <script>"),
            ]
        );
        assert_eq!(
            parse("x <!-- note --> y"),
            vec![text("x "), Inline::RawHtml("<!-- note -->".to_string()), text(" y")]
        );
    }

    #[test]
    fn autolinks() {
        assert_eq!(
            parse("<http://example.com> <me@example.com> <nope>"),
            vec![
                Inline::Autolink {
                    target: "http://example.com".to_string(),
                    email: false,
                },
                text(" "),
                Inline::Autolink {
                    target: "me@example.com".to_string(),
                    email: true,
                },
                text(" <nope>"),
            ]
        );
    }

    #[test]
    fn inline_links_and_images() {
        assert_eq!(
            parse("[a *b*](/x \"T\") ![alt *text*](/i.png)"),
            vec![
                Inline::Link {
                    target: "/x".to_string(),
                    title: Some("T".to_string()),
                    children: vec![text("a "), Inline::Emphasis(vec![text("b")])],
                },
                text(" "),
                Inline::Image {
                    target: "/i.png".to_string(),
                    title: None,
                    alt: "alt text".to_string(),
                },
            ]
        );
    }

    #[test]
    fn escaped_bang_and_bracket_stay_literal() {
        assert_eq!(parse(r"\![not](x)"), vec![text("![not](x)")]);
        assert_eq!(parse(r"\[not](x)"), vec![text("[not](x)")]);
    }

    fn definitions() -> Vec<Block> {
        vec![
            Block::ReferenceDef {
                label: "ref".to_string(),
                target: "http://example.com".to_string(),
                title: Some("Title".to_string()),
            },
            Block::FootnoteDef {
                label: "note".to_string(),
                blocks: vec![Block::Paragraph(InlineText::new("body"))],
            },
            Block::AbbreviationDef {
                term: "HTML".to_string(),
                expansion: "Hypertext Markup Language".to_string(),
            },
        ]
    }

    #[test]
    fn reference_links_resolve_case_insensitively() {
        let options = Options::default();
        let mut diagnostics = Diagnostics::new();
        let tables = ReferenceTables::collect(&definitions(), &mut diagnostics);
        let mut blocks = vec![Block::Heading {
            level: 2,
            content: InlineText::new("Block Level Formatting"),
            anchor: String::new(),
        }];
        let headings = HeadingIndex::assign(&mut blocks);
        let mut parser = InlineParser::new(&options, &tables, &headings, diagnostics);

        let expected = Inline::Link {
            target: "http://example.com".to_string(),
            title: Some("Title".to_string()),
            children: vec![text("link")],
        };
        assert_eq!(parse_one(&mut parser, "[link][REF]"), expected);
        assert_eq!(parse_one(&mut parser, "[link] [ref]"), expected);
        assert_eq!(
            parse_one(&mut parser, "[ref][]"),
            Inline::Link {
                target: "http://example.com".to_string(),
                title: Some("Title".to_string()),
                children: vec![text("ref")],
            }
        );
        assert_eq!(
            parse_one(&mut parser, "[text][Block Level Formatting]"),
            Inline::Link {
                target: "#block-level-formatting".to_string(),
                title: None,
                children: vec![text("text")],
            }
        );
        assert!(parser.into_diagnostics().is_empty());
    }

    fn parse_one(parser: &mut InlineParser<'_>, input: &str) -> Inline {
        let mut spans = parser.parse(input);
        assert_eq!(spans.len(), 1, "{:?}", spans);
        spans.remove(0)
    }

    #[test]
    fn unresolved_references_stay_literal_and_warn() {
        let options = Options::default();
        let tables = ReferenceTables::default();
        let headings = HeadingIndex::default();
        let mut parser = InlineParser::new(&options, &tables, &headings, Diagnostics::new());

        assert_eq!(parser.parse("[a][missing] [^gone] [plain]"), vec![text("[a][missing] [^gone] [plain]")]);
        assert_eq!(
            parser.into_diagnostics().into_warnings(),
            vec![
                Warning::UnresolvedReference {
                    kind: ReferenceKind::Link,
                    label: "missing".to_string(),
                },
                Warning::UnresolvedReference {
                    kind: ReferenceKind::Footnote,
                    label: "gone".to_string(),
                },
            ]
        );
    }

    #[test]
    fn footnotes_are_numbered_by_first_use() {
        let options = Options::default();
        let mut diagnostics = Diagnostics::new();
        let tables = ReferenceTables::collect(&definitions(), &mut diagnostics);
        let headings = HeadingIndex::default();
        let mut parser = InlineParser::new(&options, &tables, &headings, diagnostics);

        let spans = parser.parse("a[^inline *text*] b[^note] c[^NOTE]");
        let refs: Vec<(usize, bool)> = spans
            .iter()
            .filter_map(|span| match span {
                Inline::FootnoteRef { number, first, .. } => Some((*number, *first)),
                _ => None,
            })
            .collect();
        assert_eq!(refs, vec![(1, true), (2, true), (2, false)]);

        let block_parser = Parser::new(&options);
        let footnotes = parser.resolve_footnotes(&block_parser).unwrap();
        assert_eq!(footnotes.len(), 2);
        assert_eq!(footnotes[0].label, "1");
        assert_eq!(footnotes[1].label, "note");
        let Block::Paragraph(body) = &footnotes[0].blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(body.spans, vec![text("inline "), Inline::Emphasis(vec![text("text")])]);
    }

    #[test]
    fn abbreviations_skip_code_and_partial_words() {
        let options = Options::default();
        let mut diagnostics = Diagnostics::new();
        let tables = ReferenceTables::collect(&definitions(), &mut diagnostics);
        let headings = HeadingIndex::default();
        let mut parser = InlineParser::new(&options, &tables, &headings, diagnostics);

        assert_eq!(
            parser.parse("The HTML standard, not HTML5 or `HTML`, *HTML*"),
            vec![
                text("The "),
                Inline::Abbreviation {
                    term: "HTML".to_string(),
                    expansion: "Hypertext Markup Language".to_string(),
                },
                text(" standard, not HTML5 or "),
                Inline::Code("HTML".to_string()),
                text(", "),
                Inline::Emphasis(vec![Inline::Abbreviation {
                    term: "HTML".to_string(),
                    expansion: "Hypertext Markup Language".to_string(),
                }]),
            ]
        );
    }
}

/// Block-level parser for the documentation dialect
///
/// Each line is tested against the block rules in a fixed priority order;
/// the first rule that matches owns the line. Lists and footnote bodies are
/// parsed recursively over their dedented content.
use crate::ast::{Block, CodeKind, Document, InlineText, ItemMarker, ListItem};
use crate::config::Options;
use crate::error::{Error, MalformedReason, Result};
use crate::html;

/// Where a run of lines is being parsed. Inside list items indented code
/// is not recognized and any list marker may start a nested list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    TopLevel,
    ListItem,
}

pub struct Parser<'o> {
    options: &'o Options,
}

impl<'o> Parser<'o> {
    pub fn new(options: &'o Options) -> Self {
        Parser { options }
    }

    /// Structural parse. Inline content is captured unresolved.
    pub fn parse(&self, input: &str) -> Result<Document> {
        let blocks = self.parse_blocks(input, Context::TopLevel, 1)?;
        Ok(Document {
            blocks,
            ..Document::default()
        })
    }

    /// Parse text that is not part of the document flow, such as the body of
    /// an inline footnote
    pub fn parse_fragment(&self, input: &str) -> Result<Vec<Block>> {
        self.parse_blocks(input, Context::ListItem, 1)
    }

    fn parse_blocks(&self, input: &str, context: Context, first_line: usize) -> Result<Vec<Block>> {
        let lines: Vec<&str> = input.lines().collect();
        let mut blocks = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            let line_no = first_line + i;

            if is_blank(line) {
                i += 1;
            }
            // Fenced code first: nothing inside it is structure
            else if let Some(info) = self.fence_start(line) {
                let (block, consumed) = self.parse_fenced_code(&lines[i..], info, line_no)?;
                blocks.push(block);
                i += consumed;
            } else if context == Context::TopLevel && self.is_code_line(line) {
                let (block, consumed) = self.parse_indented_code(&lines[i..]);
                blocks.push(block);
                i += consumed;
            } else if self.is_toc_placeholder(line) {
                blocks.push(Block::TableOfContents);
                i += 1;
            } else if let Some(tag) = self.raw_html_start(line) {
                let (block, consumed) = self.parse_raw_html(&lines[i..], tag, line_no)?;
                blocks.push(block);
                i += consumed;
            } else if let Some((block, consumed)) = self.parse_definition(&lines[i..], line_no)? {
                blocks.push(block);
                i += consumed;
            }
            // Rules before list markers: `* * *` is not a list
            else if self.is_horizontal_rule(line) {
                blocks.push(Block::HorizontalRule);
                i += 1;
            } else if let Some((level, text)) = self.parse_atx_heading(line) {
                blocks.push(heading(level, text));
                i += 1;
            } else if self.is_blockquote_start(line) {
                let (block, consumed) = self.parse_blockquote(&lines[i..]);
                blocks.push(block);
                i += consumed;
            } else if self.list_marker(line).is_some() {
                let (block, consumed) = self.parse_list(&lines[i..], line_no)?;
                blocks.push(block);
                i += consumed;
            } else if let Some(level) = lines.get(i + 1).and_then(|next| self.setext_level(next)) {
                blocks.push(heading(level, line.trim()));
                i += 2;
            } else {
                let (block, consumed) = self.parse_paragraph(&lines[i..], context);
                blocks.push(block);
                i += consumed;
            }
        }

        Ok(blocks)
    }

    /// Collect paragraph lines until a blank line or a line that starts
    /// another block
    fn parse_paragraph(&self, lines: &[&str], context: Context) -> (Block, usize) {
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            if is_blank(line) {
                break;
            }
            if i > 0 {
                if self.interrupts_paragraph(line, context) {
                    break;
                }
                // The line above an underline is a heading of its own
                if lines.get(i + 1).is_some_and(|next| self.setext_level(next).is_some()) {
                    break;
                }
            }
            i += 1;
        }
        (Block::Paragraph(InlineText::new(paragraph_text(&lines[..i]))), i)
    }

    fn interrupts_paragraph(&self, line: &str, context: Context) -> bool {
        self.fence_start(line).is_some()
            || (context == Context::TopLevel && self.is_code_line(line))
            || self.is_toc_placeholder(line)
            || self.raw_html_start(line).is_some()
            || split_definition(line).is_some()
            || self.is_horizontal_rule(line)
            || self.parse_atx_heading(line).is_some()
            || self.is_blockquote_start(line)
            // In running prose only `1.` may open an ordered list, so a
            // sentence that starts with a number stays text
            || self.list_marker(line).is_some_and(|marker| {
                context == Context::ListItem || !marker.ordered || marker.number == 1
            })
    }

    fn parse_atx_heading<'l>(&self, line: &'l str) -> Option<(u8, &'l str)> {
        let trimmed = line.trim_start();

        // Count leading # characters
        let hash_count = trimmed.chars().take_while(|&c| c == '#').count();
        if hash_count == 0 || hash_count > 6 {
            return None;
        }

        let after_hashes = &trimmed[hash_count..];

        // Must have space after hashes (or be end of line)
        if !after_hashes.is_empty() && !after_hashes.starts_with([' ', '\t']) {
            return None;
        }

        let text = after_hashes.trim();

        // A closing run of # counts only when it is separated from the text
        let without_closing = text.trim_end_matches('#');
        let text = if without_closing.is_empty() {
            ""
        } else if without_closing.ends_with([' ', '\t']) {
            without_closing.trim_end()
        } else {
            text
        };

        Some((hash_count as u8, text))
    }

    /// `=` underlines make level 1, `-` underlines (two or more) level 2
    fn setext_level(&self, line: &str) -> Option<u8> {
        let trimmed = line.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c == '=') {
            Some(1)
        } else if trimmed.len() >= 2 && trimmed.chars().all(|c| c == '-') {
            Some(2)
        } else {
            None
        }
    }

    fn is_horizontal_rule(&self, line: &str) -> bool {
        // Three or more matching -, * or _ characters, optionally spaced
        let chars_only: String = line.chars().filter(|c| !c.is_whitespace()).collect();

        if chars_only.len() < 3 {
            return false;
        }

        let first_char = match chars_only.chars().next() {
            Some(c @ ('-' | '_' | '*')) => c,
            _ => return false,
        };

        chars_only.chars().all(|c| c == first_char)
    }

    fn is_toc_placeholder(&self, line: &str) -> bool {
        let trimmed = line.trim();
        trimmed.eq_ignore_ascii_case("[toc]") || trimmed.eq_ignore_ascii_case("![toc]")
    }

    /// A leading tab or four leading spaces
    fn is_code_line(&self, line: &str) -> bool {
        !is_blank(line) && (line.starts_with('\t') || line.starts_with("    "))
    }

    /// A block keeps to one kind of indentation: tab lines or space lines
    fn parse_indented_code(&self, lines: &[&str]) -> (Block, usize) {
        let tabbed = lines[0].starts_with('\t');
        let kind = if tabbed {
            CodeKind::TabIndented
        } else {
            CodeKind::SpaceIndented
        };
        let continues = |line: &str| self.is_code_line(line) && line.starts_with('\t') == tabbed;
        let mut code_lines: Vec<&str> = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];

            if continues(line) {
                let dedented = line
                    .strip_prefix('\t')
                    .or_else(|| line.strip_prefix("    "))
                    .unwrap_or(line);
                code_lines.push(dedented);
                i += 1;
            } else if is_blank(line) {
                // Blank lines belong to the block only when more code follows
                let mut j = i + 1;
                while j < lines.len() && is_blank(lines[j]) {
                    j += 1;
                }
                if j < lines.len() && continues(lines[j]) {
                    code_lines.extend(std::iter::repeat_n("", j - i));
                    i = j;
                } else {
                    break;
                }
            } else {
                break;
            }
        }

        let literal = code_lines.join("\n") + "\n";
        (Block::CodeBlock { kind, literal }, i)
    }

    /// Check if a line opens a fenced code block.
    /// Returns the info word, if any, following the fence.
    fn fence_start(&self, line: &str) -> Option<Option<String>> {
        let fence = self.options.fence.as_str();
        let fence_char = fence.chars().next()?;
        let after_fence = line.trim_start().strip_prefix(fence)?;

        // A fence character after the fence is inline code, not a fence
        if after_fence.contains(fence_char) {
            return None;
        }

        Some(after_fence.split_whitespace().next().map(str::to_string))
    }

    fn is_closing_fence(&self, line: &str) -> bool {
        line.trim() == self.options.fence
    }

    fn parse_fenced_code(
        &self,
        lines: &[&str],
        info: Option<String>,
        line_no: usize,
    ) -> Result<(Block, usize)> {
        // Content is dedented by the fence's own indentation
        let fence_indent = indent_columns(lines[0]);
        let mut code_lines = Vec::new();

        for (i, line) in lines.iter().enumerate().skip(1) {
            if self.is_closing_fence(line) {
                let literal = if code_lines.is_empty() {
                    String::new()
                } else {
                    code_lines.join("\n") + "\n"
                };
                let block = Block::CodeBlock {
                    kind: CodeKind::Fenced { info },
                    literal,
                };
                return Ok((block, i + 1));
            }
            code_lines.push(remove_indent(line, fence_indent));
        }

        Err(Error::malformed(line_no, MalformedReason::UnterminatedFence))
    }

    /// Name of an allowlisted block tag opening the line
    fn raw_html_start(&self, line: &str) -> Option<String> {
        let name = opening_tag_name(line.trim_start())?;
        html::is_block_tag(&name).then_some(name)
    }

    /// Pass lines through until the opening tag's depth returns to zero
    fn parse_raw_html(&self, lines: &[&str], tag: String, line_no: usize) -> Result<(Block, usize)> {
        let mut depth: i64 = 0;

        for (i, line) in lines.iter().enumerate() {
            depth += tag_depth_change(line, &tag);
            if depth <= 0 {
                let html = html::neutralize_tags(&lines[..=i].join("\n"));
                return Ok((Block::RawHtml { tag, html }, i + 1));
            }
        }

        Err(Error::malformed(line_no, MalformedReason::UnterminatedHtml(tag)))
    }

    /// `[label]: target "title"`, `[^label]: text` or `*[Term]: expansion`
    fn parse_definition(&self, lines: &[&str], line_no: usize) -> Result<Option<(Block, usize)>> {
        let Some((kind, label, rest)) = split_definition(lines[0]) else {
            return Ok(None);
        };
        let label = label.trim();

        match kind {
            DefinitionKind::Abbreviation => Ok(Some((
                Block::AbbreviationDef {
                    term: label.to_string(),
                    expansion: rest.trim().to_string(),
                },
                1,
            ))),
            DefinitionKind::Link => Ok(parse_link_definition(label, rest, lines[0], lines.get(1).copied())),
            DefinitionKind::Footnote => {
                // The body continues on lines indented deeper than the definition
                let base_indent = indent_columns(lines[0]);
                let mut body = vec![rest.trim()];
                let mut i = 1;
                while i < lines.len()
                    && !is_blank(lines[i])
                    && indent_columns(lines[i]) > base_indent
                    && split_definition(lines[i]).is_none()
                {
                    body.push(lines[i].trim());
                    i += 1;
                }
                let blocks = self.parse_blocks(&body.join("\n"), Context::ListItem, line_no)?;
                let block = Block::FootnoteDef {
                    label: label.to_string(),
                    blocks,
                };
                Ok(Some((block, i)))
            }
        }
    }

    fn is_blockquote_start(&self, line: &str) -> bool {
        line.trim_start().starts_with('>')
    }

    /// Quotes hold paragraphs only. A line without `>` continues the quote
    /// when it follows quoted text; a blank line ends it.
    fn parse_blockquote(&self, lines: &[&str]) -> (Block, usize) {
        let mut quote_lines: Vec<&str> = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];

            if self.is_blockquote_start(line) {
                quote_lines.push(strip_blockquote_marker(line));
            } else if is_blank(line) {
                break;
            } else {
                let follows_text = quote_lines.last().is_some_and(|last| !is_blank(last));
                if !follows_text || self.interrupts_paragraph(line, Context::TopLevel) {
                    break;
                }
                quote_lines.push(line);
            }
            i += 1;
        }

        let paragraphs = quote_lines
            .split(|line| is_blank(line))
            .filter(|group| !group.is_empty())
            .map(|group| Block::Paragraph(InlineText::new(paragraph_text(group))))
            .collect();

        (Block::BlockQuote(paragraphs), i)
    }

    fn list_marker(&self, line: &str) -> Option<ListMarker> {
        let trimmed = line.trim_start();
        let leading_bytes = line.len() - trimmed.len();
        let indent = indent_columns(line);

        let (ordered, number, marker_len) = match trimmed.chars().next()? {
            '-' | '+' | '*' => (false, 1, 1),
            c if c.is_ascii_digit() => {
                let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
                if digits > 9 || !trimmed[digits..].starts_with('.') {
                    return None;
                }
                (true, trimmed[..digits].parse().ok()?, digits + 1)
            }
            _ => return None,
        };

        // Must be followed by whitespace or end of line
        let after_marker = &trimmed[marker_len..];
        if !after_marker.is_empty() && !after_marker.starts_with([' ', '\t']) {
            return None;
        }

        // More than four spaces after the marker: only one is spacing
        let spacing = after_marker.len() - after_marker.trim_start_matches([' ', '\t']).len();
        let spacing = if spacing > 4 { 1 } else { spacing };

        Some(ListMarker {
            indent,
            ordered,
            number,
            content_start: leading_bytes + marker_len + spacing,
            content_col: indent + marker_len + spacing.max(1),
        })
    }

    /// Collect consecutive items of the same kind into one list
    fn parse_list(&self, lines: &[&str], line_no: usize) -> Result<(Block, usize)> {
        let Some(first) = self.list_marker(lines[0]) else {
            return Ok(self.parse_paragraph(lines, Context::TopLevel));
        };
        let mut items = Vec::new();
        let mut tight = true;
        let mut i = 0;

        while i < lines.len() {
            let Some(marker) = self.list_marker(lines[i]) else {
                break;
            };
            if marker.ordered != first.ordered {
                // Different list type, stop this list
                break;
            }

            let (item, consumed) = self.parse_list_item(&lines[i..], marker, line_no + i)?;
            items.push(item);
            i += consumed;

            // Only truly empty lines reach here; whitespace-only lines are
            // absorbed by the item. A sibling after them makes the list loose.
            let mut j = i;
            while j < lines.len() && is_blank(lines[j]) {
                j += 1;
            }
            if j > i {
                let sibling_follows = lines.get(j).and_then(|line| self.list_marker(line))
                    .is_some_and(|next| next.ordered == first.ordered);
                if !sibling_follows {
                    break;
                }
                tight = false;
                i = j;
            }
        }

        let block = Block::List {
            ordered: first.ordered,
            start: first.number,
            tight,
            items,
        };
        Ok((block, i))
    }

    /// Parse a single list item: its first line plus every following line
    /// indented past the item's marker
    fn parse_list_item(&self, lines: &[&str], marker: ListMarker, line_no: usize) -> Result<(ListItem, usize)> {
        let first_content = lines[0].get(marker.content_start..).unwrap_or("").trim_start();
        let (item_marker, first_content) = split_task_marker(first_content);

        let mut item_lines = vec![first_content.to_string()];
        let mut i = 1;

        while i < lines.len() {
            let line = lines[i];

            if line.is_empty() {
                // A truly empty line ends the item unless indented content follows
                let mut j = i + 1;
                while j < lines.len() && is_blank(lines[j]) {
                    j += 1;
                }
                let continues = j < lines.len() && indent_columns(lines[j]) > marker.indent;
                if !continues {
                    break;
                }
                item_lines.extend(lines[i..j].iter().map(|blank| blank_marker(blank)));
                i = j;
            } else if is_blank(line) {
                // Whitespace-only lines stay inside the item
                item_lines.push(" ".to_string());
                i += 1;
            } else if indent_columns(line) <= marker.indent {
                // Sibling item, parent item or outdented text
                break;
            } else {
                item_lines.push(remove_indent(line, marker.content_col));
                i += 1;
            }
        }

        let blocks = self.parse_blocks(&item_lines.join("\n"), Context::ListItem, line_no)?;
        let item = ListItem {
            marker: item_marker,
            blocks,
        };
        Ok((item, i))
    }
}

/// List marker identifier
#[derive(Debug, Clone, Copy, PartialEq)]
struct ListMarker {
    indent: usize,      // Columns before the marker
    ordered: bool,      // `1.` style rather than `-`, `+` or `*`
    number: u32,        // Ordinal of an ordered marker
    content_start: usize, // Byte offset of the item text on the marker line
    content_col: usize, // Column continuation lines are dedented to
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefinitionKind {
    Link,
    Footnote,
    Abbreviation,
}

/// Split a definition line into its kind, label and the text after `]:`
fn split_definition(line: &str) -> Option<(DefinitionKind, &str, &str)> {
    let trimmed = line.trim_start();
    let (kind, body) = if let Some(rest) = trimmed.strip_prefix("*[") {
        (DefinitionKind::Abbreviation, rest)
    } else if let Some(rest) = trimmed.strip_prefix("[^") {
        (DefinitionKind::Footnote, rest)
    } else if let Some(rest) = trimmed.strip_prefix('[') {
        (DefinitionKind::Link, rest)
    } else {
        return None;
    };

    let close = body.find("]:")?;
    let label = &body[..close];
    if label.trim().is_empty() || label.contains(['[', ']']) {
        return None;
    }
    Some((kind, label, &body[close + 2..]))
}

/// `target`, `<target>`, each optionally followed by a title in `"…"`,
/// `'…'` or `(…)` on the same line or on the next line indented deeper
/// than the definition
fn parse_link_definition(
    label: &str,
    rest: &str,
    line: &str,
    next_line: Option<&str>,
) -> Option<(Block, usize)> {
    let rest = rest.trim();
    let (target, after) = if let Some(inner) = rest.strip_prefix('<') {
        let end = inner.find('>')?;
        (&inner[..end], inner[end + 1..].trim())
    } else {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        (&rest[..end], rest[end..].trim())
    };
    if target.is_empty() {
        return None;
    }

    let definition = |title: Option<&str>| Block::ReferenceDef {
        label: label.to_string(),
        target: target.to_string(),
        title: title.map(str::to_string),
    };

    if !after.is_empty() {
        // Anything other than a title after the target is not a definition
        let title = parse_title(after)?;
        return Some((definition(Some(title)), 1));
    }
    let title_line = next_line.filter(|next| indent_columns(next) > indent_columns(line));
    match title_line.and_then(|next| parse_title(next.trim())) {
        Some(title) => Some((definition(Some(title)), 2)),
        None => Some((definition(None), 1)),
    }
}

fn parse_title(text: &str) -> Option<&str> {
    let close = match text.chars().next()? {
        '"' => '"',
        '\'' => '\'',
        '(' => ')',
        _ => return None,
    };
    if text.len() < 2 || !text.ends_with(close) {
        return None;
    }
    Some(&text[1..text.len() - 1])
}

/// `[ ]`, `[]`, `[x]` or `[X]` directly followed by whitespace
fn split_task_marker(content: &str) -> (ItemMarker, &str) {
    for (prefix, checked) in [("[ ]", false), ("[]", false), ("[x]", true), ("[X]", true)] {
        if let Some(rest) = content.strip_prefix(prefix)
            && (rest.is_empty() || rest.starts_with([' ', '\t']))
        {
            return (ItemMarker::Task { checked }, rest.trim_start());
        }
    }
    (ItemMarker::Plain, content)
}

/// Lowercased name of an opening tag at the start of `text`
fn opening_tag_name(text: &str) -> Option<String> {
    let after = text.strip_prefix('<')?;
    let name_len = after
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_alphabetic() || (*i > 0 && c.is_ascii_digit())))
        .map_or(after.len(), |(i, _)| i);
    if name_len == 0 {
        return None;
    }
    let boundary = after[name_len..].chars().next();
    if !matches!(boundary, None | Some('>' | '/' | ' ' | '\t')) {
        return None;
    }
    Some(after[..name_len].to_ascii_lowercase())
}

/// Openings of `tag` minus its closings on one line; self-closing tags
/// do not count
fn tag_depth_change(line: &str, tag: &str) -> i64 {
    let lower = line.to_ascii_lowercase();
    let mut change = 0;
    let mut rest = lower.as_str();

    while let Some(pos) = rest.find('<') {
        rest = &rest[pos + 1..];
        let (closing, name_part) = match rest.strip_prefix('/') {
            Some(after) => (true, after),
            None => (false, rest),
        };
        let Some(after_name) = name_part.strip_prefix(tag) else {
            continue;
        };
        if !matches!(after_name.chars().next(), None | Some('>' | '/' | ' ' | '\t')) {
            continue;
        }
        if closing {
            change -= 1;
        } else {
            let self_closing = after_name
                .find('>')
                .is_some_and(|end| after_name[..end].ends_with('/'));
            if !self_closing {
                change += 1;
            }
        }
    }
    change
}

fn heading(level: u8, text: &str) -> Block {
    Block::Heading {
        level,
        content: InlineText::new(text),
        anchor: String::new(),
    }
}

/// Join paragraph lines: leading whitespace goes, trailing spaces stay for
/// hard line breaks except at the very end
fn paragraph_text(lines: &[&str]) -> String {
    let mut text = lines
        .iter()
        .map(|line| line.trim_start())
        .collect::<Vec<_>>()
        .join("\n");
    text.truncate(text.trim_end().len());
    text
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Keep the difference between truly empty and whitespace-only lines
fn blank_marker(line: &str) -> String {
    if line.is_empty() {
        String::new()
    } else {
        " ".to_string()
    }
}

fn strip_blockquote_marker(line: &str) -> &str {
    let after_marker = line.trim_start().strip_prefix('>').unwrap_or(line);
    after_marker.strip_prefix(' ').unwrap_or(after_marker)
}

/// Count the number of columns of indentation, treating tabs as advancing to next multiple of 4
fn indent_columns(line: &str) -> usize {
    let mut col = 0;
    for ch in line.chars() {
        match ch {
            ' ' => col += 1,
            '\t' => col = (col / 4 + 1) * 4,
            _ => break,
        }
    }
    col
}

/// Remove up to `columns` worth of indentation from a line.
/// A tab that straddles the boundary leaves its remainder as spaces.
fn remove_indent(line: &str, columns: usize) -> String {
    let mut col = 0;
    let mut chars = line.chars().peekable();
    let mut result = String::new();

    while col < columns {
        match chars.peek() {
            Some(&' ') => {
                chars.next();
                col += 1;
            }
            Some(&'\t') => {
                chars.next();
                let next_tab_stop = (col / 4 + 1) * 4;
                if next_tab_stop > columns {
                    result.extend(std::iter::repeat_n(' ', next_tab_stop - columns));
                }
                col = next_tab_stop;
            }
            _ => break,
        }
    }

    result.extend(chars);
    result
}

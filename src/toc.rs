/// Heading anchors and the table of contents
use std::collections::{HashMap, HashSet};

use crate::ast::{Block, TocEntry, plain_text};

/// Lowercase, whitespace runs become a single `-`, every character that is
/// neither alphanumeric nor `-` is dropped.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for word in text.split_whitespace() {
        let start = slug.len();
        for ch in word.chars() {
            if ch.is_alphanumeric() || ch == '-' {
                slug.extend(ch.to_lowercase());
            }
        }
        // A word made only of punctuation leaves no trace
        if slug.len() > start && start > 0 {
            slug.insert(start, '-');
        }
    }
    slug
}

/// Visible text of heading markup: link and image destinations, reference
/// labels, footnote references and tags are dropped.
fn heading_text(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut text = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                text.push(chars[i + 1]);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'[') => i += 1,
            '[' => match closing(&chars, i, '[', ']') {
                Some(close) if chars.get(i + 1) == Some(&'^') => i = close + 1,
                Some(close) => {
                    let inner: String = chars[i + 1..close].iter().collect();
                    text.push_str(&heading_text(&inner));
                    i = skip_link_target(&chars, close + 1);
                }
                None => {
                    text.push('[');
                    i += 1;
                }
            },
            '<' if chars.get(i + 1).is_some_and(|c| c.is_ascii_alphabetic() || *c == '/') => {
                match chars[i..].iter().position(|&c| c == '>') {
                    Some(len) if !chars[i..i + len].contains(&':') => i += len + 1,
                    _ => {
                        text.push('<');
                        i += 1;
                    }
                }
            }
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    text
}

/// Position after a `(destination)` or `[label]` directly following a link
/// text, or `at` when there is none
fn skip_link_target(chars: &[char], at: usize) -> usize {
    let mut label = at;
    while chars.get(label) == Some(&' ') {
        label += 1;
    }
    let target = match chars.get(label) {
        Some('(') if label == at => closing(chars, at, '(', ')'),
        Some('[') => closing(chars, label, '[', ']'),
        _ => None,
    };
    target.map_or(at, |close| close + 1)
}

/// Index of the bracket closing the one at `open`, nesting counted
fn closing(chars: &[char], open: usize, left: char, right: char) -> Option<usize> {
    let mut depth = 0;
    for (i, &c) in chars.iter().enumerate().skip(open) {
        if c == left {
            depth += 1;
        } else if c == right {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Heading anchors by normalized heading text and by anchor
#[derive(Debug, Default)]
pub struct HeadingIndex {
    anchors: HashMap<String, String>,
}

impl HeadingIndex {
    /// Assign a unique anchor to every heading in the tree, in document order
    pub fn assign(blocks: &mut [Block]) -> Self {
        let mut index = HeadingIndex::default();
        let mut used = HashSet::new();
        index.assign_in(blocks, &mut used);
        index
    }

    fn assign_in(&mut self, blocks: &mut [Block], used: &mut HashSet<String>) {
        for block in blocks {
            match block {
                Block::Heading {
                    content, anchor, ..
                } => {
                    let base = match slugify(&heading_text(&content.source)) {
                        slug if slug.is_empty() => "heading".to_string(),
                        slug => slug,
                    };
                    let mut candidate = base.clone();
                    let mut suffix = 0;
                    while used.contains(&candidate) {
                        suffix += 1;
                        candidate = format!("{}-{}", base, suffix);
                    }
                    used.insert(candidate.clone());
                    self.anchors.entry(base).or_insert_with(|| candidate.clone());
                    self.anchors
                        .entry(candidate.clone())
                        .or_insert_with(|| candidate.clone());
                    *anchor = candidate;
                }
                Block::List { items, .. } => {
                    for item in items {
                        self.assign_in(&mut item.blocks, used);
                    }
                }
                Block::BlockQuote(children) => self.assign_in(children, used),
                _ => {}
            }
        }
    }

    /// Anchor of the heading whose text (or anchor) normalizes to `label`
    pub fn anchor_for(&self, label: &str) -> Option<&str> {
        self.anchors.get(&slugify(label)).map(String::as_str)
    }
}

/// Headings in document order, read after inline resolution
pub fn collect_entries(blocks: &[Block]) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    collect_into(blocks, &mut entries);
    entries
}

fn collect_into(blocks: &[Block], entries: &mut Vec<TocEntry>) {
    for block in blocks {
        match block {
            Block::Heading {
                level,
                content,
                anchor,
            } => entries.push(TocEntry {
                level: *level,
                anchor: anchor.clone(),
                text: plain_text(&content.spans).trim().to_string(),
            }),
            Block::List { items, .. } => {
                for item in items {
                    collect_into(&item.blocks, entries);
                }
            }
            Block::BlockQuote(children) => collect_into(children, entries),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocNode<'a> {
    pub entry: &'a TocEntry,
    pub children: Vec<TocNode<'a>>,
}

/// Nest entries by level. A deeper heading nests under the closest preceding
/// shallower one, however many levels it skips.
pub fn nest(entries: &[TocEntry]) -> Vec<TocNode<'_>> {
    let mut roots: Vec<TocNode<'_>> = Vec::new();
    // Path of open nodes, each with its level
    let mut stack: Vec<TocNode<'_>> = Vec::new();

    for entry in entries {
        while stack.last().is_some_and(|open| open.entry.level >= entry.level) {
            close_top(&mut stack, &mut roots);
        }
        stack.push(TocNode {
            entry,
            children: Vec::new(),
        });
    }
    while !stack.is_empty() {
        close_top(&mut stack, &mut roots);
    }
    roots
}

fn close_top<'a>(stack: &mut Vec<TocNode<'a>>, roots: &mut Vec<TocNode<'a>>) {
    if let Some(node) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}

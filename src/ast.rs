/// Document tree produced by the block parser and completed by the resolution pass
use serde::{Deserialize, Serialize};

use crate::error::Warning;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
    /// Footnote bodies in first-reference order, filled by the resolution pass
    pub footnotes: Vec<Footnote>,
    /// Headings in document order, filled by the resolution pass
    pub toc: Vec<TocEntry>,
    pub warnings: Vec<Warning>,
}

/// Raw inline source captured by the block parser together with the spans
/// the inline formatter produces from it once every reference table is known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineText {
    pub source: String,
    pub spans: Vec<Inline>,
}

impl InlineText {
    pub fn new(source: impl Into<String>) -> Self {
        InlineText {
            source: source.into(),
            spans: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Block {
    Heading {
        level: u8,
        content: InlineText,
        anchor: String, // Assigned by the TOC builder
    },
    Paragraph(InlineText),
    List {
        ordered: bool,
        start: u32,
        tight: bool, // Tight lists render the leading paragraph of each item bare
        items: Vec<ListItem>,
    },
    BlockQuote(Vec<Block>), // Paragraphs only
    CodeBlock {
        kind: CodeKind,
        literal: String,
    },
    HorizontalRule,
    RawHtml {
        tag: String,
        html: String,
    },
    TableOfContents,
    // Definition-only blocks, never rendered
    AbbreviationDef {
        term: String,
        expansion: String,
    },
    ReferenceDef {
        label: String,
        target: String,
        title: Option<String>,
    },
    FootnoteDef {
        label: String,
        blocks: Vec<Block>,
    },
}

impl Block {
    /// Definitions register into the reference tables and produce no output
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            Block::AbbreviationDef { .. } | Block::ReferenceDef { .. } | Block::FootnoteDef { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub marker: ItemMarker,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemMarker {
    Plain,
    Task { checked: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeKind {
    Fenced { info: Option<String> },
    TabIndented,
    SpaceIndented,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inline {
    Text(String),
    Entity(String), // Character reference passed through unchanged
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Code(String),
    LineBreak,
    RawHtml(String),
    Link {
        target: String,
        title: Option<String>,
        children: Vec<Inline>,
    },
    Image {
        target: String,
        title: Option<String>,
        alt: String,
    },
    FootnoteRef {
        label: String,
        number: usize,
        first: bool, // First reference carries the back-reference anchor
    },
    Abbreviation {
        term: String,
        expansion: String,
    },
    Autolink {
        target: String,
        email: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footnote {
    pub number: usize,
    pub label: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub level: u8,
    pub anchor: String,
    pub text: String,
}

/// Concatenated text content of a span sequence, without markup
pub fn plain_text(spans: &[Inline]) -> String {
    let mut out = String::new();
    push_plain_text(spans, &mut out);
    out
}

fn push_plain_text(spans: &[Inline], out: &mut String) {
    for span in spans {
        match span {
            Inline::Text(text) | Inline::Code(text) => out.push_str(text),
            Inline::Entity(entity) => out.push_str(&html_escape::decode_html_entities(entity)),
            Inline::Emphasis(children)
            | Inline::Strong(children)
            | Inline::Strikethrough(children)
            | Inline::Link { children, .. } => push_plain_text(children, out),
            Inline::Image { alt, .. } => out.push_str(alt),
            Inline::Abbreviation { term, .. } => out.push_str(term),
            Inline::Autolink { target, .. } => out.push_str(target),
            Inline::LineBreak => out.push(' '),
            Inline::RawHtml(_) | Inline::FootnoteRef { .. } => {}
        }
    }
}

/// HTML renderer for resolved documents
use crate::ast::{Block, CodeKind, Document, Footnote, Inline, ItemMarker, ListItem, TocEntry};
use crate::html::{escape_attribute, escape_text, obfuscate};
use crate::toc::{self, TocNode};

pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn new() -> Self {
        HtmlRenderer
    }

    /// Document body followed by the footnote section, if any footnote was
    /// referenced
    pub fn render(&self, document: &Document) -> String {
        let toc = self.render_toc(&document.toc);
        let mut html = render_blocks(&document.blocks, &toc);
        if !document.footnotes.is_empty() {
            html.push_str(&render_footnotes(&document.footnotes, &toc));
        }
        html
    }

    /// Nested `<ul>` outline of the headings; empty when there are none
    pub fn render_toc(&self, entries: &[TocEntry]) -> String {
        let tree = toc::nest(entries);
        if tree.is_empty() {
            String::new()
        } else {
            render_toc_nodes(&tree)
        }
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn render_toc_nodes(nodes: &[TocNode<'_>]) -> String {
    let items: String = nodes
        .iter()
        .map(|node| {
            let link = format!(
                "<a href=\"#{}\">{}</a>",
                escape_attribute(&node.entry.anchor),
                escape_text(&node.entry.text)
            );
            if node.children.is_empty() {
                format!("<li>{}</li>\n", link)
            } else {
                format!("<li>{}\n{}</li>\n", link, render_toc_nodes(&node.children))
            }
        })
        .collect();
    format!("<ul>\n{}</ul>\n", items)
}

fn render_blocks(blocks: &[Block], toc: &str) -> String {
    blocks.iter().map(|block| render_block(block, toc)).collect()
}

fn render_block(block: &Block, toc: &str) -> String {
    match block {
        Block::Heading {
            level,
            content,
            anchor,
        } => {
            let content = render_inlines(&content.spans);
            if anchor.is_empty() {
                format!("<h{}>{}</h{}>\n", level, content, level)
            } else {
                format!(
                    "<h{} id=\"{}\">{}</h{}>\n",
                    level,
                    escape_attribute(anchor),
                    content,
                    level
                )
            }
        }
        Block::Paragraph(content) => format!("<p>{}</p>\n", render_inlines(&content.spans)),
        Block::List {
            ordered,
            start,
            tight,
            items,
        } => {
            let content: String = items
                .iter()
                .map(|item| render_list_item(item, *tight, toc))
                .collect();
            if !ordered {
                format!("<ul>\n{}</ul>\n", content)
            } else if *start == 1 {
                format!("<ol>\n{}</ol>\n", content)
            } else {
                format!("<ol start=\"{}\">\n{}</ol>\n", start, content)
            }
        }
        Block::BlockQuote(children) => {
            format!("<blockquote>\n{}</blockquote>\n", render_blocks(children, toc))
        }
        Block::CodeBlock { kind, literal } => match kind {
            CodeKind::Fenced { info: Some(info) } => format!(
                "<pre><code class=\"language-{}\">{}</code></pre>\n",
                escape_attribute(info),
                escape_text(literal)
            ),
            _ => format!("<pre><code>{}</code></pre>\n", escape_text(literal)),
        },
        Block::HorizontalRule => "<hr />\n".to_string(),
        Block::RawHtml { html, .. } => format!("{}\n", html),
        Block::TableOfContents => {
            if toc.is_empty() {
                String::new()
            } else {
                format!("<div class=\"toc\">\n{}</div>\n", toc)
            }
        }
        Block::AbbreviationDef { .. } | Block::ReferenceDef { .. } | Block::FootnoteDef { .. } => String::new(),
    }
}

/// Tight items show their leading paragraph without `<p>`; nested blocks
/// follow on their own lines
fn render_list_item(item: &ListItem, tight: bool, toc: &str) -> String {
    let open = match item.marker {
        ItemMarker::Plain => "<li>".to_string(),
        ItemMarker::Task { checked } => format!(
            "<li class=\"task-list-item\"><input type=\"checkbox\" disabled{} /> ",
            if checked { " checked" } else { "" }
        ),
    };

    let blocks: Vec<&Block> = item.blocks.iter().filter(|block| !block.is_definition()).collect();
    match blocks.split_first() {
        None => format!("{}</li>\n", open.trim_end()),
        Some((Block::Paragraph(lead), rest)) if tight => {
            let lead = render_inlines(&lead.spans);
            if rest.is_empty() {
                format!("{}{}</li>\n", open, lead)
            } else {
                let nested: String = rest.iter().map(|block| render_block(block, toc)).collect();
                format!("{}{}\n{}</li>\n", open, lead, nested)
            }
        }
        Some(_) => {
            let content: String = blocks.iter().map(|block| render_block(block, toc)).collect();
            format!("{}\n{}</li>\n", open.trim_end(), content)
        }
    }
}

fn render_footnotes(footnotes: &[Footnote], toc: &str) -> String {
    let items: String = footnotes
        .iter()
        .map(|footnote| render_footnote(footnote, toc))
        .collect();
    format!(
        "<div class=\"footnotes\">\n<hr />\n<ol>\n{}</ol>\n</div>\n",
        items
    )
}

/// The back-reference goes inside the last paragraph when there is one
fn render_footnote(footnote: &Footnote, toc: &str) -> String {
    let backref = format!(
        "<a href=\"#fnref-{}\" class=\"footnote-backref\">&#8617;</a>",
        footnote.number
    );
    let blocks: Vec<&Block> = footnote
        .blocks
        .iter()
        .filter(|block| !block.is_definition())
        .collect();

    let body = match blocks.split_last() {
        Some((Block::Paragraph(last), rest)) => {
            let rest: String = rest.iter().map(|block| render_block(block, toc)).collect();
            format!("{}<p>{} {}</p>\n", rest, render_inlines(&last.spans), backref)
        }
        _ => {
            let content: String = blocks.iter().map(|block| render_block(block, toc)).collect();
            format!("{}{}\n", content, backref)
        }
    };
    format!("<li id=\"fn-{}\">\n{}</li>\n", footnote.number, body)
}

fn render_inlines(spans: &[Inline]) -> String {
    spans.iter().map(render_inline).collect()
}

fn render_inline(span: &Inline) -> String {
    match span {
        Inline::Text(text) => escape_text(text).into_owned(),
        // Already valid references
        Inline::Entity(entity) => entity.clone(),
        Inline::Emphasis(children) => format!("<em>{}</em>", render_inlines(children)),
        Inline::Strong(children) => format!("<strong>{}</strong>", render_inlines(children)),
        Inline::Strikethrough(children) => format!("<del>{}</del>", render_inlines(children)),
        Inline::Code(code) => format!("<code>{}</code>", escape_text(code)),
        Inline::LineBreak => "<br />\n".to_string(),
        Inline::RawHtml(html) => html.clone(),
        Inline::Link {
            target,
            title,
            children,
        } => format!(
            "<a href=\"{}\"{}>{}</a>",
            escape_attribute(target),
            title_attribute(title.as_deref()),
            render_inlines(children)
        ),
        Inline::Image { target, title, alt } => format!(
            "<img src=\"{}\" alt=\"{}\"{} />",
            escape_attribute(target),
            escape_attribute(alt),
            title_attribute(title.as_deref())
        ),
        Inline::FootnoteRef { number, first, .. } => {
            if *first {
                format!(
                    "<sup id=\"fnref-{0}\"><a href=\"#fn-{0}\" class=\"footnote-ref\">{0}</a></sup>",
                    number
                )
            } else {
                format!(
                    "<sup><a href=\"#fn-{0}\" class=\"footnote-ref\">{0}</a></sup>",
                    number
                )
            }
        }
        Inline::Abbreviation { term, expansion } => format!(
            "<abbr title=\"{}\">{}</abbr>",
            escape_attribute(expansion),
            escape_text(term)
        ),
        Inline::Autolink {
            target,
            email: false,
        } => format!(
            "<a href=\"{}\">{}</a>",
            escape_attribute(target),
            escape_text(target)
        ),
        Inline::Autolink {
            target,
            email: true,
        } => format!(
            "<a href=\"{}\">{}</a>",
            obfuscate(&format!("mailto:{}", target)),
            obfuscate(target)
        ),
    }
}

fn title_attribute(title: Option<&str>) -> String {
    match title {
        Some(title) => format!(" title=\"{}\"", escape_attribute(title)),
        None => String::new(),
    }
}

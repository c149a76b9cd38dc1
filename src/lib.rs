/// Documentation comments in source files rendered as HTML
pub mod ast;
pub mod config;
pub mod error;
pub mod extract;
pub mod html;
pub mod inline;
pub mod parser;
pub mod refs;
pub mod renderer;
pub mod toc;

use serde::Serialize;

pub use ast::Document;
pub use config::{EmphasisMode, Options};
pub use error::{Error, Result, Warning};
pub use extract::CommentExtractor;

use error::Diagnostics;
use inline::InlineParser;
use parser::Parser;
use refs::ReferenceTables;
use renderer::HtmlRenderer;
use toc::HeadingIndex;

/// Output of one rendering run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderedDocument {
    pub html: String,
    /// Standalone table-of-contents fragment; empty without headings
    pub toc: String,
    pub warnings: Vec<Warning>,
}

/// Parse and resolve one logical text without rendering it
pub fn parse_document(text: &str, options: &Options) -> Result<Document> {
    let parser = Parser::new(options);
    let mut document = parser.parse(text)?;

    // Every definition is known before any inline text is resolved
    let mut diagnostics = Diagnostics::new();
    let tables = ReferenceTables::collect(&document.blocks, &mut diagnostics);
    let headings = HeadingIndex::assign(&mut document.blocks);

    let mut inline = InlineParser::new(options, &tables, &headings, diagnostics);
    inline.resolve_blocks(&mut document.blocks);
    document.footnotes = inline.resolve_footnotes(&parser)?;
    document.warnings = inline.into_diagnostics().into_warnings();
    document.toc = toc::collect_entries(&document.blocks);

    log::debug!(
        "parsed {} blocks, {} footnotes, {} headings",
        document.blocks.len(),
        document.footnotes.len(),
        document.toc.len()
    );
    Ok(document)
}

/// Render markdown text to HTML
pub fn render_markdown(text: &str, options: &Options) -> Result<RenderedDocument> {
    let document = parse_document(text, options)?;
    let renderer = HtmlRenderer::new();
    Ok(RenderedDocument {
        html: renderer.render(&document),
        toc: renderer.render_toc(&document.toc),
        warnings: document.warnings,
    })
}

/// Render every documentation comment in `source` as one document, so
/// definitions in one comment serve references in another
pub fn render_source(source: &str, options: &Options) -> Result<RenderedDocument> {
    let extractor = options.extractor()?;
    let blocks: Vec<String> = extractor.blocks(source).collect();
    log::debug!("extracted {} documentation comments", blocks.len());
    render_markdown(&blocks.join("\n\n"), options)
}

/// Render each documentation comment in `source` on its own
pub fn render_comments(source: &str, options: &Options) -> Result<Vec<RenderedDocument>> {
    let extractor = options.extractor()?;
    extractor
        .blocks(source)
        .map(|block| render_markdown(&block, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MalformedReason, ReferenceKind};
    use pretty_assertions::assert_eq;

    fn html(text: &str) -> String {
        render_markdown(text, &Options::default()).unwrap().html
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(html(""), "");
    }

    #[test]
    fn test_strong_and_intraword_emphasis() {
        assert_eq!(
            html("**bold** and *em*phasis"),
            "<p><strong>bold</strong> and <em>em</em>phasis</p>\n"
        );
    }

    #[test]
    fn test_nested_ordered_list() {
        assert_eq!(
            html("1. Item 1\n     1. Item 1.1\n1. Item 2"),
            "<ol>\n<li>Item 1\n<ol>\n<li>Item 1.1</li>\n</ol>\n</li>\n<li>Item 2</li>\n</ol>\n"
        );
    }

    #[test]
    fn test_forward_reference_link() {
        assert_eq!(
            html("[link][ref]\n\n[ref]: http://example.com \"Title\""),
            "<p><a href=\"http://example.com\" title=\"Title\">link</a></p>\n"
        );
    }

    #[test]
    fn test_code_span_with_backtick() {
        assert_eq!(html("``a`b``"), "<p><code>a`b</code></p>\n");
    }

    #[test]
    fn test_heading_reference() {
        assert_eq!(
            html("## Block Level Formatting\n\nSee [text][Block Level Formatting]."),
            "<h2 id=\"block-level-formatting\">Block Level Formatting</h2>\n\
             <p>See <a href=\"#block-level-formatting\">text</a>.</p>\n"
        );
    }

    #[test]
    fn test_heading_with_link_resolves_by_visible_text() {
        let rendered = render_markdown(
            "## See [docs](http://example.com) now\n\n[go][See docs now]",
            &Options::default(),
        )
        .unwrap();
        assert_eq!(
            rendered.html,
            "<h2 id=\"see-docs-now\">See <a href=\"http://example.com\">docs</a> now</h2>\n\
             <p><a href=\"#see-docs-now\">go</a></p>\n"
        );
        assert!(rendered.warnings.is_empty());
    }

    #[test]
    fn test_basic_image() {
        assert_eq!(
            html("![foo](/url \"title\")\n"),
            "<p><img src=\"/url\" alt=\"foo\" title=\"title\" /></p>\n"
        );
    }

    #[test]
    fn test_toc_fragment_and_placeholder() {
        let rendered = render_markdown("[toc]\n\n# One\n\n## Two", &Options::default()).unwrap();
        let fragment = "<ul>\n<li><a href=\"#one\">One</a>\n<ul>\n<li><a href=\"#two\">Two</a></li>\n</ul>\n</li>\n</ul>\n";
        assert_eq!(rendered.toc, fragment);
        assert_eq!(
            rendered.html,
            format!(
                "<div class=\"toc\">\n{}</div>\n<h1 id=\"one\">One</h1>\n<h2 id=\"two\">Two</h2>\n",
                fragment
            )
        );
    }

    #[test]
    fn test_footnotes_render_in_reference_order() {
        let rendered = html("B[^b] A[^a] B again[^b]\n\n[^a]: First.\n[^b]: Second.\n[^unused]: Never.");
        assert_eq!(
            rendered,
            "<p>B<sup id=\"fnref-1\"><a href=\"#fn-1\" class=\"footnote-ref\">1</a></sup> \
             A<sup id=\"fnref-2\"><a href=\"#fn-2\" class=\"footnote-ref\">2</a></sup> \
             B again<sup><a href=\"#fn-1\" class=\"footnote-ref\">1</a></sup></p>\n\
             <div class=\"footnotes\">\n<hr />\n<ol>\n\
             <li id=\"fn-1\">\n<p>Second. <a href=\"#fnref-1\" class=\"footnote-backref\">&#8617;</a></p>\n</li>\n\
             <li id=\"fn-2\">\n<p>First. <a href=\"#fnref-2\" class=\"footnote-backref\">&#8617;</a></p>\n</li>\n\
             </ol>\n</div>\n"
        );
    }

    #[test]
    fn test_multi_word_footnote_label() {
        let rendered = render_markdown("See[^my note].\n\n[^My  Note]: Defined body.", &Options::default()).unwrap();
        assert_eq!(
            rendered.html,
            "<p>See<sup id=\"fnref-1\"><a href=\"#fn-1\" class=\"footnote-ref\">1</a></sup>.</p>\n\
             <div class=\"footnotes\">\n<hr />\n<ol>\n\
             <li id=\"fn-1\">\n<p>Defined body. <a href=\"#fnref-1\" class=\"footnote-backref\">&#8617;</a></p>\n</li>\n\
             </ol>\n</div>\n"
        );
        assert!(rendered.warnings.is_empty());
    }

    #[test]
    fn test_warnings_are_reported() {
        let rendered = render_markdown(
            "[x][nowhere]\n\n[a]: /1\n[A]: /2",
            &Options::default(),
        )
        .unwrap();
        assert_eq!(rendered.html, "<p>[x][nowhere]</p>\n");
        assert_eq!(
            rendered.warnings,
            vec![
                Warning::DuplicateDefinition {
                    kind: ReferenceKind::Link,
                    label: "A".to_string(),
                },
                Warning::UnresolvedReference {
                    kind: ReferenceKind::Link,
                    label: "nowhere".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_malformed_block_is_fatal() {
        let err = render_markdown("text\n\n```\nunclosed", &Options::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedBlock {
                line: 3,
                reason: MalformedReason::UnterminatedFence
            }
        ));
    }

    #[test]
    fn test_render_source_joins_comments() {
        let source = "/**\n * Uses [the site][site].\n */\nint x;\n/**\n * [site]: http://example.com\n */\n";
        let rendered = render_source(source, &Options::default()).unwrap();
        assert_eq!(
            rendered.html,
            "<p>Uses <a href=\"http://example.com\">the site</a>.</p>\n"
        );
    }

    #[test]
    fn test_render_comments_separately() {
        let source = "/** One */\n/** *Two* */\n";
        let rendered = render_comments(source, &Options::default()).unwrap();
        let bodies: Vec<&str> = rendered.iter().map(|doc| doc.html.as_str()).collect();
        assert_eq!(bodies, vec!["<p>One</p>\n", "<p><em>Two</em></p>\n"]);
    }

    #[test]
    fn test_invalid_marker() {
        let options = Options {
            marker: "(".to_string(),
            ..Options::default()
        };
        assert!(matches!(
            render_source("", &options),
            Err(Error::InvalidMarker(_))
        ));
    }
}

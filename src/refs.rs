/// First pass over the block tree: every definition, wherever it occurs,
/// lands in a lookup table before any inline text is resolved.
use std::collections::HashMap;

use regex::Regex;
use unicode_casefold::UnicodeCaseFold;

use crate::ast::Block;
use crate::error::{Diagnostics, ReferenceKind, Warning};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub url: String,
    pub title: Option<String>,
}

#[derive(Debug, Default)]
pub struct ReferenceTables {
    links: HashMap<String, LinkTarget>,
    footnotes: HashMap<String, Vec<Block>>,
    abbreviations: Vec<(String, String)>,
    abbreviation_pattern: Option<Regex>,
}

impl ReferenceTables {
    pub fn collect(blocks: &[Block], diagnostics: &mut Diagnostics) -> Self {
        let mut tables = ReferenceTables::default();
        tables.collect_from(blocks, diagnostics);

        // Longest terms first so overlapping terms prefer the longer match
        tables
            .abbreviations
            .sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
        if !tables.abbreviations.is_empty() {
            let alternation = tables
                .abbreviations
                .iter()
                .map(|(term, _)| regex::escape(term))
                .collect::<Vec<_>>()
                .join("|");
            // Escaped literals always form a valid pattern; a failure only
            // disables expansion
            match Regex::new(&alternation) {
                Ok(pattern) => tables.abbreviation_pattern = Some(pattern),
                Err(err) => log::warn!("abbreviations disabled: {}", err),
            }
        }

        log::debug!(
            "collected {} link, {} footnote and {} abbreviation definitions",
            tables.links.len(),
            tables.footnotes.len(),
            tables.abbreviations.len()
        );
        tables
    }

    fn collect_from(&mut self, blocks: &[Block], diagnostics: &mut Diagnostics) {
        for block in blocks {
            match block {
                Block::ReferenceDef {
                    label,
                    target,
                    title,
                } => {
                    let key = normalize_label(label);
                    if self.links.contains_key(&key) {
                        diagnostics.warn(duplicate(ReferenceKind::Link, label));
                    } else {
                        self.links.insert(
                            key,
                            LinkTarget {
                                url: target.clone(),
                                title: title.clone(),
                            },
                        );
                    }
                }
                Block::FootnoteDef { label, blocks } => {
                    let key = normalize_label(label);
                    if self.footnotes.contains_key(&key) {
                        diagnostics.warn(duplicate(ReferenceKind::Footnote, label));
                    } else {
                        self.footnotes.insert(key, blocks.clone());
                    }
                }
                Block::AbbreviationDef { term, expansion } => {
                    if self.abbreviations.iter().any(|(known, _)| known == term) {
                        diagnostics.warn(duplicate(ReferenceKind::Abbreviation, term));
                    } else {
                        self.abbreviations.push((term.clone(), expansion.clone()));
                    }
                }
                Block::List { items, .. } => {
                    for item in items {
                        self.collect_from(&item.blocks, diagnostics);
                    }
                }
                Block::BlockQuote(children) => self.collect_from(children, diagnostics),
                _ => {}
            }
        }
    }

    pub fn link(&self, label: &str) -> Option<&LinkTarget> {
        self.links.get(&normalize_label(label))
    }

    pub fn footnote(&self, label: &str) -> Option<&[Block]> {
        self.footnotes.get(&normalize_label(label)).map(Vec::as_slice)
    }

    /// Whole-word abbreviation matches in `text` as `(start, end, expansion)`
    /// byte ranges, left to right and non-overlapping
    pub fn abbreviations_in<'t>(&'t self, text: &str) -> Vec<(usize, usize, &'t str)> {
        let Some(pattern) = &self.abbreviation_pattern else {
            return Vec::new();
        };
        let mut found = Vec::new();
        let mut pos = 0;
        while let Some(m) = pattern.find_at(text, pos) {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            let bounded = !before.is_some_and(char::is_alphanumeric)
                && !after.is_some_and(char::is_alphanumeric);
            if bounded && let Some(expansion) = self.expansion(m.as_str()) {
                found.push((m.start(), m.end(), expansion));
                pos = m.end();
            } else {
                // Retry one character further on
                pos = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
            }
            if pos >= text.len() {
                break;
            }
        }
        found
    }

    fn expansion(&self, term: &str) -> Option<&str> {
        self.abbreviations
            .iter()
            .find(|(known, _)| known == term)
            .map(|(_, expansion)| expansion.as_str())
    }
}

fn duplicate(kind: ReferenceKind, label: &str) -> Warning {
    Warning::DuplicateDefinition {
        kind,
        label: label.to_string(),
    }
}

/// Case-fold and collapse whitespace so labels compare loosely
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .case_fold()
        .collect()
}

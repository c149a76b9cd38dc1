use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors. A malformed block aborts the containing document only.
#[derive(Debug, Error)]
pub enum Error {
    /// A block construct was opened and never closed.
    #[error("malformed block at line {line}: {reason}")]
    MalformedBlock {
        /// Line (1-indexed, within the rendered text) where the block opened
        line: usize,
        reason: MalformedReason,
    },
    /// The documentation comment marker is not a valid pattern.
    #[error("invalid comment marker pattern: {0}")]
    InvalidMarker(#[from] regex::Error),
    /// Options could not be deserialized.
    #[error("invalid options: {0}")]
    InvalidOptions(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("unterminated fenced code block")]
    UnterminatedFence,
    #[error("unterminated <{0}> block")]
    UnterminatedHtml(String),
}

impl Error {
    pub(crate) fn malformed(line: usize, reason: MalformedReason) -> Self {
        Self::MalformedBlock { line, reason }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Which table a label belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    Link,
    Footnote,
    Abbreviation,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::Link => write!(f, "link"),
            ReferenceKind::Footnote => write!(f, "footnote"),
            ReferenceKind::Abbreviation => write!(f, "abbreviation"),
        }
    }
}

/// Non-fatal diagnostics; rendering continues with a fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Warning {
    /// A label with no matching definition; rendered as literal bracket text
    UnresolvedReference { kind: ReferenceKind, label: String },
    /// A label defined more than once; the first definition wins
    DuplicateDefinition { kind: ReferenceKind, label: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnresolvedReference { kind, label } => {
                write!(f, "unresolved {} reference [{}]", kind, label)
            }
            Warning::DuplicateDefinition { kind, label } => {
                write!(f, "duplicate {} definition [{}]; keeping the first", kind, label)
            }
        }
    }
}

/// Collected warnings, each also reported through `log`
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, warning: Warning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_block_message_names_line_and_reason() {
        let err = Error::malformed(7, MalformedReason::UnterminatedHtml("table".into()));
        assert_eq!(
            err.to_string(),
            "malformed block at line 7: unterminated <table> block"
        );
    }

    #[test]
    fn warnings_are_collected_in_order() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());
        diagnostics.warn(Warning::UnresolvedReference {
            kind: ReferenceKind::Link,
            label: "ref".into(),
        });
        diagnostics.warn(Warning::DuplicateDefinition {
            kind: ReferenceKind::Abbreviation,
            label: "HTML".into(),
        });
        let warnings = diagnostics.into_warnings();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].to_string(), "unresolved link reference [ref]");
    }
}

/// Caller-supplied settings for extraction and parsing
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::extract::CommentExtractor;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmphasisMode {
    /// `_` between two word characters is literal; `*` still emphasizes
    #[default]
    WordInternalLiteral,
    /// `_` and `*` behave the same, including inside words
    Classic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Regex matching the opening sequence of a documentation comment
    pub marker: String,
    pub emphasis: EmphasisMode,
    /// Line that opens and closes a fenced code block
    pub fence: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            marker: r"/\*\*".to_string(),
            emphasis: EmphasisMode::default(),
            fence: "```".to_string(),
        }
    }
}

impl Options {
    /// Load options from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn extractor(&self) -> Result<CommentExtractor> {
        CommentExtractor::new(&self.marker)
    }

    pub(crate) fn classic_underscore(&self) -> bool {
        self.emphasis == EmphasisMode::Classic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let options = Options::from_json(r#"{"emphasis": "classic"}"#).unwrap();
        assert_eq!(options.emphasis, EmphasisMode::Classic);
        assert_eq!(options.fence, "```");
        assert_eq!(options.marker, r"/\*\*");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Options::from_json("{\"fence\": 3}").is_err());
    }

    #[test]
    fn invalid_marker_is_reported() {
        let options = Options {
            marker: "(".to_string(),
            ..Options::default()
        };
        assert!(options.extractor().is_err());
    }
}

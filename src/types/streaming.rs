//! Types for streamed provider output.

use serde::{Deserialize, Serialize};

/// One unit of a streamed response, carrying deltas for one or more choices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub choices: Vec<ChoiceDelta>,
}

/// An incremental text fragment for a single choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceDelta {
    /// Zero-based choice index.
    pub index: usize,
    /// Text fragment; providers may send deltas without content.
    pub content: Option<String>,
}

impl Chunk {
    /// A chunk with a single text delta.
    pub fn text(index: usize, content: impl Into<String>) -> Self {
        Self {
            choices: vec![ChoiceDelta::text(index, content)],
        }
    }

    pub fn new(choices: Vec<ChoiceDelta>) -> Self {
        Self { choices }
    }
}

impl ChoiceDelta {
    pub fn text(index: usize, content: impl Into<String>) -> Self {
        Self {
            index,
            content: Some(content.into()),
        }
    }

    /// A delta that carries no text (role announcements, finish markers).
    pub fn empty(index: usize) -> Self {
        Self {
            index,
            content: None,
        }
    }

    pub fn fragment(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_fragment_reads_as_empty() {
        assert_eq!(ChoiceDelta::empty(3).fragment(), "");
        assert_eq!(ChoiceDelta::text(0, "He").fragment(), "He");
    }
}

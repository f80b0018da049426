//! Strings that remember which program produced them.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A string annotated with the identity of the program that produced it.
///
/// The originator is metadata only: equality, hashing, ordering and serialization
/// all look at the text alone.
#[derive(Debug, Clone, Default)]
pub struct TrackedStr {
    content: String,
    originator: Option<String>,
}

impl TrackedStr {
    pub fn new(content: impl Into<String>, originator: Option<String>) -> Self {
        Self {
            content: content.into(),
            originator,
        }
    }

    /// Identity hash of the producing program, if known.
    pub fn originator(&self) -> Option<&str> {
        self.originator.as_deref()
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn into_string(self) -> String {
        self.content
    }
}

impl Deref for TrackedStr {
    type Target = str;

    fn deref(&self) -> &str {
        &self.content
    }
}

impl AsRef<str> for TrackedStr {
    fn as_ref(&self) -> &str {
        &self.content
    }
}

impl fmt::Display for TrackedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

impl PartialEq for TrackedStr {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
    }
}

impl Eq for TrackedStr {}

impl std::hash::Hash for TrackedStr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.content.hash(state);
    }
}

impl PartialOrd for TrackedStr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TrackedStr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.content.cmp(&other.content)
    }
}

impl PartialEq<str> for TrackedStr {
    fn eq(&self, other: &str) -> bool {
        self.content == other
    }
}

impl PartialEq<&str> for TrackedStr {
    fn eq(&self, other: &&str) -> bool {
        self.content == *other
    }
}

impl PartialEq<String> for TrackedStr {
    fn eq(&self, other: &String) -> bool {
        &self.content == other
    }
}

impl From<&str> for TrackedStr {
    fn from(s: &str) -> Self {
        Self::new(s, None)
    }
}

impl From<String> for TrackedStr {
    fn from(s: String) -> Self {
        Self::new(s, None)
    }
}

impl From<TrackedStr> for String {
    fn from(s: TrackedStr) -> Self {
        s.content
    }
}

impl Serialize for TrackedStr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.content)
    }
}

impl<'de> Deserialize<'de> for TrackedStr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(TrackedStr::from)
    }
}

/// The finalized output of one provider call.
///
/// A call that produced one choice yields `Single`; anything else yields the
/// choices in ascending index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Completion {
    Single(TrackedStr),
    Multiple(Vec<TrackedStr>),
}

impl Completion {
    /// The single completion, if exactly one choice was produced.
    pub fn as_single(&self) -> Option<&TrackedStr> {
        match self {
            Completion::Single(s) => Some(s),
            Completion::Multiple(_) => None,
        }
    }

    /// All completions in choice order.
    pub fn choices(&self) -> &[TrackedStr] {
        match self {
            Completion::Single(s) => std::slice::from_ref(s),
            Completion::Multiple(v) => v,
        }
    }

    pub fn into_choices(self) -> Vec<TrackedStr> {
        match self {
            Completion::Single(s) => vec![s],
            Completion::Multiple(v) => v,
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Single(s) => f.write_str(s),
            Completion::Multiple(v) => {
                let parts: Vec<&str> = v.iter().map(TrackedStr::as_str).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

//! Identifiers and feature names shared across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of a post in the feed.
///
/// The engine never interprets the value; it is only used as a map key and
/// forwarded to the API client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    /// Create a post id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PostId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A backend feature whose availability is discovered at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    /// `/post/{id}/like` and `/post/{id}/unlike`
    Like,
    /// `/post/{id}/dislike` and `/post/{id}/undislike`
    Dislike,
    /// `/post/{id}/comments`
    Comments,
}

impl Feature {
    /// All features tracked by the capability registry
    pub const ALL: [Feature; 3] = [Feature::Like, Feature::Dislike, Feature::Comments];

    /// Lowercase name used in logs and configuration keys
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
            Self::Comments => "comments",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            "comments" => Ok(Self::Comments),
            other => Err(format!("unknown feature `{other}`")),
        }
    }
}

/// One of the two mutually exclusive reactions a user can hold on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    /// Positive reaction
    Like,
    /// Negative reaction
    Dislike,
}

impl ReactionKind {
    /// The opposing reaction, cleared whenever this one is enabled
    #[must_use]
    pub fn opposite(&self) -> Self {
        match self {
            Self::Like => Self::Dislike,
            Self::Dislike => Self::Like,
        }
    }

    /// Capability that gates the remote endpoint for this reaction
    #[must_use]
    pub fn feature(&self) -> Feature {
        match self {
            Self::Like => Feature::Like,
            Self::Dislike => Feature::Dislike,
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.feature().name())
    }
}

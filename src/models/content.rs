//! Canonical content item and identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Unique identifier for an ingested item.
///
/// Derived deterministically from source fields; re-ingesting the same
/// input yields the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates a new item id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where an item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentSource {
    /// Chat-log session dialect (newline-delimited JSON transcripts).
    ChatLog,
    /// Rollout session dialect (manifest plus ordered event files).
    Rollout,
    /// Multi-agent session dialect (mission/cycle/task state directory).
    MultiAgent,
    /// RSS or Atom feed.
    Rss,
    /// Browser history database.
    Browser,
    /// Newsletter archive export.
    Newsletter,
    /// User-supplied seed idea.
    Seed,
}

impl ContentSource {
    /// Stable string form used in ids, tags, and persisted state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChatLog => "chat-log",
            Self::Rollout => "rollout",
            Self::MultiAgent => "multi-agent",
            Self::Rss => "rss",
            Self::Browser => "browser",
            Self::Newsletter => "newsletter",
            Self::Seed => "seed",
        }
    }

    /// Whether this source yields coding sessions rather than reading
    /// material.
    #[must_use]
    pub const fn is_session(self) -> bool {
        matches!(self, Self::ChatLog | Self::Rollout | Self::MultiAgent)
    }
}

impl fmt::Display for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentSource {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "chat-log" => Ok(Self::ChatLog),
            "rollout" => Ok(Self::Rollout),
            "multi-agent" => Ok(Self::MultiAgent),
            "rss" => Ok(Self::Rss),
            "browser" => Ok(Self::Browser),
            "newsletter" => Ok(Self::Newsletter),
            "seed" => Ok(Self::Seed),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown content source: {other}"
            ))),
        }
    }
}

/// Content format category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    /// An AI coding session.
    Session,
    /// A long-form article.
    Article,
    /// A short social or forum post.
    Post,
    /// An email or newsletter issue.
    Email,
    /// A video.
    Video,
    /// A user note or seed.
    Note,
}

impl ContentKind {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Article => "article",
            Self::Post => "post",
            Self::Email => "email",
            Self::Video => "video",
            Self::Note => "note",
        }
    }
}

/// Source-agnostic canonical ingestion record.
///
/// Every parser produces these. The core pipeline operates on
/// `ContentItem` values and never needs to know which source produced an
/// item. Items are immutable once created; the analyzer decorates
/// sessions in a separate pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Stable identifier derived from source fields.
    pub id: ItemId,
    /// Originating source.
    pub source: ContentSource,
    /// Content format category.
    pub kind: ContentKind,
    /// Item title. For sessions, a short summary line.
    pub title: String,
    /// Full body text.
    pub body: String,
    /// Short excerpt for digests.
    #[serde(default)]
    pub excerpt: String,
    /// Canonical URL, when the source provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Author, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Publishing site or feed name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    /// Publication timestamp, when the source provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// When this item entered the store.
    pub ingested_at: DateTime<Utc>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Detected topics.
    #[serde(default)]
    pub topics: BTreeSet<String>,
    /// Attributed project, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Opaque source-specific metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ContentItem {
    /// The calendar date this item belongs to: `published_at` when
    /// present, otherwise `ingested_at`.
    #[must_use]
    pub fn bucket_timestamp(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.ingested_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_display() {
        let id = ItemId::new("rss:abc123");
        assert_eq!(id.to_string(), "rss:abc123");
        assert_eq!(id.as_str(), "rss:abc123");
    }

    #[test]
    fn test_source_roundtrip() {
        for source in [
            ContentSource::ChatLog,
            ContentSource::Rollout,
            ContentSource::MultiAgent,
            ContentSource::Rss,
            ContentSource::Browser,
            ContentSource::Newsletter,
            ContentSource::Seed,
        ] {
            let parsed: ContentSource = source.as_str().parse().unwrap();
            assert_eq!(parsed, source);
        }
    }

    #[test]
    fn test_unknown_source_rejected() {
        assert!("gopher".parse::<ContentSource>().is_err());
    }

    #[test]
    fn test_session_sources() {
        assert!(ContentSource::ChatLog.is_session());
        assert!(ContentSource::MultiAgent.is_session());
        assert!(!ContentSource::Rss.is_session());
        assert!(!ContentSource::Seed.is_session());
    }
}

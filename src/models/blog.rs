//! Blog post types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of blog post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlogPostType {
    /// Weekly synthesis of a calendar week of journals.
    Weekly,
    /// Deep-dive on one recurring theme.
    Thematic,
    /// Digest of external reading.
    ReadingList,
}

impl BlogPostType {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Thematic => "thematic",
            Self::ReadingList => "reading-list",
        }
    }
}

impl fmt::Display for BlogPostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One synthesized blog post, unique per slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPost {
    /// Unique slug, also the file stem.
    pub slug: String,
    /// Kind of post.
    pub post_type: BlogPostType,
    /// Date attributed to the post (week end or last evidence date).
    pub date: NaiveDate,
    /// Post title.
    pub title: String,
    /// The markdown prose body.
    pub body_markdown: String,
    /// Themes the post covers.
    #[serde(default)]
    pub themes: Vec<String>,
    /// Projects mentioned.
    #[serde(default)]
    pub projects: Vec<String>,
    /// Journal dates consumed to produce this post.
    #[serde(default)]
    pub source_dates: Vec<NaiveDate>,
    /// Extracted key points, used for cross-post dedup.
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Short canonical example strings, used for cross-post dedup.
    #[serde(default)]
    pub examples_used: Vec<String>,
    /// Platforms this post has been delivered to.
    #[serde(default)]
    pub platforms_published: BTreeSet<String>,
}

/// Derives a slug from free text: lowercased, punctuation runs collapsed
/// to single hyphens, trimmed of leading/trailing hyphens.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_was_hyphen = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

//! Seeds and editorial notes: user-authored steering input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A short user-supplied idea woven into synthesis context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    /// Short random identifier.
    pub id: String,
    /// The idea text.
    pub text: String,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// When the seed was added.
    pub created_at: DateTime<Utc>,
    /// Whether the seed has been consumed.
    #[serde(default)]
    pub used: bool,
    /// What consumed the seed (journal date or post slug).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_in: Option<String>,
}

impl Seed {
    /// Creates a new unused seed with a random id.
    #[must_use]
    pub fn new(text: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string()[..12].to_string(),
            text: text.into(),
            tags,
            created_at: Utc::now(),
            used: false,
            used_in: None,
        }
    }
}

/// A steering instruction targeted at a week, a theme, or everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorialNote {
    /// Short random identifier.
    pub id: String,
    /// The instruction text.
    pub text: String,
    /// Target selector: empty (global), `week:<ISO-week>`, or
    /// `theme:<slug>`.
    #[serde(default)]
    pub target: String,
    /// When the note was added.
    pub created_at: DateTime<Utc>,
    /// Whether the note has been consumed.
    #[serde(default)]
    pub used: bool,
}

impl EditorialNote {
    /// Creates a new unused note with a random id.
    #[must_use]
    pub fn new(text: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string()[..12].to_string(),
            text: text.into(),
            target: target.into(),
            created_at: Utc::now(),
            used: false,
        }
    }

    /// Whether this note applies to the given target selector. Global
    /// notes (empty target) match everything; otherwise the target must
    /// match exactly. Notes with an unmatched target are simply never
    /// selected.
    #[must_use]
    pub fn matches(&self, target: &str) -> bool {
        self.target.is_empty() || self.target == target
    }
}

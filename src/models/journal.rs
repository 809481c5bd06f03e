//! Journal entry types.

use super::content::ItemId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Available journal writing styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum JournalStyle {
    /// Personal developer journal, first person.
    #[default]
    DevJournal,
    /// Technical blog voice.
    TechBlog,
    /// Team status update voice.
    TeamUpdate,
    /// Building-in-public voice.
    BuildingInPublic,
}

impl JournalStyle {
    /// Stable string form used in filenames and state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DevJournal => "dev-journal",
            Self::TechBlog => "tech-blog",
            Self::TeamUpdate => "team-update",
            Self::BuildingInPublic => "building-in-public",
        }
    }
}

impl fmt::Display for JournalStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JournalStyle {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "dev-journal" => Ok(Self::DevJournal),
            "tech-blog" => Ok(Self::TechBlog),
            "team-update" => Ok(Self::TeamUpdate),
            "building-in-public" => Ok(Self::BuildingInPublic),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown journal style: {other}"
            ))),
        }
    }
}

/// One synthesized journal entry, unique per `(date, style)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// The day this entry narrates.
    pub date: NaiveDate,
    /// Writing style the entry was generated in.
    pub style: JournalStyle,
    /// Word count of the prose body.
    pub word_count: usize,
    /// Projects touched during the day.
    pub projects: Vec<String>,
    /// Number of sessions contributing to this entry.
    pub sessions_count: usize,
    /// Total session time in whole minutes.
    pub duration_minutes: u64,
    /// Tags across contributing sessions.
    pub tags: BTreeSet<String>,
    /// The markdown prose body.
    pub body_markdown: String,
    /// Ids of the sessions that contributed.
    pub source_session_ids: Vec<ItemId>,
    /// When the entry was generated.
    pub generated_at: DateTime<Utc>,
}

impl JournalEntry {
    /// File stem for this entry: `journal-<date>-<style>`.
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!("journal-{}-{}", self.date, self.style)
    }
}

//! Session types: the coding-session specialization of content items.

use super::content::ContentItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Session duration, recomputed by the analyzer.
///
/// A session whose end timestamp precedes its start is marked `Unknown`
/// rather than carrying a negative duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationSummary {
    /// Duration in whole seconds. Always non-negative.
    Known(u64),
    /// Timestamps were missing or inconsistent.
    Unknown,
}

impl DurationSummary {
    /// Duration in seconds, treating unknown as zero.
    #[must_use]
    pub const fn seconds_or_zero(self) -> u64 {
        match self {
            Self::Known(secs) => secs,
            Self::Unknown => 0,
        }
    }

    /// Duration in whole minutes, treating unknown as zero.
    #[must_use]
    pub const fn minutes_or_zero(self) -> u64 {
        self.seconds_or_zero() / 60
    }
}

/// A structured event observed during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    /// Human-readable description.
    pub description: String,
    /// Files modified by this outcome, when applicable.
    #[serde(default)]
    pub files_modified: Vec<String>,
    /// Shell command run, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl SessionOutcome {
    /// Creates a description-only outcome.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            files_modified: Vec::new(),
            command: None,
        }
    }
}

/// An ordered signal emitted by an agent during a multi-agent session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSignal {
    /// When the signal was emitted.
    pub ts: DateTime<Utc>,
    /// Identifier of the emitting agent.
    pub agent_id: String,
    /// Role of the emitting agent (dev, qa, planner, ...).
    pub role: String,
    /// Signal name (done, approved, blocked, needs_revision, complete).
    pub signal: String,
    /// Free-text message attached to the signal.
    #[serde(default)]
    pub message: String,
}

/// One recorded execution of an AI coding assistant.
///
/// A session is a [`ContentItem`] plus timing, tool usage, and structured
/// outcome data. The `item` is created by a parser and never mutated; all
/// derived fields are filled by the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// The canonical ingestion record for this session.
    pub item: ContentItem,
    /// When the session started (first message or manifest timestamp).
    pub started_at: DateTime<Utc>,
    /// When the session ended, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Recomputed duration.
    pub duration: DurationSummary,
    /// Tool name to call count.
    #[serde(default)]
    pub tool_usage: BTreeMap<String, u32>,
    /// Ordered structured events.
    #[serde(default)]
    pub outcomes: Vec<SessionOutcome>,
    /// Ordered agent signals (multi-agent sessions only).
    #[serde(default)]
    pub agent_signals: Vec<AgentSignal>,
    /// Free-text learnings, preserved verbatim from the source.
    #[serde(default)]
    pub learnings: Vec<String>,
    /// Attributed project. `(unassigned)` when attribution fails.
    pub project: String,
    /// Deterministic one-line narrative, filled by the analyzer.
    #[serde(default)]
    pub narrative: String,
}

impl Session {
    /// Recomputes the duration from the start/end timestamps.
    ///
    /// Negative spans (end before start) yield `Unknown`.
    #[must_use]
    pub fn computed_duration(&self) -> DurationSummary {
        match self.ended_at {
            Some(end) => {
                let span = end.signed_duration_since(self.started_at);
                match u64::try_from(span.num_seconds()) {
                    Ok(secs) => DurationSummary::Known(secs),
                    Err(_) => DurationSummary::Unknown,
                }
            },
            None => DurationSummary::Unknown,
        }
    }

    /// All files modified across outcomes, deduplicated, in order.
    #[must_use]
    pub fn files_modified(&self) -> Vec<&str> {
        let mut seen = std::collections::BTreeSet::new();
        let mut files = Vec::new();
        for outcome in &self.outcomes {
            for file in &outcome.files_modified {
                if seen.insert(file.as_str()) {
                    files.push(file.as_str());
                }
            }
        }
        files
    }

    /// The top `n` tools by call count, name only.
    #[must_use]
    pub fn top_tools(&self, n: usize) -> Vec<&str> {
        let mut tools: Vec<(&str, u32)> = self
            .tool_usage
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        tools.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        tools.into_iter().take(n).map(|(name, _)| name).collect()
    }
}

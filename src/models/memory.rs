//! Unified memory: threads, entities, daily entries, and published
//! artifacts tracked across runs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle of a memory thread. Dormancy is a flag, not deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    /// Thread was seen recently.
    #[default]
    Active,
    /// Thread has not been seen within the dormancy window.
    Dormant,
}

/// A recurring topic tracked across days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryThread {
    /// Thread name (short kebab-case).
    pub name: String,
    /// Current one-line state of the thread.
    pub summary: String,
    /// First day the thread was observed.
    pub first_seen: NaiveDate,
    /// Most recent day the thread was observed.
    pub last_seen: NaiveDate,
    /// How many days mentioned it.
    pub mention_count: u32,
    /// Active or dormant.
    #[serde(default)]
    pub status: ThreadStatus,
}

/// A tracked entity: project, technology, person, or concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Entity name.
    pub name: String,
    /// Entity category.
    pub entity_type: String,
    /// First day the entity was observed.
    pub first_seen: NaiveDate,
    /// Most recent day the entity was observed.
    pub last_seen: NaiveDate,
    /// How many times it has been mentioned.
    pub mention_count: u32,
    /// Recent context snippets, bounded.
    #[serde(default)]
    pub recent_contexts: Vec<String>,
}

/// Record of a published artifact. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedRecord {
    /// Post slug.
    pub slug: String,
    /// Post title.
    pub title: String,
    /// Post type string.
    pub post_type: String,
    /// Date attributed to the post.
    pub date: NaiveDate,
    /// Platforms delivered to.
    #[serde(default)]
    pub platforms: Vec<String>,
}

/// Memory from a single day across all streams.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyEntry {
    /// The day.
    pub date: NaiveDate,
    /// Ids of sessions seen that day.
    #[serde(default)]
    pub session_ids: Vec<String>,
    /// Ids of read items seen that day.
    #[serde(default)]
    pub read_ids: Vec<String>,
    /// High-level themes.
    #[serde(default)]
    pub themes: Vec<String>,
    /// What was learned.
    #[serde(default)]
    pub insights: Vec<String>,
    /// What was decided.
    #[serde(default)]
    pub decisions: Vec<String>,
    /// Unresolved questions.
    #[serde(default)]
    pub open_questions: Vec<String>,
}

/// One memory system for the entire pipeline.
///
/// Memory grows monotonically: threads and entities are never deleted,
/// only marked dormant; old daily entries may be compacted into summary
/// strings past a configurable horizon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnifiedMemory {
    /// Per-day entries, kept sorted by date.
    #[serde(default)]
    pub daily_entries: Vec<DailyEntry>,
    /// Threads keyed by name.
    #[serde(default)]
    pub threads: BTreeMap<String, MemoryThread>,
    /// Entities keyed by `type:name` (lowercased).
    #[serde(default)]
    pub entities: BTreeMap<String, EntityRecord>,
    /// Published artifacts, in publication order.
    #[serde(default)]
    pub published: Vec<PublishedRecord>,
    /// Compacted summaries of entries past the horizon.
    #[serde(default)]
    pub compacted: Vec<String>,
}

impl UnifiedMemory {
    /// Merges a daily entry. An existing entry for the same date is
    /// extended, not replaced.
    pub fn record_daily(&mut self, entry: DailyEntry) {
        if let Some(existing) = self.daily_entries.iter_mut().find(|e| e.date == entry.date) {
            merge_unique(&mut existing.session_ids, entry.session_ids);
            merge_unique(&mut existing.read_ids, entry.read_ids);
            merge_unique(&mut existing.themes, entry.themes);
            merge_unique(&mut existing.insights, entry.insights);
            merge_unique(&mut existing.decisions, entry.decisions);
            merge_unique(&mut existing.open_questions, entry.open_questions);
        } else {
            self.daily_entries.push(entry);
            self.daily_entries.sort_by_key(|e| e.date);
        }
    }

    /// Records themes as threads seen on `date`. Existing threads get
    /// `last_seen` and `mention_count` updates; summaries are refreshed
    /// when a non-empty one is provided.
    pub fn update_threads(&mut self, seen: &[(String, String)], date: NaiveDate) {
        for (name, summary) in seen {
            match self.threads.get_mut(name) {
                Some(thread) => {
                    if date > thread.last_seen {
                        thread.last_seen = date;
                    }
                    thread.mention_count += 1;
                    thread.status = ThreadStatus::Active;
                    if !summary.is_empty() {
                        thread.summary.clone_from(summary);
                    }
                },
                None => {
                    self.threads.insert(
                        name.clone(),
                        MemoryThread {
                            name: name.clone(),
                            summary: summary.clone(),
                            first_seen: date,
                            last_seen: date,
                            mention_count: 1,
                            status: ThreadStatus::Active,
                        },
                    );
                },
            }
        }
    }

    /// Marks threads dormant when unseen for `dormant_days` relative to
    /// the most recent daily entry.
    pub fn sweep_dormant(&mut self, dormant_days: i64) {
        let Some(latest) = self.daily_entries.iter().map(|e| e.date).max() else {
            return;
        };
        for thread in self.threads.values_mut() {
            let age = latest.signed_duration_since(thread.last_seen).num_days();
            if age > dormant_days {
                thread.status = ThreadStatus::Dormant;
            }
        }
    }

    /// Tracks an entity mention on `date` with an optional context
    /// snippet. Context history is bounded to ten snippets.
    pub fn update_entity(
        &mut self,
        name: &str,
        entity_type: &str,
        date: NaiveDate,
        context: &str,
    ) {
        let key = format!("{entity_type}:{}", name.to_lowercase());
        match self.entities.get_mut(&key) {
            Some(entity) => {
                if date > entity.last_seen {
                    entity.last_seen = date;
                }
                entity.mention_count += 1;
                if !context.is_empty() && entity.recent_contexts.len() < 10 {
                    entity.recent_contexts.push(context.to_string());
                }
            },
            None => {
                self.entities.insert(
                    key,
                    EntityRecord {
                        name: name.to_string(),
                        entity_type: entity_type.to_string(),
                        first_seen: date,
                        last_seen: date,
                        mention_count: 1,
                        recent_contexts: if context.is_empty() {
                            Vec::new()
                        } else {
                            vec![context.to_string()]
                        },
                    },
                );
            },
        }
    }

    /// Appends a published record. Re-publishing the same slug replaces
    /// the earlier record.
    pub fn record_published(&mut self, record: PublishedRecord) {
        self.published.retain(|p| p.slug != record.slug);
        self.published.push(record);
    }

    /// Threads whose `last_seen` falls within `window_days` of `date`.
    #[must_use]
    pub fn active_threads(&self, date: NaiveDate, window_days: i64) -> Vec<&MemoryThread> {
        let mut threads: Vec<&MemoryThread> = self
            .threads
            .values()
            .filter(|t| {
                t.status == ThreadStatus::Active
                    && date.signed_duration_since(t.last_seen).num_days() <= window_days
            })
            .collect();
        threads.sort_by(|a, b| {
            b.mention_count
                .cmp(&a.mention_count)
                .then_with(|| a.name.cmp(&b.name))
        });
        threads
    }

    /// Entities mentioned on the given day.
    #[must_use]
    pub fn entities_seen_on(&self, date: NaiveDate) -> Vec<&EntityRecord> {
        let mut entities: Vec<&EntityRecord> = self
            .entities
            .values()
            .filter(|e| e.last_seen == date)
            .collect();
        entities.sort_by(|a, b| {
            b.mention_count
                .cmp(&a.mention_count)
                .then_with(|| a.name.cmp(&b.name))
        });
        entities
    }

    /// Compacts daily entries older than `horizon_days` (relative to the
    /// newest entry) into one-line summary strings. Threads and entities
    /// are untouched.
    pub fn compact(&mut self, horizon_days: i64) {
        let Some(latest) = self.daily_entries.iter().map(|e| e.date).max() else {
            return;
        };
        let (old, kept): (Vec<DailyEntry>, Vec<DailyEntry>) =
            self.daily_entries.drain(..).partition(|e| {
                latest.signed_duration_since(e.date).num_days() > horizon_days
            });
        for entry in &old {
            self.compacted.push(format!(
                "{}: {} sessions, {} reads; themes: {}",
                entry.date,
                entry.session_ids.len(),
                entry.read_ids.len(),
                entry.themes.join(", ")
            ));
        }
        self.daily_entries = kept;
    }

    /// Renders memory as markdown for LLM context injection. Empty when
    /// there is nothing to say.
    #[must_use]
    pub fn render_for_prompt(&self, date: NaiveDate, window_days: i64) -> String {
        if self.daily_entries.is_empty() && self.threads.is_empty() {
            return String::new();
        }

        let mut lines: Vec<String> = vec!["# Memory Context".to_string(), String::new()];

        let mut recent: Vec<&DailyEntry> = self.daily_entries.iter().collect();
        recent.sort_by_key(|e| std::cmp::Reverse(e.date));
        for entry in recent.into_iter().take(7) {
            lines.push(format!("## {}", entry.date));
            if !entry.themes.is_empty() {
                lines.push(format!("Themes: {}", entry.themes.join(", ")));
            }
            push_list(&mut lines, "Insights:", &entry.insights, 3);
            push_list(&mut lines, "Decisions:", &entry.decisions, 3);
            push_list(&mut lines, "Open questions:", &entry.open_questions, 3);
            lines.push(String::new());
        }

        let active = self.active_threads(date, window_days);
        if !active.is_empty() {
            lines.push("## Ongoing Threads".to_string());
            for thread in active {
                lines.push(format!(
                    "- **{}** ({}x since {}): {}",
                    thread.name, thread.mention_count, thread.first_seen, thread.summary
                ));
            }
            lines.push(String::new());
        }

        if !self.published.is_empty() {
            let mut recent_pub: Vec<&PublishedRecord> = self.published.iter().collect();
            recent_pub.sort_by_key(|p| std::cmp::Reverse(p.date));
            lines.push("## Recently Published".to_string());
            for record in recent_pub.into_iter().take(5) {
                let platforms = if record.platforms.is_empty() {
                    "unpublished".to_string()
                } else {
                    record.platforms.join(", ")
                };
                lines.push(format!(
                    "- \"{}\" ({}, {platforms})",
                    record.title, record.date
                ));
            }
            lines.push(String::new());
        }

        lines.join("\n")
    }
}

fn merge_unique(target: &mut Vec<String>, incoming: Vec<String>) {
    for value in incoming {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

fn push_list(lines: &mut Vec<String>, header: &str, items: &[String], limit: usize) {
    if items.is_empty() {
        return;
    }
    lines.push(header.to_string());
    for item in items.iter().take(limit) {
        lines.push(format!("  - {item}"));
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Dormant => f.write_str("dormant"),
        }
    }
}

//! Blog context assembly.
//!
//! Two context types, one per post shape. Weekly contexts aggregate a
//! calendar week of journal entries; thematic contexts gather evidence
//! for one recurring memory thread. Candidate selection is data-driven
//! from memory threads using exact-string matching.

use crate::models::{JournalEntry, MemoryThread, UnifiedMemory};
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeMap;

/// Context for a weekly synthesis post.
#[derive(Debug, Clone)]
pub struct WeeklyContext {
    /// ISO week year.
    pub year: i32,
    /// ISO week number.
    pub week: u32,
    /// Monday of the week.
    pub week_start: NaiveDate,
    /// Sunday of the week.
    pub week_end: NaiveDate,
    /// Journal dates consumed, ascending.
    pub source_dates: Vec<NaiveDate>,
    /// Total sessions across the week.
    pub total_sessions: usize,
    /// Total session minutes across the week.
    pub total_duration_minutes: u64,
    /// Unique projects across the week.
    pub projects: Vec<String>,
    /// Sub-topics appearing in at least two journals of the week.
    pub recurring_topics: Vec<String>,
    /// Decisions recorded in memory during the week.
    pub decisions: Vec<String>,
    /// Open questions recorded in memory during the week.
    pub open_questions: Vec<String>,
    /// Journal prose stitched day by day.
    pub combined_prose: String,
}

/// Context for a thematic deep-dive post.
#[derive(Debug, Clone)]
pub struct ThematicContext {
    /// The thread the post is about.
    pub thread: MemoryThread,
    /// Journal dates contributing evidence, ascending.
    pub source_dates: Vec<NaiveDate>,
    /// Evidence excerpts stitched date by date.
    pub combined_evidence: String,
    /// Projects mentioned in the evidence.
    pub projects: Vec<String>,
}

/// The weekly slug for an ISO week.
#[must_use]
pub fn weekly_slug(year: i32, week: u32) -> String {
    format!("weekly-{year}-W{week:02}")
}

/// Groups journal entries by ISO week.
#[must_use]
pub fn group_by_week(entries: &[JournalEntry]) -> BTreeMap<(i32, u32), Vec<&JournalEntry>> {
    let mut weeks: BTreeMap<(i32, u32), Vec<&JournalEntry>> = BTreeMap::new();
    for entry in entries {
        let iso = entry.date.iso_week();
        weeks.entry((iso.year(), iso.week())).or_default().push(entry);
    }
    for entries in weeks.values_mut() {
        entries.sort_by_key(|e| e.date);
    }
    weeks
}

/// Builds the weekly context for one ISO week. Returns `None` when the
/// week has fewer than `min_journals` entries: a thin week is skipped,
/// not padded into an empty post.
#[must_use]
pub fn prepare_weekly_context(
    year: i32,
    week: u32,
    entries: &[&JournalEntry],
    memory: &UnifiedMemory,
    min_journals: usize,
) -> Option<WeeklyContext> {
    if entries.len() < min_journals {
        return None;
    }

    let week_start = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
    let week_end = week_start + chrono::Duration::days(6);

    let mut projects: Vec<String> = Vec::new();
    let mut tag_days: BTreeMap<&str, usize> = BTreeMap::new();
    let mut prose_parts: Vec<String> = Vec::new();
    let mut source_dates: Vec<NaiveDate> = Vec::new();
    let mut total_sessions = 0;
    let mut total_duration_minutes = 0;

    let mut sorted: Vec<&&JournalEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.date);

    for entry in sorted {
        source_dates.push(entry.date);
        total_sessions += entry.sessions_count;
        total_duration_minutes += entry.duration_minutes;
        for project in &entry.projects {
            if !projects.contains(project) {
                projects.push(project.clone());
            }
        }
        for tag in &entry.tags {
            *tag_days.entry(tag.as_str()).or_insert(0) += 1;
        }
        prose_parts.push(format!(
            "## {}\n\n{}",
            entry.date.format("%A, %B %d"),
            entry.body_markdown
        ));
    }

    let recurring_topics: Vec<String> = tag_days
        .into_iter()
        .filter(|(_, days)| *days >= 2)
        .map(|(tag, _)| tag.to_string())
        .collect();

    let mut decisions = Vec::new();
    let mut open_questions = Vec::new();
    for daily in &memory.daily_entries {
        if daily.date >= week_start && daily.date <= week_end {
            decisions.extend(daily.decisions.iter().cloned());
            open_questions.extend(daily.open_questions.iter().cloned());
        }
    }

    Some(WeeklyContext {
        year,
        week,
        week_start,
        week_end,
        source_dates,
        total_sessions,
        total_duration_minutes,
        projects,
        recurring_topics,
        decisions,
        open_questions,
        combined_prose: prose_parts.join("\n\n"),
    })
}

/// A ranked thematic candidate.
#[derive(Debug, Clone)]
pub struct ThemeCandidate {
    /// The qualifying thread.
    pub thread: MemoryThread,
    /// Highest mention count inside any qualifying window.
    pub window_mentions: u32,
}

/// Finds thematic candidates: threads mentioned at least `mention_min`
/// times within some 14-day window, last seen within the last 30 days of
/// `today`, with no thematic post generated yet. Ranked by
/// (window mentions, recency, name).
#[must_use]
pub fn thematic_candidates(
    memory: &UnifiedMemory,
    today: NaiveDate,
    mention_min: u32,
    has_post: impl Fn(&str) -> bool,
) -> Vec<ThemeCandidate> {
    let mut candidates: Vec<ThemeCandidate> = memory
        .threads
        .values()
        .filter(|thread| today.signed_duration_since(thread.last_seen).num_days() <= 30)
        .filter(|thread| !has_post(&thread.name))
        .filter_map(|thread| {
            let mentions = peak_window_mentions(memory, &thread.name, 14);
            (mentions >= mention_min).then(|| ThemeCandidate {
                thread: thread.clone(),
                window_mentions: mentions,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.window_mentions
            .cmp(&a.window_mentions)
            .then_with(|| b.thread.last_seen.cmp(&a.thread.last_seen))
            .then_with(|| a.thread.name.cmp(&b.thread.name))
    });
    candidates
}

/// Whether a theme stays eligible for thematic treatment: it either
/// still clears the mention window, or a post already exists for it.
#[must_use]
pub fn theme_remains_eligible(
    memory: &UnifiedMemory,
    name: &str,
    mention_min: u32,
    has_post: bool,
) -> bool {
    has_post || peak_window_mentions(memory, name, 14) >= mention_min
}

/// The most mentions of `theme` inside any `window_days`-day window of
/// the daily entries.
fn peak_window_mentions(memory: &UnifiedMemory, theme: &str, window_days: i64) -> u32 {
    let mut dates: Vec<NaiveDate> = memory
        .daily_entries
        .iter()
        .filter(|entry| entry.themes.iter().any(|t| t == theme))
        .map(|entry| entry.date)
        .collect();
    dates.sort_unstable();
    dates.dedup();

    let mut peak = 0u32;
    for (i, start) in dates.iter().enumerate() {
        let end = *start + chrono::Duration::days(window_days - 1);
        let in_window = dates[i..].iter().take_while(|d| **d <= end).count();
        peak = peak.max(u32::try_from(in_window).unwrap_or(u32::MAX));
    }
    peak
}

/// Builds the thematic context: every journal excerpt mentioning the
/// theme across its active window, by exact-string match.
#[must_use]
pub fn prepare_thematic_context(
    thread: &MemoryThread,
    entries: &[JournalEntry],
) -> Option<ThematicContext> {
    let needle = thread.name.to_lowercase();
    let mut evidence: Vec<&JournalEntry> = entries
        .iter()
        .filter(|entry| entry.date >= thread.first_seen && entry.date <= thread.last_seen)
        .filter(|entry| {
            entry.body_markdown.to_lowercase().contains(&needle)
                || entry.tags.iter().any(|t| t.to_lowercase() == needle)
        })
        .collect();
    evidence.sort_by_key(|e| e.date);

    if evidence.is_empty() {
        return None;
    }

    let mut projects: Vec<String> = Vec::new();
    let mut parts: Vec<String> = Vec::new();
    let mut source_dates = Vec::new();
    for entry in &evidence {
        source_dates.push(entry.date);
        for project in &entry.projects {
            if !projects.contains(project) {
                projects.push(project.clone());
            }
        }
        parts.push(format!(
            "### {}\n\n{}",
            entry.date.format("%B %d, %Y"),
            excerpt_around(&entry.body_markdown, &needle, 600)
        ));
    }

    Some(ThematicContext {
        thread: thread.clone(),
        source_dates,
        combined_evidence: parts.join("\n\n"),
        projects,
    })
}

/// A bounded excerpt centered on the first mention of `needle`; the
/// whole body when the mention is only in tags.
fn excerpt_around(body: &str, needle: &str, radius: usize) -> String {
    // Lowercasing can shift byte offsets for non-ASCII text, so the
    // position is only trusted when it lands on a char boundary
    let pos = body
        .to_lowercase()
        .find(needle)
        .filter(|&p| body.is_char_boundary(p))
        .unwrap_or(0);
    let start = body[..pos]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map_or(0, |(i, _)| i);
    body[start..].chars().take(radius * 2).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DailyEntry, JournalStyle, ThreadStatus};
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn entry(date: NaiveDate, body: &str, tags: &[&str]) -> JournalEntry {
        JournalEntry {
            date,
            style: JournalStyle::DevJournal,
            word_count: body.split_whitespace().count(),
            projects: vec!["alpha".to_string()],
            sessions_count: 2,
            duration_minutes: 60,
            tags: tags.iter().map(ToString::to_string).collect::<BTreeSet<_>>(),
            body_markdown: body.to_string(),
            source_session_ids: vec![],
            generated_at: Utc::now(),
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_weekly_skip_below_minimum() {
        let entries = vec![
            entry(d(2026, 2, 2), "monday work", &[]),
            entry(d(2026, 2, 3), "tuesday work", &[]),
        ];
        let refs: Vec<&JournalEntry> = entries.iter().collect();
        assert!(prepare_weekly_context(2026, 6, &refs, &UnifiedMemory::default(), 3).is_none());
        assert!(prepare_weekly_context(2026, 6, &refs, &UnifiedMemory::default(), 2).is_some());
    }

    #[test]
    fn test_weekly_aggregates() {
        let entries = vec![
            entry(d(2026, 2, 2), "monday work", &["parsers", "testing"]),
            entry(d(2026, 2, 3), "tuesday work", &["parsers"]),
            entry(d(2026, 2, 4), "wednesday work", &["memory"]),
        ];
        let refs: Vec<&JournalEntry> = entries.iter().collect();
        let context =
            prepare_weekly_context(2026, 6, &refs, &UnifiedMemory::default(), 3).unwrap();

        assert_eq!(context.week_start, d(2026, 2, 2));
        assert_eq!(context.week_end, d(2026, 2, 8));
        assert_eq!(context.total_sessions, 6);
        assert_eq!(context.total_duration_minutes, 180);
        assert_eq!(context.recurring_topics, vec!["parsers"]);
        assert!(context.combined_prose.contains("## Monday, February 02"));
    }

    #[test]
    fn test_weekly_pulls_decisions_from_memory() {
        let mut memory = UnifiedMemory::default();
        memory.record_daily(DailyEntry {
            date: d(2026, 2, 3),
            decisions: vec!["use sha256 ids".to_string()],
            open_questions: vec!["what about collisions?".to_string()],
            ..Default::default()
        });
        let entries = vec![
            entry(d(2026, 2, 2), "a", &[]),
            entry(d(2026, 2, 3), "b", &[]),
            entry(d(2026, 2, 4), "c", &[]),
        ];
        let refs: Vec<&JournalEntry> = entries.iter().collect();
        let context = prepare_weekly_context(2026, 6, &refs, &memory, 3).unwrap();
        assert_eq!(context.decisions, vec!["use sha256 ids"]);
        assert_eq!(context.open_questions, vec!["what about collisions?"]);
    }

    fn memory_with_theme(theme: &str, dates: &[NaiveDate]) -> UnifiedMemory {
        let mut memory = UnifiedMemory::default();
        for date in dates {
            memory.record_daily(DailyEntry {
                date: *date,
                themes: vec![theme.to_string()],
                ..Default::default()
            });
            memory.update_threads(&[(theme.to_string(), "summary".to_string())], *date);
        }
        memory
    }

    #[test]
    fn test_thematic_candidate_at_threshold() {
        let memory = memory_with_theme("pipeline", &[d(2026, 2, 1), d(2026, 2, 3), d(2026, 2, 6)]);
        let candidates = thematic_candidates(&memory, d(2026, 2, 8), 3, |_| false);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].thread.name, "pipeline");
        assert_eq!(candidates[0].window_mentions, 3);
    }

    #[test]
    fn test_thematic_below_threshold_dropped() {
        let memory = memory_with_theme("pipeline", &[d(2026, 2, 1), d(2026, 2, 3)]);
        assert!(thematic_candidates(&memory, d(2026, 2, 8), 3, |_| false).is_empty());
    }

    #[test]
    fn test_spread_mentions_do_not_qualify() {
        // Three mentions but never three inside one 14-day window
        let memory =
            memory_with_theme("pipeline", &[d(2026, 1, 1), d(2026, 1, 20), d(2026, 2, 8)]);
        assert!(thematic_candidates(&memory, d(2026, 2, 8), 3, |_| false).is_empty());
    }

    #[test]
    fn test_stale_thread_excluded() {
        let memory = memory_with_theme("old", &[d(2025, 11, 1), d(2025, 11, 2), d(2025, 11, 3)]);
        assert!(thematic_candidates(&memory, d(2026, 2, 8), 3, |_| false).is_empty());
    }

    #[test]
    fn test_existing_post_excluded_but_remains_eligible() {
        let memory = memory_with_theme("pipeline", &[d(2026, 2, 1), d(2026, 2, 3), d(2026, 2, 6)]);
        let candidates = thematic_candidates(&memory, d(2026, 2, 8), 3, |name| name == "pipeline");
        assert!(candidates.is_empty());
        assert!(theme_remains_eligible(&memory, "pipeline", 3, true));

        // Without a post and below threshold, the theme is dropped
        let thin = memory_with_theme("thin", &[d(2026, 2, 1)]);
        assert!(!theme_remains_eligible(&thin, "thin", 3, false));
    }

    #[test]
    fn test_candidate_ranking_ties_break_by_name() {
        let mut memory = UnifiedMemory::default();
        for theme in ["zebra", "apple"] {
            for date in [d(2026, 2, 1), d(2026, 2, 2), d(2026, 2, 3)] {
                memory.record_daily(DailyEntry {
                    date,
                    themes: vec![theme.to_string()],
                    ..Default::default()
                });
                memory.update_threads(&[(theme.to_string(), String::new())], date);
            }
        }
        let candidates = thematic_candidates(&memory, d(2026, 2, 8), 3, |_| false);
        assert_eq!(candidates[0].thread.name, "apple");
        assert_eq!(candidates[1].thread.name, "zebra");
    }

    #[test]
    fn test_thematic_context_gathers_evidence() {
        let thread = MemoryThread {
            name: "pipeline".to_string(),
            summary: "the pipeline thread".to_string(),
            first_seen: d(2026, 2, 1),
            last_seen: d(2026, 2, 6),
            mention_count: 3,
            status: ThreadStatus::Active,
        };
        let entries = vec![
            entry(d(2026, 2, 1), "built the pipeline stage", &[]),
            entry(d(2026, 2, 3), "unrelated day", &[]),
            entry(d(2026, 2, 5), "tagged day", &["pipeline"]),
            entry(d(2026, 2, 9), "pipeline after window", &[]),
        ];

        let context = prepare_thematic_context(&thread, &entries).unwrap();
        assert_eq!(context.source_dates, vec![d(2026, 2, 1), d(2026, 2, 5)]);
        assert!(context.combined_evidence.contains("built the pipeline stage"));
    }

    #[test]
    fn test_thematic_context_empty_evidence() {
        let thread = MemoryThread {
            name: "ghost".to_string(),
            summary: String::new(),
            first_seen: d(2026, 2, 1),
            last_seen: d(2026, 2, 6),
            mention_count: 3,
            status: ThreadStatus::Active,
        };
        assert!(prepare_thematic_context(&thread, &[]).is_none());
    }

    #[test]
    fn test_weekly_slug() {
        assert_eq!(weekly_slug(2026, 6), "weekly-2026-W06");
    }
}

//! Daily context assembly.
//!
//! Compresses one day's analyzed sessions plus rolling memory, editorial
//! notes, seeds, and project descriptors into the structured text the
//! LLM prompt is built from. Fully deterministic; testable without any
//! LLM.

use crate::config::DistillConfig;
use crate::models::{DurationSummary, Seed, Session, UnifiedMemory};
use chrono::{Datelike, NaiveDate};

/// Compact per-session summary for LLM context.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Start time, `HH:MM`.
    pub time: String,
    /// Duration in minutes, when known.
    pub duration_minutes: Option<u64>,
    /// Source tag.
    pub source: String,
    /// Attributed project.
    pub project: String,
    /// Session title.
    pub title: String,
    /// Analyzer narrative line.
    pub narrative: String,
    /// Outcome descriptions, bounded.
    pub outcomes: Vec<String>,
    /// Top tools by call count.
    pub top_tools: Vec<String>,
    /// Session tags, bounded.
    pub tags: Vec<String>,
    /// Learnings preserved from the source.
    pub learnings: Vec<String>,
    /// Top-level agent signals (`role/signal`), bounded.
    pub signals: Vec<String>,
}

/// Compressed context for a single day.
#[derive(Debug, Clone)]
pub struct DailyContext {
    /// The day.
    pub date: NaiveDate,
    /// Number of sessions included.
    pub total_sessions: usize,
    /// Total known session time, minutes.
    pub total_duration_minutes: u64,
    /// Unique projects in session order.
    pub projects: Vec<String>,
    /// Per-session summaries.
    pub sessions: Vec<SessionSummary>,
    /// Union of session tags, bounded.
    pub tags: Vec<String>,
    /// Rendered rolling-memory context.
    pub memory_context: String,
    /// Rendered editorial direction.
    pub editorial_context: String,
    /// Unused seed texts.
    pub seeds: Vec<String>,
    /// `name: description` lines for projects touched today.
    pub project_descriptors: Vec<String>,
}

/// The ISO-week selector for a date, e.g. `week:2026-W06`.
#[must_use]
pub fn week_target(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("week:{}-W{:02}", week.year(), week.week())
}

/// Builds the daily context from analyzed sessions.
#[must_use]
pub fn prepare_daily_context(
    date: NaiveDate,
    sessions: &[Session],
    memory: &UnifiedMemory,
    editorial_context: String,
    seeds: &[&Seed],
    config: &DistillConfig,
) -> DailyContext {
    let mut day_sessions: Vec<&Session> = sessions.iter().collect();
    day_sessions.sort_by_key(|s| s.started_at);
    day_sessions.truncate(config.journal.max_sessions_per_entry);

    let total_duration_minutes = day_sessions
        .iter()
        .map(|s| s.duration.minutes_or_zero())
        .sum();

    let mut projects: Vec<String> = Vec::new();
    let mut tags: Vec<String> = Vec::new();
    let mut summaries = Vec::new();

    for session in &day_sessions {
        if session.project != "(unassigned)" && !projects.contains(&session.project) {
            projects.push(session.project.clone());
        }
        for tag in &session.item.tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        summaries.push(summarize_session(session));
    }
    tags.truncate(20);

    let project_descriptors = projects
        .iter()
        .filter_map(|name| {
            config
                .project(name)
                .map(|p| format!("{}: {}", p.name, p.description))
        })
        .collect();

    DailyContext {
        date,
        total_sessions: day_sessions.len(),
        total_duration_minutes,
        projects,
        sessions: summaries,
        tags,
        memory_context: memory.render_for_prompt(date, config.journal.memory_window_days),
        editorial_context,
        seeds: seeds.iter().map(|s| s.text.clone()).collect(),
        project_descriptors,
    }
}

fn summarize_session(session: &Session) -> SessionSummary {
    let duration_minutes = match session.duration {
        DurationSummary::Known(secs) => Some(secs / 60),
        DurationSummary::Unknown => None,
    };

    SessionSummary {
        time: session.started_at.format("%H:%M").to_string(),
        duration_minutes,
        source: session.item.source.to_string(),
        project: session.project.clone(),
        title: session.item.title.clone(),
        narrative: session.narrative.clone(),
        outcomes: session
            .outcomes
            .iter()
            .map(|o| o.description.clone())
            .take(5)
            .collect(),
        top_tools: session.top_tools(3).into_iter().map(String::from).collect(),
        tags: session.item.tags.iter().take(10).cloned().collect(),
        learnings: session.learnings.iter().take(5).cloned().collect(),
        signals: session
            .agent_signals
            .iter()
            .map(|s| format!("{}/{}", s.role, s.signal))
            .take(8)
            .collect(),
    }
}

impl DailyContext {
    /// Renders the context as structured text for the LLM prompt.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.push(format!("# Daily Session Context: {}", self.date));
        lines.push(String::new());
        lines.push(format!("Sessions: {}", self.total_sessions));
        lines.push(format!("Total time: {} minutes", self.total_duration_minutes));
        if !self.projects.is_empty() {
            lines.push(format!("Projects: {}", self.projects.join(", ")));
        }
        lines.push(String::new());

        if !self.project_descriptors.is_empty() {
            lines.push("## Projects".to_string());
            for descriptor in &self.project_descriptors {
                lines.push(format!("- {descriptor}"));
            }
            lines.push(String::new());
        }

        for (i, session) in self.sessions.iter().enumerate() {
            lines.push(format!(
                "## Session {} ({}, {})",
                i + 1,
                session.time,
                session.source
            ));
            if !session.project.is_empty() && session.project != "(unassigned)" {
                lines.push(format!("Project: {}", session.project));
            }
            if let Some(minutes) = session.duration_minutes {
                lines.push(format!("Duration: {minutes}min"));
            }
            if !session.title.is_empty() {
                lines.push(format!("Summary: {}", session.title));
            }
            if !session.narrative.is_empty() {
                lines.push(format!("Narrative: {}", session.narrative));
            }
            if !session.outcomes.is_empty() {
                lines.push("Outcomes:".to_string());
                for outcome in &session.outcomes {
                    lines.push(format!("  - {outcome}"));
                }
            }
            if !session.top_tools.is_empty() {
                lines.push(format!("Tools: {}", session.top_tools.join(", ")));
            }
            if !session.learnings.is_empty() {
                lines.push("Learnings:".to_string());
                for learning in &session.learnings {
                    lines.push(format!("  - {learning}"));
                }
            }
            if !session.signals.is_empty() {
                lines.push(format!("Signals: {}", session.signals.join(", ")));
            }
            if !session.tags.is_empty() {
                lines.push(format!("Tags: {}", session.tags.join(", ")));
            }
            lines.push(String::new());
        }

        if !self.tags.is_empty() {
            lines.push(format!("Tags across sessions: {}", self.tags.join(", ")));
        }

        if !self.seeds.is_empty() {
            lines.push(String::new());
            lines.push("## Your Seed Ideas".to_string());
            lines.push("Raw thoughts you noted; weave in any that fit naturally:".to_string());
            for seed in &self.seeds {
                lines.push(format!("- {seed}"));
            }
        }

        if !self.editorial_context.is_empty() {
            lines.push(String::new());
            lines.push(self.editorial_context.clone());
        }

        if !self.memory_context.is_empty() {
            lines.push(String::new());
            lines.push(self.memory_context.clone());
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentItem, ContentKind, ContentSource, ItemId};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn session(project: &str, start_hour: u32, minutes: u64) -> Session {
        let start = Utc.with_ymd_and_hms(2026, 2, 8, start_hour, 0, 0).unwrap();
        Session {
            item: ContentItem {
                id: ItemId::new(format!("chat-log:{project}-{start_hour}")),
                source: ContentSource::ChatLog,
                kind: ContentKind::Session,
                title: format!("work on {project}"),
                body: String::new(),
                excerpt: String::new(),
                url: None,
                author: None,
                site_name: None,
                published_at: None,
                ingested_at: start,
                tags: ["ai-session".to_string()].into_iter().collect(),
                topics: Default::default(),
                project: Some(project.to_string()),
                metadata: BTreeMap::new(),
            },
            started_at: start,
            ended_at: None,
            duration: DurationSummary::Known(minutes * 60),
            tool_usage: BTreeMap::new(),
            outcomes: Vec::new(),
            agent_signals: Vec::new(),
            learnings: Vec::new(),
            project: project.to_string(),
            narrative: String::new(),
        }
    }

    fn config() -> DistillConfig {
        DistillConfig::default()
    }

    #[test]
    fn test_context_aggregates() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 8).unwrap();
        let sessions = vec![session("alpha", 9, 45), session("beta", 14, 30)];
        let context = prepare_daily_context(
            date,
            &sessions,
            &UnifiedMemory::default(),
            String::new(),
            &[],
            &config(),
        );

        assert_eq!(context.total_sessions, 2);
        assert_eq!(context.total_duration_minutes, 75);
        assert_eq!(context.projects, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_sessions_sorted_by_start() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 8).unwrap();
        let sessions = vec![session("late", 16, 10), session("early", 8, 10)];
        let context = prepare_daily_context(
            date,
            &sessions,
            &UnifiedMemory::default(),
            String::new(),
            &[],
            &config(),
        );
        assert_eq!(context.sessions[0].project, "early");
        assert_eq!(context.sessions[1].project, "late");
    }

    #[test]
    fn test_session_cap_applies() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 8).unwrap();
        let mut cfg = config();
        cfg.journal.max_sessions_per_entry = 1;
        let sessions = vec![session("alpha", 9, 45), session("beta", 14, 30)];
        let context = prepare_daily_context(
            date,
            &sessions,
            &UnifiedMemory::default(),
            String::new(),
            &[],
            &cfg,
        );
        assert_eq!(context.total_sessions, 1);
    }

    #[test]
    fn test_render_contains_sections() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 8).unwrap();
        let mut cfg = config();
        cfg.projects.push(crate::config::ProjectDescriptor {
            name: "alpha".to_string(),
            description: "The alpha service".to_string(),
            url: None,
            tags: vec![],
            root: None,
        });
        let seed = Seed::new("ship the codec post", vec![]);
        let sessions = vec![session("alpha", 9, 45)];
        let context = prepare_daily_context(
            date,
            &sessions,
            &UnifiedMemory::default(),
            "## Editorial Direction\n- keep it short".to_string(),
            &[&seed],
            &cfg,
        );

        let text = context.render_text();
        assert!(text.contains("# Daily Session Context: 2026-02-08"));
        assert!(text.contains("alpha: The alpha service"));
        assert!(text.contains("## Session 1 (09:00, chat-log)"));
        assert!(text.contains("ship the codec post"));
        assert!(text.contains("Editorial Direction"));
    }

    #[test]
    fn test_week_target() {
        assert_eq!(
            week_target(NaiveDate::from_ymd_opt(2026, 2, 8).unwrap()),
            "week:2026-W06"
        );
    }
}

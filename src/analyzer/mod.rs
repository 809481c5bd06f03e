//! Session analyzer.
//!
//! Pure and deterministic: identical input yields identical output, and
//! nothing here reads or writes memory. The analyzer recomputes
//! durations, derives tags and project attribution, and writes the
//! one-line narrative each session carries into synthesis context.

use crate::config::ProjectDescriptor;
use crate::models::{ContentSource, DurationSummary, Session};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;

/// Aggregate statistics across a set of analyzed sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Total number of sessions.
    pub total_sessions: usize,
    /// Sum of known durations, in minutes.
    pub total_duration_minutes: u64,
    /// Session count per source.
    pub per_source: BTreeMap<String, usize>,
    /// Tool call totals across sessions.
    pub tools_used: BTreeMap<String, u32>,
    /// Earliest and latest session start.
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

/// Deterministic session analyzer.
#[derive(Debug, Clone, Default)]
pub struct SessionAnalyzer {
    project_roots: Vec<(String, String)>,
}

impl SessionAnalyzer {
    /// Creates an analyzer that attributes files to the given known
    /// projects by path prefix.
    #[must_use]
    pub fn new(projects: &[ProjectDescriptor]) -> Self {
        let mut project_roots: Vec<(String, String)> = projects
            .iter()
            .filter_map(|p| {
                p.root
                    .as_ref()
                    .map(|root| (root.to_string_lossy().into_owned(), p.name.clone()))
            })
            .collect();
        // Longest prefix first so nested roots win
        project_roots.sort_by_key(|(root, _)| std::cmp::Reverse(root.len()));
        Self { project_roots }
    }

    /// Analyzes one session, returning the decorated copy. The raw item
    /// body is never mutated.
    #[must_use]
    pub fn analyze(&self, mut session: Session) -> Session {
        session.duration = session.computed_duration();
        session.project = self.attribute_project(&session);
        self.derive_tags(&mut session);
        session.narrative = build_narrative(&session);
        session
    }

    /// Tag derivation rules:
    /// - `ai-session` and the source tag, always
    /// - `debugging` when error or exception strings appear in tool output
    /// - `testing` when a test-runner command was detected
    /// - `feature` when a new file was written
    /// - `documentation` when only markdown or text files were edited
    fn derive_tags(&self, session: &mut Session) {
        session.item.tags.insert("ai-session".to_string());
        session.item.tags.insert(session.item.source.to_string());

        if session
            .item
            .metadata
            .get("tool_errors")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
        {
            session.item.tags.insert("debugging".to_string());
        }

        let commands: Vec<&str> = session
            .outcomes
            .iter()
            .filter_map(|o| o.command.as_deref())
            .collect();
        let has_test_run = commands.iter().any(|c| is_test_command(c))
            || session.tool_usage.keys().any(|t| t == "TestRunner")
            || session.item.body.lines().any(|l| {
                l.starts_with("$ ") && is_test_command(l.trim_start_matches("$ "))
            });
        if has_test_run {
            session.item.tags.insert("testing".to_string());
        }

        let files: Vec<String> = session
            .files_modified()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        if session.tool_usage.contains_key("Write") && !files.is_empty() {
            session.item.tags.insert("feature".to_string());
        }
        if !files.is_empty() && files.iter().all(|f| is_doc_file(f)) {
            session.item.tags.insert("documentation".to_string());
        }
    }

    /// Project attribution, in priority order: explicit parser-supplied
    /// project, longest known-project-root prefix of the modified files,
    /// working-directory basename, `(unassigned)`.
    fn attribute_project(&self, session: &Session) -> String {
        if let Some(project) = session.item.project.as_ref().filter(|p| !p.is_empty()) {
            return project.clone();
        }

        for file in session.files_modified() {
            for (root, name) in &self.project_roots {
                if file.starts_with(root.as_str()) {
                    return name.clone();
                }
            }
        }

        if let Some(cwd) = session
            .item
            .metadata
            .get("cwd")
            .and_then(serde_json::Value::as_str)
        {
            if let Some(base) = Path::new(cwd).file_name() {
                let base = base.to_string_lossy();
                if !base.is_empty() {
                    return base.into_owned();
                }
            }
        }

        "(unassigned)".to_string()
    }
}

/// Computes aggregate statistics over analyzed sessions.
#[must_use]
pub fn session_stats(sessions: &[Session]) -> SessionStats {
    let mut stats = SessionStats {
        total_sessions: sessions.len(),
        ..Default::default()
    };

    for session in sessions {
        stats.total_duration_minutes += session.duration.minutes_or_zero();
        *stats
            .per_source
            .entry(session.item.source.to_string())
            .or_insert(0) += 1;
        for (tool, count) in &session.tool_usage {
            *stats.tools_used.entry(tool.clone()).or_insert(0) += count;
        }
        stats.date_range = match stats.date_range {
            None => Some((session.started_at, session.started_at)),
            Some((min, max)) => Some((min.min(session.started_at), max.max(session.started_at))),
        };
    }

    stats
}

fn is_test_command(command: &str) -> bool {
    let command = command.trim();
    command.starts_with("cargo test")
        || command.starts_with("pytest")
        || command.starts_with("npm test")
        || command.starts_with("npx jest")
        || command.starts_with("go test")
        || command.contains(" test ")
}

fn is_doc_file(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with(".md") || lower.ends_with(".txt") || lower.ends_with(".rst")
}

/// Builds the deterministic one-line narrative: what happened, from the
/// title and outcome counts. For multi-agent sessions the workflow
/// outcome leads.
fn build_narrative(session: &Session) -> String {
    let mut parts: Vec<String> = Vec::new();

    if session.item.source == ContentSource::MultiAgent {
        if let Some(outcome) = session
            .item
            .metadata
            .get("outcome")
            .and_then(serde_json::Value::as_str)
        {
            parts.push(format!("Workflow {outcome}"));
        }
    }

    if !session.item.title.is_empty() {
        parts.push(session.item.title.clone());
    }

    let files = session.files_modified().len();
    if files > 0 {
        parts.push(format!("{files} file(s) touched"));
    }
    match session.duration {
        DurationSummary::Known(secs) if secs > 0 => {
            parts.push(format!("{} min", secs / 60));
        },
        _ => {},
    }

    parts.join(" — ")
}

//! Multi-agent session dialect.
//!
//! A hierarchical state directory of task executions:
//!
//! ```text
//! state/<mission>-cycle-<N>-<task>/
//!   task.md          task description, preserved verbatim
//!   signals/*.yaml   ordered agent signals
//!   outcome.yaml     quality rating and learnings, optional
//! ```
//!
//! Sessions are task executions. Signals are first-class ordered events;
//! task descriptions, learnings, and quality ratings pass through
//! verbatim.

use super::{modified_within, ParseDiagnostic, ParseOutput, SourceParser};
use crate::ingest::derive_id;
use crate::models::{
    AgentSignal, ContentItem, ContentKind, ContentSource, DurationSummary, Session, SessionOutcome,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Parser for the multi-agent workflow dialect.
#[derive(Debug, Clone)]
pub struct MultiAgentParser {
    since_days: u32,
}

impl MultiAgentParser {
    /// Creates a parser with a discovery lookback window.
    #[must_use]
    pub const fn new(since_days: u32) -> Self {
        Self { since_days }
    }
}

fn workflow_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<mission>.+)-cycle-(?P<cycle>\d+)-(?P<task>.+)$")
            .expect("workflow name pattern is valid")
    })
}

impl SourceParser for MultiAgentParser {
    fn source(&self) -> ContentSource {
        ContentSource::MultiAgent
    }

    fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let state = root.join("state");
        let scan_root = if state.is_dir() { state } else { root.to_path_buf() };

        let entries = std::fs::read_dir(&scan_root).map_err(|e| Error::SourceUnavailable {
            source: "multi-agent".to_string(),
            cause: format!("{}: {e}", scan_root.display()),
        })?;

        let mut dirs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            let Some(name) = name else { continue };
            // Meeting directories are coordination noise, not executions
            if name.starts_with("mtg-") {
                continue;
            }
            if workflow_name_pattern().is_match(&name) && modified_within(&path, self.since_days) {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn parse(&self, location: &Path) -> Result<ParseOutput> {
        let mut output = ParseOutput::default();
        match parse_workflow_dir(location, &mut output.diagnostics) {
            Some(session) => output.sessions.push(session),
            None => output.diagnostics.push(ParseDiagnostic::new(
                location.display().to_string(),
                "workflow directory had no parseable signals",
            )),
        }
        Ok(output)
    }
}

/// A signal file. The structured-text format is YAML.
#[derive(Debug, serde::Deserialize)]
struct SignalFile {
    ts: String,
    #[serde(default)]
    agent_id: String,
    #[serde(default)]
    role: String,
    signal: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, serde::Deserialize)]
struct OutcomeFile {
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    learnings: Vec<String>,
}

fn parse_workflow_dir(dir: &Path, diagnostics: &mut Vec<ParseDiagnostic>) -> Option<Session> {
    let name = dir.file_name()?.to_string_lossy().into_owned();
    let captures = workflow_name_pattern().captures(&name)?;
    let mission = captures.name("mission").map(|m| m.as_str().to_string())?;
    let cycle: u32 = captures.name("cycle")?.as_str().parse().ok()?;
    let task = captures.name("task").map(|m| m.as_str().to_string())?;

    // Ordered signals: filename order is emission order, then timestamp
    let mut signals: Vec<AgentSignal> = Vec::new();
    let signals_dir = dir.join("signals");
    if signals_dir.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&signals_dir)
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml")
            })
            .collect();
        files.sort();

        for file in files {
            let text = match std::fs::read_to_string(&file) {
                Ok(text) => text,
                Err(e) => {
                    diagnostics
                        .push(ParseDiagnostic::new(file.display().to_string(), e.to_string()));
                    continue;
                },
            };
            let parsed: SignalFile = match serde_yaml_ng::from_str(&text) {
                Ok(parsed) => parsed,
                Err(e) => {
                    diagnostics
                        .push(ParseDiagnostic::new(file.display().to_string(), e.to_string()));
                    continue;
                },
            };
            let Some(ts) = parse_timestamp(&parsed.ts) else {
                diagnostics.push(ParseDiagnostic::new(
                    file.display().to_string(),
                    format!("unparseable timestamp: {}", parsed.ts),
                ));
                continue;
            };
            signals.push(AgentSignal {
                ts,
                agent_id: parsed.agent_id,
                role: parsed.role,
                signal: parsed.signal,
                message: parsed.message,
            });
        }
    }

    if signals.is_empty() {
        return None;
    }
    signals.sort_by_key(|s| s.ts);

    let started_at = signals.first().map(|s| s.ts)?;
    let ended_at = signals.last().map(|s| s.ts);

    // Task description preserved verbatim
    let task_description = std::fs::read_to_string(dir.join("task.md")).unwrap_or_default();

    let outcome_file: OutcomeFile = std::fs::read_to_string(dir.join("outcome.yaml"))
        .ok()
        .and_then(|text| match serde_yaml_ng::from_str(&text) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                diagnostics.push(ParseDiagnostic::new(
                    dir.join("outcome.yaml").display().to_string(),
                    e.to_string(),
                ));
                None
            },
        })
        .unwrap_or_default();

    let outcome = workflow_outcome(&signals);

    let mut metadata = BTreeMap::new();
    metadata.insert("mission".to_string(), serde_json::Value::String(mission.clone()));
    metadata.insert("cycle".to_string(), serde_json::Value::from(cycle));
    metadata.insert("task".to_string(), serde_json::Value::String(task.clone()));
    metadata.insert("outcome".to_string(), serde_json::Value::String(outcome.to_string()));
    if !task_description.is_empty() {
        metadata.insert(
            "task_description".to_string(),
            serde_json::Value::String(task_description.clone()),
        );
    }
    if let Some(quality) = &outcome_file.quality {
        metadata.insert("quality".to_string(), serde_json::Value::String(quality.clone()));
    }

    let title = if task_description.is_empty() {
        format!("{task} (cycle {cycle})")
    } else {
        task_description.lines().next().unwrap_or(&task).trim_start_matches('#').trim().to_string()
    };

    let item = ContentItem {
        id: derive_id(ContentSource::MultiAgent, Some(&name), None, &title, None, ""),
        source: ContentSource::MultiAgent,
        kind: ContentKind::Session,
        title,
        body: task_description,
        excerpt: String::new(),
        url: None,
        author: None,
        site_name: None,
        published_at: None,
        ingested_at: Utc::now(),
        tags: Default::default(),
        topics: Default::default(),
        project: Some(mission.clone()),
        metadata,
    };

    let mut session = Session {
        item,
        started_at,
        ended_at,
        duration: DurationSummary::Unknown,
        tool_usage: BTreeMap::new(),
        outcomes: vec![SessionOutcome::new(format!("Workflow {outcome}"))],
        agent_signals: signals,
        learnings: outcome_file.learnings,
        project: mission,
        narrative: String::new(),
    };
    session.duration = session.computed_duration();
    Some(session)
}

/// Derives the workflow outcome from the signal sequence, most recent
/// terminal signal first.
fn workflow_outcome(signals: &[AgentSignal]) -> &'static str {
    for signal in signals.iter().rev() {
        match signal.signal.as_str() {
            "complete" => return "completed",
            "approved" => return "approved",
            "blocked" => return "blocked",
            _ => {},
        }
    }
    if signals.iter().any(|s| s.signal == "done") {
        "done"
    } else {
        "in_progress"
    }
}

fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_workflow(root: &Path, name: &str) -> PathBuf {
        let dir = root.join("state").join(name);
        let signals = dir.join("signals");
        std::fs::create_dir_all(&signals).unwrap();
        std::fs::write(
            dir.join("task.md"),
            "# Implement retry backoff\n\nAdd bounded retries to the delivery path.\n",
        )
        .unwrap();
        std::fs::write(
            signals.join("001-done.yaml"),
            "ts: 2026-02-08T14:00:00Z\nagent_id: dev-1\nrole: dev\nsignal: done\nmessage: patch ready\n",
        )
        .unwrap();
        std::fs::write(
            signals.join("002-approved.yaml"),
            "ts: 2026-02-08T14:20:00Z\nagent_id: qa-1\nrole: qa\nsignal: approved\nmessage: tests pass\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("outcome.yaml"),
            "quality: excellent\nlearnings:\n  - retries need jitter\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_parse_workflow() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_workflow(root.path(), "m-042-cycle-3-retry-backoff");

        let parser = MultiAgentParser::new(365);
        let output = parser.parse(&dir).unwrap();
        let session = &output.sessions[0];

        assert_eq!(session.item.id.as_str(), "multi-agent:m-042-cycle-3-retry-backoff");
        assert_eq!(session.item.title, "Implement retry backoff");
        assert_eq!(session.project, "m-042");
        assert_eq!(session.agent_signals.len(), 2);
        assert_eq!(session.agent_signals[0].signal, "done");
        assert_eq!(session.agent_signals[1].role, "qa");
        assert_eq!(session.learnings, vec!["retries need jitter"]);
        assert_eq!(session.duration, DurationSummary::Known(1200));
        assert_eq!(
            session.item.metadata.get("quality"),
            Some(&serde_json::Value::String("excellent".to_string()))
        );
        assert_eq!(
            session.item.metadata.get("outcome"),
            Some(&serde_json::Value::String("approved".to_string()))
        );
    }

    #[test]
    fn test_task_description_preserved_verbatim() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_workflow(root.path(), "m-042-cycle-3-retry-backoff");

        let parser = MultiAgentParser::new(365);
        let output = parser.parse(&dir).unwrap();
        assert_eq!(
            output.sessions[0].item.body,
            "# Implement retry backoff\n\nAdd bounded retries to the delivery path.\n"
        );
    }

    #[test]
    fn test_discover_skips_meeting_dirs() {
        let root = tempfile::tempdir().unwrap();
        write_workflow(root.path(), "m-042-cycle-3-retry-backoff");
        std::fs::create_dir_all(root.path().join("state").join("mtg-standup")).unwrap();
        std::fs::create_dir_all(root.path().join("state").join("not-a-workflow")).unwrap();

        let parser = MultiAgentParser::new(365);
        let found = parser.discover(root.path()).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_malformed_signal_skipped() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_workflow(root.path(), "m-042-cycle-3-retry-backoff");
        std::fs::write(dir.join("signals").join("003-bad.yaml"), ": not yaml :\n:").unwrap();

        let parser = MultiAgentParser::new(365);
        let output = parser.parse(&dir).unwrap();
        assert_eq!(output.sessions.len(), 1);
        assert_eq!(output.sessions[0].agent_signals.len(), 2);
        assert_eq!(output.diagnostics.len(), 1);
    }

    #[test]
    fn test_blocked_outcome() {
        let signals = vec![
            AgentSignal {
                ts: Utc::now(),
                agent_id: "dev".to_string(),
                role: "dev".to_string(),
                signal: "done".to_string(),
                message: String::new(),
            },
            AgentSignal {
                ts: Utc::now(),
                agent_id: "qa".to_string(),
                role: "qa".to_string(),
                signal: "blocked".to_string(),
                message: String::new(),
            },
        ];
        assert_eq!(workflow_outcome(&signals), "blocked");
    }
}

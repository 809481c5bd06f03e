//! Rollout session dialect.
//!
//! One directory per session under `sessions/YYYY/MM/DD/`, holding a
//! `manifest.json` with identity and timestamps plus ordered
//! `events-*.jsonl` files. Session identity comes from the directory
//! name; timestamps come from the manifest.

use super::{modified_within, ParseDiagnostic, ParseOutput, SourceParser};
use crate::ingest::derive_id;
use crate::models::{
    ContentItem, ContentKind, ContentSource, DurationSummary, Session, SessionOutcome,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Parser for the rollout session dialect.
#[derive(Debug, Clone)]
pub struct RolloutParser {
    since_days: u32,
}

impl RolloutParser {
    /// Creates a parser with a discovery lookback window.
    #[must_use]
    pub const fn new(since_days: u32) -> Self {
        Self { since_days }
    }
}

impl SourceParser for RolloutParser {
    fn source(&self) -> ContentSource {
        ContentSource::Rollout
    }

    fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let sessions = root.join("sessions");
        let scan_root = if sessions.is_dir() { sessions } else { root.to_path_buf() };

        if !scan_root.is_dir() {
            return Err(Error::SourceUnavailable {
                source: "rollout".to_string(),
                cause: format!("{} is not a directory", scan_root.display()),
            });
        }

        let mut found = Vec::new();
        collect_session_dirs(&scan_root, self.since_days, &mut found).map_err(|e| {
            Error::SourceUnavailable {
                source: "rollout".to_string(),
                cause: e.to_string(),
            }
        })?;
        found.sort();
        Ok(found)
    }

    fn parse(&self, location: &Path) -> Result<ParseOutput> {
        let mut output = ParseOutput::default();
        match parse_session_dir(location, &mut output.diagnostics) {
            Some(session) => output.sessions.push(session),
            None => output.diagnostics.push(ParseDiagnostic::new(
                location.display().to_string(),
                "session directory had no usable manifest",
            )),
        }
        Ok(output)
    }
}

/// Recursively collects directories that contain a `manifest.json`.
fn collect_session_dirs(
    dir: &Path,
    since_days: u32,
    found: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let manifest = path.join("manifest.json");
        if manifest.is_file() {
            if modified_within(&manifest, since_days) {
                found.push(path);
            }
        } else {
            collect_session_dirs(&path, since_days, found)?;
        }
    }
    Ok(())
}

#[derive(Debug, serde::Deserialize)]
struct Manifest {
    #[serde(default)]
    id: Option<String>,
    started_at: Option<String>,
    #[serde(default)]
    ended_at: Option<String>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// One line of an events file.
#[derive(Debug, serde::Deserialize)]
struct Event {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

fn parse_session_dir(dir: &Path, diagnostics: &mut Vec<ParseDiagnostic>) -> Option<Session> {
    let manifest_path = dir.join("manifest.json");
    let manifest: Manifest = match std::fs::read_to_string(&manifest_path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
    {
        Ok(manifest) => manifest,
        Err(e) => {
            diagnostics.push(ParseDiagnostic::new(manifest_path.display().to_string(), e));
            return None;
        },
    };

    // Identity from the directory name, manifest id as fallback
    let native_id = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .or(manifest.id)
        .unwrap_or_default();
    if native_id.is_empty() {
        return None;
    }

    let started_at = manifest
        .started_at
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| {
            std::fs::metadata(&manifest_path)
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from)
        })?;
    let ended_at = manifest.ended_at.as_deref().and_then(parse_timestamp);

    // Ordered event files: lexicographic name order is event order
    let mut event_files: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map(|n| n.to_string_lossy().starts_with("events-"))
                .unwrap_or(false)
                && path.extension().is_some_and(|ext| ext == "jsonl")
        })
        .collect();
    event_files.sort();

    let mut tool_usage: BTreeMap<String, u32> = BTreeMap::new();
    let mut files_modified: Vec<String> = Vec::new();
    let mut commands_run = 0u32;
    let mut body_lines: Vec<String> = Vec::new();

    for file in &event_files {
        let Ok(handle) = std::fs::File::open(file) else {
            diagnostics.push(ParseDiagnostic::new(
                file.display().to_string(),
                "unreadable events file",
            ));
            continue;
        };
        for (line_no, line) in std::io::BufReader::new(handle).lines().enumerate() {
            let Ok(line) = line else { continue };
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = match serde_json::from_str(&line) {
                Ok(event) => event,
                Err(e) => {
                    diagnostics.push(ParseDiagnostic::new(
                        format!("{}:{}", file.display(), line_no + 1),
                        e.to_string(),
                    ));
                    continue;
                },
            };
            match event.kind.as_deref() {
                Some("tool_call") => {
                    let name = event.tool.unwrap_or_else(|| "unknown".to_string());
                    *tool_usage.entry(name).or_insert(0) += 1;
                },
                Some("file_change") => {
                    if let Some(path) = event.path {
                        if !files_modified.contains(&path) {
                            files_modified.push(path);
                        }
                    }
                },
                Some("command") => {
                    commands_run += 1;
                    if let Some(command) = event.command {
                        body_lines.push(format!("$ {command}"));
                    }
                },
                Some("message") => {
                    if let Some(text) = event.text {
                        body_lines.push(text);
                    }
                },
                _ => {},
            }
        }
    }

    let mut outcomes = Vec::new();
    if !files_modified.is_empty() {
        outcomes.push(SessionOutcome {
            description: format!("Modified {} file(s)", files_modified.len()),
            files_modified: files_modified.clone(),
            command: None,
        });
    }
    if commands_run > 0 {
        outcomes.push(SessionOutcome::new(format!("Ran {commands_run} shell command(s)")));
    }

    let title = manifest
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("Session {native_id}"));
    let project = manifest
        .cwd
        .as_deref()
        .and_then(|dir| Path::new(dir).file_name())
        .map(|name| name.to_string_lossy().into_owned());

    let mut metadata = BTreeMap::new();
    if let Some(dir) = &manifest.cwd {
        metadata.insert("cwd".to_string(), serde_json::Value::String(dir.clone()));
    }

    let item = ContentItem {
        id: derive_id(ContentSource::Rollout, Some(&native_id), None, &title, None, ""),
        source: ContentSource::Rollout,
        kind: ContentKind::Session,
        title,
        body: body_lines.join("\n"),
        excerpt: String::new(),
        url: None,
        author: None,
        site_name: None,
        published_at: None,
        ingested_at: Utc::now(),
        tags: Default::default(),
        topics: Default::default(),
        project: project.clone(),
        metadata,
    };

    let mut session = Session {
        item,
        started_at,
        ended_at,
        duration: DurationSummary::Unknown,
        tool_usage,
        outcomes,
        agent_signals: Vec::new(),
        learnings: Vec::new(),
        project: project.unwrap_or_else(|| "(unassigned)".to_string()),
        narrative: String::new(),
    };
    session.duration = session.computed_duration();
    Some(session)
}

fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_session(root: &Path, name: &str) -> PathBuf {
        let dir = root.join("sessions").join("2026").join("02").join("08").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("manifest.json"),
            r#"{"id":"ignored","started_at":"2026-02-08T10:00:00Z","ended_at":"2026-02-08T10:30:00Z","cwd":"/home/dev/beta","title":"wire the codec"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("events-001.jsonl"),
            r#"{"kind":"message","text":"starting on the codec"}
{"kind":"tool_call","tool":"apply_patch"}
{"kind":"file_change","path":"src/codec.rs"}
{"kind":"command","command":"cargo check"}
"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_parse_session_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_session(root.path(), "rollout-abc");

        let parser = RolloutParser::new(365);
        let output = parser.parse(&dir).unwrap();
        let session = &output.sessions[0];

        assert_eq!(session.item.id.as_str(), "rollout:rollout-abc");
        assert_eq!(session.item.title, "wire the codec");
        assert_eq!(session.project, "beta");
        assert_eq!(session.duration, DurationSummary::Known(1800));
        assert_eq!(session.tool_usage["apply_patch"], 1);
        assert!(session
            .outcomes
            .iter()
            .any(|o| o.files_modified.contains(&"src/codec.rs".to_string())));
    }

    #[test]
    fn test_discover_nested_layout() {
        let root = tempfile::tempdir().unwrap();
        write_session(root.path(), "rollout-abc");
        write_session(root.path(), "rollout-def");

        let parser = RolloutParser::new(365);
        let found = parser.discover(root.path()).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_missing_manifest_is_diagnostic() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("sessions").join("bad");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("manifest.json"), "{broken").unwrap();

        let parser = RolloutParser::new(365);
        let output = parser.parse(&dir).unwrap();
        assert!(output.sessions.is_empty());
        assert!(!output.diagnostics.is_empty());
    }

    #[test]
    fn test_malformed_event_line_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_session(root.path(), "rollout-ghi");
        std::fs::write(dir.join("events-002.jsonl"), "garbage line\n").unwrap();

        let parser = RolloutParser::new(365);
        let output = parser.parse(&dir).unwrap();
        assert_eq!(output.sessions.len(), 1);
        assert_eq!(output.diagnostics.len(), 1);
    }
}

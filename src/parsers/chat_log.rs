//! Chat-log session dialect.
//!
//! A directory tree of newline-delimited JSON transcripts, one file per
//! session, grouped under `projects/<project>/`. Each line is a message
//! envelope carrying a role, a timestamp, and optional tool-call or
//! tool-result structures. Session boundary is the file boundary;
//! start/end times are the first/last message timestamps.

use super::{modified_within, ParseDiagnostic, ParseOutput, SourceParser};
use crate::ingest::derive_id;
use crate::models::{
    ContentItem, ContentKind, ContentSource, DurationSummary, Session, SessionOutcome,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Parser for the chat-log transcript dialect.
#[derive(Debug, Clone)]
pub struct ChatLogParser {
    since_days: u32,
}

impl ChatLogParser {
    /// Creates a parser with a discovery lookback window.
    #[must_use]
    pub const fn new(since_days: u32) -> Self {
        Self { since_days }
    }
}

impl SourceParser for ChatLogParser {
    fn source(&self) -> ContentSource {
        ContentSource::ChatLog
    }

    fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let projects = root.join("projects");
        let scan_root = if projects.is_dir() { projects } else { root.to_path_buf() };

        let entries = std::fs::read_dir(&scan_root).map_err(|e| Error::SourceUnavailable {
            source: "chat-log".to_string(),
            cause: format!("{}: {e}", scan_root.display()),
        })?;

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if let Ok(project_files) = std::fs::read_dir(&path) {
                    for file in project_files.flatten() {
                        let file_path = file.path();
                        if is_transcript(&file_path) && modified_within(&file_path, self.since_days)
                        {
                            files.push(file_path);
                        }
                    }
                }
            } else if is_transcript(&path) && modified_within(&path, self.since_days) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn parse(&self, location: &Path) -> Result<ParseOutput> {
        let mut output = ParseOutput::default();
        match parse_transcript(location, &mut output.diagnostics) {
            Some(session) => output.sessions.push(session),
            None => {
                output.diagnostics.push(ParseDiagnostic::new(
                    location.display().to_string(),
                    "transcript contained no messages",
                ));
            },
        }
        Ok(output)
    }
}

fn is_transcript(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "jsonl")
}

/// One line of a transcript. Unknown fields are ignored; unknown types
/// are skipped.
#[derive(Debug, serde::Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    timestamp: Option<String>,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
    cwd: Option<String>,
    message: Option<MessageBody>,
}

#[derive(Debug, serde::Deserialize)]
struct MessageBody {
    content: Option<serde_json::Value>,
}

fn parse_transcript(path: &Path, diagnostics: &mut Vec<ParseDiagnostic>) -> Option<Session> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            diagnostics.push(ParseDiagnostic::new(path.display().to_string(), e.to_string()));
            return None;
        },
    };

    let mut session_id: Option<String> = None;
    let mut cwd: Option<String> = None;
    let mut first_ts: Option<DateTime<Utc>> = None;
    let mut last_ts: Option<DateTime<Utc>> = None;
    let mut tool_usage: BTreeMap<String, u32> = BTreeMap::new();
    let mut first_user_message = String::new();
    let mut body_lines: Vec<String> = Vec::new();
    // tool_use id -> (tool name, file_path argument if any)
    let mut pending_tools: HashMap<String, (String, Option<String>)> = HashMap::new();
    let mut files_modified: Vec<String> = Vec::new();
    let mut commands_run = 0u32;
    let mut tool_output_had_errors = false;

    for (line_no, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                diagnostics.push(ParseDiagnostic::new(
                    format!("{}:{}", path.display(), line_no + 1),
                    e.to_string(),
                ));
                continue;
            },
        };
        if line.trim().is_empty() {
            continue;
        }

        let envelope: Envelope = match serde_json::from_str(&line) {
            Ok(envelope) => envelope,
            Err(e) => {
                diagnostics.push(ParseDiagnostic::new(
                    format!("{}:{}", path.display(), line_no + 1),
                    e.to_string(),
                ));
                continue;
            },
        };

        if let Some(id) = envelope.session_id {
            session_id.get_or_insert(id);
        }
        if let Some(dir) = envelope.cwd {
            cwd.get_or_insert(dir);
        }
        if let Some(ts) = envelope.timestamp.as_deref().and_then(parse_timestamp) {
            if first_ts.is_none_or(|t| ts < t) {
                first_ts = Some(ts);
            }
            if last_ts.is_none_or(|t| ts > t) {
                last_ts = Some(ts);
            }
        }

        let Some(content) = envelope.message.and_then(|m| m.content) else {
            continue;
        };

        match envelope.kind.as_deref() {
            Some("user") => process_user_content(
                &content,
                &mut first_user_message,
                &mut body_lines,
                &mut pending_tools,
                &mut tool_usage,
                &mut files_modified,
                &mut commands_run,
                &mut tool_output_had_errors,
            ),
            Some("assistant") => {
                process_assistant_content(&content, &mut body_lines, &mut pending_tools);
            },
            _ => {},
        }
    }

    // Unmatched tool uses still count toward the histogram
    for (_, (name, file_path)) in pending_tools.drain() {
        *tool_usage.entry(name.clone()).or_insert(0) += 1;
        record_tool_effects(&name, file_path.as_deref(), &mut files_modified, &mut commands_run);
    }

    if body_lines.is_empty() && first_user_message.is_empty() {
        return None;
    }

    let started_at = first_ts.or_else(|| file_mtime(path)).unwrap_or_else(Utc::now);
    let ended_at = last_ts;
    let native_id = session_id.unwrap_or_else(|| {
        path.file_stem().map_or_else(String::new, |stem| stem.to_string_lossy().into_owned())
    });

    let title = if first_user_message.is_empty() {
        format!("Session {native_id}")
    } else {
        truncate_chars(&first_user_message, 200)
    };

    let project = cwd
        .as_deref()
        .and_then(|dir| Path::new(dir).file_name())
        .map(|name| name.to_string_lossy().into_owned());

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

    let mut metadata = BTreeMap::new();
    if let Some(dir) = &cwd {
        metadata.insert("cwd".to_string(), serde_json::Value::String(dir.clone()));
    }
    if tool_output_had_errors {
        metadata.insert("tool_errors".to_string(), serde_json::Value::Bool(true));
    }

    let item = ContentItem {
        id: derive_id(ContentSource::ChatLog, Some(&native_id), None, &title, None, ""),
        source: ContentSource::ChatLog,
        kind: ContentKind::Session,
        title,
        body: body_lines.join("\n"),
        excerpt: truncate_chars(&first_user_message, 300),
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

#[allow(clippy::too_many_arguments)]
fn process_user_content(
    content: &serde_json::Value,
    first_user_message: &mut String,
    body_lines: &mut Vec<String>,
    pending_tools: &mut HashMap<String, (String, Option<String>)>,
    tool_usage: &mut BTreeMap<String, u32>,
    files_modified: &mut Vec<String>,
    commands_run: &mut u32,
    tool_output_had_errors: &mut bool,
) {
    match content {
        serde_json::Value::String(text) => {
            if first_user_message.is_empty() {
                *first_user_message = text.clone();
            }
            body_lines.push(format!("user: {text}"));
        },
        serde_json::Value::Array(blocks) => {
            for block in blocks {
                match block.get("type").and_then(serde_json::Value::as_str) {
                    Some("text") => {
                        let text = block.get("text").and_then(serde_json::Value::as_str).unwrap_or("");
                        if first_user_message.is_empty() && !text.trim().is_empty() {
                            *first_user_message = text.to_string();
                        }
                        body_lines.push(format!("user: {text}"));
                    },
                    Some("tool_result") => {
                        let Some(use_id) = block.get("tool_use_id").and_then(serde_json::Value::as_str)
                        else {
                            continue;
                        };
                        if let Some((name, file_path)) = pending_tools.remove(use_id) {
                            *tool_usage.entry(name.clone()).or_insert(0) += 1;
                            record_tool_effects(&name, file_path.as_deref(), files_modified, commands_run);
                        }
                        let result_text = match block.get("content") {
                            Some(serde_json::Value::String(s)) => s.clone(),
                            Some(other) => other.to_string(),
                            None => String::new(),
                        };
                        let lower = result_text.to_lowercase();
                        if lower.contains("error") || lower.contains("exception") || lower.contains("traceback") {
                            *tool_output_had_errors = true;
                        }
                    },
                    _ => {},
                }
            }
        },
        _ => {},
    }
}

fn process_assistant_content(
    content: &serde_json::Value,
    body_lines: &mut Vec<String>,
    pending_tools: &mut HashMap<String, (String, Option<String>)>,
) {
    match content {
        serde_json::Value::String(text) => body_lines.push(format!("assistant: {text}")),
        serde_json::Value::Array(blocks) => {
            for block in blocks {
                match block.get("type").and_then(serde_json::Value::as_str) {
                    Some("text") => {
                        let text = block.get("text").and_then(serde_json::Value::as_str).unwrap_or("");
                        body_lines.push(format!("assistant: {text}"));
                    },
                    Some("tool_use") => {
                        let id = block.get("id").and_then(serde_json::Value::as_str).unwrap_or("");
                        let name = block
                            .get("name")
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or("unknown");
                        let file_path = block
                            .get("input")
                            .and_then(|input| input.get("file_path"))
                            .and_then(serde_json::Value::as_str)
                            .map(String::from);
                        pending_tools.insert(id.to_string(), (name.to_string(), file_path));
                    },
                    // thinking blocks are internal
                    _ => {},
                }
            }
        },
        _ => {},
    }
}

fn record_tool_effects(
    tool: &str,
    file_path: Option<&str>,
    files_modified: &mut Vec<String>,
    commands_run: &mut u32,
) {
    match tool {
        "Edit" | "Write" | "NotebookEdit" => {
            if let Some(path) = file_path {
                if !path.is_empty() && !files_modified.iter().any(|f| f == path) {
                    files_modified.push(path.to_string());
                }
            }
        },
        "Bash" => *commands_run += 1,
        _ => {},
    }
}

fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSCRIPT: &str = r#"{"type":"user","sessionId":"sess-1","timestamp":"2026-02-08T09:00:00Z","cwd":"/home/dev/alpha","message":{"content":"fix the flaky parser test"}}
{"type":"assistant","timestamp":"2026-02-08T09:01:00Z","message":{"content":[{"type":"text","text":"Looking at the test."},{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"tests/parser.rs"}}]}}
{"type":"user","timestamp":"2026-02-08T09:02:00Z","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"fn test_parse() { ... }"}]}}
{"type":"assistant","timestamp":"2026-02-08T09:10:00Z","message":{"content":[{"type":"tool_use","id":"t2","name":"Edit","input":{"file_path":"src/parser.rs"}}]}}
{"type":"user","timestamp":"2026-02-08T09:45:00Z","message":{"content":[{"type":"tool_result","tool_use_id":"t2","content":"ok"}]}}
"#;

    fn write_transcript(dir: &Path, name: &str, content: &str) -> PathBuf {
        let projects = dir.join("projects").join("alpha");
        std::fs::create_dir_all(&projects).unwrap();
        let path = projects.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_transcript(dir.path(), "sess-1.jsonl", TRANSCRIPT);

        let parser = ChatLogParser::new(365);
        let output = parser.parse(&path).unwrap();
        assert_eq!(output.sessions.len(), 1);
        assert!(output.diagnostics.is_empty());

        let session = &output.sessions[0];
        assert_eq!(session.item.id.as_str(), "chat-log:sess-1");
        assert_eq!(session.project, "alpha");
        assert_eq!(session.tool_usage["Read"], 1);
        assert_eq!(session.tool_usage["Edit"], 1);
        assert_eq!(session.duration, DurationSummary::Known(2700));
        assert_eq!(session.item.title, "fix the flaky parser test");
        assert!(session
            .outcomes
            .iter()
            .any(|o| o.files_modified.contains(&"src/parser.rs".to_string())));
    }

    #[test]
    fn test_malformed_line_is_skipped_with_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let content = format!("not json at all\n{TRANSCRIPT}");
        let path = write_transcript(dir.path(), "sess-2.jsonl", &content);

        let parser = ChatLogParser::new(365);
        let output = parser.parse(&path).unwrap();
        assert_eq!(output.sessions.len(), 1);
        assert_eq!(output.diagnostics.len(), 1);
        assert!(output.diagnostics[0].location.ends_with(":1"));
    }

    #[test]
    fn test_empty_transcript_yields_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_transcript(dir.path(), "empty.jsonl", "");

        let parser = ChatLogParser::new(365);
        let output = parser.parse(&path).unwrap();
        assert!(output.sessions.is_empty());
        assert_eq!(output.diagnostics.len(), 1);
    }

    #[test]
    fn test_parse_twice_yields_identical_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_transcript(dir.path(), "sess-1.jsonl", TRANSCRIPT);

        let parser = ChatLogParser::new(365);
        let first = parser.parse(&path).unwrap();
        let second = parser.parse(&path).unwrap();
        assert_eq!(first.sessions[0].item.id, second.sessions[0].item.id);
    }

    #[test]
    fn test_discover_finds_project_transcripts() {
        let dir = tempfile::tempdir().unwrap();
        write_transcript(dir.path(), "sess-1.jsonl", TRANSCRIPT);
        write_transcript(dir.path(), "notes.txt", "not a transcript");

        let parser = ChatLogParser::new(365);
        let found = parser.discover(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("sess-1.jsonl"));
    }

    #[test]
    fn test_discover_unreadable_root_is_source_unavailable() {
        let parser = ChatLogParser::new(365);
        let err = parser.discover(Path::new("/nonexistent/distill-test")).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }

    #[test]
    fn test_error_strings_in_tool_output_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let content = r#"{"type":"user","sessionId":"s","timestamp":"2026-02-08T09:00:00Z","message":{"content":"run tests"}}
{"type":"assistant","timestamp":"2026-02-08T09:01:00Z","message":{"content":[{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"cargo test"}}]}}
{"type":"user","timestamp":"2026-02-08T09:02:00Z","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"error[E0308]: mismatched types"}]}}
"#;
        let path = write_transcript(dir.path(), "err.jsonl", content);
        let parser = ChatLogParser::new(365);
        let output = parser.parse(&path).unwrap();
        let session = &output.sessions[0];
        assert_eq!(session.item.metadata.get("tool_errors"), Some(&serde_json::Value::Bool(true)));
    }
}

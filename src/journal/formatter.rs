//! Journal entry formatting.
//!
//! Every persisted artifact uses the same convention: a structured
//! front-matter header block followed by a markdown body.

use crate::models::JournalEntry;

/// Renders a journal entry as front-matter plus prose.
#[must_use]
pub fn format_entry(entry: &JournalEntry) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push("---".to_string());
    lines.push("type: journal".to_string());
    lines.push(format!("date: {}", entry.date));
    lines.push(format!("style: {}", entry.style));
    lines.push(format!("word_count: {}", entry.word_count));
    lines.push(format!("sessions_count: {}", entry.sessions_count));
    lines.push(format!("duration_minutes: {}", entry.duration_minutes));
    if !entry.projects.is_empty() {
        lines.push(format!("projects: [{}]", entry.projects.join(", ")));
    }
    if !entry.tags.is_empty() {
        let tags: Vec<&str> = entry.tags.iter().map(String::as_str).collect();
        lines.push(format!("tags: [{}]", tags.join(", ")));
    }
    lines.push(format!(
        "generated: {}",
        entry.generated_at.format("%Y-%m-%dT%H:%M:%SZ")
    ));
    lines.push("---".to_string());
    lines.push(String::new());
    lines.push(entry.body_markdown.clone());
    lines.join("\n")
}

/// Counts words in prose, ignoring front-matter-like lines.
#[must_use]
pub fn word_count(prose: &str) -> usize {
    prose.split_whitespace().count()
}

/// Strips any chrome outside the first top-level heading: preamble the
/// LLM added before the `#` line is dropped. Prose with no heading is
/// returned unchanged.
#[must_use]
pub fn strip_chrome(prose: &str) -> &str {
    for (offset, line) in prose.lines().map(|l| (line_offset(prose, l), l)) {
        if line.starts_with("# ") {
            return prose[offset..].trim_end();
        }
    }
    prose.trim()
}

fn line_offset(text: &str, line: &str) -> usize {
    let text_ptr = text.as_ptr() as usize;
    let line_ptr = line.as_ptr() as usize;
    line_ptr - text_ptr
}

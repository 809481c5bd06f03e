//! Diagram handling for blog posts.
//!
//! Two responsibilities: drop malformed mermaid fences the LLM sometimes
//! emits, and insert one diagram when the post has structural cues but
//! the LLM produced none.

use regex::Regex;
use std::sync::OnceLock;

fn arrow_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^\s*([A-Za-z][\w ./-]{1,40}?)\s*(?:->|→)\s*([A-Za-z][\w ./-]{1,40})\s*$")
            .expect("arrow pattern is valid")
    })
}

fn numbered_step_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^\d+\.\s+(.{3,80})$").expect("step pattern is valid")
    })
}

/// Whether the prose contains structural cues worth diagramming:
/// component arrows or a run of at least three numbered steps.
#[must_use]
pub fn has_structural_cues(prose: &str) -> bool {
    arrow_pattern().is_match(prose) || numbered_step_pattern().find_iter(prose).count() >= 3
}

/// Whether the prose already carries a mermaid block.
#[must_use]
pub fn has_diagram(prose: &str) -> bool {
    prose.contains("```mermaid")
}

/// Inserts a mermaid flowchart derived from the structural cues, after
/// the first section break. Prose without cues (or with an existing
/// diagram) is returned unchanged.
#[must_use]
pub fn maybe_insert_diagram(prose: &str) -> String {
    if has_diagram(prose) || !has_structural_cues(prose) {
        return prose.to_string();
    }

    let Some(diagram) = build_diagram(prose) else {
        return prose.to_string();
    };

    // After the first ## section heading; appended when there is none
    let lines: Vec<&str> = prose.lines().collect();
    let insert_at = lines
        .iter()
        .position(|line| line.starts_with("## "))
        .map_or(lines.len(), |i| i + 1);

    let mut result: Vec<String> = lines[..insert_at].iter().map(ToString::to_string).collect();
    result.push(String::new());
    result.push(diagram);
    result.extend(lines[insert_at..].iter().map(ToString::to_string));
    result.join("\n")
}

fn build_diagram(prose: &str) -> Option<String> {
    // Arrow cues first: they name components directly
    let arrows: Vec<(String, String)> = arrow_pattern()
        .captures_iter(prose)
        .map(|c| (c[1].trim().to_string(), c[2].trim().to_string()))
        .take(8)
        .collect();
    if !arrows.is_empty() {
        let mut lines = vec!["```mermaid".to_string(), "flowchart LR".to_string()];
        for (from, to) in arrows {
            lines.push(format!("    {} --> {}", node_id(&from), node_id(&to)));
        }
        lines.push("```".to_string());
        return Some(lines.join("\n"));
    }

    let steps: Vec<String> = numbered_step_pattern()
        .captures_iter(prose)
        .map(|c| c[1].trim().trim_end_matches('.').to_string())
        .take(8)
        .collect();
    if steps.len() >= 3 {
        let mut lines = vec!["```mermaid".to_string(), "flowchart TD".to_string()];
        for (i, step) in steps.iter().enumerate() {
            let label = step.replace('"', "'");
            lines.push(format!("    s{i}[\"{label}\"]"));
        }
        for i in 1..steps.len() {
            lines.push(format!("    s{} --> s{}", i - 1, i));
        }
        lines.push("```".to_string());
        return Some(lines.join("\n"));
    }

    None
}

fn node_id(label: &str) -> String {
    let id: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{id}[\"{}\"]", label.replace('"', "'"))
}

/// Removes malformed mermaid fences: blocks that are empty or never
/// closed. Well-formed blocks pass through untouched.
#[must_use]
pub fn clean_diagrams(prose: &str) -> String {
    let mut result: Vec<&str> = Vec::new();
    let mut lines = prose.lines().peekable();

    while let Some(line) = lines.next() {
        if line.trim() != "```mermaid" {
            result.push(line);
            continue;
        }

        let mut block = vec![line];
        let mut closed = false;
        for inner in lines.by_ref() {
            block.push(inner);
            if inner.trim() == "```" {
                closed = true;
                break;
            }
        }

        let body_is_empty = block
            .iter()
            .skip(1)
            .take(block.len().saturating_sub(2))
            .all(|l| l.trim().is_empty());
        if closed && !body_is_empty {
            result.extend(block);
        }
        // Unclosed or empty blocks are dropped entirely
    }

    result.join("\n")
}

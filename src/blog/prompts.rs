//! Prompt templates for blog synthesis.

use super::context::{ThematicContext, WeeklyContext};

/// System prompt for a weekly synthesis post.
#[must_use]
pub fn weekly_system_prompt(target_word_count: usize, include_diagrams: bool) -> String {
    let diagrams = if include_diagrams {
        "\nWhere the material has clear structure (a pipeline, a sequence of \
         steps), you may include one mermaid diagram in a fenced block."
    } else {
        ""
    };
    format!(
        "You are writing a weekly synthesis blog post from a developer's \
         daily journal entries. Find the through-line of the week rather \
         than recapping day by day. Concrete evidence from the journals \
         beats abstraction. Target length: about {target_word_count} words. \
         Start with a single top-level markdown heading that could serve as \
         a post title, and output markdown only.{diagrams}"
    )
}

/// System prompt for a thematic deep-dive post.
#[must_use]
pub fn thematic_system_prompt(
    theme_title: &str,
    target_word_count: usize,
    include_diagrams: bool,
) -> String {
    let diagrams = if include_diagrams {
        "\nWhere the material has clear structure, you may include one \
         mermaid diagram in a fenced block."
    } else {
        ""
    };
    format!(
        "You are writing a thematic deep-dive blog post about \
         \"{theme_title}\", drawing on dated evidence from a developer's \
         journals. Build an argument across the evidence; quote or \
         paraphrase specific moments with their dates. Target length: about \
         {target_word_count} words. Start with a single top-level markdown \
         heading, and output markdown only.{diagrams}"
    )
}

/// User prompt for weekly synthesis.
#[must_use]
pub fn weekly_user_prompt(context: &WeeklyContext, memory_context: &str, editorial: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("# Week {}-W{:02}", context.year, context.week));
    lines.push(format!("({} to {})", context.week_start, context.week_end));
    lines.push(format!("Total sessions: {}", context.total_sessions));
    lines.push(format!(
        "Total duration: {} minutes",
        context.total_duration_minutes
    ));
    if !context.projects.is_empty() {
        lines.push(format!("Projects: {}", context.projects.join(", ")));
    }
    if !context.recurring_topics.is_empty() {
        lines.push(format!(
            "Recurring topics: {}",
            context.recurring_topics.join(", ")
        ));
    }
    if !context.decisions.is_empty() {
        lines.push("Decisions this week:".to_string());
        for decision in &context.decisions {
            lines.push(format!("  - {decision}"));
        }
    }
    if !context.open_questions.is_empty() {
        lines.push("Open questions:".to_string());
        for question in &context.open_questions {
            lines.push(format!("  - {question}"));
        }
    }
    lines.push(String::new());

    if !editorial.is_empty() {
        lines.push(editorial.to_string());
        lines.push(String::new());
    }
    if !memory_context.is_empty() {
        lines.push(memory_context.to_string());
        lines.push(String::new());
    }

    lines.push("# Daily Journal Entries".to_string());
    lines.push(String::new());
    lines.push(context.combined_prose.clone());
    lines.join("\n")
}

/// User prompt for thematic synthesis.
#[must_use]
pub fn thematic_user_prompt(
    context: &ThematicContext,
    memory_context: &str,
    editorial: &str,
) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("# Theme: {}", context.thread.name));
    lines.push(format!("Current state: {}", context.thread.summary));
    lines.push(format!(
        "Evidence from {} journal entries ({} to {})",
        context.source_dates.len(),
        context.thread.first_seen,
        context.thread.last_seen
    ));
    lines.push(String::new());

    if !editorial.is_empty() {
        lines.push(editorial.to_string());
        lines.push(String::new());
    }
    if !memory_context.is_empty() {
        lines.push(memory_context.to_string());
        lines.push(String::new());
    }

    lines.push("# Evidence from Journal Entries".to_string());
    lines.push(String::new());
    lines.push(context.combined_evidence.clone());
    lines.join("\n")
}

/// Re-prompt issued when too many key points overlap previous posts.
#[must_use]
pub fn overlap_rewrite_prompt(prose: &str, overlapping: &[String]) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(
        "The draft below repeats material already covered in previous \
         posts. Rework it so the following points and examples are \
         replaced with different evidence or dropped entirely; keep the \
         rest intact. Output markdown only, starting at the heading."
            .to_string(),
    );
    lines.push(String::new());
    lines.push("Already covered:".to_string());
    for item in overlapping {
        lines.push(format!("- {item}"));
    }
    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(String::new());
    lines.push(prose.to_string());
    lines.join("\n")
}

//! Blog synthesis.
//!
//! Drives the LLM worker over weekly and thematic contexts, enforcing
//! cross-post non-repetition against the blog memory: an avoid-list of
//! key points and examples from recent posts goes into the prompt, and
//! an extraction pass over the result checks how much slipped through.

pub mod context;
pub mod diagrams;
pub mod formatter;
pub mod prompts;

pub use context::{
    group_by_week, prepare_thematic_context, prepare_weekly_context, thematic_candidates,
    theme_remains_eligible, weekly_slug, ThemeCandidate, ThematicContext, WeeklyContext,
};

use crate::config::DistillConfig;
use crate::llm::LlmWorker;
use crate::models::{slugify, BlogPost, BlogPostType};
use crate::store::{BlogMemory, BlogState};
use crate::Result;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// A freshly generated blog post plus synthesis diagnostics.
pub struct GeneratedPost {
    /// The post.
    pub post: BlogPost,
    /// Diagnostics accumulated during synthesis (overlap misses).
    pub diagnostics: Vec<String>,
}

/// Blog synthesizer.
pub struct BlogSynthesizer<'a> {
    config: &'a DistillConfig,
    worker: &'a dyn LlmWorker,
}

impl<'a> BlogSynthesizer<'a> {
    /// Creates a synthesizer over a config and worker.
    #[must_use]
    pub fn new(config: &'a DistillConfig, worker: &'a dyn LlmWorker) -> Self {
        Self { config, worker }
    }

    /// Synthesizes a weekly post.
    ///
    /// # Errors
    ///
    /// Propagates LLM failures.
    pub fn synthesize_weekly(
        &self,
        context: &WeeklyContext,
        blog_memory: &BlogMemory,
        memory_context: &str,
        editorial: &str,
    ) -> Result<GeneratedPost> {
        let system = prompts::weekly_system_prompt(
            self.config.blog.target_word_count,
            self.config.blog.include_diagrams,
        );
        let user = prompts::weekly_user_prompt(context, memory_context, editorial);
        let slug = weekly_slug(context.year, context.week);

        let (prose, diagnostics) = self.generate_with_dedup(&system, &user, blog_memory)?;
        let title = formatter::derive_title(&prose, &slug);
        let key_points = extract_key_points(&prose);
        let examples_used = extract_examples(&prose);

        Ok(GeneratedPost {
            post: BlogPost {
                slug,
                post_type: BlogPostType::Weekly,
                date: context.week_end,
                title,
                body_markdown: prose,
                themes: context.recurring_topics.clone(),
                projects: context.projects.clone(),
                source_dates: context.source_dates.clone(),
                key_points,
                examples_used,
                platforms_published: BTreeSet::new(),
            },
            diagnostics,
        })
    }

    /// Synthesizes a thematic post. The slug is the slugified theme
    /// name, with a numeric suffix on collision against `state`.
    ///
    /// # Errors
    ///
    /// Propagates LLM failures.
    pub fn synthesize_thematic(
        &self,
        context: &ThematicContext,
        state: &BlogState,
        blog_memory: &BlogMemory,
        memory_context: &str,
        editorial: &str,
    ) -> Result<GeneratedPost> {
        let system = prompts::thematic_system_prompt(
            &context.thread.name,
            self.config.blog.target_word_count,
            self.config.blog.include_diagrams,
        );
        let user = prompts::thematic_user_prompt(context, memory_context, editorial);
        let slug = unique_slug(&slugify(&context.thread.name), state);

        let (prose, diagnostics) = self.generate_with_dedup(&system, &user, blog_memory)?;
        let title = formatter::derive_title(&prose, &slug);
        let key_points = extract_key_points(&prose);
        let examples_used = extract_examples(&prose);

        let last_date = context.source_dates.last().copied().unwrap_or(context.thread.last_seen);
        Ok(GeneratedPost {
            post: BlogPost {
                slug,
                post_type: BlogPostType::Thematic,
                date: last_date,
                title,
                body_markdown: prose,
                themes: vec![context.thread.name.clone()],
                projects: context.projects.clone(),
                source_dates: context.source_dates.clone(),
                key_points,
                examples_used,
                platforms_published: BTreeSet::new(),
            },
            diagnostics,
        })
    }

    /// Generates prose, then enforces non-repetition: when the overlap
    /// with the avoid-list exceeds the threshold, one rewrite is issued
    /// with the overlapping items listed; a still-overlapping result is
    /// kept with a diagnostic annotation.
    fn generate_with_dedup(
        &self,
        system: &str,
        user: &str,
        blog_memory: &BlogMemory,
    ) -> Result<(String, Vec<String>)> {
        let avoid = blog_memory.avoid_list(self.config.blog.avoid_list_posts);
        let memory_block = blog_memory.render_for_prompt(self.config.blog.avoid_list_posts);

        let prompt = if memory_block.is_empty() {
            format!("{system}\n\n---\n\n{user}")
        } else {
            format!("{system}\n\n{memory_block}\n\n---\n\n{user}")
        };

        let mut diagnostics = Vec::new();
        let mut prose = self.postprocess(&self.worker.invoke(&prompt)?);

        let overlapping = overlap_with(&prose, &avoid);
        let threshold = self.config.blog.overlap_threshold;
        if overlap_fraction(&prose, &overlapping) > threshold {
            tracing::info!(
                overlapping = overlapping.len(),
                "Blog draft overlaps previous posts, re-prompting once"
            );
            metrics::counter!("blog_overlap_reprompts_total").increment(1);
            let rewrite = prompts::overlap_rewrite_prompt(&prose, &overlapping);
            prose = self.postprocess(&self.worker.invoke(&rewrite)?);

            let remaining = overlap_with(&prose, &avoid);
            if overlap_fraction(&prose, &remaining) > threshold {
                diagnostics.push(format!(
                    "post still overlaps {} previously used item(s) after rewrite",
                    remaining.len()
                ));
                prose.push_str(&format!(
                    "\n\n<!-- diagnostic: overlap with previous posts above {:.0}% after rewrite -->",
                    threshold * 100.0
                ));
            }
        }

        Ok((prose, diagnostics))
    }

    fn postprocess(&self, raw: &str) -> String {
        let prose = crate::journal::formatter::strip_chrome(raw).to_string();
        let prose = diagrams::clean_diagrams(&prose);
        if self.config.blog.include_diagrams {
            diagrams::maybe_insert_diagram(&prose)
        } else {
            prose
        }
    }
}

/// Appends a numeric suffix until the slug is unused.
#[must_use]
pub fn unique_slug(base: &str, state: &BlogState) -> String {
    let base = if base.is_empty() { "post" } else { base };
    if !state.is_generated(base) {
        return base.to_string();
    }
    for n in 2.. {
        let candidate = format!("{base}-{n}");
        if !state.is_generated(&candidate) {
            return candidate;
        }
    }
    unreachable!("suffix search terminates at the first unused slug")
}

/// Extracts candidate key points: the first sentence under each
/// non-title heading.
#[must_use]
pub fn extract_key_points(prose: &str) -> Vec<String> {
    let mut points = Vec::new();
    let mut lines = prose.lines().peekable();
    while let Some(line) = lines.next() {
        if !line.starts_with("## ") {
            continue;
        }
        // First non-empty prose line of the section
        while let Some(candidate) = lines.peek() {
            let trimmed = candidate.trim();
            if trimmed.is_empty() {
                lines.next();
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with("```") {
                break;
            }
            let sentence = first_sentence(trimmed);
            if !sentence.is_empty() {
                points.push(sentence);
            }
            break;
        }
    }
    points
}

/// Extracts short quoted snippets used as examples.
#[must_use]
pub fn extract_examples(prose: &str) -> Vec<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new("\"([^\"\n]{3,80})\"").expect("quote pattern is valid"));
    let mut seen = BTreeSet::new();
    let mut examples = Vec::new();
    for capture in re.captures_iter(prose) {
        let snippet = capture[1].trim().to_string();
        if seen.insert(snippet.to_lowercase()) {
            examples.push(snippet);
        }
    }
    examples
}

fn first_sentence(text: &str) -> String {
    let end = text
        .char_indices()
        .find(|(_, c)| matches!(c, '.' | '!' | '?'))
        .map_or(text.len(), |(i, c)| i + c.len_utf8());
    text[..end].trim().to_string()
}

/// Items from the avoid-list that appear in the prose or match an
/// extracted key point or example (normalized comparison).
fn overlap_with(prose: &str, avoid: &[String]) -> Vec<String> {
    let prose_lower = prose.to_lowercase();
    avoid
        .iter()
        .filter(|item| {
            let needle = item.to_lowercase();
            !needle.is_empty() && prose_lower.contains(&needle)
        })
        .cloned()
        .collect()
}

/// Overlap fraction: overlapping items over the post's own candidate
/// key points and examples (at least one to avoid dividing by zero).
fn overlap_fraction(prose: &str, overlapping: &[String]) -> f64 {
    let candidates = extract_key_points(prose).len() + extract_examples(prose).len();
    let denominator = candidates.max(1);
    #[allow(clippy::cast_precision_loss)]
    {
        overlapping.len() as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemoryThread, ThreadStatus};
    use crate::store::{BlogPostRecord, BlogPostSummary};
    use crate::Error;
    use chrono::{NaiveDate, Utc};
    use std::sync::Mutex;

    struct ScriptedWorker {
        responses: Mutex<Vec<String>>,
    }

    impl ScriptedWorker {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
            }
        }

        fn remaining(&self) -> usize {
            self.responses.lock().unwrap().len()
        }
    }

    impl LlmWorker for ScriptedWorker {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn invoke(&self, _prompt: &str) -> Result<String> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| Error::LlmUnavailable("script exhausted".to_string()))
        }
    }

    fn weekly_context() -> WeeklyContext {
        WeeklyContext {
            year: 2026,
            week: 6,
            week_start: NaiveDate::from_ymd_opt(2026, 2, 2).unwrap(),
            week_end: NaiveDate::from_ymd_opt(2026, 2, 8).unwrap(),
            source_dates: vec![
                NaiveDate::from_ymd_opt(2026, 2, 2).unwrap(),
                NaiveDate::from_ymd_opt(2026, 2, 3).unwrap(),
            ],
            total_sessions: 4,
            total_duration_minutes: 120,
            projects: vec!["alpha".to_string()],
            recurring_topics: vec!["parsers".to_string()],
            decisions: vec![],
            open_questions: vec![],
            combined_prose: "## Monday\n\nwork".to_string(),
        }
    }

    fn memory_with_example(example: &str) -> BlogMemory {
        let mut memory = BlogMemory::default();
        memory.add_post(BlogPostSummary {
            slug: "weekly-2026-W05".to_string(),
            title: "Week 5".to_string(),
            post_type: "weekly".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            key_points: vec![],
            themes_covered: vec![],
            examples_used: vec![example.to_string()],
            platforms_published: BTreeSet::new(),
        });
        memory
    }

    #[test]
    fn test_weekly_post_shape() {
        let config = DistillConfig::default();
        let worker = ScriptedWorker::new(vec!["# The Week the Parsers Fell Into Place\n\n## Monday\n\nParsing came together."]);
        let synthesizer = BlogSynthesizer::new(&config, &worker);

        let generated = synthesizer
            .synthesize_weekly(&weekly_context(), &BlogMemory::default(), "", "")
            .unwrap();
        assert_eq!(generated.post.slug, "weekly-2026-W06");
        assert_eq!(generated.post.post_type, BlogPostType::Weekly);
        assert_eq!(generated.post.title, "The Week the Parsers Fell Into Place");
        assert_eq!(generated.post.source_dates.len(), 2);
        assert!(generated.diagnostics.is_empty());
    }

    #[test]
    fn test_overlap_triggers_single_reprompt() {
        let mut config = DistillConfig::default();
        config.blog.overlap_threshold = 0.4;
        // First draft reuses the known example; rewrite drops it
        let worker = ScriptedWorker::new(vec![
            "# Week\n\n## Section\n\nThe \"fan-in parser\" strikes again.",
            "# Week\n\n## Section\n\nA fresh example this time.",
        ]);
        let synthesizer = BlogSynthesizer::new(&config, &worker);
        let memory = memory_with_example("fan-in parser");

        let generated = synthesizer
            .synthesize_weekly(&weekly_context(), &memory, "", "")
            .unwrap();
        assert_eq!(worker.remaining(), 0);
        assert!(generated.diagnostics.is_empty());
        assert!(!generated.post.body_markdown.contains("fan-in parser"));
        assert_ne!(
            generated.post.examples_used,
            vec!["fan-in parser".to_string()]
        );
    }

    #[test]
    fn test_persistent_overlap_annotated() {
        let mut config = DistillConfig::default();
        config.blog.overlap_threshold = 0.4;
        let draft = "# Week\n\n## Section\n\nThe \"fan-in parser\" again.";
        let worker = ScriptedWorker::new(vec![draft, draft]);
        let synthesizer = BlogSynthesizer::new(&config, &worker);
        let memory = memory_with_example("fan-in parser");

        let generated = synthesizer
            .synthesize_weekly(&weekly_context(), &memory, "", "")
            .unwrap();
        assert_eq!(generated.diagnostics.len(), 1);
        assert!(generated.post.body_markdown.contains("<!-- diagnostic:"));
    }

    #[test]
    fn test_thematic_slug_collision_suffix() {
        let config = DistillConfig::default();
        let worker = ScriptedWorker::new(vec!["# Pipelines\n\n## Why\n\nBecause."]);
        let synthesizer = BlogSynthesizer::new(&config, &worker);

        let mut state = BlogState::default();
        state.mark_generated(BlogPostRecord {
            slug: "pipeline-that-compounds".to_string(),
            post_type: "thematic".to_string(),
            generated_at: Utc::now(),
            source_dates: vec![],
            file_path: String::new(),
            config_fingerprint: String::new(),
            stale: false,
        });

        let context = ThematicContext {
            thread: MemoryThread {
                name: "Pipeline That Compounds".to_string(),
                summary: "compounding".to_string(),
                first_seen: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
                last_seen: NaiveDate::from_ymd_opt(2026, 2, 6).unwrap(),
                mention_count: 3,
                status: ThreadStatus::Active,
            },
            source_dates: vec![NaiveDate::from_ymd_opt(2026, 2, 6).unwrap()],
            combined_evidence: "evidence".to_string(),
            projects: vec![],
        };

        let generated = synthesizer
            .synthesize_thematic(&context, &state, &BlogMemory::default(), "", "")
            .unwrap();
        assert_eq!(generated.post.slug, "pipeline-that-compounds-2");
    }

    #[test]
    fn test_extract_key_points_first_sentences() {
        let prose = "# Title\n\nintro text.\n\n## First Section\n\nThe point is parsing. More detail.\n\n## Second\n\nMemory matters! And more.";
        assert_eq!(
            extract_key_points(prose),
            vec!["The point is parsing.", "Memory matters!"]
        );
    }

    #[test]
    fn test_extract_examples_quoted() {
        let prose = "We built the \"fan-in parser\" and the \"atomic rename\" dance.";
        assert_eq!(extract_examples(prose), vec!["fan-in parser", "atomic rename"]);
    }

    #[test]
    fn test_extract_examples_skips_long_quotes() {
        let long = format!("\"{}\"", "x".repeat(120));
        assert!(extract_examples(&long).is_empty());
    }

    #[test]
    fn test_unique_slug_without_collision() {
        assert_eq!(unique_slug("fresh", &BlogState::default()), "fresh");
        assert_eq!(unique_slug("", &BlogState::default()), "post");
    }
}

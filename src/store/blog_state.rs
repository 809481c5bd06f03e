//! Blog state and blog memory.
//!
//! Two durable records back blog idempotence: `BlogState` tracks what has
//! been generated (the skip check), `BlogMemory` tracks what has been
//! *said* (the non-repetition check).

use super::{Store, BLOG_MEMORY_FILENAME, BLOG_STATE_FILENAME};
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Record of one generated blog post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPostRecord {
    /// Post slug.
    pub slug: String,
    /// Post type string.
    pub post_type: String,
    /// When the post was generated.
    pub generated_at: DateTime<Utc>,
    /// Journal dates consumed.
    #[serde(default)]
    pub source_dates: Vec<NaiveDate>,
    /// Path of the canonical rendered file.
    #[serde(default)]
    pub file_path: String,
    /// Fingerprint of the synthesis config at generation time.
    #[serde(default)]
    pub config_fingerprint: String,
    /// Set when a source journal was regenerated after this post.
    #[serde(default)]
    pub stale: bool,
}

/// Tracks which blog posts have been generated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlogState {
    /// Generation records, one per slug.
    #[serde(default)]
    pub posts: Vec<BlogPostRecord>,
}

impl BlogState {
    /// Whether a post with this slug is generated, current, and was
    /// produced under the same configuration.
    #[must_use]
    pub fn is_up_to_date(&self, slug: &str, config_fingerprint: &str) -> bool {
        self.posts
            .iter()
            .any(|p| p.slug == slug && !p.stale && p.config_fingerprint == config_fingerprint)
    }

    /// Whether any record exists for this slug, stale or not.
    #[must_use]
    pub fn is_generated(&self, slug: &str) -> bool {
        self.posts.iter().any(|p| p.slug == slug)
    }

    /// Records a generated post, replacing any previous record with the
    /// same slug.
    pub fn mark_generated(&mut self, record: BlogPostRecord) {
        self.posts.retain(|p| p.slug != record.slug);
        self.posts.push(record);
    }

    /// Flags every post that consumed `date` as stale, returning the
    /// affected slugs. Called when a journal is force-regenerated.
    pub fn mark_stale_for_date(&mut self, date: NaiveDate) -> Vec<String> {
        let mut affected = Vec::new();
        for post in &mut self.posts {
            if post.source_dates.contains(&date) && !post.stale {
                post.stale = true;
                affected.push(post.slug.clone());
            }
        }
        affected
    }
}

/// Summary of a published post for cross-post dedup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPostSummary {
    /// Post slug.
    pub slug: String,
    /// Post title.
    pub title: String,
    /// Post type string.
    pub post_type: String,
    /// Date attributed to the post.
    pub date: NaiveDate,
    /// Key points the post made.
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Themes the post covered.
    #[serde(default)]
    pub themes_covered: Vec<String>,
    /// Specific examples and anecdotes the post used.
    #[serde(default)]
    pub examples_used: Vec<String>,
    /// Platforms the post has been delivered to.
    #[serde(default)]
    pub platforms_published: BTreeSet<String>,
}

/// Rolling memory of published blog content, used to keep new posts from
/// repeating earlier ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlogMemory {
    /// Post summaries, in generation order.
    #[serde(default)]
    pub posts: Vec<BlogPostSummary>,
}

impl BlogMemory {
    /// Adds or replaces a post summary by slug.
    pub fn add_post(&mut self, summary: BlogPostSummary) {
        self.posts.retain(|p| p.slug != summary.slug);
        self.posts.push(summary);
    }

    /// The avoid-list: union of key points and examples from the last
    /// `window` posts, deduplicated and sorted.
    #[must_use]
    pub fn avoid_list(&self, window: usize) -> Vec<String> {
        let mut avoid = BTreeSet::new();
        for post in self.posts.iter().rev().take(window) {
            for point in &post.key_points {
                avoid.insert(point.clone());
            }
            for example in &post.examples_used {
                avoid.insert(example.clone());
            }
        }
        avoid.into_iter().collect()
    }

    /// Marks a post delivered to a platform. Returns false if the post
    /// is unknown.
    pub fn mark_published(&mut self, slug: &str, platform: &str) -> bool {
        for post in &mut self.posts {
            if post.slug == slug {
                post.platforms_published.insert(platform.to_string());
                return true;
            }
        }
        false
    }

    /// Whether a post has been delivered to a platform.
    #[must_use]
    pub fn is_published_to(&self, slug: &str, platform: &str) -> bool {
        self.posts
            .iter()
            .any(|p| p.slug == slug && p.platforms_published.contains(platform))
    }

    /// Renders previous-post context for LLM injection. Empty when no
    /// posts exist.
    #[must_use]
    pub fn render_for_prompt(&self, window: usize) -> String {
        if self.posts.is_empty() {
            return String::new();
        }

        let mut lines: Vec<String> = vec!["## Previous Blog Posts".to_string(), String::new()];
        let mut recent: Vec<&BlogPostSummary> = self.posts.iter().collect();
        recent.sort_by_key(|p| std::cmp::Reverse(p.date));
        for post in recent.into_iter().take(window) {
            let points = if post.key_points.is_empty() {
                "no summary".to_string()
            } else {
                post.key_points.join("; ")
            };
            lines.push(format!("- \"{}\" ({}): {points}", post.title, post.date));
        }
        lines.push(String::new());

        let avoid = self.avoid_list(window);
        if !avoid.is_empty() {
            lines.push("## DO NOT REUSE These Examples".to_string());
            lines.push(
                "The following examples, anecdotes, and statistics have already \
                 appeared in previous posts. Find different evidence; never \
                 recycle these:"
                    .to_string(),
            );
            lines.push(String::new());
            for item in avoid {
                lines.push(format!("- {item}"));
            }
            lines.push(String::new());
        }

        lines.join("\n")
    }
}

impl Store {
    /// Loads the blog state ledger.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StateCorrupt`] if the file exists but is
    /// unreadable; a corrupt generation ledger must abort the run rather
    /// than silently regenerate everything.
    pub fn load_blog_state(&self) -> Result<BlogState> {
        Ok(self
            .read_ledger(&self.root().join("blog").join(BLOG_STATE_FILENAME))?
            .unwrap_or_default())
    }

    /// Persists the blog state ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn commit_blog_state(&self, state: &BlogState) -> Result<()> {
        self.write_json(&self.root().join("blog").join(BLOG_STATE_FILENAME), state)
    }

    /// Loads the blog memory. Corrupt content starts fresh.
    #[must_use]
    pub fn load_blog_memory(&self) -> BlogMemory {
        self.read_memory_class(&self.root().join("blog").join(BLOG_MEMORY_FILENAME))
    }

    /// Persists the blog memory.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn commit_blog_memory(&self, memory: &BlogMemory) -> Result<()> {
        self.write_json(&self.root().join("blog").join(BLOG_MEMORY_FILENAME), memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn record(slug: &str, dates: Vec<NaiveDate>) -> BlogPostRecord {
        BlogPostRecord {
            slug: slug.to_string(),
            post_type: "weekly".to_string(),
            generated_at: Utc::now(),
            source_dates: dates,
            file_path: String::new(),
            config_fingerprint: "abc".to_string(),
            stale: false,
        }
    }

    #[test]
    fn test_mark_generated_replaces() {
        let mut state = BlogState::default();
        state.mark_generated(record("weekly-2026-W06", vec![]));
        state.mark_generated(record("weekly-2026-W06", vec![]));
        assert_eq!(state.posts.len(), 1);
    }

    #[test]
    fn test_up_to_date_requires_same_fingerprint() {
        let mut state = BlogState::default();
        state.mark_generated(record("weekly-2026-W06", vec![]));
        assert!(state.is_up_to_date("weekly-2026-W06", "abc"));
        assert!(!state.is_up_to_date("weekly-2026-W06", "other"));
    }

    #[test]
    fn test_mark_stale_for_date() {
        let mut state = BlogState::default();
        state.mark_generated(record("weekly-2026-W06", vec![d(2026, 2, 8), d(2026, 2, 9)]));
        state.mark_generated(record("weekly-2026-W07", vec![d(2026, 2, 15)]));

        let affected = state.mark_stale_for_date(d(2026, 2, 8));
        assert_eq!(affected, vec!["weekly-2026-W06"]);
        assert!(!state.is_up_to_date("weekly-2026-W06", "abc"));
        assert!(state.is_up_to_date("weekly-2026-W07", "abc"));
    }

    #[test]
    fn test_avoid_list_window() {
        let mut memory = BlogMemory::default();
        for i in 0..12 {
            memory.add_post(BlogPostSummary {
                slug: format!("post-{i}"),
                title: format!("Post {i}"),
                post_type: "weekly".to_string(),
                date: d(2026, 1, 1),
                key_points: vec![format!("point-{i}")],
                themes_covered: vec![],
                examples_used: vec![format!("example-{i}")],
                platforms_published: BTreeSet::new(),
            });
        }
        let avoid = memory.avoid_list(10);
        // 10 most recent posts, two strings each
        assert_eq!(avoid.len(), 20);
        assert!(!avoid.contains(&"point-0".to_string()));
        assert!(avoid.contains(&"point-11".to_string()));
    }

    #[test]
    fn test_mark_published() {
        let mut memory = BlogMemory::default();
        memory.add_post(BlogPostSummary {
            slug: "weekly-2026-W06".to_string(),
            title: "Week 6".to_string(),
            post_type: "weekly".to_string(),
            date: d(2026, 2, 8),
            key_points: vec![],
            themes_covered: vec![],
            examples_used: vec![],
            platforms_published: BTreeSet::new(),
        });

        assert!(!memory.is_published_to("weekly-2026-W06", "vault"));
        assert!(memory.mark_published("weekly-2026-W06", "vault"));
        assert!(memory.is_published_to("weekly-2026-W06", "vault"));
        assert!(!memory.mark_published("missing", "vault"));
    }

    #[test]
    fn test_render_for_prompt_lists_avoid_items() {
        let mut memory = BlogMemory::default();
        memory.add_post(BlogPostSummary {
            slug: "weekly-2026-W05".to_string(),
            title: "Week 5".to_string(),
            post_type: "weekly".to_string(),
            date: d(2026, 2, 1),
            key_points: vec!["parsers unified".to_string()],
            themes_covered: vec![],
            examples_used: vec!["fan-in parser".to_string()],
            platforms_published: BTreeSet::new(),
        });

        let rendered = memory.render_for_prompt(10);
        assert!(rendered.contains("DO NOT REUSE"));
        assert!(rendered.contains("- fan-in parser"));
        assert!(rendered.contains("\"Week 5\" (2026-02-01): parsers unified"));
    }

    #[test]
    fn test_state_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let mut state = store.load_blog_state().unwrap();
        assert!(state.posts.is_empty());
        state.mark_generated(record("weekly-2026-W06", vec![d(2026, 2, 8)]));
        store.commit_blog_state(&state).unwrap();

        let loaded = store.load_blog_state().unwrap();
        assert!(loaded.is_generated("weekly-2026-W06"));
    }

    #[test]
    fn test_corrupt_state_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("blog").join(BLOG_STATE_FILENAME), "{oops").unwrap();
        let err = store.load_blog_state().unwrap_err();
        assert!(err.is_fatal());
    }
}

//! Reading persisted canonical blog posts back from disk.
//!
//! A standalone publish run reconstructs posts from `blog/<slug>.md`;
//! the dedup fields come from blog memory, not from the file.

use super::Store;
use crate::models::{BlogPost, BlogPostType};
use chrono::NaiveDate;
use std::collections::BTreeSet;

impl Store {
    /// Loads the canonical post for a slug, when one exists on disk.
    #[must_use]
    pub fn load_blog_post(&self, slug: &str) -> Option<BlogPost> {
        let path = self.root().join("blog").join(format!("{slug}.md"));
        let contents = std::fs::read_to_string(path).ok()?;
        parse_post_file(&contents)
    }
}

fn parse_post_file(contents: &str) -> Option<BlogPost> {
    let rest = contents.strip_prefix("---\n")?;
    let (header, body) = rest.split_once("\n---\n")?;

    let mut slug = String::new();
    let mut post_type = BlogPostType::Weekly;
    let mut date: Option<NaiveDate> = None;
    let mut title = String::new();
    let mut themes: Vec<String> = Vec::new();
    let mut projects: Vec<String> = Vec::new();
    let mut source_dates: Vec<NaiveDate> = Vec::new();

    for line in header.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "slug" => slug = value.to_string(),
            "post_type" => {
                post_type = match value {
                    "thematic" => BlogPostType::Thematic,
                    "reading-list" => BlogPostType::ReadingList,
                    _ => BlogPostType::Weekly,
                };
            },
            "date" => date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
            "title" => title = value.trim_matches('"').to_string(),
            "themes" => themes = parse_list(value),
            "projects" => projects = parse_list(value),
            "source_dates" => {
                source_dates = parse_list(value)
                    .iter()
                    .filter_map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                    .collect();
            },
            _ => {},
        }
    }

    if slug.is_empty() {
        return None;
    }

    Some(BlogPost {
        slug,
        post_type,
        date: date?,
        title,
        body_markdown: body.trim_start_matches('\n').to_string(),
        themes,
        projects,
        source_dates,
        key_points: Vec::new(),
        examples_used: Vec::new(),
        platforms_published: BTreeSet::new(),
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

//! Blog post formatting and index regeneration.

use crate::models::BlogPost;
use crate::store::BlogState;

/// Renders a blog post as front-matter plus prose.
#[must_use]
pub fn format_post(post: &BlogPost) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push("---".to_string());
    lines.push("type: blog-post".to_string());
    lines.push(format!("slug: {}", post.slug));
    lines.push(format!("post_type: {}", post.post_type));
    lines.push(format!("date: {}", post.date));
    lines.push(format!("title: \"{}\"", post.title.replace('"', "'")));
    if !post.themes.is_empty() {
        lines.push(format!("themes: [{}]", post.themes.join(", ")));
    }
    if !post.projects.is_empty() {
        lines.push(format!("projects: [{}]", post.projects.join(", ")));
    }
    if !post.source_dates.is_empty() {
        let dates: Vec<String> = post.source_dates.iter().map(ToString::to_string).collect();
        lines.push(format!("source_dates: [{}]", dates.join(", ")));
    }
    lines.push("---".to_string());
    lines.push(String::new());
    lines.push(post.body_markdown.clone());
    lines.join("\n")
}

/// Renders the blog index listing every generated post by type.
#[must_use]
pub fn format_index(state: &BlogState) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push("---".to_string());
    lines.push("type: blog-index".to_string());
    lines.push(format!("total_posts: {}", state.posts.len()));
    lines.push("---".to_string());
    lines.push(String::new());
    lines.push("# Blog Index".to_string());
    lines.push(String::new());

    let mut weekly: Vec<_> = state.posts.iter().filter(|p| p.post_type == "weekly").collect();
    weekly.sort_by(|a, b| b.slug.cmp(&a.slug));
    if !weekly.is_empty() {
        lines.push("## Weekly Synthesis".to_string());
        lines.push(String::new());
        for post in weekly {
            lines.push(format!(
                "- [[blog/{}|{}]] (generated {})",
                post.slug,
                post.slug,
                post.generated_at.format("%Y-%m-%d")
            ));
        }
        lines.push(String::new());
    }

    let mut thematic: Vec<_> = state.posts.iter().filter(|p| p.post_type == "thematic").collect();
    thematic.sort_by(|a, b| a.slug.cmp(&b.slug));
    if !thematic.is_empty() {
        lines.push("## Thematic Deep-Dives".to_string());
        lines.push(String::new());
        for post in thematic {
            lines.push(format!(
                "- [[blog/{}|{}]] (generated {})",
                post.slug,
                post.slug,
                post.generated_at.format("%Y-%m-%d")
            ));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// The post title: text of the first top-level heading, or the slug
/// when the prose has none.
#[must_use]
pub fn derive_title(prose: &str, fallback: &str) -> String {
    prose
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map_or_else(|| fallback.to_string(), |t| t.trim().to_string())
}

//! Professional-post dialect: hook line, condensed body, link footer.

use super::{DeliveryReceipt, Payload, Platform, Publisher};
use crate::models::BlogPost;
use crate::store::Store;
use crate::Result;

const BODY_LIMIT: usize = 2200;

/// Publisher for the professional-network dialect.
pub struct ProfessionalPublisher {
    store: Store,
}

impl ProfessionalPublisher {
    /// Creates a professional publisher writing through the store.
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

impl Publisher for ProfessionalPublisher {
    fn platform(&self) -> Platform {
        Platform::Professional
    }

    fn render(&self, post: &BlogPost) -> Result<Payload> {
        let mut lines: Vec<String> = Vec::new();
        lines.push(hook_line(post));
        lines.push(String::new());

        let body = condensed_body(&post.body_markdown);
        lines.push(body);
        lines.push(String::new());

        if !post.themes.is_empty() {
            let hashtags: Vec<String> = post
                .themes
                .iter()
                .take(5)
                .map(|t| format!("#{}", t.replace([' ', '-'], "")))
                .collect();
            lines.push(hashtags.join(" "));
        }

        let mut content = lines.join("\n");
        if content.len() > BODY_LIMIT {
            content = truncate_at_sentence(&content, BODY_LIMIT);
        }

        Ok(Payload {
            platform: Platform::Professional,
            slug: post.slug.clone(),
            content,
            parts: vec![],
        })
    }

    fn deliver(&self, payload: &Payload) -> Result<DeliveryReceipt> {
        let path = self.store.blog_path("professional", &payload.slug);
        self.store.atomic_write(&path, &payload.content)?;
        Ok(DeliveryReceipt {
            platform: Platform::Professional,
            target: path.display().to_string(),
        })
    }
}

fn hook_line(post: &BlogPost) -> String {
    // First sentence of the body is the hook; the title when none exists
    post.body_markdown
        .lines()
        .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .find_map(|l| {
            let trimmed = l.trim();
            let end = trimmed.find(['.', '!', '?']).map(|i| i + 1)?;
            Some(trimmed[..end].to_string())
        })
        .unwrap_or_else(|| post.title.clone())
}

fn condensed_body(markdown: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || trimmed.starts_with('#') || trimmed.starts_with("<!--") {
            continue;
        }
        if trimmed.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(trimmed);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs.join("\n\n")
}

fn truncate_at_sentence(text: &str, limit: usize) -> String {
    let mut cut = 0;
    for (i, c) in text.char_indices() {
        if i >= limit {
            break;
        }
        if matches!(c, '.' | '!' | '?') {
            cut = i + c.len_utf8();
        }
    }
    if cut == 0 {
        text.chars().take(limit).collect()
    } else {
        text[..cut].to_string()
    }
}

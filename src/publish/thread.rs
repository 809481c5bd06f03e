//! Thread dialect: short numbered segments.
//!
//! The post body is stripped of markdown structure and split into
//! segments that fit a short-post limit, each suffixed with an `(n/m)`
//! counter. The rendered form is written locally; an operator pastes or
//! pipes the segments into the destination.

use super::{DeliveryReceipt, Payload, Platform, Publisher};
use crate::models::BlogPost;
use crate::store::Store;
use crate::{Error, Result};

const SEGMENT_LIMIT: usize = 280;

/// Publisher for the segmented thread dialect.
pub struct ThreadPublisher {
    store: Store,
}

impl ThreadPublisher {
    /// Creates a thread publisher writing through the store.
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

impl Publisher for ThreadPublisher {
    fn platform(&self) -> Platform {
        Platform::Thread
    }

    fn render(&self, post: &BlogPost) -> Result<Payload> {
        let plain = strip_markdown(&post.body_markdown);
        if plain.is_empty() {
            return Err(Error::PublisherRejected {
                platform: "thread".to_string(),
                cause: "post body is empty after markdown stripping".to_string(),
            });
        }

        let segments = segment(&plain, SEGMENT_LIMIT);
        let total = segments.len();
        let numbered: Vec<String> = segments
            .into_iter()
            .enumerate()
            .map(|(i, s)| format!("{s} ({}/{total})", i + 1))
            .collect();

        Ok(Payload {
            platform: Platform::Thread,
            slug: post.slug.clone(),
            content: numbered.join("\n\n---\n\n"),
            parts: numbered,
        })
    }

    fn deliver(&self, payload: &Payload) -> Result<DeliveryReceipt> {
        let path = self.store.blog_path("thread", &payload.slug);
        self.store.atomic_write(&path, &payload.content)?;
        Ok(DeliveryReceipt {
            platform: Platform::Thread,
            target: path.display().to_string(),
        })
    }
}

/// Drops headings, fences, and link syntax, keeping prose sentences.
fn strip_markdown(body: &str) -> String {
    let mut in_fence = false;
    let mut lines: Vec<&str> = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || trimmed.starts_with('#') || trimmed.starts_with("<!--") {
            continue;
        }
        lines.push(line);
    }
    let text = lines.join(" ");
    let text = text.replace("**", "").replace('`', "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits text at word boundaries into chunks of at most `limit` minus
/// counter headroom.
fn segment(text: &str, limit: usize) -> Vec<String> {
    // Leave room for the " (nn/mm)" counter suffix
    let budget = limit.saturating_sub(10);
    let mut segments = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > budget {
            segments.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::tests::sample_post;

    #[test]
    fn test_segments_fit_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let publisher = ThreadPublisher::new(store);

        let mut post = sample_post();
        post.body_markdown = format!("# T\n\n{}", "word ".repeat(300));
        let payload = publisher.render(&post).unwrap();

        assert!(payload.parts.len() > 1);
        for part in &payload.parts {
            assert!(part.len() <= SEGMENT_LIMIT, "segment too long: {}", part.len());
        }
        assert!(payload.parts[0].ends_with(&format!("(1/{})", payload.parts.len())));
    }

    #[test]
    fn test_markdown_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let publisher = ThreadPublisher::new(store);

        let mut post = sample_post();
        post.body_markdown =
            "# Heading\n\n```mermaid\nflowchart\n```\n\nReal **bold** prose here.".to_string();
        let payload = publisher.render(&post).unwrap();
        assert_eq!(payload.parts.len(), 1);
        assert!(payload.parts[0].starts_with("Real bold prose here."));
        assert!(!payload.content.contains("flowchart"));
    }

    #[test]
    fn test_empty_body_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let publisher = ThreadPublisher::new(store);

        let mut post = sample_post();
        post.body_markdown = "# Only a heading".to_string();
        assert!(matches!(
            publisher.render(&post).unwrap_err(),
            Error::PublisherRejected { .. }
        ));
    }
}

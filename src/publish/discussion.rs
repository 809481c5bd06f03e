//! Discussion-post dialect: explicit title line plus markdown body.

use super::{DeliveryReceipt, Payload, Platform, Publisher};
use crate::models::BlogPost;
use crate::store::Store;
use crate::Result;

/// Publisher for the discussion-forum dialect.
pub struct DiscussionPublisher {
    store: Store,
}

impl DiscussionPublisher {
    /// Creates a discussion publisher writing through the store.
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

impl Publisher for DiscussionPublisher {
    fn platform(&self) -> Platform {
        Platform::Discussion
    }

    fn render(&self, post: &BlogPost) -> Result<Payload> {
        // Forums take the title separately; strip the top-level heading
        // so it does not repeat inside the body
        let body: Vec<&str> = post
            .body_markdown
            .lines()
            .skip_while(|l| l.starts_with("# ") || l.trim().is_empty())
            .collect();

        let content = format!("Title: {}\n\n{}", post.title, body.join("\n"));
        Ok(Payload {
            platform: Platform::Discussion,
            slug: post.slug.clone(),
            content,
            parts: vec![post.title.clone()],
        })
    }

    fn deliver(&self, payload: &Payload) -> Result<DeliveryReceipt> {
        let path = self.store.blog_path("discussion", &payload.slug);
        self.store.atomic_write(&path, &payload.content)?;
        Ok(DeliveryReceipt {
            platform: Platform::Discussion,
            target: path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::tests::sample_post;

    #[test]
    fn test_title_separated_from_body() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let publisher = DiscussionPublisher::new(store);

        let payload = publisher.render(&sample_post()).unwrap();
        assert!(payload.content.starts_with("Title: A Week of Parsers\n"));
        // The heading does not repeat in the body
        assert!(!payload.content.contains("# A Week of Parsers"));
        assert!(payload.content.contains("## What happened"));
    }
}

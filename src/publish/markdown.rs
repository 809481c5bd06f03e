//! Plain-markdown dialect.

use super::{DeliveryReceipt, Payload, Platform, Publisher};
use crate::blog::formatter::format_post;
use crate::models::BlogPost;
use crate::store::Store;
use crate::Result;

/// Publisher that writes the canonical markdown form to disk.
pub struct MarkdownPublisher {
    store: Store,
}

impl MarkdownPublisher {
    /// Creates a markdown publisher writing through the store.
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

impl Publisher for MarkdownPublisher {
    fn platform(&self) -> Platform {
        Platform::Markdown
    }

    fn render(&self, post: &BlogPost) -> Result<Payload> {
        Ok(Payload {
            platform: Platform::Markdown,
            slug: post.slug.clone(),
            content: format_post(post),
            parts: vec![],
        })
    }

    fn deliver(&self, payload: &Payload) -> Result<DeliveryReceipt> {
        let path = self.store.blog_path("markdown", &payload.slug);
        self.store.atomic_write(&path, &payload.content)?;
        Ok(DeliveryReceipt {
            platform: Platform::Markdown,
            target: path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::tests::sample_post;

    #[test]
    fn test_render_and_deliver() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let publisher = MarkdownPublisher::new(store);

        let payload = publisher.render(&sample_post()).unwrap();
        let receipt = publisher.deliver(&payload).unwrap();
        assert!(receipt.target.ends_with("blog/markdown/weekly-2026-W06.md"));
        let written = std::fs::read_to_string(&receipt.target).unwrap();
        assert!(written.contains("slug: weekly-2026-W06"));
    }
}

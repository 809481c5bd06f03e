//! Local-vault dialect: wiki-links and front matter.

use super::{DeliveryReceipt, Payload, Platform, Publisher};
use crate::models::BlogPost;
use crate::store::Store;
use crate::Result;

/// Publisher for a local note vault.
pub struct VaultPublisher {
    store: Store,
}

impl VaultPublisher {
    /// Creates a vault publisher writing through the store.
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

impl Publisher for VaultPublisher {
    fn platform(&self) -> Platform {
        Platform::Vault
    }

    fn render(&self, post: &BlogPost) -> Result<Payload> {
        let mut lines: Vec<String> = Vec::new();
        lines.push("---".to_string());
        lines.push(format!("title: \"{}\"", post.title.replace('"', "'")));
        lines.push(format!("date: {}", post.date));
        lines.push(format!("type: {}", post.post_type));
        if !post.themes.is_empty() {
            lines.push(format!("tags: [{}]", post.themes.join(", ")));
        }
        lines.push("---".to_string());
        lines.push(String::new());
        lines.push(post.body_markdown.clone());

        // Wiki-link footer: projects and source days become links
        if !post.projects.is_empty() || !post.source_dates.is_empty() {
            lines.push(String::new());
            lines.push("---".to_string());
            if !post.projects.is_empty() {
                let links: Vec<String> =
                    post.projects.iter().map(|p| format!("[[{p}]]")).collect();
                lines.push(format!("Projects: {}", links.join(" ")));
            }
            if !post.source_dates.is_empty() {
                let links: Vec<String> = post
                    .source_dates
                    .iter()
                    .map(|d| format!("[[journal-{d}]]"))
                    .collect();
                lines.push(format!("Source days: {}", links.join(" ")));
            }
        }

        Ok(Payload {
            platform: Platform::Vault,
            slug: post.slug.clone(),
            content: lines.join("\n"),
            parts: vec![],
        })
    }

    fn deliver(&self, payload: &Payload) -> Result<DeliveryReceipt> {
        let path = self.store.blog_path("vault", &payload.slug);
        self.store.atomic_write(&path, &payload.content)?;
        Ok(DeliveryReceipt {
            platform: Platform::Vault,
            target: path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::tests::sample_post;

    #[test]
    fn test_render_has_wiki_links() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let publisher = VaultPublisher::new(store);

        let payload = publisher.render(&sample_post()).unwrap();
        assert!(payload.content.contains("[[alpha]]"));
        assert!(payload.content.contains("[[journal-2026-02-02]]"));
        assert!(payload.content.starts_with("---\ntitle:"));
    }
}

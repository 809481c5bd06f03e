//! CMS dialect: markdown delivered through an authenticated API.

use super::{DeliveryReceipt, Payload, Platform, Publisher};
use crate::config::CmsConfig;
use crate::models::BlogPost;
use crate::{Error, Result};
use std::time::Duration;

/// Publisher posting drafts to a Ghost-style CMS.
pub struct CmsPublisher {
    config: CmsConfig,
    client: reqwest::blocking::Client,
}

impl CmsPublisher {
    /// Creates a CMS publisher with a per-request timeout.
    #[must_use]
    pub fn new(config: CmsConfig, timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("distill-publisher")
            .build()
            .unwrap_or_default();
        Self { config, client }
    }
}

impl Publisher for CmsPublisher {
    fn platform(&self) -> Platform {
        Platform::Cms
    }

    fn render(&self, post: &BlogPost) -> Result<Payload> {
        let body = serde_json::json!({
            "posts": [{
                "title": post.title,
                "slug": post.slug,
                "markdown": post.body_markdown,
                "tags": post.themes,
                "status": "draft",
            }]
        });
        Ok(Payload {
            platform: Platform::Cms,
            slug: post.slug.clone(),
            content: body.to_string(),
            parts: vec![],
        })
    }

    fn deliver(&self, payload: &Payload) -> Result<DeliveryReceipt> {
        let url = format!("{}/posts/", self.config.url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Ghost {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .body(payload.content.clone())
            .send()
            .map_err(|e| Error::PublisherRejected {
                platform: "cms".to_string(),
                cause: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::PublisherRejected {
                platform: "cms".to_string(),
                cause: format!("status {status}: {body}"),
            });
        }

        // The created post id, when the CMS returns one
        let target = response
            .json::<serde_json::Value>()
            .ok()
            .and_then(|v| {
                v.pointer("/posts/0/id")
                    .and_then(serde_json::Value::as_str)
                    .map(String::from)
            })
            .unwrap_or_else(|| payload.slug.clone());

        Ok(DeliveryReceipt {
            platform: Platform::Cms,
            target,
        })
    }
}

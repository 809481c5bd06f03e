//! Scheduler dialect: JSON forwarded to a social-scheduling service.

use super::{DeliveryReceipt, Payload, Platform, Publisher};
use crate::config::SchedulerConfig;
use crate::models::BlogPost;
use crate::{Error, Result};
use std::time::Duration;

/// Publisher forwarding posts to an external scheduling service.
pub struct SchedulerPublisher {
    config: SchedulerConfig,
    client: reqwest::blocking::Client,
}

impl SchedulerPublisher {
    /// Creates a scheduler publisher with a per-request timeout.
    #[must_use]
    pub fn new(config: SchedulerConfig, timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("distill-publisher")
            .build()
            .unwrap_or_default();
        Self { config, client }
    }
}

impl Publisher for SchedulerPublisher {
    fn platform(&self) -> Platform {
        Platform::Scheduler
    }

    fn render(&self, post: &BlogPost) -> Result<Payload> {
        // The scheduler takes a short teaser, not the whole post
        let teaser: String = post
            .body_markdown
            .lines()
            .filter(|l| !l.starts_with('#') && !l.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(400)
            .collect();

        let body = serde_json::json!({
            "content": format!("{}\n\n{}", post.title, teaser),
            "channels": self.config.channels,
            "reference": post.slug,
        });
        Ok(Payload {
            platform: Platform::Scheduler,
            slug: post.slug.clone(),
            content: body.to_string(),
            parts: vec![],
        })
    }

    fn deliver(&self, payload: &Payload) -> Result<DeliveryReceipt> {
        let url = format!("{}/api/posts", self.config.url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .body(payload.content.clone())
            .send()
            .map_err(|e| Error::PublisherRejected {
                platform: "scheduler".to_string(),
                cause: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::PublisherRejected {
                platform: "scheduler".to_string(),
                cause: format!("status {status}"),
            });
        }

        let target = response
            .json::<serde_json::Value>()
            .ok()
            .and_then(|v| v.get("id").and_then(serde_json::Value::as_str).map(String::from))
            .unwrap_or_else(|| payload.slug.clone());

        Ok(DeliveryReceipt {
            platform: Platform::Scheduler,
            target,
        })
    }
}

//! Publisher fan-out.
//!
//! Each destination platform implements [`Publisher`]: render a
//! canonical post into the platform dialect, then deliver the payload.
//! Fan-out for one post runs platforms in parallel; platforms share no
//! state, and one platform's failure never blocks another.

mod cms;
mod discussion;
mod markdown;
mod professional;
mod scheduler;
mod thread;
mod vault;

pub use cms::CmsPublisher;
pub use discussion::DiscussionPublisher;
pub use markdown::MarkdownPublisher;
pub use professional::ProfessionalPublisher;
pub use scheduler::SchedulerPublisher;
pub use thread::ThreadPublisher;
pub use vault::VaultPublisher;

use crate::config::DistillConfig;
use crate::models::BlogPost;
use crate::store::Store;
use crate::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// A destination platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Local vault dialect: wiki-links and front matter.
    Vault,
    /// CMS dialect: markdown via authenticated API.
    Cms,
    /// Plain markdown file.
    Markdown,
    /// Thread dialect: short segmented posts.
    Thread,
    /// Professional-network dialect: hook plus excerpt.
    Professional,
    /// Discussion-forum dialect: title plus body.
    Discussion,
    /// Social-scheduler dialect: JSON forwarded to a scheduling service.
    Scheduler,
}

impl Platform {
    /// Stable string form used in directories and state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vault => "vault",
            Self::Cms => "cms",
            Self::Markdown => "markdown",
            Self::Thread => "thread",
            Self::Professional => "professional",
            Self::Discussion => "discussion",
            Self::Scheduler => "scheduler",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vault" => Ok(Self::Vault),
            "cms" => Ok(Self::Cms),
            "markdown" => Ok(Self::Markdown),
            "thread" => Ok(Self::Thread),
            "professional" => Ok(Self::Professional),
            "discussion" => Ok(Self::Discussion),
            "scheduler" => Ok(Self::Scheduler),
            other => Err(Error::InvalidInput(format!("unknown platform: {other}"))),
        }
    }
}

/// A platform-rendered payload ready for delivery.
#[derive(Debug, Clone)]
pub struct Payload {
    /// The platform it renders for.
    pub platform: Platform,
    /// Slug of the post being delivered.
    pub slug: String,
    /// Rendered content in the platform dialect.
    pub content: String,
    /// Platform-specific structured fields (segments, JSON body).
    pub parts: Vec<String>,
}

/// Proof of a completed delivery.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    /// The platform delivered to.
    pub platform: Platform,
    /// Where the payload landed: a file path or remote identifier.
    pub target: String,
}

/// Capability set of a publisher.
pub trait Publisher: Send + Sync {
    /// The platform this publisher serves.
    fn platform(&self) -> Platform;

    /// Renders a post into the platform dialect.
    ///
    /// # Errors
    ///
    /// Returns an error when the post cannot be represented on this
    /// platform.
    fn render(&self, post: &BlogPost) -> Result<Payload>;

    /// Delivers a rendered payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PublisherRejected`] when the destination refuses
    /// the payload.
    fn deliver(&self, payload: &Payload) -> Result<DeliveryReceipt>;
}

/// Outcome of fanning one post out to every configured platform.
#[derive(Debug, Default)]
pub struct FanoutReport {
    /// Successful deliveries.
    pub delivered: Vec<DeliveryReceipt>,
    /// Failed platforms with their errors, stringified.
    pub failed: Vec<(Platform, String)>,
}

/// Builds the publisher set for the configured platform list. Platforms
/// that need credentials are skipped (with a warning) when their config
/// block is absent.
#[must_use]
pub fn build_publishers(config: &DistillConfig, store: &Store) -> Vec<Box<dyn Publisher>> {
    let mut publishers: Vec<Box<dyn Publisher>> = Vec::new();
    for name in &config.blog.platforms {
        let Ok(platform) = name.parse::<Platform>() else {
            tracing::warn!(platform = %name, "Unknown platform in config, skipping");
            continue;
        };
        match platform {
            Platform::Vault => publishers.push(Box::new(VaultPublisher::new(store.clone()))),
            Platform::Markdown => publishers.push(Box::new(MarkdownPublisher::new(store.clone()))),
            Platform::Thread => publishers.push(Box::new(ThreadPublisher::new(store.clone()))),
            Platform::Professional => {
                publishers.push(Box::new(ProfessionalPublisher::new(store.clone())));
            },
            Platform::Discussion => {
                publishers.push(Box::new(DiscussionPublisher::new(store.clone())));
            },
            Platform::Cms => match &config.cms {
                Some(cms) => publishers.push(Box::new(CmsPublisher::new(
                    cms.clone(),
                    Duration::from_secs(config.pipeline.publisher_timeout_secs),
                ))),
                None => tracing::warn!("cms platform configured without [cms] block, skipping"),
            },
            Platform::Scheduler => match &config.scheduler {
                Some(scheduler) => publishers.push(Box::new(SchedulerPublisher::new(
                    scheduler.clone(),
                    Duration::from_secs(config.pipeline.publisher_timeout_secs),
                ))),
                None => {
                    tracing::warn!("scheduler platform configured without [scheduler] block, skipping");
                },
            },
        }
    }
    publishers
}

/// Fans one post out to every publisher in parallel. Each platform gets
/// its own timeout; failures are isolated per platform. The
/// cancellation flag is honored between platforms.
#[must_use]
pub fn fan_out(
    publishers: &[&dyn Publisher],
    post: &BlogPost,
    timeout: Duration,
    cancelled: &Arc<AtomicBool>,
) -> FanoutReport {
    let mut report = FanoutReport::default();

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for publisher in publishers {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let (tx, rx) = mpsc::channel();
            let platform = publisher.platform();
            scope.spawn(move || {
                let result = publisher
                    .render(post)
                    .and_then(|payload| publisher.deliver(&payload));
                let _ = tx.send(result);
            });
            handles.push((platform, rx));
        }

        for (platform, rx) in handles {
            match rx.recv_timeout(timeout) {
                Ok(Ok(receipt)) => {
                    metrics::counter!("publisher_deliveries_total", "platform" => platform.as_str(), "status" => "success").increment(1);
                    tracing::info!(platform = %platform, target = %receipt.target, "Delivered");
                    report.delivered.push(receipt);
                },
                Ok(Err(e)) => {
                    metrics::counter!("publisher_deliveries_total", "platform" => platform.as_str(), "status" => "error").increment(1);
                    tracing::warn!(platform = %platform, error = %e, "Delivery failed");
                    report.failed.push((platform, e.to_string()));
                },
                Err(_) => {
                    metrics::counter!("publisher_deliveries_total", "platform" => platform.as_str(), "status" => "timeout").increment(1);
                    tracing::warn!(platform = %platform, "Delivery timed out");
                    report.failed.push((platform, format!("timed out after {}s", timeout.as_secs())));
                },
            }
        }
    });

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlogPostType;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    pub(crate) fn sample_post() -> BlogPost {
        BlogPost {
            slug: "weekly-2026-W06".to_string(),
            post_type: BlogPostType::Weekly,
            date: NaiveDate::from_ymd_opt(2026, 2, 8).unwrap(),
            title: "A Week of Parsers".to_string(),
            body_markdown: "# A Week of Parsers\n\n## What happened\n\nThe parsers unified. It took three tries.".to_string(),
            themes: vec!["parsers".to_string()],
            projects: vec!["alpha".to_string()],
            source_dates: vec![NaiveDate::from_ymd_opt(2026, 2, 2).unwrap()],
            key_points: vec![],
            examples_used: vec![],
            platforms_published: BTreeSet::new(),
        }
    }

    struct SlowPublisher;

    impl Publisher for SlowPublisher {
        fn platform(&self) -> Platform {
            Platform::Cms
        }

        fn render(&self, post: &BlogPost) -> Result<Payload> {
            Ok(Payload {
                platform: Platform::Cms,
                slug: post.slug.clone(),
                content: String::new(),
                parts: vec![],
            })
        }

        fn deliver(&self, _payload: &Payload) -> Result<DeliveryReceipt> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(DeliveryReceipt {
                platform: Platform::Cms,
                target: "late".to_string(),
            })
        }
    }

    #[test]
    fn test_platform_roundtrip() {
        for platform in [
            Platform::Vault,
            Platform::Cms,
            Platform::Markdown,
            Platform::Thread,
            Platform::Professional,
            Platform::Discussion,
            Platform::Scheduler,
        ] {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn test_fan_out_isolates_timeout() {
        let slow = SlowPublisher;
        let publishers: Vec<&dyn Publisher> = vec![&slow];
        let cancelled = Arc::new(AtomicBool::new(false));
        let report = fan_out(
            &publishers,
            &sample_post(),
            Duration::from_millis(50),
            &cancelled,
        );
        assert!(report.delivered.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].1.contains("timed out"));
    }

    #[test]
    fn test_fan_out_honors_cancellation() {
        let slow = SlowPublisher;
        let publishers: Vec<&dyn Publisher> = vec![&slow];
        let cancelled = Arc::new(AtomicBool::new(true));
        let report = fan_out(
            &publishers,
            &sample_post(),
            Duration::from_millis(50),
            &cancelled,
        );
        assert!(report.delivered.is_empty());
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_build_publishers_skips_unconfigured_cms() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let mut config = DistillConfig::default();
        config.blog.platforms = vec!["vault".to_string(), "cms".to_string()];

        let publishers = build_publishers(&config, &store);
        assert_eq!(publishers.len(), 1);
        assert_eq!(publishers[0].platform(), Platform::Vault);
    }
}

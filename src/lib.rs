//! # Distill
//!
//! A batch pipeline that distills heterogeneous activity sources (AI
//! coding-assistant session logs and external content feeds) into daily
//! journal entries, weekly and thematic blog posts, and multi-platform
//! publication artifacts.
//!
//! ## Architecture
//!
//! - Source parsers normalize three session dialects and several content
//!   feeds into one canonical model
//! - A deterministic analyzer derives per-session statistics, tags, and
//!   project attribution
//! - Journal and blog synthesizers delegate prose generation to an
//!   external LLM worker (subprocess by default)
//! - A unified memory store preserves narrative continuity across runs
//! - A state layer makes every stage idempotent and safely re-runnable
//!
//! ## Example
//!
//! ```rust,ignore
//! use distill::config::DistillConfig;
//! use distill::pipeline::{Pipeline, RunRequest};
//!
//! let config = DistillConfig::load_default();
//! let pipeline = Pipeline::new(config)?;
//! let report = pipeline.run(&RunRequest::default())?;
//! println!("{}", report.summary_text());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use std::error::Error as StdError;
use std::fmt;

// Module declarations
pub mod analyzer;
pub mod blog;
pub mod config;
pub mod ingest;
pub mod journal;
pub mod llm;
pub mod models;
pub mod observability;
pub mod parsers;
pub mod pipeline;
pub mod publish;
pub mod store;

// Re-exports for convenience
pub use config::DistillConfig;
pub use llm::LlmWorker;
pub use models::{BlogPost, ContentItem, ContentSource, JournalEntry, Session, UnifiedMemory};
pub use store::Store;

/// Error type for distill operations.
#[derive(Debug)]
pub enum Error {
    /// Invalid input was provided.
    InvalidInput(String),
    /// A source root could not be read at all. Fatal for that source only.
    SourceUnavailable {
        /// The source that failed.
        source: String,
        /// The underlying cause.
        cause: String,
    },
    /// A single record or file could not be parsed. Soft; the record is
    /// dropped and the pipeline continues.
    Parse {
        /// Location of the malformed input.
        location: String,
        /// The underlying cause.
        cause: String,
    },
    /// The LLM worker could not be invoked or exited with a failure.
    LlmUnavailable(String),
    /// The LLM worker exceeded its configured timeout.
    LlmTimeout {
        /// The timeout that was exceeded, in seconds.
        timeout_secs: u64,
    },
    /// Generated content fell below the acceptable length band.
    ContentTooShort {
        /// Actual word count.
        words: usize,
        /// Minimum acceptable word count.
        min_words: usize,
    },
    /// Generated content exceeded the acceptable length band.
    ContentTooLong {
        /// Actual word count.
        words: usize,
        /// Maximum acceptable word count.
        max_words: usize,
    },
    /// A publishing platform rejected a delivery.
    PublisherRejected {
        /// The platform that rejected the payload.
        platform: String,
        /// The underlying cause.
        cause: String,
    },
    /// Durable state is corrupt. Fatal for the whole run.
    StateCorrupt {
        /// Path of the corrupt state file.
        path: String,
        /// The underlying cause.
        cause: String,
    },
    /// An operation failed.
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::SourceUnavailable { source, cause } => {
                write!(f, "source '{source}' unavailable: {cause}")
            },
            Self::Parse { location, cause } => {
                write!(f, "parse error at {location}: {cause}")
            },
            Self::LlmUnavailable(msg) => write!(f, "llm worker unavailable: {msg}"),
            Self::LlmTimeout { timeout_secs } => {
                write!(f, "llm worker timed out after {timeout_secs}s")
            },
            Self::ContentTooShort { words, min_words } => {
                write!(f, "content too short: {words} words (minimum {min_words})")
            },
            Self::ContentTooLong { words, max_words } => {
                write!(f, "content too long: {words} words (maximum {max_words})")
            },
            Self::PublisherRejected { platform, cause } => {
                write!(f, "publisher '{platform}' rejected delivery: {cause}")
            },
            Self::StateCorrupt { path, cause } => {
                write!(f, "state corrupt at {path}: {cause}")
            },
            Self::OperationFailed { operation, cause } => {
                write!(f, "operation '{operation}' failed: {cause}")
            },
        }
    }
}

impl StdError for Error {}

/// Result type alias for distill operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error may succeed on retry (band-2 in the error
    /// taxonomy): timeouts and transient transport failures.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LlmTimeout { .. } => true,
            Self::LlmUnavailable(cause)
            | Self::OperationFailed { cause, .. }
            | Self::PublisherRejected { cause, .. } => {
                let lower = cause.to_lowercase();
                lower.contains("timeout")
                    || lower.contains("timed out")
                    || lower.contains("connect")
                    || lower.contains("connection")
                    || lower.contains("network")
                    || lower.contains("empty output")
                    || lower.contains("429")
                    || lower.contains("rate limit")
                    || lower.contains("503")
                    || lower.contains("overloaded")
            },
            _ => false,
        }
    }

    /// Whether the error aborts the whole pipeline run (band-4).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::StateCorrupt { .. })
    }
}

/// Returns the current Unix timestamp in seconds.
#[must_use]
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("bad date".to_string());
        assert_eq!(err.to_string(), "invalid input: bad date");

        let err = Error::LlmTimeout { timeout_secs: 120 };
        assert_eq!(err.to_string(), "llm worker timed out after 120s");

        let err = Error::SourceUnavailable {
            source: "chat-log".to_string(),
            cause: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "source 'chat-log' unavailable: permission denied"
        );
    }

    #[test]
    fn test_timeout_is_retryable() {
        assert!(Error::LlmTimeout { timeout_secs: 5 }.is_retryable());
    }

    #[test]
    fn test_transient_causes_are_retryable() {
        for cause in [
            "connection refused",
            "request timed out",
            "API returned 429 rate limit",
            "empty output from worker",
        ] {
            let err = Error::LlmUnavailable(cause.to_string());
            assert!(err.is_retryable(), "should be retryable: {cause}");
        }
    }

    #[test]
    fn test_parse_errors_are_not_retryable() {
        let err = Error::Parse {
            location: "sessions/a.jsonl:3".to_string(),
            cause: "unexpected end of input".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_only_state_corruption_is_fatal() {
        let corrupt = Error::StateCorrupt {
            path: ".blog-state".to_string(),
            cause: "truncated".to_string(),
        };
        assert!(corrupt.is_fatal());
        assert!(!Error::InvalidInput("x".to_string()).is_fatal());
        assert!(!Error::LlmTimeout { timeout_secs: 1 }.is_fatal());
    }

    #[test]
    fn test_current_timestamp_is_nonzero() {
        assert!(current_timestamp() > 1_600_000_000);
    }
}

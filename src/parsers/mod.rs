//! Source parsers.
//!
//! Each parser implements [`SourceParser`]: discover locations under a
//! root, then parse each location into raw records. Parsers never touch
//! the store; partial reads cannot corrupt persisted state.
//!
//! Failure semantics: a malformed record is skipped with one diagnostic;
//! a malformed file is skipped with one diagnostic; an unreadable source
//! root surfaces [`crate::Error::SourceUnavailable`], fatal for that
//! source only.

mod browser;
mod chat_log;
mod feed;
mod multi_agent;
mod newsletter;
mod rollout;

pub use browser::BrowserParser;
pub use chat_log::ChatLogParser;
pub use feed::FeedParser;
pub use multi_agent::MultiAgentParser;
pub use newsletter::NewsletterParser;
pub use rollout::RolloutParser;

use crate::models::{ContentItem, ContentSource, Session};
use crate::Result;
use std::path::{Path, PathBuf};

/// A soft, per-record parse problem. The record was dropped and the
/// pipeline continued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    /// Where the problem was observed (`file` or `file:line`).
    pub location: String,
    /// What went wrong.
    pub message: String,
}

impl ParseDiagnostic {
    /// Creates a diagnostic.
    #[must_use]
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Output of parsing one location.
#[derive(Debug, Default)]
pub struct ParseOutput {
    /// Parsed coding sessions.
    pub sessions: Vec<Session>,
    /// Parsed content items (external feeds).
    pub items: Vec<ContentItem>,
    /// Soft diagnostics accumulated along the way.
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParseOutput {
    /// Merges another output into this one.
    pub fn extend(&mut self, other: Self) {
        self.sessions.extend(other.sessions);
        self.items.extend(other.items);
        self.diagnostics.extend(other.diagnostics);
    }
}

/// Capability set every source parser provides.
pub trait SourceParser: Send + Sync {
    /// The source this parser reads.
    fn source(&self) -> ContentSource;

    /// Finds parseable locations under a root.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SourceUnavailable`] when the root itself
    /// cannot be read.
    fn discover(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Parses one discovered location.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that invalidate the whole
    /// location; per-record problems become diagnostics instead.
    fn parse(&self, location: &Path) -> Result<ParseOutput>;
}

/// Well-known dot-directory for each session source under a scan root.
#[must_use]
pub fn source_directory(source: ContentSource) -> Option<&'static str> {
    match source {
        ContentSource::ChatLog => Some(".claude"),
        ContentSource::Rollout => Some(".codex"),
        ContentSource::MultiAgent => Some(".vermas"),
        _ => None,
    }
}

/// Finds root directories for the requested session sources under
/// `scan_root`, optionally also under the user's home directory.
#[must_use]
pub fn discover_source_roots(
    scan_root: &Path,
    sources: &[ContentSource],
    include_global: bool,
) -> Vec<(ContentSource, PathBuf)> {
    let mut roots = Vec::new();
    let mut scan_dirs = vec![scan_root.to_path_buf()];
    if include_global {
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            if home != scan_root {
                scan_dirs.push(home);
            }
        }
    }

    for dir in scan_dirs {
        for &source in sources {
            let Some(name) = source_directory(source) else {
                continue;
            };
            let candidate = dir.join(name);
            if candidate.is_dir() && !roots.iter().any(|(s, p)| *s == source && *p == candidate) {
                roots.push((source, candidate));
            }
        }
    }

    roots
}

/// Whether a file was modified within the last `since_days` days.
/// Files with unreadable metadata pass the filter.
#[must_use]
pub fn modified_within(path: &Path, since_days: u32) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return true;
    };
    let Ok(modified) = metadata.modified() else {
        return true;
    };
    let Ok(age) = std::time::SystemTime::now().duration_since(modified) else {
        return true;
    };
    age.as_secs() <= u64::from(since_days) * 86_400
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_directories() {
        assert_eq!(source_directory(ContentSource::ChatLog), Some(".claude"));
        assert_eq!(source_directory(ContentSource::Rollout), Some(".codex"));
        assert_eq!(source_directory(ContentSource::MultiAgent), Some(".vermas"));
        assert_eq!(source_directory(ContentSource::Rss), None);
    }

    #[test]
    fn test_discover_source_roots() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".claude")).unwrap();
        std::fs::create_dir(dir.path().join(".vermas")).unwrap();

        let roots = discover_source_roots(
            dir.path(),
            &[
                ContentSource::ChatLog,
                ContentSource::Rollout,
                ContentSource::MultiAgent,
            ],
            false,
        );

        let sources: Vec<ContentSource> = roots.iter().map(|(s, _)| *s).collect();
        assert_eq!(sources, vec![ContentSource::ChatLog, ContentSource::MultiAgent]);
    }

    #[test]
    fn test_modified_within_recent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.jsonl");
        std::fs::write(&path, "{}").unwrap();
        assert!(modified_within(&path, 7));
    }
}

//! Browser-history parser.
//!
//! Reads a Chromium-style history database (the `urls` table) with
//! rusqlite. The live database is usually locked by the browser, so the
//! configured path should point at a snapshot copy; the parser opens the
//! file read-only and never writes.

use super::{ParseDiagnostic, ParseOutput, SourceParser};
use crate::ingest::derive_id;
use crate::models::{ContentItem, ContentKind, ContentSource};
use crate::{Error, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Microseconds between 1601-01-01 (the history epoch) and 1970-01-01.
const EPOCH_OFFSET_MICROS: i64 = 11_644_473_600_000_000;

/// Parser for browser history databases.
#[derive(Debug, Clone)]
pub struct BrowserParser {
    history_paths: Vec<PathBuf>,
    since_days: i64,
}

impl BrowserParser {
    /// Creates a parser over the configured history snapshots.
    #[must_use]
    pub fn new(history_paths: Vec<PathBuf>, since_days: i64) -> Self {
        Self {
            history_paths,
            since_days,
        }
    }

    /// Converts a history timestamp (microseconds since 1601) to UTC.
    fn history_time_to_utc(micros: i64) -> Option<DateTime<Utc>> {
        let unix_micros = micros.checked_sub(EPOCH_OFFSET_MICROS)?;
        Utc.timestamp_micros(unix_micros).single()
    }

    fn parse_database(&self, path: &Path, output: &mut ParseOutput) -> Result<()> {
        let conn = rusqlite::Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .map_err(|e| Error::SourceUnavailable {
            source: "browser".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let cutoff_micros = (Utc::now() - Duration::days(self.since_days))
            .timestamp_micros()
            .saturating_add(EPOCH_OFFSET_MICROS);

        let mut statement = conn
            .prepare(
                "SELECT url, title, last_visit_time, visit_count
                 FROM urls
                 WHERE last_visit_time >= ?1 AND hidden = 0
                 ORDER BY last_visit_time DESC",
            )
            .map_err(|e| Error::SourceUnavailable {
                source: "browser".to_string(),
                cause: format!("unexpected schema in {}: {e}", path.display()),
            })?;

        let rows = statement
            .query_map([cutoff_micros], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(|e| Error::SourceUnavailable {
                source: "browser".to_string(),
                cause: e.to_string(),
            })?;

        for row in rows {
            let (url, title, visit_time, visit_count) = match row {
                Ok(row) => row,
                Err(e) => {
                    output
                        .diagnostics
                        .push(ParseDiagnostic::new(path.display().to_string(), e.to_string()));
                    continue;
                },
            };
            // Skip non-content schemes
            if !url.starts_with("http://") && !url.starts_with("https://") {
                continue;
            }
            let visited_at = Self::history_time_to_utc(visit_time);
            let title = title.filter(|t| !t.is_empty()).unwrap_or_else(|| url.clone());

            let mut metadata = BTreeMap::new();
            metadata.insert("visit_count".to_string(), serde_json::Value::from(visit_count));

            output.items.push(ContentItem {
                id: derive_id(ContentSource::Browser, None, Some(&url), &title, None, ""),
                source: ContentSource::Browser,
                kind: ContentKind::Article,
                title,
                body: String::new(),
                excerpt: String::new(),
                url: Some(url),
                author: None,
                site_name: None,
                published_at: visited_at,
                ingested_at: Utc::now(),
                tags: Default::default(),
                topics: Default::default(),
                project: None,
                metadata,
            });
        }
        Ok(())
    }
}

impl SourceParser for BrowserParser {
    fn source(&self) -> ContentSource {
        ContentSource::Browser
    }

    fn discover(&self, _root: &Path) -> Result<Vec<PathBuf>> {
        Ok(self
            .history_paths
            .iter()
            .filter(|path| path.is_file())
            .cloned()
            .collect())
    }

    fn parse(&self, location: &Path) -> Result<ParseOutput> {
        let mut output = ParseOutput::default();
        self.parse_database(location, &mut output)?;
        Ok(output)
    }
}

//! Newsletter archive parser.
//!
//! Reads CSV archive exports with tolerant header mapping: common
//! aliases for subject, sender, date, and body columns are recognized.
//! Rows missing a subject are skipped with a diagnostic.

use super::{ParseDiagnostic, ParseOutput, SourceParser};
use crate::ingest::derive_id;
use crate::models::{ContentItem, ContentKind, ContentSource};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Parser for newsletter CSV exports.
#[derive(Debug, Clone)]
pub struct NewsletterParser {
    exports: Vec<PathBuf>,
}

impl NewsletterParser {
    /// Creates a parser over the configured export files.
    #[must_use]
    pub fn new(exports: Vec<PathBuf>) -> Self {
        Self { exports }
    }
}

/// Column indices resolved from the header row.
#[derive(Debug, Default)]
struct ColumnMap {
    subject: Option<usize>,
    author: Option<usize>,
    date: Option<usize>,
    body: Option<usize>,
    url: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut map = Self::default();
        for (i, header) in headers.iter().enumerate() {
            match header.to_lowercase().trim() {
                "subject" | "title" => map.subject = Some(i),
                "from" | "sender" | "author" => map.author = Some(i),
                "date" | "sent_at" | "published_at" => map.date = Some(i),
                "body" | "content" | "html" | "text" => map.body = Some(i),
                "url" | "link" | "web_url" => map.url = Some(i),
                _ => {},
            }
        }
        map
    }

    fn field<'a>(&self, record: &'a csv::StringRecord, index: Option<usize>) -> &'a str {
        index.and_then(|i| record.get(i)).unwrap_or("")
    }
}

impl SourceParser for NewsletterParser {
    fn source(&self) -> ContentSource {
        ContentSource::Newsletter
    }

    fn discover(&self, _root: &Path) -> Result<Vec<PathBuf>> {
        Ok(self
            .exports
            .iter()
            .filter(|path| path.is_file())
            .cloned()
            .collect())
    }

    fn parse(&self, location: &Path) -> Result<ParseOutput> {
        let mut output = ParseOutput::default();

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(location)
            .map_err(|e| Error::SourceUnavailable {
                source: "newsletter".to_string(),
                cause: format!("{}: {e}", location.display()),
            })?;

        let headers = reader.headers().map_err(|e| Error::Parse {
            location: location.display().to_string(),
            cause: e.to_string(),
        })?;
        let columns = ColumnMap::from_headers(headers);
        if columns.subject.is_none() {
            return Err(Error::Parse {
                location: location.display().to_string(),
                cause: "no subject/title column in export".to_string(),
            });
        }

        for (row_no, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    output.diagnostics.push(ParseDiagnostic::new(
                        format!("{}:{}", location.display(), row_no + 2),
                        e.to_string(),
                    ));
                    continue;
                },
            };

            let subject = columns.field(&record, columns.subject).trim().to_string();
            if subject.is_empty() {
                output.diagnostics.push(ParseDiagnostic::new(
                    format!("{}:{}", location.display(), row_no + 2),
                    "row has empty subject",
                ));
                continue;
            }

            let body = columns.field(&record, columns.body).trim().to_string();
            let author = columns.field(&record, columns.author).trim().to_string();
            let url = columns.field(&record, columns.url).trim().to_string();
            let published_at = parse_date(columns.field(&record, columns.date).trim());

            let excerpt: String = body.chars().take(300).collect();
            output.items.push(ContentItem {
                id: derive_id(
                    ContentSource::Newsletter,
                    None,
                    (!url.is_empty()).then_some(url.as_str()),
                    &subject,
                    published_at.map(|ts| ts.date_naive()),
                    &body,
                ),
                source: ContentSource::Newsletter,
                kind: ContentKind::Email,
                title: subject,
                body,
                excerpt,
                url: (!url.is_empty()).then_some(url),
                author: (!author.is_empty()).then_some(author),
                site_name: None,
                published_at,
                ingested_at: Utc::now(),
                tags: Default::default(),
                topics: Default::default(),
                project: None,
                metadata: BTreeMap::new(),
            });
        }

        Ok(output)
    }
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_rfc2822(text))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}

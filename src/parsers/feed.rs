//! RSS 2.0 / Atom feed parser.
//!
//! Feeds come from HTTP URLs or local files. Extraction is a minimal
//! hand parser over the handful of tags this pipeline needs (title,
//! link, description, publication date, author); it tolerates unknown
//! tags and malformed entries by skipping them. Items from multiple
//! feeds that resolve to the same canonical URL deduplicate down to the
//! version with the longer body.

use super::{ParseDiagnostic, ParseOutput, SourceParser};
use crate::ingest::{derive_id, normalize_url};
use crate::models::{ContentItem, ContentKind, ContentSource};
use crate::Result;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Parser for RSS and Atom feeds.
#[derive(Debug, Clone)]
pub struct FeedParser {
    feeds: Vec<String>,
    fetch_timeout: Duration,
    max_age_days: i64,
}

impl FeedParser {
    /// Creates a parser over the configured feed URLs.
    #[must_use]
    pub fn new(feeds: Vec<String>) -> Self {
        Self {
            feeds,
            fetch_timeout: Duration::from_secs(20),
            max_age_days: 7,
        }
    }

    /// Sets the per-feed fetch timeout.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Sets the recency window for feed entries.
    #[must_use]
    pub const fn with_max_age_days(mut self, days: i64) -> Self {
        self.max_age_days = days;
        self
    }

    /// Fetches and parses all configured feeds, with cross-feed URL
    /// dedup. A feed that fails to fetch contributes one diagnostic and
    /// the rest continue.
    #[must_use]
    pub fn parse_all(&self) -> ParseOutput {
        let mut output = ParseOutput::default();
        let cutoff = Utc::now() - chrono::Duration::days(self.max_age_days);

        for feed_url in &self.feeds {
            let content = if feed_url.starts_with("http://") || feed_url.starts_with("https://") {
                fetch_feed(feed_url, self.fetch_timeout)
            } else {
                std::fs::read_to_string(feed_url).map_err(|e| e.to_string())
            };
            match content {
                Ok(xml) => {
                    let items = extract_items(&xml, feed_url, cutoff, &mut output.diagnostics);
                    tracing::debug!(feed = %feed_url, items = items.len(), "Parsed feed");
                    output.items.extend(items);
                },
                Err(e) => {
                    output
                        .diagnostics
                        .push(ParseDiagnostic::new(feed_url.clone(), e));
                },
            }
        }

        output.items = dedup_by_url(std::mem::take(&mut output.items));
        output
    }
}

impl SourceParser for FeedParser {
    fn source(&self) -> ContentSource {
        ContentSource::Rss
    }

    fn discover(&self, _root: &Path) -> Result<Vec<PathBuf>> {
        // Feeds are URL-configured; discovery yields one synthetic
        // location so the orchestrator drives feeds like any source.
        Ok(vec![PathBuf::from("feeds")])
    }

    fn parse(&self, _location: &Path) -> Result<ParseOutput> {
        Ok(self.parse_all())
    }
}

fn fetch_feed(url: &str, timeout: Duration) -> std::result::Result<String, String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent("distill-feed-reader")
        .build()
        .map_err(|e| e.to_string())?;
    let response = client.get(url).send().map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("feed returned status {}", response.status()));
    }
    response.text().map_err(|e| e.to_string())
}

/// Extracts items from RSS `<item>` or Atom `<entry>` blocks.
fn extract_items(
    xml: &str,
    feed_url: &str,
    cutoff: DateTime<Utc>,
    diagnostics: &mut Vec<ParseDiagnostic>,
) -> Vec<ContentItem> {
    let site_name = tag_text(xml, "title").map(|t| clean_text(&t));
    let mut items = Vec::new();

    let blocks: Vec<&str> = blocks_of(xml, "item").chain(blocks_of(xml, "entry")).collect();
    for block in blocks {
        match extract_item(block, feed_url, site_name.as_deref()) {
            Some(item) => {
                if item.published_at.is_none_or(|ts| ts >= cutoff) {
                    items.push(item);
                }
            },
            None => diagnostics.push(ParseDiagnostic::new(
                feed_url.to_string(),
                "feed entry missing both title and link",
            )),
        }
    }
    items
}

fn extract_item(block: &str, feed_url: &str, site_name: Option<&str>) -> Option<ContentItem> {
    let title = tag_text(block, "title").map(|t| clean_text(&t)).unwrap_or_default();

    // RSS: <link>url</link>; Atom: <link href="url"/>
    let url = tag_text(block, "link")
        .map(|t| clean_text(&t))
        .filter(|t| !t.is_empty())
        .or_else(|| link_href(block));

    if title.is_empty() && url.is_none() {
        return None;
    }

    let body = tag_text(block, "content:encoded")
        .or_else(|| tag_text(block, "content"))
        .or_else(|| tag_text(block, "description"))
        .or_else(|| tag_text(block, "summary"))
        .map(|t| clean_text(&t))
        .unwrap_or_default();

    let published_at = tag_text(block, "pubDate")
        .or_else(|| tag_text(block, "published"))
        .or_else(|| tag_text(block, "updated"))
        .and_then(|t| parse_feed_date(t.trim()));

    let author = tag_text(block, "author")
        .map(|raw| {
            // Atom nests <name> inside <author>
            tag_text(&raw, "name").unwrap_or(raw)
        })
        .or_else(|| tag_text(block, "dc:creator"))
        .map(|t| clean_text(&t))
        .filter(|t| !t.is_empty());

    let excerpt: String = body.chars().take(300).collect();
    let mut metadata = BTreeMap::new();
    metadata.insert(
        "feed_url".to_string(),
        serde_json::Value::String(feed_url.to_string()),
    );

    Some(ContentItem {
        id: derive_id(
            ContentSource::Rss,
            None,
            url.as_deref(),
            &title,
            published_at.map(|ts| ts.date_naive()),
            &body,
        ),
        source: ContentSource::Rss,
        kind: ContentKind::Article,
        title,
        body,
        excerpt,
        url,
        author,
        site_name: site_name.map(String::from),
        published_at,
        ingested_at: Utc::now(),
        tags: Default::default(),
        topics: Default::default(),
        project: None,
        metadata,
    })
}

/// Iterates the inner text of every `<tag>...</tag>` block.
fn blocks_of<'a>(xml: &'a str, tag: &'a str) -> impl Iterator<Item = &'a str> {
    let open = format!("<{tag}>");
    let open_attr = format!("<{tag} ");
    let close = format!("</{tag}>");
    let mut rest = xml;
    std::iter::from_fn(move || {
        loop {
            let start = match (rest.find(&open), rest.find(&open_attr)) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => return None,
            };
            let after_open = rest[start..].find('>').map(|i| start + i + 1)?;
            let Some(end) = rest[after_open..].find(&close) else {
                rest = "";
                return None;
            };
            let block = &rest[after_open..after_open + end];
            rest = &rest[after_open + end + close.len()..];
            if !block.trim().is_empty() {
                return Some(block);
            }
        }
    })
}

/// Inner text of the first `<tag>...</tag>` occurrence, CDATA unwrapped.
fn tag_text(xml: &str, tag: &str) -> Option<String> {
    let close = format!("</{tag}>");
    let open_plain = format!("<{tag}>");
    let open_attr = format!("<{tag} ");

    let start = match (xml.find(&open_plain), xml.find(&open_attr)) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    let content_start = xml[start..].find('>').map(|i| start + i + 1)?;
    let content_end = xml[content_start..].find(&close).map(|i| content_start + i)?;
    let inner = &xml[content_start..content_end];

    let inner = inner
        .trim()
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .unwrap_or(inner);
    Some(inner.trim().to_string())
}

/// `<link href="..."/>` for Atom entries.
fn link_href(block: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r#"<link[^>]*href\s*=\s*"([^"]+)""#).expect("link pattern is valid")
    });
    re.captures(block).map(|c| c[1].to_string())
}

/// Strips HTML tags and decodes the common entities.
fn clean_text(text: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let re = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));
    let stripped = re.replace_all(text, " ");
    stripped
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Feed dates come as RFC 2822 (RSS) or RFC 3339 (Atom).
fn parse_feed_date(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(text)
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Cross-feed dedup by normalized URL, keeping the longer body.
fn dedup_by_url(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut by_url: BTreeMap<String, ContentItem> = BTreeMap::new();
    let mut no_url = Vec::new();

    for item in items {
        match &item.url {
            Some(url) => {
                let key = normalize_url(url);
                match by_url.get(&key) {
                    Some(existing) if existing.body.len() >= item.body.len() => {},
                    _ => {
                        by_url.insert(key, item);
                    },
                }
            },
            None => no_url.push(item),
        }
    }

    let mut result: Vec<ContentItem> = by_url.into_values().collect();
    result.extend(no_url);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
<title>Example Blog</title>
<item>
  <title>On Parsers &amp; Pipelines</title>
  <link>https://example.com/parsers</link>
  <description><![CDATA[<p>Parsing is <b>fun</b>.</p>]]></description>
  <pubDate>Sun, 08 Feb 2026 10:00:00 GMT</pubDate>
  <dc:creator>Ada</dc:creator>
</item>
<item>
  <title>Old Post</title>
  <link>https://example.com/old</link>
  <pubDate>Tue, 01 Jan 2019 10:00:00 GMT</pubDate>
</item>
</channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
<title>Atom Feed</title>
<entry>
  <title>Streams of Events</title>
  <link href="https://example.com/streams"/>
  <summary>Event streams explained.</summary>
  <published>2026-02-08T08:00:00Z</published>
  <author><name>Grace</name></author>
</entry>
</feed>"#;

    fn parse_str(xml: &str) -> Vec<ContentItem> {
        let cutoff = Utc::now() - chrono::Duration::days(365 * 20);
        let mut diagnostics = Vec::new();
        extract_items(xml, "test-feed", cutoff, &mut diagnostics)
    }

    #[test]
    fn test_parse_rss_item() {
        let items = parse_str(RSS);
        let item = items
            .iter()
            .find(|i| i.url.as_deref() == Some("https://example.com/parsers"))
            .unwrap();
        assert_eq!(item.title, "On Parsers & Pipelines");
        assert_eq!(item.body, "Parsing is fun .");
        assert_eq!(item.author.as_deref(), Some("Ada"));
        assert_eq!(item.site_name.as_deref(), Some("Example Blog"));
        assert!(item.published_at.is_some());
    }

    #[test]
    fn test_parse_atom_entry() {
        let items = parse_str(ATOM);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url.as_deref(), Some("https://example.com/streams"));
        assert_eq!(items[0].author.as_deref(), Some("Grace"));
        assert_eq!(items[0].body, "Event streams explained.");
    }

    #[test]
    fn test_recency_filter() {
        let cutoff = Utc::now() - chrono::Duration::days(7);
        let mut diagnostics = Vec::new();
        let items = extract_items(RSS, "test", cutoff, &mut diagnostics);
        assert!(items.iter().all(|i| i.title != "Old Post"));
    }

    #[test]
    fn test_same_article_from_two_feeds_dedupes() {
        let a = parse_str(RSS).into_iter().find(|i| i.title.contains("Parsers")).unwrap();
        let mut b = a.clone();
        b.url = Some("https://example.com/parsers?utm_source=other".to_string());
        b.body = String::new();

        let deduped = dedup_by_url(vec![a, b]);
        assert_eq!(deduped.len(), 1);
        // longer body wins
        assert!(!deduped[0].body.is_empty());
    }

    #[test]
    fn test_id_stable_across_parses() {
        let first = parse_str(RSS);
        let second = parse_str(RSS);
        assert_eq!(first[0].id, second[0].id);
    }

    #[test]
    fn test_clean_text_entities() {
        assert_eq!(clean_text("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(clean_text("<p>spaced   <i>out</i></p>"), "spaced out");
    }
}

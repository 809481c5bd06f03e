//! Reading persisted journal entries back from disk.
//!
//! The blog stage consumes journals across a window; this reader parses
//! the front-matter convention the formatter writes. Files that do not
//! parse are skipped with a warning rather than failing the stage.

use super::Store;
use crate::models::{JournalEntry, JournalStyle};
use crate::Result;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeSet;

impl Store {
    /// Loads every journal entry under `journal/`, sorted by date.
    ///
    /// # Errors
    ///
    /// Returns an error when the journal directory itself is unreadable.
    pub fn load_journal_entries(&self) -> Result<Vec<JournalEntry>> {
        let dir = self.root().join("journal");
        let entries = std::fs::read_dir(&dir).map_err(|e| crate::Error::OperationFailed {
            operation: "read_journal_dir".to_string(),
            cause: format!("{}: {e}", dir.display()),
        })?;

        let mut journals = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "md") {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(contents) => match parse_journal_file(&contents) {
                    Some(journal) => journals.push(journal),
                    None => {
                        tracing::warn!(path = %path.display(), "Unparseable journal file, skipping");
                    },
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Unreadable journal file, skipping");
                },
            }
        }
        journals.sort_by_key(|j| j.date);
        Ok(journals)
    }
}

fn parse_journal_file(contents: &str) -> Option<JournalEntry> {
    let rest = contents.strip_prefix("---\n")?;
    let (header, body) = rest.split_once("\n---\n")?;

    let mut date: Option<NaiveDate> = None;
    let mut style = JournalStyle::DevJournal;
    let mut word_count = 0usize;
    let mut sessions_count = 0usize;
    let mut duration_minutes = 0u64;
    let mut projects: Vec<String> = Vec::new();
    let mut tags: BTreeSet<String> = BTreeSet::new();

    for line in header.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "date" => date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
            "style" => style = value.parse().unwrap_or(JournalStyle::DevJournal),
            "word_count" => word_count = value.parse().unwrap_or(0),
            "sessions_count" => sessions_count = value.parse().unwrap_or(0),
            "duration_minutes" => duration_minutes = value.parse().unwrap_or(0),
            "projects" => projects = parse_list(value),
            "tags" => tags = parse_list(value).into_iter().collect(),
            _ => {},
        }
    }

    Some(JournalEntry {
        date: date?,
        style,
        word_count,
        projects,
        sessions_count,
        duration_minutes,
        tags,
        body_markdown: body.trim_start_matches('\n').to_string(),
        source_session_ids: Vec::new(),
        generated_at: Utc::now(),
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::formatter::format_entry;

    #[test]
    fn test_roundtrip_through_formatter() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let entry = JournalEntry {
            date: NaiveDate::from_ymd_opt(2026, 2, 8).unwrap(),
            style: JournalStyle::DevJournal,
            word_count: 3,
            projects: vec!["alpha".to_string(), "beta".to_string()],
            sessions_count: 2,
            duration_minutes: 75,
            tags: BTreeSet::from(["ai-session".to_string(), "testing".to_string()]),
            body_markdown: "# A Day\n\nGood work today.".to_string(),
            source_session_ids: vec![],
            generated_at: Utc::now(),
        };
        let path = store.journal_path(entry.date, entry.style.as_str());
        store.atomic_write(&path, &format_entry(&entry)).unwrap();

        let loaded = store.load_journal_entries().unwrap();
        assert_eq!(loaded.len(), 1);
        let journal = &loaded[0];
        assert_eq!(journal.date, entry.date);
        assert_eq!(journal.sessions_count, 2);
        assert_eq!(journal.duration_minutes, 75);
        assert_eq!(journal.projects, entry.projects);
        assert_eq!(journal.tags, entry.tags);
        assert_eq!(journal.body_markdown, entry.body_markdown);
    }

    #[test]
    fn test_unparseable_file_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("journal").join("junk.md"), "no frontmatter").unwrap();
        assert!(store.load_journal_entries().unwrap().is_empty());
    }

    #[test]
    fn test_non_markdown_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("journal").join(".journal-state"), "{}").unwrap();
        assert!(store.load_journal_entries().unwrap().is_empty());
    }
}

//! Durable state ownership.
//!
//! The [`Store`] exclusively owns everything under the output directory.
//! Parsers, the analyzer, and the synthesizers are stateless with respect
//! to persistence: they receive inputs, return outputs, and the
//! orchestrator commits through the store.
//!
//! All writes go through [`Store::atomic_write`]: the content lands in a
//! temporary file in the same directory, is fsynced, and is renamed over
//! the target. Readers observe either the old or the new state, never a
//! torn write.

mod blog_files;
mod blog_state;
mod editorial;
mod journal_files;
mod ledger;
mod memory;

pub use blog_state::{BlogMemory, BlogPostRecord, BlogPostSummary, BlogState};
pub use editorial::{NoteStore, SeedStore};
pub use ledger::{JournalLedger, JournalRecord};

use crate::models::ContentItem;
use crate::{Error, Result};
use chrono::NaiveDate;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Filename of the unified memory record.
pub const MEMORY_FILENAME: &str = ".distill-memory";
/// Filename of the blog state ledger.
pub const BLOG_STATE_FILENAME: &str = ".blog-state";
/// Filename of the blog memory record.
pub const BLOG_MEMORY_FILENAME: &str = ".blog-memory";
/// Filename of the journal ledger.
pub const JOURNAL_LEDGER_FILENAME: &str = ".journal-state";
/// Filename of the seed store.
pub const SEEDS_FILENAME: &str = ".distill-seeds";
/// Filename of the editorial note store.
pub const NOTES_FILENAME: &str = ".distill-notes";
/// Filename of the last run report.
pub const REPORT_FILENAME: &str = ".distill-last-run";
/// Scratch directory for uncommitted stage output.
const SCRATCH_DIR: &str = ".scratch";

/// Owner of all on-disk pipeline state.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Opens a store rooted at `root`, creating the directory tree and
    /// removing any orphan scratch files left by a crashed run.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory tree cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [
            root.clone(),
            root.join("journal"),
            root.join("blog"),
            root.join("intake"),
            root.join("intake").join("archive"),
        ] {
            fs::create_dir_all(&dir).map_err(|e| Error::OperationFailed {
                operation: "create_store_dirs".to_string(),
                cause: format!("{}: {e}", dir.display()),
            })?;
        }
        let store = Self { root };
        store.recover()?;
        Ok(store)
    }

    /// The store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a journal entry file for `(date, style)`.
    #[must_use]
    pub fn journal_path(&self, date: NaiveDate, style: &str) -> PathBuf {
        self.root
            .join("journal")
            .join(format!("journal-{date}-{style}.md"))
    }

    /// Path of a rendered blog post for a platform.
    #[must_use]
    pub fn blog_path(&self, platform: &str, slug: &str) -> PathBuf {
        self.root.join("blog").join(platform).join(format!("{slug}.md"))
    }

    /// Path of the daily intake digest.
    #[must_use]
    pub fn digest_path(&self, date: NaiveDate) -> PathBuf {
        self.root.join("intake").join(format!("digest-{date}.md"))
    }

    /// Removes orphan scratch files from a previous crashed run. A crash
    /// between result-write and state-update leaves its output here; the
    /// stage reruns cleanly afterwards.
    fn recover(&self) -> Result<()> {
        let scratch = self.root.join(SCRATCH_DIR);
        if !scratch.exists() {
            return Ok(());
        }
        let entries = fs::read_dir(&scratch).map_err(|e| Error::OperationFailed {
            operation: "recover_scratch".to_string(),
            cause: e.to_string(),
        })?;
        let mut removed = 0u64;
        for entry in entries.flatten() {
            if fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::warn!(removed, "Removed orphan scratch files from a previous run");
        }
        Ok(())
    }

    /// Writes a stage result to the scratch area, returning its path.
    /// The caller commits it with [`Store::promote_scratch`] after the
    /// corresponding state record is persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the scratch file cannot be written.
    pub fn write_scratch(&self, name: &str, content: &str) -> Result<PathBuf> {
        let scratch = self.root.join(SCRATCH_DIR);
        fs::create_dir_all(&scratch).map_err(|e| Error::OperationFailed {
            operation: "create_scratch_dir".to_string(),
            cause: e.to_string(),
        })?;
        let path = scratch.join(name);
        self.atomic_write(&path, content)?;
        Ok(path)
    }

    /// Moves a scratch file into its final location.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    pub fn promote_scratch(&self, scratch_path: &Path, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "promote_scratch".to_string(),
                cause: e.to_string(),
            })?;
        }
        fs::rename(scratch_path, target).map_err(|e| Error::OperationFailed {
            operation: "promote_scratch".to_string(),
            cause: format!("{} -> {}: {e}", scratch_path.display(), target.display()),
        })
    }

    /// Atomically writes `content` to `path`: temp file in the target
    /// directory, fsync, rename.
    ///
    /// # Errors
    ///
    /// Returns an error if any filesystem operation fails; on failure the
    /// previous content of `path` is untouched.
    pub fn atomic_write(&self, path: &Path, content: &str) -> Result<()> {
        let parent = path.parent().ok_or_else(|| Error::InvalidInput(format!(
            "path has no parent: {}",
            path.display()
        )))?;
        fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "atomic_write".to_string(),
            cause: e.to_string(),
        })?;

        let tmp = parent.join(format!(
            ".tmp-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));
        let result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(Error::OperationFailed {
                operation: "atomic_write".to_string(),
                cause: format!("{}: {e}", path.display()),
            });
        }
        Ok(())
    }

    /// Archives the raw items ingested on `date` to
    /// `intake/archive/<date>.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn archive_items(&self, date: NaiveDate, items: &[ContentItem]) -> Result<()> {
        let path = self.root.join("intake").join("archive").join(format!("{date}.json"));
        let json = serde_json::to_string_pretty(items).map_err(|e| Error::OperationFailed {
            operation: "serialize_archive".to_string(),
            cause: e.to_string(),
        })?;
        self.atomic_write(&path, &json)
    }

    /// Loads the archived items for `date`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateCorrupt`] if the archive exists but cannot
    /// be parsed.
    pub fn load_archive(&self, date: NaiveDate) -> Result<Vec<ContentItem>> {
        let path = self.root.join("intake").join("archive").join(format!("{date}.json"));
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path).map_err(|e| Error::OperationFailed {
            operation: "read_archive".to_string(),
            cause: e.to_string(),
        })?;
        serde_json::from_str(&contents).map_err(|e| Error::StateCorrupt {
            path: path.display().to_string(),
            cause: e.to_string(),
        })
    }

    /// Reads a ledger-class JSON file. Missing file → `None`; unreadable
    /// content → [`Error::StateCorrupt`] (ledgers are authoritative for
    /// idempotence, a corrupt one must abort the run).
    pub(crate) fn read_ledger<T: serde::de::DeserializeOwned>(
        &self,
        path: &Path,
    ) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_state".to_string(),
            cause: e.to_string(),
        })?;
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| Error::StateCorrupt {
                path: path.display().to_string(),
                cause: e.to_string(),
            })
    }

    /// Reads a memory-class JSON file. Missing or corrupt content starts
    /// fresh with a warning; losing memory degrades prose continuity but
    /// must not block the pipeline.
    pub(crate) fn read_memory_class<T: serde::de::DeserializeOwned + Default>(
        &self,
        path: &Path,
    ) -> T {
        if !path.exists() {
            return T::default();
        }
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Corrupt memory file, starting fresh");
                    T::default()
                },
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable memory file, starting fresh");
                T::default()
            },
        }
    }

    /// Serializes a value as pretty JSON and writes it atomically.
    pub(crate) fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(|e| Error::OperationFailed {
            operation: "serialize_state".to_string(),
            cause: e.to_string(),
        })?;
        self.atomic_write(path, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let target = dir.path().join("note.md");
        store.atomic_write(&target, "hello world").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello world");
    }

    #[test]
    fn test_atomic_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let target = dir.path().join("note.md");
        store.atomic_write(&target, "old").unwrap();
        store.atomic_write(&target, "new").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let sub = dir.path().join("sub");
        store.atomic_write(&sub.join("note.md"), "content").unwrap();
        let names: Vec<String> = fs::read_dir(&sub)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["note.md"]);
    }

    #[test]
    fn test_open_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("out");
        let _store = Store::open(&root).unwrap();
        assert!(root.join("journal").is_dir());
        assert!(root.join("blog").is_dir());
        assert!(root.join("intake").join("archive").is_dir());
    }

    #[test]
    fn test_recover_removes_orphan_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join(SCRATCH_DIR);
        fs::create_dir_all(&scratch).unwrap();
        fs::write(scratch.join("orphan.md"), "leftover").unwrap();

        let _store = Store::open(dir.path()).unwrap();
        assert!(!scratch.join("orphan.md").exists());
    }

    #[test]
    fn test_scratch_promote() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let scratch = store.write_scratch("pending.md", "draft").unwrap();
        let target = dir.path().join("journal").join("final.md");
        store.promote_scratch(&scratch, &target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "draft");
        assert!(!scratch.exists());
    }

    #[test]
    fn test_journal_path_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 2, 8).unwrap();
        let path = store.journal_path(date, "dev-journal");
        assert!(path.ends_with("journal/journal-2026-02-08-dev-journal.md"));
    }

    #[test]
    fn test_archive_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 2, 8).unwrap();
        assert!(store.load_archive(date).unwrap().is_empty());
        store.archive_items(date, &[]).unwrap();
        assert!(store.load_archive(date).unwrap().is_empty());
    }
}

//! Unified memory persistence.

use super::{Store, MEMORY_FILENAME};
use crate::models::UnifiedMemory;
use crate::Result;

impl Store {
    /// Loads the unified memory, returning an empty memory when none has
    /// been persisted (or the file is unreadable; memory loss degrades
    /// continuity but never blocks a run).
    #[must_use]
    pub fn load_memory(&self) -> UnifiedMemory {
        self.read_memory_class(&self.root().join(MEMORY_FILENAME))
    }

    /// Atomically replaces the persisted unified memory. Never partial:
    /// a reader sees the previous memory or this one.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn commit_memory(&self, memory: &UnifiedMemory) -> Result<()> {
        self.write_json(&self.root().join(MEMORY_FILENAME), memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DailyEntry;
    use chrono::NaiveDate;

    #[test]
    fn test_load_empty_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let memory = store.load_memory();
        assert!(memory.daily_entries.is_empty());
        assert!(memory.threads.is_empty());
    }

    #[test]
    fn test_commit_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let mut memory = UnifiedMemory::default();
        memory.record_daily(DailyEntry {
            date: NaiveDate::from_ymd_opt(2026, 2, 8).unwrap(),
            session_ids: vec!["s1".to_string()],
            themes: vec!["parsers".to_string()],
            ..Default::default()
        });
        memory.update_threads(
            &[("parsers".to_string(), "normalizing dialects".to_string())],
            NaiveDate::from_ymd_opt(2026, 2, 8).unwrap(),
        );
        store.commit_memory(&memory).unwrap();

        let loaded = store.load_memory();
        assert_eq!(loaded.daily_entries.len(), 1);
        assert_eq!(loaded.threads["parsers"].summary, "normalizing dialects");
    }

    #[test]
    fn test_commit_of_loaded_memory_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let mut memory = UnifiedMemory::default();
        memory.update_threads(
            &[("x".to_string(), String::new())],
            NaiveDate::from_ymd_opt(2026, 2, 8).unwrap(),
        );
        store.commit_memory(&memory).unwrap();
        let first = std::fs::read_to_string(dir.path().join(MEMORY_FILENAME)).unwrap();

        let loaded = store.load_memory();
        store.commit_memory(&loaded).unwrap();
        let second = std::fs::read_to_string(dir.path().join(MEMORY_FILENAME)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_corrupt_memory_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        std::fs::write(dir.path().join(MEMORY_FILENAME), "{not json").unwrap();
        let memory = store.load_memory();
        assert!(memory.daily_entries.is_empty());
    }
}

//! Seed and editorial-note stores.

use super::{Store, NOTES_FILENAME, SEEDS_FILENAME};
use crate::models::{EditorialNote, Seed};
use crate::Result;
use std::path::PathBuf;

/// Store for user-supplied seed ideas.
pub struct SeedStore {
    store: Store,
    path: PathBuf,
    seeds: Vec<Seed>,
}

impl SeedStore {
    /// Opens the seed store under the given store root. Corrupt content
    /// starts fresh with a warning.
    #[must_use]
    pub fn open(store: &Store) -> Self {
        let path = store.root().join(SEEDS_FILENAME);
        let seeds = store.read_memory_class(&path);
        Self {
            store: store.clone(),
            path,
            seeds,
        }
    }

    /// Adds a new seed and persists.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn add(&mut self, text: &str, tags: Vec<String>) -> Result<Seed> {
        let seed = Seed::new(text, tags);
        self.seeds.push(seed.clone());
        self.save()?;
        Ok(seed)
    }

    /// All seeds, used and unused.
    #[must_use]
    pub fn list_all(&self) -> &[Seed] {
        &self.seeds
    }

    /// Unused seeds, in insertion order.
    #[must_use]
    pub fn list_unused(&self) -> Vec<&Seed> {
        self.seeds.iter().filter(|s| !s.used).collect()
    }

    /// Compare-and-set on the `used` flag: marks the seed consumed by
    /// `used_in` and returns true, or returns false when the seed is
    /// unknown or already used.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn mark_used(&mut self, seed_id: &str, used_in: &str) -> Result<bool> {
        let Some(seed) = self.seeds.iter_mut().find(|s| s.id == seed_id) else {
            return Ok(false);
        };
        if seed.used {
            return Ok(false);
        }
        seed.used = true;
        seed.used_in = Some(used_in.to_string());
        self.save()?;
        Ok(true)
    }

    fn save(&self) -> Result<()> {
        self.store.write_json(&self.path, &self.seeds)
    }
}

/// Store for editorial steering notes.
pub struct NoteStore {
    store: Store,
    path: PathBuf,
    notes: Vec<EditorialNote>,
}

impl NoteStore {
    /// Opens the note store under the given store root. Corrupt content
    /// starts fresh with a warning.
    #[must_use]
    pub fn open(store: &Store) -> Self {
        let path = store.root().join(NOTES_FILENAME);
        let notes = store.read_memory_class(&path);
        Self {
            store: store.clone(),
            path,
            notes,
        }
    }

    /// Adds a new note and persists.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn add(&mut self, text: &str, target: &str) -> Result<EditorialNote> {
        let note = EditorialNote::new(text, target);
        self.notes.push(note.clone());
        self.save()?;
        Ok(note)
    }

    /// All notes.
    #[must_use]
    pub fn list_all(&self) -> &[EditorialNote] {
        &self.notes
    }

    /// Unused notes whose target matches the given selector (global
    /// notes always match). Notes with a different target are left
    /// untouched.
    #[must_use]
    pub fn active_for(&self, target: &str) -> Vec<&EditorialNote> {
        self.notes
            .iter()
            .filter(|n| !n.used && n.matches(target))
            .collect()
    }

    /// Compare-and-set on the `used` flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn mark_used(&mut self, note_id: &str) -> Result<bool> {
        let Some(note) = self.notes.iter_mut().find(|n| n.id == note_id) else {
            return Ok(false);
        };
        if note.used {
            return Ok(false);
        }
        note.used = true;
        self.save()?;
        Ok(true)
    }

    fn save(&self) -> Result<()> {
        self.store.write_json(&self.path, &self.notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_add_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let mut seeds = SeedStore::open(&store);
        let seed = seeds.add("agents need friction", vec!["agents".to_string()]).unwrap();

        let reloaded = SeedStore::open(&store);
        assert_eq!(reloaded.list_unused().len(), 1);
        assert_eq!(reloaded.list_unused()[0].id, seed.id);
    }

    #[test]
    fn test_mark_used_is_compare_and_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let mut seeds = SeedStore::open(&store);
        let seed = seeds.add("one idea", vec![]).unwrap();

        assert!(seeds.mark_used(&seed.id, "journal-2026-02-08").unwrap());
        // Second attempt observes the set flag and fails
        assert!(!seeds.mark_used(&seed.id, "weekly-2026-W06").unwrap());
        assert!(!seeds.mark_used("nonexistent", "x").unwrap());
        assert!(seeds.list_unused().is_empty());
    }

    #[test]
    fn test_notes_target_filtering() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let mut notes = NoteStore::open(&store);
        notes.add("global guidance", "").unwrap();
        notes.add("week six focus", "week:2026-W06").unwrap();
        notes.add("theme note", "theme:pipeline").unwrap();

        let active = notes.active_for("week:2026-W06");
        assert_eq!(active.len(), 2);

        // Unmatched target: only the global note applies, the targeted
        // notes stay unused
        let other = notes.active_for("week:2026-W09");
        assert_eq!(other.len(), 1);
        assert_eq!(notes.list_all().iter().filter(|n| n.used).count(), 0);
    }

    #[test]
    fn test_note_mark_used() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let mut notes = NoteStore::open(&store);
        let note = notes.add("say more about testing", "").unwrap();
        assert!(notes.mark_used(&note.id).unwrap());
        assert!(!notes.mark_used(&note.id).unwrap());
        assert!(notes.active_for("").is_empty());
    }
}

//! Journal generation ledger.
//!
//! Tracks, per `(date, style)`, the set of session ids that contributed
//! to the generated entry (the cache key) and a per-date pending flag set
//! when synthesis retries are exhausted. Downstream stages skip pending
//! dates until a successful rerun clears the flag.

use super::{Store, JOURNAL_LEDGER_FILENAME};
use crate::models::{ItemId, JournalStyle};
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Record of one generated journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    /// The day the entry covers.
    pub date: NaiveDate,
    /// The style it was generated in.
    pub style: JournalStyle,
    /// Ids of the sessions that contributed, sorted.
    pub session_ids: BTreeSet<String>,
    /// Fingerprint of the synthesis config at generation time.
    #[serde(default)]
    pub config_fingerprint: String,
    /// When the entry was generated.
    pub generated_at: DateTime<Utc>,
}

/// Journal ledger: generation records plus pending dates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalLedger {
    /// One record per generated `(date, style)`.
    #[serde(default)]
    pub records: Vec<JournalRecord>,
    /// Dates whose synthesis exhausted its retries this or a prior run.
    #[serde(default)]
    pub pending_dates: BTreeSet<NaiveDate>,
}

impl JournalLedger {
    /// Whether the entry for `(date, style)` is current: generated from
    /// exactly this session-id set under this configuration. A changed
    /// set (sessions arrived late) forces regeneration.
    #[must_use]
    pub fn is_up_to_date(
        &self,
        date: NaiveDate,
        style: JournalStyle,
        session_ids: &[ItemId],
        config_fingerprint: &str,
    ) -> bool {
        let ids: BTreeSet<String> = session_ids.iter().map(ToString::to_string).collect();
        self.records.iter().any(|r| {
            r.date == date
                && r.style == style
                && r.session_ids == ids
                && r.config_fingerprint == config_fingerprint
        })
    }

    /// Records a generated entry, replacing any record for the same
    /// `(date, style)` and clearing the date's pending flag.
    pub fn mark_generated(
        &mut self,
        date: NaiveDate,
        style: JournalStyle,
        session_ids: &[ItemId],
        config_fingerprint: &str,
    ) {
        self.records.retain(|r| !(r.date == date && r.style == style));
        self.records.push(JournalRecord {
            date,
            style,
            session_ids: session_ids.iter().map(ToString::to_string).collect(),
            config_fingerprint: config_fingerprint.to_string(),
            generated_at: Utc::now(),
        });
        self.pending_dates.remove(&date);
    }

    /// Flags a date whose synthesis failed after all retries.
    pub fn mark_pending(&mut self, date: NaiveDate) {
        self.pending_dates.insert(date);
    }

    /// Whether a date is awaiting a successful rerun.
    #[must_use]
    pub fn is_pending(&self, date: NaiveDate) -> bool {
        self.pending_dates.contains(&date)
    }

    /// Drops the record for `(date, style)`, forcing regeneration.
    pub fn invalidate(&mut self, date: NaiveDate, style: JournalStyle) {
        self.records.retain(|r| !(r.date == date && r.style == style));
    }
}

impl Store {
    /// Loads the journal ledger.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StateCorrupt`] if the file exists but is
    /// unreadable.
    pub fn load_journal_ledger(&self) -> Result<JournalLedger> {
        Ok(self
            .read_ledger(&self.root().join("journal").join(JOURNAL_LEDGER_FILENAME))?
            .unwrap_or_default())
    }

    /// Persists the journal ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn commit_journal_ledger(&self, ledger: &JournalLedger) -> Result<()> {
        self.write_json(
            &self.root().join("journal").join(JOURNAL_LEDGER_FILENAME),
            ledger,
        )
    }
}

//! Structured end-of-run reporting.

use crate::store::{Store, REPORT_FILENAME};
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Items ingested per source.
    #[serde(default)]
    pub ingested: BTreeMap<String, usize>,
    /// Soft parse diagnostics per source.
    #[serde(default)]
    pub parse_diagnostics: BTreeMap<String, usize>,
    /// Journals generated this run.
    #[serde(default)]
    pub journals_generated: Vec<NaiveDate>,
    /// Journals skipped as up to date.
    #[serde(default)]
    pub journals_skipped: usize,
    /// Dates whose synthesis exhausted retries and needs attention.
    #[serde(default)]
    pub pending_dates: Vec<NaiveDate>,
    /// Blog posts generated this run, by slug.
    #[serde(default)]
    pub posts_generated: Vec<String>,
    /// Blog posts skipped as up to date.
    #[serde(default)]
    pub posts_skipped: usize,
    /// Deliveries per platform: (succeeded, failed).
    #[serde(default)]
    pub deliveries: BTreeMap<String, (usize, usize)>,
    /// Errors worth surfacing, stringified.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    /// Starts an empty report stamped now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            ingested: BTreeMap::new(),
            parse_diagnostics: BTreeMap::new(),
            journals_generated: Vec::new(),
            journals_skipped: 0,
            pending_dates: Vec::new(),
            posts_generated: Vec::new(),
            posts_skipped: 0,
            deliveries: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Marks the run finished.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Human-readable summary for stdout.
    #[must_use]
    pub fn summary_text(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        let duration = self
            .finished_at
            .map(|end| end.signed_duration_since(self.started_at))
            .map_or(String::new(), |d| format!(" in {}s", d.num_seconds()));
        let status = if self.errors.is_empty() { "completed" } else { "finished with errors" };
        lines.push(format!("Pipeline {status}{duration}"));

        if !self.ingested.is_empty() {
            let parts: Vec<String> = self
                .ingested
                .iter()
                .map(|(source, count)| format!("{source}: {count}"))
                .collect();
            lines.push(format!("Ingested: {}", parts.join(", ")));
        }
        let diagnostics: usize = self.parse_diagnostics.values().sum();
        if diagnostics > 0 {
            lines.push(format!("Parse diagnostics: {diagnostics} record(s) dropped"));
        }

        lines.push(format!(
            "Journals: {} generated, {} skipped",
            self.journals_generated.len(),
            self.journals_skipped
        ));
        lines.push(format!(
            "Blog posts: {} generated, {} skipped",
            self.posts_generated.len(),
            self.posts_skipped
        ));

        for (platform, (ok, failed)) in &self.deliveries {
            lines.push(format!("Delivered {platform}: {ok} succeeded, {failed} failed"));
        }

        if !self.pending_dates.is_empty() {
            let dates: Vec<String> = self.pending_dates.iter().map(ToString::to_string).collect();
            lines.push(format!("Pending dates needing attention: {}", dates.join(", ")));
        }

        if !self.errors.is_empty() {
            lines.push(format!("Errors: {}", self.errors.len()));
            for error in self.errors.iter().take(5) {
                lines.push(format!("  - {error}"));
            }
            if self.errors.len() > 5 {
                lines.push(format!("  ... and {} more", self.errors.len() - 5));
            }
        }

        lines.join("\n")
    }
}

impl Store {
    /// Persists the run report.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_report(&self, report: &RunReport) -> Result<()> {
        self.write_json(&self.root().join(REPORT_FILENAME), report)
    }

    /// Loads the last run report, when one exists.
    #[must_use]
    pub fn load_report(&self) -> Option<RunReport> {
        let path = self.root().join(REPORT_FILENAME);
        if !path.exists() {
            return None;
        }
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
    }
}

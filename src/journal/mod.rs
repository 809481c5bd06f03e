//! Journal synthesis.
//!
//! Builds the daily context, drives the LLM worker, enforces the length
//! band, and extracts structured memory from the generated prose. The
//! synthesizer is stateless: cache checks consult the ledger it is
//! handed, and every write goes back through the orchestrator.

pub mod context;
pub mod formatter;
pub mod prompts;

pub use context::{prepare_daily_context, week_target, DailyContext};

use crate::config::DistillConfig;
use crate::llm::{strip_code_fences, LlmWorker};
use crate::models::{ItemId, JournalEntry, Session};
use crate::store::JournalLedger;
use crate::{Error, Result};
use chrono::{NaiveDate, Utc};
use std::collections::BTreeSet;

/// Result of one journal synthesis request.
#[derive(Debug)]
pub enum JournalOutcome {
    /// An up-to-date entry already exists; nothing was generated.
    Cached,
    /// A new entry was generated.
    Generated(Box<GeneratedJournal>),
}

/// A freshly generated journal entry plus its side products.
#[derive(Debug)]
pub struct GeneratedJournal {
    /// The entry itself.
    pub entry: JournalEntry,
    /// Structured memory extracted from the prose, when the extraction
    /// pass succeeded.
    pub extraction: Option<MemoryExtraction>,
    /// Diagnostics accumulated during synthesis (length band misses,
    /// extraction failures).
    pub diagnostics: Vec<String>,
}

/// Structured memory extracted from generated prose.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct MemoryExtraction {
    /// High-level themes.
    #[serde(default)]
    pub themes: Vec<String>,
    /// What was learned.
    #[serde(default)]
    pub insights: Vec<String>,
    /// What was decided.
    #[serde(default)]
    pub decisions: Vec<String>,
    /// Unresolved questions.
    #[serde(default)]
    pub open_questions: Vec<String>,
    /// Ongoing threads.
    #[serde(default)]
    pub threads: Vec<ExtractedThread>,
    /// Mentioned entities.
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
}

/// A thread the extraction pass identified.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ExtractedThread {
    /// Thread name.
    pub name: String,
    /// Current one-line state.
    #[serde(default)]
    pub summary: String,
}

/// An entity the extraction pass identified.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ExtractedEntity {
    /// Entity name.
    pub name: String,
    /// Entity category.
    #[serde(default = "default_entity_type")]
    pub entity_type: String,
}

fn default_entity_type() -> String {
    "concept".to_string()
}

/// Journal synthesizer.
pub struct JournalSynthesizer<'a> {
    config: &'a DistillConfig,
    worker: &'a dyn LlmWorker,
}

impl<'a> JournalSynthesizer<'a> {
    /// Creates a synthesizer over a config and worker.
    #[must_use]
    pub fn new(config: &'a DistillConfig, worker: &'a dyn LlmWorker) -> Self {
        Self { config, worker }
    }

    /// Synthesizes the journal entry for one day.
    ///
    /// Cache-before-compute: when the ledger already holds an entry for
    /// `(date, style)` generated from this exact session-id set under
    /// this configuration and `force` is false, nothing is generated.
    ///
    /// # Errors
    ///
    /// Propagates LLM failures after the worker's own retry budget is
    /// exhausted; the caller marks the date pending.
    pub fn synthesize(
        &self,
        context: &DailyContext,
        sessions: &[Session],
        ledger: &JournalLedger,
        force: bool,
    ) -> Result<JournalOutcome> {
        let style = self.config.journal.style;
        let session_ids: Vec<ItemId> = sessions.iter().map(|s| s.item.id.clone()).collect();
        let fingerprint = self.config.synthesis_fingerprint();

        if !force && ledger.is_up_to_date(context.date, style, &session_ids, &fingerprint) {
            tracing::debug!(date = %context.date, "Journal up to date, skipping");
            metrics::counter!("journals_skipped_total").increment(1);
            return Ok(JournalOutcome::Cached);
        }

        let mut diagnostics = Vec::new();
        let prose = self.generate_prose(context, &mut diagnostics)?;

        let extraction = match self.extract_memory(&prose, context.date) {
            Ok(extraction) => Some(extraction),
            Err(e) => {
                // Extraction failure is soft: the entry still lands,
                // memory just misses a day
                tracing::warn!(date = %context.date, error = %e, "Memory extraction failed");
                diagnostics.push(format!("memory extraction failed: {e}"));
                None
            },
        };

        let tags: BTreeSet<String> = context.tags.iter().cloned().collect();
        let entry = JournalEntry {
            date: context.date,
            style,
            word_count: formatter::word_count(&prose),
            projects: context.projects.clone(),
            sessions_count: sessions.len(),
            duration_minutes: context.total_duration_minutes,
            tags,
            body_markdown: prose,
            source_session_ids: session_ids,
            generated_at: Utc::now(),
        };

        metrics::counter!("journals_generated_total").increment(1);
        Ok(JournalOutcome::Generated(Box::new(GeneratedJournal {
            entry,
            extraction,
            diagnostics,
        })))
    }

    /// First pass plus at most one length-corrected re-prompt. A result
    /// still outside the band is accepted with a diagnostic.
    fn generate_prose(
        &self,
        context: &DailyContext,
        diagnostics: &mut Vec<String>,
    ) -> Result<String> {
        let target = self.config.journal.target_word_count;
        let system = prompts::system_prompt(self.config.journal.style, target);
        let prompt = format!("{system}\n\n---\n\n{}", context.render_text());

        let raw = self.worker.invoke(&prompt)?;
        let prose = formatter::strip_chrome(&raw).to_string();

        let words = formatter::word_count(&prose);
        if within_band(words, target) {
            return Ok(prose);
        }

        tracing::info!(
            date = %context.date,
            words,
            target,
            "Journal outside length band, re-prompting once"
        );
        let correction = prompts::length_correction_prompt(&prose, words, target);
        let corrected_raw = self.worker.invoke(&correction)?;
        let corrected = formatter::strip_chrome(&corrected_raw).to_string();

        let corrected_words = formatter::word_count(&corrected);
        if !within_band(corrected_words, target) {
            diagnostics.push(format!(
                "length {corrected_words} words outside ±50% of {target} after re-prompt"
            ));
        }
        Ok(corrected)
    }

    /// Second LLM call: pull themes, insights, decisions, questions,
    /// threads, and entities out of the prose as JSON.
    fn extract_memory(&self, prose: &str, date: NaiveDate) -> Result<MemoryExtraction> {
        let prompt = prompts::memory_extraction_prompt(prose, date);
        let raw = self.worker.invoke(&prompt)?;
        let json = strip_code_fences(&raw);
        serde_json::from_str(json).map_err(|e| Error::OperationFailed {
            operation: "parse_memory_extraction".to_string(),
            cause: e.to_string(),
        })
    }
}

/// Whether a word count lands within ±50% of the target.
#[must_use]
pub fn within_band(words: usize, target: usize) -> bool {
    let min = target / 2;
    let max = target + target / 2;
    words >= min && words <= max
}

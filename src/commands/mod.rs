//! CLI command implementations.

use distill::config::DistillConfig;
use distill::models::JournalStyle;
use distill::pipeline::{Pipeline, RunRequest, StageSet, StageSetOption};
use distill::store::{NoteStore, SeedStore, Store};
use distill::{Error, Result};
use chrono::NaiveDate;
use std::path::PathBuf;

/// Full pipeline run.
#[allow(clippy::fn_params_excessive_bools)]
pub fn cmd_run(
    mut config: DistillConfig,
    scan_root: Option<PathBuf>,
    since_days: Option<u32>,
    force: bool,
    dry_run: bool,
    publish: bool,
    model: Option<String>,
) -> Result<()> {
    if let Some(days) = since_days {
        config.sessions.since_days = days;
    }
    if model.is_some() {
        config.llm.model = model;
    }

    let pipeline = Pipeline::new(config)?;

    let request = RunRequest {
        scan_root,
        force,
        dry_run,
        stages: StageSetOption(StageSet {
            ingest: true,
            journal: true,
            blog: true,
            publish,
        }),
        ..Default::default()
    };
    let report = pipeline.run(&request)?;
    println!("{}", report.summary_text());
    Ok(())
}

/// Ingest-only run.
pub fn cmd_ingest(
    mut config: DistillConfig,
    scan_root: Option<PathBuf>,
    since_days: Option<u32>,
) -> Result<()> {
    if let Some(days) = since_days {
        config.sessions.since_days = days;
    }
    let pipeline = Pipeline::new(config)?;
    let request = RunRequest {
        scan_root,
        stages: StageSetOption(StageSet {
            ingest: true,
            journal: false,
            blog: false,
            publish: false,
        }),
        ..Default::default()
    };
    let report = pipeline.run(&request)?;
    println!("{}", report.summary_text());
    Ok(())
}

/// Journal generation.
#[allow(clippy::too_many_arguments, clippy::fn_params_excessive_bools)]
pub fn cmd_journal(
    mut config: DistillConfig,
    scan_root: Option<PathBuf>,
    date: Option<String>,
    style: Option<String>,
    words: Option<usize>,
    force: bool,
    dry_run: bool,
    model: Option<String>,
) -> Result<()> {
    if let Some(style) = style {
        config.journal.style = style.parse::<JournalStyle>()?;
    }
    if let Some(words) = words {
        config.journal.target_word_count = words;
    }
    if model.is_some() {
        config.llm.model = model;
    }

    let dates = date
        .map(|d| {
            NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                .map(|parsed| vec![parsed])
                .map_err(|e| Error::InvalidInput(format!("bad date '{d}': {e}")))
        })
        .transpose()?;

    let pipeline = Pipeline::new(config)?;

    let request = RunRequest {
        scan_root,
        dates,
        force,
        dry_run,
        stages: StageSetOption(StageSet {
            ingest: true,
            journal: true,
            blog: false,
            publish: false,
        }),
        ..Default::default()
    };
    let report = pipeline.run(&request)?;
    println!("{}", report.summary_text());
    Ok(())
}

/// Blog generation from existing journals.
pub fn cmd_blog(
    mut config: DistillConfig,
    week: Option<String>,
    theme: Option<String>,
    force: bool,
    dry_run: bool,
    model: Option<String>,
) -> Result<()> {
    if model.is_some() {
        config.llm.model = model;
    }
    let pipeline = Pipeline::new(config)?;

    let request = RunRequest {
        force,
        dry_run,
        target_week: week,
        target_theme: theme,
        stages: StageSetOption(StageSet {
            ingest: false,
            journal: false,
            blog: true,
            publish: false,
        }),
        ..Default::default()
    };
    let report = pipeline.run(&request)?;
    println!("{}", report.summary_text());
    Ok(())
}

/// Deliver posts to configured platforms.
pub fn cmd_publish(config: DistillConfig) -> Result<()> {
    let pipeline = Pipeline::new(config)?;

    let request = RunRequest {
        stages: StageSetOption(StageSet {
            ingest: false,
            journal: false,
            blog: false,
            publish: true,
        }),
        ..Default::default()
    };
    let report = pipeline.run(&request)?;
    println!("{}", report.summary_text());
    Ok(())
}

/// Adds a seed idea.
pub fn cmd_seed_add(config: &DistillConfig, text: &str, tags: Option<String>) -> Result<()> {
    let store = Store::open(config.output_dir.clone())?;
    let mut seeds = SeedStore::open(&store);
    let tags = tags
        .map(|t| t.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();
    let seed = seeds.add(text, tags)?;
    println!("Added seed {}", seed.id);
    Ok(())
}

/// Lists seeds.
pub fn cmd_seed_list(config: &DistillConfig, all: bool) -> Result<()> {
    let store = Store::open(config.output_dir.clone())?;
    let seeds = SeedStore::open(&store);
    for seed in seeds.list_all() {
        if !all && seed.used {
            continue;
        }
        let status = if seed.used {
            format!("used in {}", seed.used_in.as_deref().unwrap_or("?"))
        } else {
            "unused".to_string()
        };
        println!("{}  [{status}]  {}", seed.id, seed.text);
    }
    Ok(())
}

/// Adds an editorial note.
pub fn cmd_note_add(config: &DistillConfig, text: &str, target: &str) -> Result<()> {
    if !target.is_empty() && !target.starts_with("week:") && !target.starts_with("theme:") {
        return Err(Error::InvalidInput(format!(
            "target must be empty, week:<ISO-week>, or theme:<slug>, got '{target}'"
        )));
    }
    let store = Store::open(config.output_dir.clone())?;
    let mut notes = NoteStore::open(&store);
    let note = notes.add(text, target)?;
    println!("Added note {}", note.id);
    Ok(())
}

/// Lists editorial notes.
pub fn cmd_note_list(config: &DistillConfig, all: bool) -> Result<()> {
    let store = Store::open(config.output_dir.clone())?;
    let notes = NoteStore::open(&store);
    for note in notes.list_all() {
        if !all && note.used {
            continue;
        }
        let target = if note.target.is_empty() { "global" } else { &note.target };
        let status = if note.used { "used" } else { "active" };
        println!("{}  [{status}, {target}]  {}", note.id, note.text);
    }
    Ok(())
}

/// Shows the last run report and pending dates.
pub fn cmd_status(config: &DistillConfig) -> Result<()> {
    let store = Store::open(config.output_dir.clone())?;
    match store.load_report() {
        Some(report) => println!("{}", report.summary_text()),
        None => println!("No pipeline run recorded yet."),
    }

    let ledger = store.load_journal_ledger()?;
    if !ledger.pending_dates.is_empty() {
        let dates: Vec<String> = ledger.pending_dates.iter().map(ToString::to_string).collect();
        println!("Pending journal dates: {}", dates.join(", "));
    }
    Ok(())
}

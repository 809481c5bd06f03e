//! Binary entry point for distill.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print output in the CLI binary
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use distill::config::DistillConfig;
use distill::observability;
use std::path::PathBuf;
use std::process::ExitCode;

/// Distill turns AI coding sessions and reading into journals and posts.
#[derive(Parser)]
#[command(name = "distill")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: ingest, journal, blog.
    Run {
        /// Directory to scan for session sources.
        #[arg(long)]
        scan_root: Option<PathBuf>,

        /// Lookback window in days.
        #[arg(long)]
        since_days: Option<u32>,

        /// Regenerate even when state says the work is done.
        #[arg(short, long)]
        force: bool,

        /// Print contexts without invoking the LLM; no writes.
        #[arg(long)]
        dry_run: bool,

        /// Also deliver generated posts to configured platforms.
        #[arg(long)]
        publish: bool,

        /// Model override passed to the LLM worker.
        #[arg(long)]
        model: Option<String>,
    },

    /// Parse and archive sources without any synthesis.
    Ingest {
        /// Directory to scan for session sources.
        #[arg(long)]
        scan_root: Option<PathBuf>,

        /// Lookback window in days.
        #[arg(long)]
        since_days: Option<u32>,
    },

    /// Generate journal entries.
    Journal {
        /// Directory to scan for session sources.
        #[arg(long)]
        scan_root: Option<PathBuf>,

        /// Generate only this date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<String>,

        /// Journal style.
        #[arg(long)]
        style: Option<String>,

        /// Target word count.
        #[arg(long)]
        words: Option<usize>,

        /// Regenerate even when cached.
        #[arg(short, long)]
        force: bool,

        /// Print the context without invoking the LLM.
        #[arg(long)]
        dry_run: bool,

        /// Model override passed to the LLM worker.
        #[arg(long)]
        model: Option<String>,
    },

    /// Generate blog posts from existing journals.
    Blog {
        /// Restrict to one ISO week, like 2026-W06.
        #[arg(long)]
        week: Option<String>,

        /// Restrict to one theme name or slug.
        #[arg(long)]
        theme: Option<String>,

        /// Regenerate even when state says the post exists.
        #[arg(short, long)]
        force: bool,

        /// Print candidates without invoking the LLM.
        #[arg(long)]
        dry_run: bool,

        /// Model override passed to the LLM worker.
        #[arg(long)]
        model: Option<String>,
    },

    /// Deliver generated posts to configured platforms.
    Publish,

    /// Manage seed ideas.
    Seed {
        #[command(subcommand)]
        action: SeedAction,
    },

    /// Manage editorial notes.
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },

    /// Show the last run report and pending dates.
    Status,
}

/// Seed subcommands.
#[derive(Subcommand)]
enum SeedAction {
    /// Add a seed idea.
    Add {
        /// The idea text.
        text: String,

        /// Comma-separated tags.
        #[arg(short, long)]
        tags: Option<String>,
    },
    /// List seeds.
    List {
        /// Include seeds that have already been used.
        #[arg(long)]
        all: bool,
    },
}

/// Note subcommands.
#[derive(Subcommand)]
enum NoteAction {
    /// Add an editorial note.
    Add {
        /// The instruction text.
        text: String,

        /// Target: empty (global), week:<ISO-week>, or theme:<slug>.
        #[arg(short = 'T', long, default_value = "")]
        target: String,
    },
    /// List notes.
    List {
        /// Include notes that have already been used.
        #[arg(long)]
        all: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    observability::init(observability::default_format(), cli.verbose);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let result = match cli.command {
        Commands::Run {
            scan_root,
            since_days,
            force,
            dry_run,
            publish,
            model,
        } => commands::cmd_run(config, scan_root, since_days, force, dry_run, publish, model),
        Commands::Ingest {
            scan_root,
            since_days,
        } => commands::cmd_ingest(config, scan_root, since_days),
        Commands::Journal {
            scan_root,
            date,
            style,
            words,
            force,
            dry_run,
            model,
        } => commands::cmd_journal(config, scan_root, date, style, words, force, dry_run, model),
        Commands::Blog {
            week,
            theme,
            force,
            dry_run,
            model,
        } => commands::cmd_blog(config, week, theme, force, dry_run, model),
        Commands::Publish => commands::cmd_publish(config),
        Commands::Seed { action } => match action {
            SeedAction::Add { text, tags } => commands::cmd_seed_add(&config, &text, tags),
            SeedAction::List { all } => commands::cmd_seed_list(&config, all),
        },
        Commands::Note { action } => match action {
            NoteAction::Add { text, target } => commands::cmd_note_add(&config, &text, &target),
            NoteAction::List { all } => commands::cmd_note_list(&config, all),
        },
        Commands::Status => commands::cmd_status(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration: `--config` flag, then `DISTILL_CONFIG_PATH`,
/// then the default location, then built-in defaults.
fn load_config(path: Option<&std::path::Path>) -> distill::Result<DistillConfig> {
    if let Some(path) = path {
        return DistillConfig::load_from_file(path);
    }
    if let Ok(env_path) = std::env::var("DISTILL_CONFIG_PATH") {
        if !env_path.trim().is_empty() {
            return DistillConfig::load_from_file(std::path::Path::new(&env_path));
        }
    }
    Ok(DistillConfig::load_default())
}

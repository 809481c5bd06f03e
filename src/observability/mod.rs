//! Structured logging initialization.
//!
//! Logs go to stderr through `tracing-subscriber` with an `EnvFilter`.
//! The default filter keeps distill at `info` (or `debug` with
//! `--verbose`) and quiets noisy dependencies; `DISTILL_LOG` overrides
//! everything.

use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs for scheduled runs.
    Json,
    /// Human-friendly logs for interactive use.
    Pretty,
}

/// Initializes the global tracing subscriber. Safe to call once;
/// subsequent calls are ignored.
pub fn init(format: LogFormat, verbose: bool) {
    let filter = std::env::var("DISTILL_LOG").map_or_else(
        |_| {
            let level = if verbose { "debug" } else { "info" };
            EnvFilter::new(format!("distill={level},reqwest=warn,hyper=warn"))
        },
        EnvFilter::new,
    );

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.compact().try_init(),
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}

/// Picks the log format: JSON when stderr is not a terminal (scheduled
/// runs), pretty otherwise.
#[must_use]
pub fn default_format() -> LogFormat {
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

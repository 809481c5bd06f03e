//! Configuration management.
//!
//! Configuration is layered: built-in defaults, then a TOML file, then
//! `DISTILL_*` environment variables, then per-request CLI flags. Unknown
//! keys in the file are rejected rather than silently ignored.

use crate::models::JournalStyle;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration for distill.
#[derive(Debug, Clone)]
pub struct DistillConfig {
    /// Root of all persisted artifacts.
    pub output_dir: PathBuf,
    /// Session source configuration.
    pub sessions: SessionsConfig,
    /// Journal synthesis configuration.
    pub journal: JournalConfig,
    /// Blog synthesis configuration.
    pub blog: BlogConfig,
    /// External content intake configuration.
    pub intake: IntakeConfig,
    /// LLM worker configuration.
    pub llm: LlmConfig,
    /// Pipeline scheduling configuration.
    pub pipeline: PipelineConfig,
    /// Known projects with descriptions injected into prompts.
    pub projects: Vec<ProjectDescriptor>,
    /// CMS publisher settings, when configured.
    pub cms: Option<CmsConfig>,
    /// Scheduler publisher settings, when configured.
    pub scheduler: Option<SchedulerConfig>,
    /// Fixed UTC offset in hours used for date bucketing.
    pub timezone_offset_hours: i32,
}

/// Session discovery configuration.
#[derive(Debug, Clone)]
pub struct SessionsConfig {
    /// Enabled session sources.
    pub sources: Vec<String>,
    /// Also scan user-wide session paths (home directory).
    pub include_global: bool,
    /// Lookback window for discovery, in days.
    pub since_days: u32,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                "chat-log".to_string(),
                "rollout".to_string(),
                "multi-agent".to_string(),
            ],
            include_global: false,
            since_days: 7,
        }
    }
}

/// Journal synthesis configuration.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Writing style.
    pub style: JournalStyle,
    /// Target word count; generated prose must land within ±50%.
    pub target_word_count: usize,
    /// Active-thread cutoff for memory injection, in days.
    pub memory_window_days: i64,
    /// Upper bound on sessions included in one entry.
    pub max_sessions_per_entry: usize,
    /// Days a thread may go unseen before it is marked dormant.
    pub thread_dormant_days: i64,
    /// Daily entries older than this are compacted to summary strings.
    pub memory_horizon_days: i64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            style: JournalStyle::DevJournal,
            target_word_count: 600,
            memory_window_days: 7,
            max_sessions_per_entry: 20,
            thread_dormant_days: 14,
            memory_horizon_days: 90,
        }
    }
}

/// Blog synthesis configuration.
#[derive(Debug, Clone)]
pub struct BlogConfig {
    /// Target word count for posts.
    pub target_word_count: usize,
    /// Whether to insert diagrams on structural cues.
    pub include_diagrams: bool,
    /// Platform identifiers to publish to.
    pub platforms: Vec<String>,
    /// Minimum journals in a week before a weekly post is generated.
    pub min_journals_for_weekly: usize,
    /// Minimum thread mentions before a thematic candidate appears.
    pub theme_mention_min: u32,
    /// Number of recent posts whose key points form the avoid-list.
    pub avoid_list_posts: usize,
    /// Fraction of overlapping key points that triggers a re-prompt.
    pub overlap_threshold: f64,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            target_word_count: 1200,
            include_diagrams: true,
            platforms: vec!["vault".to_string(), "markdown".to_string()],
            min_journals_for_weekly: 3,
            theme_mention_min: 3,
            avoid_list_posts: 10,
            overlap_threshold: 0.4,
        }
    }
}

/// External content intake configuration.
#[derive(Debug, Clone, Default)]
pub struct IntakeConfig {
    /// Whether intake runs at all.
    pub enabled: bool,
    /// RSS/Atom feed URLs.
    pub feeds: Vec<String>,
    /// Browser history database paths.
    pub browser_history_paths: Vec<PathBuf>,
    /// Newsletter CSV export paths.
    pub newsletter_exports: Vec<PathBuf>,
}

/// LLM worker configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Worker command; the prompt is written to its stdin.
    pub command: Vec<String>,
    /// Model selection string passed through unchanged.
    pub model: Option<String>,
    /// Per-invocation timeout in seconds.
    pub timeout_secs: u64,
    /// Retry attempts for retryable failures.
    pub max_retries: u32,
    /// Initial retry backoff in seconds; doubles per attempt.
    pub retry_backoff_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            command: vec!["claude".to_string(), "-p".to_string()],
            model: None,
            timeout_secs: 120,
            max_retries: 3,
            retry_backoff_secs: 2,
        }
    }
}

/// Pipeline scheduling configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum concurrent source parsers.
    pub parser_workers: usize,
    /// Maximum concurrent LLM synthesis workers.
    pub llm_workers: usize,
    /// Per-platform publisher timeout in seconds.
    pub publisher_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parser_workers: 8,
            llm_workers: 2,
            publisher_timeout_secs: 30,
        }
    }
}

/// A known project whose description is injected into prompts.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectDescriptor {
    /// Project name as it appears in session attribution.
    pub name: String,
    /// One-line description for LLM context.
    pub description: String,
    /// Optional canonical URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Optional tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional filesystem root used for path-prefix attribution.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// Ghost-style CMS publisher settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CmsConfig {
    /// API base URL.
    pub url: String,
    /// API key or token.
    pub api_key: String,
}

/// Social-scheduler publisher settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Scheduler endpoint URL.
    pub url: String,
    /// API key.
    pub api_key: String,
    /// Channel identifiers to schedule into.
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for DistillConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("distill-output"),
            sessions: SessionsConfig::default(),
            journal: JournalConfig::default(),
            blog: BlogConfig::default(),
            intake: IntakeConfig::default(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            projects: Vec::new(),
            cms: None,
            scheduler: None,
            timezone_offset_hours: 0,
        }
    }
}

impl DistillConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path, then applies environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid
    /// TOML, or contains unrecognized keys.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: e.to_string(),
            })?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        let mut config = Self::default();
        config.apply_config_file(file)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from the default location
    /// (`~/.config/distill/config.toml`), falling back to defaults when
    /// no file exists. Environment overrides always apply.
    #[must_use]
    pub fn load_default() -> Self {
        let default_path = std::env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(".config").join("distill").join("config.toml"));

        if let Some(path) = default_path {
            if path.exists() {
                if let Ok(config) = Self::load_from_file(&path) {
                    return config;
                }
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_config_file(&mut self, file: ConfigFile) -> crate::Result<()> {
        if let Some(output) = file.output {
            if let Some(dir) = output.directory {
                self.output_dir = dir;
            }
        }
        if let Some(sessions) = file.sessions {
            if let Some(sources) = sessions.sources {
                for source in &sources {
                    // Validate eagerly so a typo fails the run, not discovery
                    source.parse::<crate::models::ContentSource>()?;
                }
                self.sessions.sources = sources;
            }
            if let Some(include_global) = sessions.include_global {
                self.sessions.include_global = include_global;
            }
            if let Some(since_days) = sessions.since_days {
                self.sessions.since_days = since_days;
            }
        }
        if let Some(journal) = file.journal {
            if let Some(style) = journal.style {
                self.journal.style = style.parse()?;
            }
            if let Some(count) = journal.target_word_count {
                self.journal.target_word_count = count;
            }
            if let Some(days) = journal.memory_window_days {
                self.journal.memory_window_days = days;
            }
            if let Some(max) = journal.max_sessions_per_entry {
                self.journal.max_sessions_per_entry = max;
            }
            if let Some(days) = journal.thread_dormant_days {
                self.journal.thread_dormant_days = days;
            }
            if let Some(days) = journal.memory_horizon_days {
                self.journal.memory_horizon_days = days;
            }
        }
        if let Some(blog) = file.blog {
            if let Some(count) = blog.target_word_count {
                self.blog.target_word_count = count;
            }
            if let Some(diagrams) = blog.include_diagrams {
                self.blog.include_diagrams = diagrams;
            }
            if let Some(platforms) = blog.platforms {
                self.blog.platforms = platforms;
            }
            if let Some(min) = blog.min_journals_for_weekly {
                self.blog.min_journals_for_weekly = min;
            }
            if let Some(min) = blog.theme_mention_min {
                self.blog.theme_mention_min = min;
            }
            if let Some(posts) = blog.avoid_list_posts {
                self.blog.avoid_list_posts = posts;
            }
            if let Some(threshold) = blog.overlap_threshold {
                self.blog.overlap_threshold = threshold.clamp(0.0, 1.0);
            }
        }
        if let Some(intake) = file.intake {
            if let Some(enabled) = intake.enabled {
                self.intake.enabled = enabled;
            }
            if let Some(feeds) = intake.feeds {
                self.intake.feeds = feeds;
            }
            if let Some(paths) = intake.browser_history_paths {
                self.intake.browser_history_paths = paths;
            }
            if let Some(paths) = intake.newsletter_exports {
                self.intake.newsletter_exports = paths;
            }
        }
        if let Some(llm) = file.llm {
            if let Some(command) = llm.command {
                if command.is_empty() {
                    return Err(crate::Error::InvalidInput(
                        "llm.command must not be empty".to_string(),
                    ));
                }
                self.llm.command = command;
            }
            if let Some(model) = llm.model {
                self.llm.model = Some(model);
            }
            if let Some(secs) = llm.timeout_secs {
                self.llm.timeout_secs = secs;
            }
            if let Some(retries) = llm.max_retries {
                self.llm.max_retries = retries;
            }
            if let Some(secs) = llm.retry_backoff_secs {
                self.llm.retry_backoff_secs = secs;
            }
        }
        if let Some(pipeline) = file.pipeline {
            if let Some(workers) = pipeline.parser_workers {
                self.pipeline.parser_workers = workers.max(1);
            }
            if let Some(workers) = pipeline.llm_workers {
                self.pipeline.llm_workers = workers.max(1);
            }
            if let Some(secs) = pipeline.publisher_timeout_secs {
                self.pipeline.publisher_timeout_secs = secs;
            }
        }
        if let Some(projects) = file.projects {
            self.projects = projects;
        }
        if let Some(offset) = file.timezone_offset_hours {
            if !(-12..=14).contains(&offset) {
                return Err(crate::Error::InvalidInput(format!(
                    "timezone_offset_hours out of range: {offset}"
                )));
            }
            self.timezone_offset_hours = offset;
        }
        self.cms = file.cms;
        self.scheduler = file.scheduler;
        Ok(())
    }

    /// Applies `DISTILL_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("DISTILL_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
        if let Some(model) = std::env::var("DISTILL_LLM_MODEL").ok().filter(|v| !v.is_empty()) {
            self.llm.model = Some(model);
        }
        if let Some(parsed) = std::env::var("DISTILL_LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.llm.timeout_secs = parsed;
        }
        if let Some(parsed) = std::env::var("DISTILL_LLM_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            self.llm.max_retries = parsed;
        }
        if let Some(parsed) = std::env::var("DISTILL_SINCE_DAYS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            self.sessions.since_days = parsed;
        }
        if let Some(parsed) = std::env::var("DISTILL_LLM_WORKERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            self.pipeline.llm_workers = parsed.max(1);
        }
    }

    /// Looks up the descriptor for a project name.
    #[must_use]
    pub fn project(&self, name: &str) -> Option<&ProjectDescriptor> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// A short hash of the synthesis-relevant settings, stored alongside
    /// generated artifacts so configuration changes invalidate them.
    #[must_use]
    pub fn synthesis_fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.journal.style.as_str());
        hasher.update(self.journal.target_word_count.to_le_bytes());
        hasher.update(self.blog.target_word_count.to_le_bytes());
        hasher.update([u8::from(self.blog.include_diagrams)]);
        hasher.update(self.llm.model.as_deref().unwrap_or("").as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }
}

// Serde mirror of the TOML file. All fields optional; unknown keys are
// rejected at every level.

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    output: Option<OutputFile>,
    sessions: Option<SessionsFile>,
    journal: Option<JournalFile>,
    blog: Option<BlogFile>,
    intake: Option<IntakeFile>,
    llm: Option<LlmFile>,
    pipeline: Option<PipelineFile>,
    projects: Option<Vec<ProjectDescriptor>>,
    cms: Option<CmsConfig>,
    scheduler: Option<SchedulerConfig>,
    timezone_offset_hours: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OutputFile {
    directory: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SessionsFile {
    sources: Option<Vec<String>>,
    include_global: Option<bool>,
    since_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JournalFile {
    style: Option<String>,
    target_word_count: Option<usize>,
    memory_window_days: Option<i64>,
    max_sessions_per_entry: Option<usize>,
    thread_dormant_days: Option<i64>,
    memory_horizon_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BlogFile {
    target_word_count: Option<usize>,
    include_diagrams: Option<bool>,
    platforms: Option<Vec<String>>,
    min_journals_for_weekly: Option<usize>,
    theme_mention_min: Option<u32>,
    avoid_list_posts: Option<usize>,
    overlap_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IntakeFile {
    enabled: Option<bool>,
    feeds: Option<Vec<String>>,
    browser_history_paths: Option<Vec<PathBuf>>,
    newsletter_exports: Option<Vec<PathBuf>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmFile {
    command: Option<Vec<String>>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_backoff_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelineFile {
    parser_workers: Option<usize>,
    llm_workers: Option<usize>,
    publisher_timeout_secs: Option<u64>,
}

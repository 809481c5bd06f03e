//! Pipeline orchestration.
//!
//! The coordinator runs stages in topological order for a requested date
//! range: parse → normalize → analyze → journal → blog → publish. The
//! state layer short-circuits work that is already complete; band-3
//! failures set per-date pending flags; only state corruption aborts the
//! whole run.

mod report;

pub use report::RunReport;

use crate::analyzer::SessionAnalyzer;
use crate::blog::{
    group_by_week, prepare_thematic_context, prepare_weekly_context, thematic_candidates,
    weekly_slug, BlogSynthesizer, GeneratedPost,
};
use crate::config::DistillConfig;
use crate::ingest::{DateBuckets, DedupOutcome, Deduplicator};
use crate::journal::{
    prepare_daily_context, week_target, DailyContext, JournalOutcome, JournalSynthesizer,
};
use crate::llm::{LlmWorker, RetryPolicy, RetryingWorker, SubprocessWorker, WorkerPool};
use crate::models::{BlogPost, ContentItem, ContentSource, JournalEntry, PublishedRecord, Session};
use crate::parsers::{
    discover_source_roots, BrowserParser, ChatLogParser, FeedParser, MultiAgentParser,
    NewsletterParser, RolloutParser, SourceParser,
};
use crate::publish::{build_publishers, fan_out};
use crate::store::{BlogPostRecord, BlogPostSummary, NoteStore, SeedStore, Store};
use crate::Result;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Which stages to run.
#[derive(Debug, Clone, Copy)]
pub struct StageSet {
    /// Parse and normalize sources.
    pub ingest: bool,
    /// Generate journal entries.
    pub journal: bool,
    /// Generate blog posts.
    pub blog: bool,
    /// Deliver posts to platforms.
    pub publish: bool,
}

impl Default for StageSet {
    fn default() -> Self {
        Self {
            ingest: true,
            journal: true,
            blog: true,
            publish: false,
        }
    }
}

/// One pipeline invocation.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Directory to scan for session sources; current directory when
    /// unset.
    pub scan_root: Option<PathBuf>,
    /// Restrict journal generation to these dates.
    pub dates: Option<Vec<NaiveDate>>,
    /// Regenerate even when state says the work is done.
    pub force: bool,
    /// Print contexts instead of invoking the LLM; no writes.
    pub dry_run: bool,
    /// Stages to run.
    pub stages: StageSetOption,
    /// Restrict weekly generation to one ISO week (`2026-W06`).
    pub target_week: Option<String>,
    /// Restrict thematic generation to one theme name or slug.
    pub target_theme: Option<String>,
}

/// Stage selection wrapper so `RunRequest` can derive `Default`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageSetOption(pub StageSet);

/// Everything ingested and analyzed for one run.
struct IngestedData {
    buckets: DateBuckets,
}

/// The pipeline coordinator.
pub struct Pipeline {
    config: DistillConfig,
    store: Store,
    cancelled: Arc<AtomicBool>,
}

impl Pipeline {
    /// Opens the pipeline over the configured output directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be opened.
    pub fn new(config: DistillConfig) -> Result<Self> {
        let store = Store::open(config.output_dir.clone())?;
        Ok(Self {
            config,
            store,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The cancellation flag; set it from a signal handler to stop the
    /// run at the next safe point.
    #[must_use]
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// The store backing this pipeline.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Runs the pipeline with the default subprocess-backed LLM worker.
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal failures (state corruption);
    /// everything else is recorded in the report.
    pub fn run(&self, request: &RunRequest) -> Result<RunReport> {
        let worker = RetryingWorker::new(
            SubprocessWorker::new(&self.config.llm),
            RetryPolicy {
                max_retries: self.config.llm.max_retries,
                base_backoff: Duration::from_secs(self.config.llm.retry_backoff_secs),
            },
        );
        self.run_with_worker(request, &worker)
    }

    /// Runs the pipeline with an explicit LLM worker (the test seam).
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal failures.
    pub fn run_with_worker(
        &self,
        request: &RunRequest,
        worker: &dyn LlmWorker,
    ) -> Result<RunReport> {
        let mut report = RunReport::new();
        let stages = request.stages.0;

        let data = if stages.ingest {
            self.ingest_stage(request, &mut report)
        } else {
            IngestedData {
                buckets: DateBuckets::default(),
            }
        };

        if stages.journal && !self.cancelled.load(Ordering::Relaxed) {
            self.journal_stage(request, worker, &data, &mut report)?;
        }

        if stages.blog && !self.cancelled.load(Ordering::Relaxed) {
            self.blog_stage(request, worker, &mut report)?;
        }

        if stages.publish && !self.cancelled.load(Ordering::Relaxed) && !request.dry_run {
            self.publish_stage(&mut report)?;
        }

        report.finish();
        if !request.dry_run {
            self.store.save_report(&report)?;
        }
        Ok(report)
    }

    // ---------------------------------------------------------------
    // Ingest
    // ---------------------------------------------------------------

    fn ingest_stage(&self, request: &RunRequest, report: &mut RunReport) -> IngestedData {
        let scan_root = request
            .scan_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let since_days = self.config.sessions.since_days;
        let sources: Vec<ContentSource> = self
            .config
            .sessions
            .sources
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();

        // Session parsers over discovered dot-directory roots
        let session_parser = |source: ContentSource| -> Option<Box<dyn SourceParser>> {
            match source {
                ContentSource::ChatLog => Some(Box::new(ChatLogParser::new(since_days))),
                ContentSource::Rollout => Some(Box::new(RolloutParser::new(since_days))),
                ContentSource::MultiAgent => Some(Box::new(MultiAgentParser::new(since_days))),
                _ => None,
            }
        };

        let mut jobs: Vec<(Box<dyn SourceParser>, PathBuf)> = Vec::new();
        for (source, root) in
            discover_source_roots(&scan_root, &sources, self.config.sessions.include_global)
        {
            let Some(parser) = session_parser(source) else {
                continue;
            };
            match parser.discover(&root) {
                Ok(locations) => {
                    for location in locations {
                        if let Some(parser) = session_parser(source) {
                            jobs.push((parser, location));
                        }
                    }
                },
                Err(e) => {
                    // Fatal for this source only; the rest continue
                    tracing::error!(source = %source, error = %e, "Source unavailable");
                    report.errors.push(e.to_string());
                },
            }
        }

        // Intake parsers, when enabled
        if self.config.intake.enabled {
            let feed = FeedParser::new(self.config.intake.feeds.clone());
            for location in feed.discover(&scan_root).unwrap_or_default() {
                jobs.push((Box::new(feed.clone()), location));
            }
            let browser = BrowserParser::new(
                self.config.intake.browser_history_paths.clone(),
                i64::from(since_days),
            );
            for location in browser.discover(&scan_root).unwrap_or_default() {
                jobs.push((Box::new(browser.clone()), location));
            }
            let newsletter = NewsletterParser::new(self.config.intake.newsletter_exports.clone());
            for location in newsletter.discover(&scan_root).unwrap_or_default() {
                jobs.push((Box::new(newsletter.clone()), location));
            }
        }

        // Bounded parallel parse: worker threads drain the job queue
        let worker_count = self.config.pipeline.parser_workers.max(1);
        let queue = Mutex::new(jobs);
        let results: Mutex<Vec<(ContentSource, crate::parsers::ParseOutput)>> =
            Mutex::new(Vec::new());
        let errors: Mutex<Vec<String>> = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for _ in 0..worker_count {
                scope.spawn(|| loop {
                    if self.cancelled.load(Ordering::Relaxed) {
                        break;
                    }
                    let Some((parser, location)) = queue
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .pop()
                    else {
                        break;
                    };
                    let source = parser.source();
                    match parser.parse(&location) {
                        Ok(output) => results
                            .lock()
                            .unwrap_or_else(std::sync::PoisonError::into_inner)
                            .push((source, output)),
                        Err(e) => errors
                            .lock()
                            .unwrap_or_else(std::sync::PoisonError::into_inner)
                            .push(e.to_string()),
                    }
                });
            }
        });

        report
            .errors
            .extend(errors.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner));

        // Normalize and dedup
        let mut dedup = Deduplicator::new();
        let analyzer = SessionAnalyzer::new(&self.config.projects);
        for (source, output) in results
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
        {
            let source_name = source.to_string();
            *report.parse_diagnostics.entry(source_name.clone()).or_insert(0) +=
                output.diagnostics.len();
            for diagnostic in &output.diagnostics {
                tracing::debug!(location = %diagnostic.location, message = %diagnostic.message, "Parse diagnostic");
            }
            for session in output.sessions {
                let analyzed = analyzer.analyze(session);
                if dedup.offer_session(analyzed) == DedupOutcome::Fresh {
                    *report.ingested.entry(source_name.clone()).or_insert(0) += 1;
                }
            }
            for item in output.items {
                if dedup.offer_item(item) == DedupOutcome::Fresh {
                    *report.ingested.entry(source_name.clone()).or_insert(0) += 1;
                }
            }
        }
        for (source, count) in &report.ingested {
            metrics::counter!("items_ingested_total", "source" => source.clone())
                .increment(u64::try_from(*count).unwrap_or(0));
        }

        let (items, sessions) = dedup.into_parts();
        let buckets = DateBuckets::build(sessions, items, self.config.timezone_offset_hours);

        // Archive raw intake items and write deterministic digests
        if !request.dry_run {
            for (date, day_items) in &buckets.items {
                if let Err(e) = self.store.archive_items(*date, day_items) {
                    report.errors.push(e.to_string());
                }
                let digest = render_digest(*date, day_items);
                if let Err(e) = self.store.atomic_write(&self.store.digest_path(*date), &digest) {
                    report.errors.push(e.to_string());
                }
            }
        }

        IngestedData { buckets }
    }

    // ---------------------------------------------------------------
    // Journal
    // ---------------------------------------------------------------

    fn journal_stage(
        &self,
        request: &RunRequest,
        worker: &dyn LlmWorker,
        data: &IngestedData,
        report: &mut RunReport,
    ) -> Result<()> {
        let mut ledger = self.store.load_journal_ledger()?;
        let mut memory = self.store.load_memory();
        let mut seeds = SeedStore::open(&self.store);
        let mut notes = NoteStore::open(&self.store);

        let dates: Vec<NaiveDate> = match &request.dates {
            Some(dates) => dates.clone(),
            None => data.buckets.session_dates(),
        };

        // Build contexts up front from an immutable memory snapshot;
        // synthesis tasks then only drive the LLM
        struct JournalJob<'a> {
            date: NaiveDate,
            context: DailyContext,
            sessions: &'a [Session],
            seed_ids: Vec<String>,
            note_ids: Vec<String>,
        }

        let empty: Vec<Session> = Vec::new();
        let mut jobs: Vec<JournalJob<'_>> = Vec::new();
        for date in dates {
            let sessions = data.buckets.sessions.get(&date).unwrap_or(&empty);
            if sessions.is_empty() {
                // A pending date stays pending until its sessions are
                // rediscovered within the lookback window
                continue;
            }
            let active_notes = notes.active_for(&week_target(date));
            let editorial = render_editorial(&active_notes);
            let note_ids = active_notes.iter().map(|n| n.id.clone()).collect();
            let unused_seeds = seeds.list_unused();
            let seed_ids = unused_seeds.iter().map(|s| s.id.clone()).collect();
            let context = prepare_daily_context(
                date,
                sessions,
                &memory,
                editorial,
                &unused_seeds,
                &self.config,
            );
            jobs.push(JournalJob {
                date,
                context,
                sessions,
                seed_ids,
                note_ids,
            });
        }

        if request.dry_run {
            for job in &jobs {
                println!("{}", job.context.render_text());
                println!("---");
            }
            return Ok(());
        }

        // Parallel synthesis across dates, bounded by the LLM pool;
        // at most one in-flight journal per date by construction
        let pool = WorkerPool::new(self.config.pipeline.llm_workers);
        let synthesizer = JournalSynthesizer::new(&self.config, worker);
        let outcomes: Mutex<Vec<(usize, Result<JournalOutcome>)>> = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for (index, job) in jobs.iter().enumerate() {
                if self.cancelled.load(Ordering::Relaxed) {
                    break;
                }
                let pool = &pool;
                let synthesizer = &synthesizer;
                let ledger_ref = &ledger;
                let outcomes = &outcomes;
                let force = request.force;
                scope.spawn(move || {
                    let _permit = pool.acquire();
                    let result =
                        synthesizer.synthesize(&job.context, job.sessions, ledger_ref, force);
                    outcomes
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .push((index, result));
                });
            }
        });

        let mut outcomes = outcomes
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        outcomes.sort_by_key(|(index, _)| *index);

        // Single-writer commit loop: files, ledger, memory, seeds/notes
        let mut blog_state_dirty_dates: Vec<NaiveDate> = Vec::new();
        for (index, outcome) in outcomes {
            let job = &jobs[index];
            match outcome {
                Ok(JournalOutcome::Cached) => report.journals_skipped += 1,
                Ok(JournalOutcome::Generated(generated)) => {
                    let entry = &generated.entry;
                    let markdown = crate::journal::formatter::format_entry(entry);
                    let scratch = self
                        .store
                        .write_scratch(&format!("{}.md", entry.file_stem()), &markdown)?;

                    ledger.mark_generated(
                        entry.date,
                        entry.style,
                        &entry.source_session_ids,
                        &self.config.synthesis_fingerprint(),
                    );
                    self.store.commit_journal_ledger(&ledger)?;
                    self.store.promote_scratch(
                        &scratch,
                        &self.store.journal_path(entry.date, entry.style.as_str()),
                    )?;

                    apply_extraction(&mut memory, entry, generated.extraction.as_ref());
                    let read_ids: Vec<String> = data
                        .buckets
                        .items
                        .get(&entry.date)
                        .map(|items| items.iter().map(|i| i.id.to_string()).collect())
                        .unwrap_or_default();
                    if !read_ids.is_empty() {
                        memory.record_daily(crate::models::DailyEntry {
                            date: entry.date,
                            read_ids,
                            ..Default::default()
                        });
                    }
                    memory.sweep_dormant(self.config.journal.thread_dormant_days);
                    memory.compact(self.config.journal.memory_horizon_days);
                    self.store.commit_memory(&memory)?;

                    for seed_id in &job.seed_ids {
                        let _ = seeds.mark_used(seed_id, &entry.file_stem())?;
                    }
                    for note_id in &job.note_ids {
                        let _ = notes.mark_used(note_id)?;
                    }

                    for diagnostic in &generated.diagnostics {
                        tracing::warn!(date = %entry.date, "{diagnostic}");
                    }
                    report.journals_generated.push(entry.date);
                    if request.force {
                        blog_state_dirty_dates.push(entry.date);
                    }
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!(date = %job.date, error = %e, "Journal synthesis failed, marking pending");
                    ledger.mark_pending(job.date);
                    self.store.commit_journal_ledger(&ledger)?;
                    report.pending_dates.push(job.date);
                    report.errors.push(format!("journal {}: {e}", job.date));
                },
            }
        }

        // Force-regenerated journals invalidate any post built on them
        if !blog_state_dirty_dates.is_empty() {
            let mut blog_state = self.store.load_blog_state()?;
            let mut stale: Vec<String> = Vec::new();
            for date in blog_state_dirty_dates {
                stale.extend(blog_state.mark_stale_for_date(date));
            }
            if !stale.is_empty() {
                tracing::info!(slugs = ?stale, "Marked posts stale after journal regeneration");
                self.store.commit_blog_state(&blog_state)?;
            }
        }

        Ok(())
    }

    // ---------------------------------------------------------------
    // Blog
    // ---------------------------------------------------------------

    fn blog_stage(
        &self,
        request: &RunRequest,
        worker: &dyn LlmWorker,
        report: &mut RunReport,
    ) -> Result<()> {
        let ledger = self.store.load_journal_ledger()?;
        let mut blog_state = self.store.load_blog_state()?;
        let mut blog_memory = self.store.load_blog_memory();
        let memory = self.store.load_memory();
        let mut notes = NoteStore::open(&self.store);
        let entries: Vec<JournalEntry> = self.store.load_journal_entries()?;
        if entries.is_empty() {
            return Ok(());
        }

        let synthesizer = BlogSynthesizer::new(&self.config, worker);
        let fingerprint = self.config.synthesis_fingerprint();
        let today = Utc::now().date_naive();
        let memory_context = memory.render_for_prompt(today, self.config.journal.memory_window_days);

        // Weekly posts
        for ((year, week), week_entries) in group_by_week(&entries) {
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }
            let slug = weekly_slug(year, week);
            if let Some(target) = &request.target_week {
                if *target != format!("{year}-W{week:02}") {
                    continue;
                }
            }
            // A pending date inside the week blocks its weekly post
            let monday = NaiveDate::from_isoywd_opt(year, week, chrono::Weekday::Mon);
            let has_pending = monday.is_some_and(|monday| {
                (0..7)
                    .map(|d| monday + chrono::Duration::days(d))
                    .any(|date| ledger.is_pending(date))
            });
            if has_pending {
                tracing::info!(slug = %slug, "Week has pending journals, skipping weekly post");
                report.posts_skipped += 1;
                continue;
            }
            if !request.force && blog_state.is_up_to_date(&slug, &fingerprint) {
                report.posts_skipped += 1;
                continue;
            }
            let Some(context) = prepare_weekly_context(
                year,
                week,
                &week_entries,
                &memory,
                self.config.blog.min_journals_for_weekly,
            ) else {
                continue;
            };

            if request.dry_run {
                println!("[dry run] would generate weekly post {slug} from {} journals", context.source_dates.len());
                continue;
            }

            let (editorial, note_ids) = {
                let active = notes.active_for(&format!("week:{year}-W{week:02}"));
                let ids: Vec<String> = active.iter().map(|n| n.id.clone()).collect();
                (render_editorial(&active), ids)
            };

            match synthesizer.synthesize_weekly(&context, &blog_memory, &memory_context, &editorial)
            {
                Ok(generated) => {
                    self.commit_post(&generated, &mut blog_state, &mut blog_memory, &fingerprint)?;
                    for note_id in &note_ids {
                        let _ = notes.mark_used(note_id)?;
                    }
                    report.posts_generated.push(generated.post.slug.clone());
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!(slug = %slug, error = %e, "Weekly synthesis failed");
                    report.errors.push(format!("weekly {slug}: {e}"));
                },
            }
        }

        // Thematic posts
        let candidates = thematic_candidates(
            &memory,
            today,
            self.config.blog.theme_mention_min,
            |name| blog_state.is_generated(&crate::models::slugify(name)),
        );
        for candidate in candidates {
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }
            let name = &candidate.thread.name;
            if let Some(target) = &request.target_theme {
                if target != name && *target != crate::models::slugify(name) {
                    continue;
                }
            }
            let Some(context) = prepare_thematic_context(&candidate.thread, &entries) else {
                continue;
            };

            if request.dry_run {
                println!(
                    "[dry run] would generate thematic post for '{name}' from {} journals",
                    context.source_dates.len()
                );
                continue;
            }

            let (editorial, note_ids) = {
                let active = notes.active_for(&format!("theme:{}", crate::models::slugify(name)));
                let ids: Vec<String> = active.iter().map(|n| n.id.clone()).collect();
                (render_editorial(&active), ids)
            };

            match synthesizer.synthesize_thematic(
                &context,
                &blog_state,
                &blog_memory,
                &memory_context,
                &editorial,
            ) {
                Ok(generated) => {
                    self.commit_post(&generated, &mut blog_state, &mut blog_memory, &fingerprint)?;
                    for note_id in &note_ids {
                        let _ = notes.mark_used(note_id)?;
                    }
                    report.posts_generated.push(generated.post.slug.clone());
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!(theme = %name, error = %e, "Thematic synthesis failed");
                    report.errors.push(format!("thematic {name}: {e}"));
                },
            }
        }

        // Regenerate the index over everything generated so far
        if !request.dry_run {
            let index = crate::blog::formatter::format_index(&blog_state);
            self.store
                .atomic_write(&self.store.root().join("blog").join("index.md"), &index)?;
        }

        Ok(())
    }

    /// Commits one generated post: scratch write, state update, promote,
    /// blog-memory update. A crash between the scratch write and the
    /// state commit is recovered by scratch cleanup on the next open.
    fn commit_post(
        &self,
        generated: &GeneratedPost,
        blog_state: &mut crate::store::BlogState,
        blog_memory: &mut crate::store::BlogMemory,
        fingerprint: &str,
    ) -> Result<()> {
        let post = &generated.post;
        let markdown = crate::blog::formatter::format_post(post);
        let scratch = self.store.write_scratch(&format!("{}.md", post.slug), &markdown)?;
        let target = self.store.root().join("blog").join(format!("{}.md", post.slug));

        blog_state.mark_generated(BlogPostRecord {
            slug: post.slug.clone(),
            post_type: post.post_type.to_string(),
            generated_at: Utc::now(),
            source_dates: post.source_dates.clone(),
            file_path: target.display().to_string(),
            config_fingerprint: fingerprint.to_string(),
            stale: false,
        });
        self.store.commit_blog_state(blog_state)?;
        self.store.promote_scratch(&scratch, &target)?;

        blog_memory.add_post(BlogPostSummary {
            slug: post.slug.clone(),
            title: post.title.clone(),
            post_type: post.post_type.to_string(),
            date: post.date,
            key_points: post.key_points.clone(),
            themes_covered: post.themes.clone(),
            examples_used: post.examples_used.clone(),
            platforms_published: BTreeSet::new(),
        });
        self.store.commit_blog_memory(blog_memory)?;

        for diagnostic in &generated.diagnostics {
            tracing::warn!(slug = %post.slug, "{diagnostic}");
        }
        metrics::counter!("blog_posts_generated_total", "post_type" => post.post_type.as_str())
            .increment(1);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Publish
    // ---------------------------------------------------------------

    fn publish_stage(&self, report: &mut RunReport) -> Result<()> {
        let mut blog_memory = self.store.load_blog_memory();
        let mut memory = self.store.load_memory();
        let publishers = build_publishers(&self.config, &self.store);
        if publishers.is_empty() {
            return Ok(());
        }
        let timeout = Duration::from_secs(self.config.pipeline.publisher_timeout_secs);

        // Posts missing at least one configured platform
        let pending: Vec<String> = blog_memory
            .posts
            .iter()
            .filter(|summary| {
                publishers
                    .iter()
                    .any(|p| !summary.platforms_published.contains(p.platform().as_str()))
            })
            .map(|summary| summary.slug.clone())
            .collect();

        for slug in pending {
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }
            let Some(post) = self.store.load_blog_post(&slug) else {
                tracing::warn!(slug = %slug, "Post in memory but not on disk, skipping publish");
                continue;
            };
            let post = hydrate(post, &blog_memory);

            // Only the platforms this post has not reached yet
            let remaining: Vec<&dyn crate::publish::Publisher> = publishers
                .iter()
                .filter(|p| !post.platforms_published.contains(p.platform().as_str()))
                .map(|p| p.as_ref())
                .collect();

            let fanout = fan_out(&remaining, &post, timeout, &self.cancelled);
            drop(remaining);

            for receipt in &fanout.delivered {
                let platform = receipt.platform.as_str();
                blog_memory.mark_published(&slug, platform);
                let entry = report.deliveries.entry(platform.to_string()).or_insert((0, 0));
                entry.0 += 1;
            }
            for (platform, error) in &fanout.failed {
                let entry = report
                    .deliveries
                    .entry(platform.as_str().to_string())
                    .or_insert((0, 0));
                entry.1 += 1;
                report.errors.push(format!("publish {slug} to {platform}: {error}"));
            }

            if !fanout.delivered.is_empty() {
                let platforms: Vec<String> = blog_memory
                    .posts
                    .iter()
                    .find(|p| p.slug == slug)
                    .map(|p| p.platforms_published.iter().cloned().collect())
                    .unwrap_or_default();
                memory.record_published(PublishedRecord {
                    slug: slug.clone(),
                    title: post.title.clone(),
                    post_type: post.post_type.to_string(),
                    date: post.date,
                    platforms,
                });
            }
        }

        self.store.commit_blog_memory(&blog_memory)?;
        self.store.commit_memory(&memory)?;
        Ok(())
    }
}

/// Fills a reconstructed post's dedup and platform fields from memory.
fn hydrate(mut post: BlogPost, blog_memory: &crate::store::BlogMemory) -> BlogPost {
    if let Some(summary) = blog_memory.posts.iter().find(|p| p.slug == post.slug) {
        post.key_points = summary.key_points.clone();
        post.examples_used = summary.examples_used.clone();
        post.platforms_published = summary.platforms_published.clone();
    }
    post
}

/// Applies a memory extraction to the unified memory.
fn apply_extraction(
    memory: &mut crate::models::UnifiedMemory,
    entry: &JournalEntry,
    extraction: Option<&crate::journal::MemoryExtraction>,
) {
    let session_ids: Vec<String> = entry.source_session_ids.iter().map(ToString::to_string).collect();
    let mut daily = crate::models::DailyEntry {
        date: entry.date,
        session_ids,
        ..Default::default()
    };
    if let Some(extraction) = extraction {
        daily.themes = extraction.themes.clone();
        daily.insights = extraction.insights.clone();
        daily.decisions = extraction.decisions.clone();
        daily.open_questions = extraction.open_questions.clone();
    }
    memory.record_daily(daily);

    if let Some(extraction) = extraction {
        let threads: Vec<(String, String)> = extraction
            .threads
            .iter()
            .map(|t| (t.name.clone(), t.summary.clone()))
            .collect();
        memory.update_threads(&threads, entry.date);
        for entity in &extraction.entities {
            memory.update_entity(&entity.name, &entity.entity_type, entry.date, "");
        }
    }
}

/// Renders active editorial notes as a prompt block.
fn render_editorial(notes: &[&crate::models::EditorialNote]) -> String {
    if notes.is_empty() {
        return String::new();
    }
    let mut lines = vec!["## Editorial Direction".to_string(), String::new()];
    for note in notes {
        lines.push(format!("- {}", note.text));
    }
    lines.join("\n")
}

/// Deterministic daily digest of ingested reading material.
fn render_digest(date: NaiveDate, items: &[ContentItem]) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push("---".to_string());
    lines.push("type: intake-digest".to_string());
    lines.push(format!("date: {date}"));
    lines.push(format!("items: {}", items.len()));
    lines.push("---".to_string());
    lines.push(String::new());
    lines.push(format!("# Reading Digest: {date}"));
    lines.push(String::new());

    let mut by_source: BTreeMap<&str, Vec<&ContentItem>> = BTreeMap::new();
    for item in items {
        by_source.entry(item.source.as_str()).or_default().push(item);
    }
    for (source, source_items) in by_source {
        lines.push(format!("## {source}"));
        lines.push(String::new());
        for item in source_items {
            let mut line = format!("- {}", item.title);
            if let Some(url) = &item.url {
                line.push_str(&format!(" ({url})"));
            }
            lines.push(line);
            if !item.excerpt.is_empty() {
                lines.push(format!("  > {}", item.excerpt));
            }
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_digest_groups_by_source() {
        use crate::models::{ContentKind, ItemId};
        let date = NaiveDate::from_ymd_opt(2026, 2, 8).unwrap();
        let item = ContentItem {
            id: ItemId::new("rss:x"),
            source: ContentSource::Rss,
            kind: ContentKind::Article,
            title: "An Article".to_string(),
            body: String::new(),
            excerpt: "short excerpt".to_string(),
            url: Some("https://example.com/a".to_string()),
            author: None,
            site_name: None,
            published_at: None,
            ingested_at: Utc::now(),
            tags: Default::default(),
            topics: Default::default(),
            project: None,
            metadata: Default::default(),
        };
        let digest = render_digest(date, &[item]);
        assert!(digest.contains("# Reading Digest: 2026-02-08"));
        assert!(digest.contains("## rss"));
        assert!(digest.contains("- An Article (https://example.com/a)"));
        assert!(digest.contains("> short excerpt"));
    }

    #[test]
    fn test_render_editorial_block() {
        let note = crate::models::EditorialNote::new("focus on the merge story", "");
        let rendered = render_editorial(&[&note]);
        assert!(rendered.contains("## Editorial Direction"));
        assert!(rendered.contains("- focus on the merge story"));
        assert_eq!(render_editorial(&[]), "");
    }

    #[test]
    fn test_stage_set_default_excludes_publish() {
        let stages = StageSet::default();
        assert!(stages.ingest && stages.journal && stages.blog);
        assert!(!stages.publish);
    }
}

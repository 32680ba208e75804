//! Crawl engine - runs the worker pool over the shared frontier
//!
//! This module contains the main crawl loop, including:
//! - Seeding the frontier and visited set
//! - Spawning `worker_count` workers that fetch, extract and enqueue links
//! - Retrying transient fetch failures
//! - Catching worker panics and respawning the worker
//! - Handling cancellation and aborts
//! - Building the final [`CrawlSummary`]

use crate::config::CrawlConfig;
use crate::crawler::extractor::extract_page;
use crate::crawler::fetcher::{FetchError, HttpFetcher, RawPage};
use crate::crawler::frontier::{Frontier, FrontierEntry, Next};
use crate::crawler::identity::{IdentityProvider, RotatingUserAgents};
use crate::crawler::visited::VisitedSet;
use crate::output::{CrawlSummary, PageRecord, Sink, SinkError};
use crate::state::{PageStatus, RunState};
use crate::url::normalize_parsed;
use crate::{ConfigError, TrawlError};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Log a progress line every this many records
const PROGRESS_INTERVAL: u64 = 10;

/// Run counters shared by all workers
#[derive(Debug, Default)]
struct Counters {
    visited: AtomicU64,
    succeeded: AtomicU64,
    fetch_failures: AtomicU64,
    parse_failures: AtomicU64,
    duplicates: AtomicU64,
    sink_failures: AtomicU64,
    worker_restarts: AtomicU64,
    depths: Mutex<BTreeMap<u32, u64>>,
}

/// Everything a worker needs, shared through one `Arc`
struct Shared {
    config: Arc<CrawlConfig>,
    frontier: Frontier,
    visited: VisitedSet,
    fetcher: HttpFetcher,
    sink: Arc<dyn Sink>,
    counters: Counters,
    /// Stops the workers; child of the external cancel token
    stop: CancellationToken,
    /// Set once by the first fatal error
    abort_reason: OnceLock<String>,
}

impl Shared {
    /// Records a fatal error and stops every worker
    fn abort(&self, error: &TrawlError) {
        let reason = error.to_string();
        if self.abort_reason.set(reason.clone()).is_ok() {
            tracing::error!("Aborting crawl: {}", reason);
        }
        self.stop.cancel();
    }
}

/// Why a worker task returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerExit {
    /// The frontier ran dry
    Finished,
    /// The run was stopped
    Stopped,
    /// A panic was caught while processing an entry
    Faulted,
}

/// Breadth-first crawler over a pool of concurrent workers
///
/// # Example
///
/// ```no_run
/// use meta_trawl::config::CrawlConfig;
/// use meta_trawl::crawler::Engine;
/// use meta_trawl::output::MemorySink;
/// use std::sync::Arc;
/// use url::Url;
///
/// # async fn run() -> Result<(), meta_trawl::TrawlError> {
/// let config = CrawlConfig::new(vec![Url::parse("https://example.com/").unwrap()]);
/// let sink = Arc::new(MemorySink::new());
/// let mut engine = Engine::new(config, sink.clone())?;
/// let summary = engine.run().await?;
/// println!("visited {} pages", summary.visited);
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    state: RunState,
}

impl Engine {
    /// Creates an engine that rotates through the configured user agents
    pub fn new(config: CrawlConfig, sink: Arc<dyn Sink>) -> Result<Self, TrawlError> {
        let identity = Arc::new(RotatingUserAgents::new(config.user_agents.clone()));
        Self::with_identity(config, sink, identity)
    }

    /// Creates an engine with a caller-supplied identity provider
    pub fn with_identity(
        config: CrawlConfig,
        sink: Arc<dyn Sink>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, TrawlError> {
        if config.seed_urls.is_empty() {
            return Err(TrawlError::NoSeeds);
        }
        if config.worker_count == 0 {
            return Err(ConfigError::Validation("worker count must be at least 1".to_string()).into());
        }

        let fetcher = HttpFetcher::new(&config, identity)?;
        let cancel = CancellationToken::new();

        let shared = Shared {
            frontier: Frontier::from_config(&config),
            visited: VisitedSet::new(),
            fetcher,
            sink,
            counters: Counters::default(),
            stop: cancel.child_token(),
            abort_reason: OnceLock::new(),
            config: Arc::new(config),
        };

        Ok(Self {
            shared: Arc::new(shared),
            cancel,
            state: RunState::Idle,
        })
    }

    /// Token that stops the run when cancelled
    ///
    /// Workers finish the fetch they are in the middle of; everything still
    /// queued is dropped and counted as skipped.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Runs the crawl to completion, cancellation or abort
    ///
    /// Returns `Err` only when the run cannot start (for instance when it
    /// has already been run). Fatal errors during the run are reported as a
    /// summary with status [`RunState::Aborted`].
    pub async fn run(&mut self) -> Result<CrawlSummary, TrawlError> {
        let started_at = Utc::now();
        let start_time = std::time::Instant::now();
        self.state.transition(RunState::Running)?;

        let config = Arc::clone(&self.shared.config);
        tracing::info!(
            "Starting crawl: {} seeds, {} workers, depth limit {}",
            config.seed_urls.len(),
            config.worker_count,
            if config.depth_limit_enabled {
                config.max_depth.to_string()
            } else {
                "off".to_string()
            }
        );

        if let Err(e) = self.seed() {
            self.shared.abort(&e);
        }

        let mut workers = JoinSet::new();
        for id in 0..config.worker_count {
            workers.spawn(worker_loop(id, Arc::clone(&self.shared)));
        }
        let mut next_id = config.worker_count;

        while let Some(joined) = workers.join_next().await {
            let respawn = match joined {
                Ok((id, WorkerExit::Finished)) => {
                    tracing::debug!("Worker {} finished", id);
                    if self.state == RunState::Running {
                        tracing::info!("Frontier exhausted, waiting for workers to exit");
                        self.state.transition(RunState::Draining)?;
                    }
                    false
                }
                Ok((id, WorkerExit::Stopped)) => {
                    tracing::debug!("Worker {} stopped", id);
                    false
                }
                Ok((id, WorkerExit::Faulted)) => {
                    tracing::warn!("Worker {} faulted", id);
                    true
                }
                Err(e) => {
                    tracing::error!("Worker task failed: {}", e);
                    e.is_panic()
                }
            };

            if respawn && !self.shared.stop.is_cancelled() {
                self.shared
                    .counters
                    .worker_restarts
                    .fetch_add(1, Ordering::Relaxed);
                tracing::info!("Respawning worker as {}", next_id);
                workers.spawn(worker_loop(next_id, Arc::clone(&self.shared)));
                next_id += 1;
            }
        }

        let mut skipped = 0;
        if self.shared.stop.is_cancelled() {
            match self.shared.frontier.drain() {
                Ok(dropped) => skipped = dropped as u64,
                Err(e) => self.shared.abort(&e),
            }
        }

        let status = if self.shared.abort_reason.get().is_some() {
            RunState::Aborted
        } else if self.shared.stop.is_cancelled() {
            RunState::Cancelled
        } else {
            if self.state == RunState::Running {
                self.state.transition(RunState::Draining)?;
            }
            RunState::Done
        };
        self.state.transition(status)?;

        if let Err(e) = self.shared.sink.flush() {
            tracing::error!("Failed to flush sink: {}", e);
        }

        let summary = self.build_summary(started_at, skipped);
        tracing::info!(
            "Crawl {} in {:.2}s: {} visited, {} succeeded, {} failed, {} skipped",
            summary.status,
            start_time.elapsed().as_secs_f64(),
            summary.visited,
            summary.succeeded,
            summary.failed(),
            summary.skipped
        );

        Ok(summary)
    }

    /// Marks every seed visited and queues it at depth 0
    fn seed(&self) -> Result<(), TrawlError> {
        for seed in &self.shared.config.seed_urls {
            let url = normalize_parsed(seed.clone())?;
            if self.shared.visited.try_mark_visited(&url)? {
                tracing::debug!("Seeded {}", url);
                self.shared.frontier.push(FrontierEntry::seed(url))?;
            } else {
                tracing::debug!("Duplicate seed {}", url);
                self.shared
                    .counters
                    .duplicates
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    fn build_summary(&self, started_at: chrono::DateTime<Utc>, skipped: u64) -> CrawlSummary {
        let counters = &self.shared.counters;
        let mut summary = CrawlSummary::new(started_at);

        summary.status = self.state;
        summary.abort_reason = self.shared.abort_reason.get().cloned();
        summary.finished_at = Utc::now();
        summary.visited = counters.visited.load(Ordering::Relaxed);
        summary.succeeded = counters.succeeded.load(Ordering::Relaxed);
        summary.fetch_failures = counters.fetch_failures.load(Ordering::Relaxed);
        summary.parse_failures = counters.parse_failures.load(Ordering::Relaxed);
        summary.skipped = skipped;
        summary.depth_rejected = self.shared.frontier.depth_rejected();
        summary.duplicates = counters.duplicates.load(Ordering::Relaxed);
        summary.sink_failures = counters.sink_failures.load(Ordering::Relaxed);
        summary.worker_restarts = counters.worker_restarts.load(Ordering::Relaxed);
        if let Ok(depths) = counters.depths.lock() {
            summary.depth_breakdown = depths.clone();
        }

        summary
    }
}

/// One worker: pull, process, complete, until the frontier runs dry or the run stops
async fn worker_loop(id: usize, shared: Arc<Shared>) -> (usize, WorkerExit) {
    tracing::trace!("Worker {} started", id);

    loop {
        if shared.stop.is_cancelled() {
            return (id, WorkerExit::Stopped);
        }

        let next = tokio::select! {
            biased;
            _ = shared.stop.cancelled() => return (id, WorkerExit::Stopped),
            next = shared.frontier.next(shared.config.pop_timeout) => next,
        };

        let entry = match next {
            Ok(Next::Entry(entry)) => entry,
            Ok(Next::Exhausted) => return (id, WorkerExit::Finished),
            Err(e) => {
                shared.abort(&e);
                return (id, WorkerExit::Stopped);
            }
        };

        let outcome = AssertUnwindSafe(process_entry(&shared, &entry))
            .catch_unwind()
            .await;

        let exit = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                shared.abort(&e);
                Some(WorkerExit::Stopped)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    "Worker {} panicked on {} (depth {}): {}",
                    id,
                    entry.url,
                    entry.depth,
                    message
                );
                if let Err(e) = emit(&shared, PageRecord::worker_fault(&entry, &message)).await {
                    shared.abort(&e);
                }
                Some(WorkerExit::Faulted)
            }
        };

        if let Err(e) = shared.frontier.complete() {
            shared.abort(&e);
            return (id, WorkerExit::Stopped);
        }

        if let Some(exit) = exit {
            return (id, exit);
        }
    }
}

/// Fetches and extracts one entry, queues its links and emits its record
///
/// Per-URL failures become records. Only failures of shared state are
/// returned as errors.
async fn process_entry(shared: &Shared, entry: &FrontierEntry) -> Result<(), TrawlError> {
    let record = match fetch_with_retry(shared, entry).await {
        Err(e) => {
            tracing::warn!("Failed to fetch {} (depth {}): {}", entry.url, entry.depth, e.cause);
            PageRecord::fetch_failed(entry, &e)
        }
        Ok(raw) => match extract_page(&raw) {
            Err(e) => {
                tracing::warn!("Failed to parse {} (depth {}): {}", entry.url, entry.depth, e);
                PageRecord::parse_failed(entry, raw.status_code, &e)
            }
            Ok(page) => {
                let queued = enqueue_links(shared, entry, &page.links)?;
                tracing::info!(
                    "Fetched {} (depth {}): {} links, {} new",
                    entry.url,
                    entry.depth,
                    page.links.len(),
                    queued
                );
                PageRecord::success(entry, raw.status_code, &page)
            }
        },
    };

    emit(shared, record).await
}

/// Fetches with up to `fetch_retries` extra attempts for transient failures
async fn fetch_with_retry(shared: &Shared, entry: &FrontierEntry) -> Result<RawPage, FetchError> {
    let retries = shared.config.fetch_retries;
    let mut attempt = 0;

    loop {
        attempt += 1;
        tracing::debug!("Fetching {} (depth {}, attempt {})", entry.url, entry.depth, attempt);

        let error = match shared.fetcher.fetch(&entry.url).await {
            Ok(raw) => return Ok(raw),
            Err(e) => e,
        };

        if attempt > retries || !error.cause.is_transient() || shared.stop.is_cancelled() {
            return Err(error);
        }

        tracing::debug!(
            "Retrying {} after {}: attempt {} of {}",
            entry.url,
            error.cause,
            attempt + 1,
            retries + 1
        );

        tokio::select! {
            _ = tokio::time::sleep(shared.config.retry_backoff) => {}
            _ = shared.stop.cancelled() => return Err(error),
        }
    }
}

/// Claims and queues each discovered link, returning how many were queued
fn enqueue_links(shared: &Shared, entry: &FrontierEntry, links: &[Url]) -> Result<usize, TrawlError> {
    let mut queued = 0;

    for link in links {
        let url = match normalize_parsed(link.clone()) {
            Ok(url) => url,
            Err(e) => {
                tracing::trace!("Skipping link {}: {}", link, e);
                continue;
            }
        };

        // Checked before claiming, so a link first seen too deep can still
        // be scheduled from a shallower page
        if !shared.frontier.check_depth(entry.depth + 1) {
            tracing::trace!("Link {} beyond depth limit", url);
            continue;
        }

        if !shared.visited.try_mark_visited(&url)? {
            tracing::trace!("Already scheduled {}", url);
            shared.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        if shared.frontier.push(entry.child(url))? {
            queued += 1;
        }
    }

    Ok(queued)
}

/// Hands a record to the sink, then counts it
async fn emit(shared: &Shared, record: PageRecord) -> Result<(), TrawlError> {
    let written = write_with_retry(shared, &record).await;

    let counters = &shared.counters;
    match record.status {
        PageStatus::Success => counters.succeeded.fetch_add(1, Ordering::Relaxed),
        PageStatus::FetchError => counters.fetch_failures.fetch_add(1, Ordering::Relaxed),
        PageStatus::ParseError => counters.parse_failures.fetch_add(1, Ordering::Relaxed),
    };
    if let Ok(mut depths) = counters.depths.lock() {
        *depths.entry(record.depth).or_insert(0) += 1;
    }

    let visited = counters.visited.fetch_add(1, Ordering::Relaxed) + 1;
    if visited % PROGRESS_INTERVAL == 0 {
        tracing::info!(
            "Progress: {} pages crawled, {} in frontier",
            visited,
            shared.frontier.len().unwrap_or(0)
        );
    }

    written
}

/// Writes a record to every sink destination, retrying the failed ones once
///
/// Destinations that accepted the record on the first pass are not written
/// again. A record still rejected after `sink_retry_backoff` is dropped.
async fn write_with_retry(shared: &Shared, record: &PageRecord) -> Result<(), TrawlError> {
    let all: Vec<usize> = (0..shared.sink.destinations()).collect();
    let failed = write_destinations(shared, record, &all)?;
    if failed.is_empty() {
        return Ok(());
    }

    for (destination, e) in &failed {
        tracing::warn!(
            "Sink write failed for {} (destination {}), retrying: {}",
            record.url,
            destination,
            e
        );
    }
    tokio::time::sleep(shared.config.sink_retry_backoff).await;

    let retry: Vec<usize> = failed.iter().map(|(destination, _)| *destination).collect();
    let failed = write_destinations(shared, record, &retry)?;
    if failed.is_empty() {
        return Ok(());
    }

    for (destination, e) in &failed {
        tracing::error!(
            "Dropping {} record for {} (destination {}) after retry: {}",
            record.status.to_db_string(),
            record.url,
            destination,
            e
        );
    }
    shared
        .counters
        .sink_failures
        .fetch_add(1, Ordering::Relaxed);
    Ok(())
}

/// Writes to each listed destination and returns the ones that failed
///
/// A panicking sink counts as a failed write. `Unavailable` stops the pass.
fn write_destinations(
    shared: &Shared,
    record: &PageRecord,
    destinations: &[usize],
) -> Result<Vec<(usize, SinkError)>, TrawlError> {
    let mut failed = Vec::new();

    for &destination in destinations {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            shared.sink.write_to(destination, record)
        }))
        .unwrap_or_else(|payload| Err(SinkError::Panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(()) => {}
            Err(SinkError::Unavailable(reason)) => {
                return Err(SinkError::Unavailable(reason).into());
            }
            Err(e) => failed.push((destination, e)),
        }
    }

    Ok(failed)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

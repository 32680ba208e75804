//! The crawl frontier: a FIFO queue of URLs awaiting processing
//!
//! This module handles:
//! - Breadth-first (FIFO) ordering of pending entries
//! - Depth-limit admission policy
//! - Tracking how many workers are mid-flight, so that "queue empty and
//!   nobody working" is decided in one locked step
//! - Waking idle workers when work arrives or the crawl runs dry

use crate::config::CrawlConfig;
use crate::TrawlError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Normalized URL to fetch
    pub url: Url,

    /// Link hops from the originating seed
    pub depth: u32,

    /// Page the link was found on; None for seeds
    pub source: Option<Url>,
}

impl FrontierEntry {
    /// Creates a depth-0 entry for a seed URL
    pub fn seed(url: Url) -> Self {
        Self {
            url,
            depth: 0,
            source: None,
        }
    }

    /// Creates the entry for a link found on this entry's page
    pub fn child(&self, url: Url) -> Self {
        Self {
            url,
            depth: self.depth + 1,
            source: Some(self.url.clone()),
        }
    }
}

/// Result of asking the frontier for work
#[derive(Debug, PartialEq, Eq)]
pub enum Next {
    /// An entry to process; the caller is now counted as in-flight and
    /// must call [`Frontier::complete`] when done with it
    Entry(FrontierEntry),

    /// Queue is empty and no worker is in-flight; the crawl is finished
    Exhausted,
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<FrontierEntry>,
    in_flight: usize,
    exhausted: bool,
}

/// Thread-safe FIFO work queue shared by all workers
#[derive(Debug)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    notify: Notify,
    max_depth: u32,
    depth_limit_enabled: bool,
    depth_rejected: AtomicU64,
}

impl Frontier {
    /// Creates an empty frontier with the given depth policy
    pub fn new(max_depth: u32, depth_limit_enabled: bool) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            notify: Notify::new(),
            max_depth,
            depth_limit_enabled,
            depth_rejected: AtomicU64::new(0),
        }
    }

    /// Creates an empty frontier using the run's depth policy
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(config.max_depth, config.depth_limit_enabled)
    }

    /// Checks the depth policy, counting a rejection when it fails
    pub fn check_depth(&self, depth: u32) -> bool {
        if self.depth_limit_enabled && depth > self.max_depth {
            self.depth_rejected.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Appends an entry to the back of the queue
    ///
    /// Returns `Ok(false)` without queueing when the entry is deeper than
    /// the depth limit allows.
    pub fn push(&self, entry: FrontierEntry) -> Result<bool, TrawlError> {
        if !self.check_depth(entry.depth) {
            tracing::trace!(
                "Rejected {} at depth {} (max {})",
                entry.url,
                entry.depth,
                self.max_depth
            );
            return Ok(false);
        }

        self.lock()?.queue.push_back(entry);
        self.notify.notify_waiters();
        Ok(true)
    }

    /// Removes the entry at the front of the queue, if any
    ///
    /// Unlike [`Frontier::next`], this does not count the caller as in-flight.
    pub fn pop(&self) -> Result<Option<FrontierEntry>, TrawlError> {
        Ok(self.lock()?.queue.pop_front())
    }

    pub fn is_empty(&self) -> Result<bool, TrawlError> {
        Ok(self.lock()?.queue.is_empty())
    }

    pub fn len(&self) -> Result<usize, TrawlError> {
        Ok(self.lock()?.queue.len())
    }

    /// Number of workers currently holding an entry
    pub fn in_flight(&self) -> Result<usize, TrawlError> {
        Ok(self.lock()?.in_flight)
    }

    /// Number of entries refused by the depth policy
    pub fn depth_rejected(&self) -> u64 {
        self.depth_rejected.load(Ordering::Relaxed)
    }

    /// Waits for the next entry or for the crawl to run dry
    ///
    /// Popping, the in-flight increment and the exhaustion check happen in
    /// a single locked step, so a worker can never observe "empty" while
    /// another worker is about to push. When the queue is empty but other
    /// workers are mid-flight the caller sleeps until woken or until `poll`
    /// elapses, then checks again.
    ///
    /// Cancel-safe: dropping the future never loses an entry.
    pub async fn next(&self, poll: Duration) -> Result<Next, TrawlError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock()?;
                if let Some(entry) = state.queue.pop_front() {
                    state.in_flight += 1;
                    return Ok(Next::Entry(entry));
                }

                if state.exhausted || state.in_flight == 0 {
                    state.exhausted = true;
                    drop(state);
                    self.notify.notify_waiters();
                    return Ok(Next::Exhausted);
                }
            }

            let _ = tokio::time::timeout(poll, notified).await;
        }
    }

    /// Marks one in-flight entry as finished
    pub fn complete(&self) -> Result<(), TrawlError> {
        let mut state = self.lock()?;
        state.in_flight = state.in_flight.saturating_sub(1);
        let idle = state.in_flight == 0 && state.queue.is_empty();
        drop(state);

        if idle {
            self.notify.notify_waiters();
        }
        Ok(())
    }

    /// Discards every queued entry, returning how many were dropped
    pub fn drain(&self) -> Result<usize, TrawlError> {
        let mut state = self.lock()?;
        let dropped = state.queue.len();
        state.queue.clear();
        drop(state);

        self.notify.notify_waiters();
        Ok(dropped)
    }

    fn lock(&self) -> Result<MutexGuard<'_, FrontierState>, TrawlError> {
        self.state
            .lock()
            .map_err(|e| TrawlError::StateUnavailable(format!("frontier lock poisoned: {}", e)))
    }
}

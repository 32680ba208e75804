//! Visited-set tracking for deduplication
//!
//! A URL is claimed at the moment it is accepted for scheduling, before it
//! is fetched, so two workers that discover the same link concurrently
//! cannot both schedule it.

use crate::TrawlError;
use std::collections::HashSet;
use std::sync::Mutex;
use url::Url;

/// Thread-safe set of normalized URLs that have been scheduled
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically inserts `url` if absent
    ///
    /// Returns `Ok(true)` if this caller claimed the URL and now owns the
    /// right to schedule it, `Ok(false)` if it was already claimed. The
    /// membership check and the insert happen under one lock acquisition.
    ///
    /// `url` is expected to be normalized already.
    pub fn try_mark_visited(&self, url: &Url) -> Result<bool, TrawlError> {
        let mut urls = self.lock()?;
        Ok(urls.insert(url.as_str().to_string()))
    }

    /// Returns true if `url` has been claimed
    pub fn contains(&self, url: &Url) -> Result<bool, TrawlError> {
        Ok(self.lock()?.contains(url.as_str()))
    }

    /// Number of URLs claimed so far
    pub fn len(&self) -> Result<usize, TrawlError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, TrawlError> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashSet<String>>, TrawlError> {
        self.urls
            .lock()
            .map_err(|e| TrawlError::StateUnavailable(format!("visited set lock poisoned: {}", e)))
    }
}

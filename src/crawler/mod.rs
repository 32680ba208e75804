//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with per-request user agents
//! - HTML metadata and link extraction
//! - The shared frontier and visited set
//! - The worker-pool engine that ties them together

mod engine;
mod extractor;
mod fetcher;
mod frontier;
mod identity;
mod visited;

pub use engine::Engine;
pub use extractor::{extract, extract_page, ExtractedPage, ParseError};
pub use fetcher::{build_http_client, FetchCause, FetchError, HttpFetcher, RawPage};
pub use frontier::{Frontier, FrontierEntry, Next};
pub use identity::{FixedUserAgent, IdentityProvider, RotatingUserAgents, DEFAULT_USER_AGENTS};
pub use visited::VisitedSet;

use crate::config::CrawlConfig;
use crate::output::{CrawlSummary, Sink};
use crate::TrawlError;
use std::sync::Arc;

/// Runs a complete crawl and returns its summary
///
/// This is the main entry point for embedding the crawler. It will:
/// 1. Build the HTTP client and user agent rotation
/// 2. Seed the frontier
/// 3. Fetch, extract and follow links breadth-first
/// 4. Hand one record per page to `sink`
pub async fn crawl(config: CrawlConfig, sink: Arc<dyn Sink>) -> Result<CrawlSummary, TrawlError> {
    Engine::new(config, sink)?.run().await
}

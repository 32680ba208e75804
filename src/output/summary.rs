//! End-of-run crawl summary

use crate::state::RunState;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Counters and metadata describing one finished run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    // Run metadata
    pub status: RunState,
    pub abort_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config_hash: Option<String>,

    /// Records produced, one per accepted entry
    pub visited: u64,
    pub succeeded: u64,
    pub fetch_failures: u64,
    pub parse_failures: u64,

    /// Entries left in the frontier when the run stopped early
    pub skipped: u64,

    /// Links refused by the depth limit
    pub depth_rejected: u64,

    /// Links (and seeds) that were already scheduled
    pub duplicates: u64,

    /// Records dropped after the sink failed twice
    pub sink_failures: u64,

    pub worker_restarts: u64,

    // Records per depth
    pub depth_breakdown: BTreeMap<u32, u64>,
}

impl CrawlSummary {
    /// Creates an empty summary for a run that started at `started_at`
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            status: RunState::Idle,
            abort_reason: None,
            started_at,
            finished_at: started_at,
            config_hash: None,
            visited: 0,
            succeeded: 0,
            fetch_failures: 0,
            parse_failures: 0,
            skipped: 0,
            depth_rejected: 0,
            duplicates: 0,
            sink_failures: 0,
            worker_restarts: 0,
            depth_breakdown: BTreeMap::new(),
        }
    }

    /// Returns the number of records that are not successes
    pub fn failed(&self) -> u64 {
        self.fetch_failures + self.parse_failures
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.visited == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / self.visited as f64) * 100.0
    }
}

/// Prints the summary to stdout in a formatted manner
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Run:");
    println!("  Status: {}", summary.status);
    if let Some(reason) = &summary.abort_reason {
        println!("  Abort reason: {}", reason);
    }
    println!("  Duration: {:.1}s", summary.duration().num_milliseconds() as f64 / 1000.0);
    println!();

    println!("Pages:");
    println!("  Visited: {}", summary.visited);
    println!("  Succeeded: {}", summary.succeeded);
    println!(
        "  Failed: {} ({} fetch, {} parse)",
        summary.failed(),
        summary.fetch_failures,
        summary.parse_failures
    );
    println!();

    println!("Links:");
    println!("  Duplicates: {}", summary.duplicates);
    println!("  Beyond depth limit: {}", summary.depth_rejected);
    println!("  Skipped: {}", summary.skipped);
    println!();

    if summary.sink_failures > 0 || summary.worker_restarts > 0 {
        println!("Faults:");
        println!("  Records dropped by sink: {}", summary.sink_failures);
        println!("  Worker restarts: {}", summary.worker_restarts);
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages)",
        summary.success_rate(),
        summary.succeeded,
        summary.visited
    );
}

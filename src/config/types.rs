use crate::url::validate_seed_url;
use crate::TrawlError;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Main configuration structure for Meta-Trawl, as read from TOML
///
/// Every section is optional; missing keys take the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Seed URLs to start crawling from
    #[serde(default)]
    pub seeds: Vec<String>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Whether `max-depth` is enforced at all
    #[serde(rename = "depth-limit-enabled", default = "default_depth_limit_enabled")]
    pub depth_limit_enabled: bool,

    /// Maximum number of link hops from a seed
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Number of concurrent workers
    #[serde(rename = "worker-count", default = "default_worker_count")]
    pub worker_count: usize,

    /// Whole-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// TCP/TLS connect timeout (milliseconds)
    #[serde(rename = "connect-timeout-ms", default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// How long an idle worker waits for new frontier work before re-checking (milliseconds)
    #[serde(rename = "pop-timeout-ms", default = "default_pop_timeout_ms")]
    pub pop_timeout_ms: u64,

    /// Extra fetch attempts for transient failures (timeouts, connect errors, 5xx)
    #[serde(rename = "fetch-retries", default)]
    pub fetch_retries: u32,

    /// Delay between fetch attempts (milliseconds)
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Response bodies are truncated to this many bytes
    #[serde(rename = "max-body-bytes", default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// User agent rotation configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserAgentConfig {
    /// Pool of user agent strings; empty means the built-in browser pool
    #[serde(default)]
    pub agents: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the CSV output file
    #[serde(rename = "csv-path", default = "default_csv_path")]
    pub csv_path: String,

    /// Whether fetch failures are written as CSV rows
    #[serde(rename = "include-failures", default)]
    pub include_failures: bool,

    /// Optional SQLite database receiving every page record
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,

    /// Optional markdown summary written at the end of the run
    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,

    /// Delay before the single retry of a failed sink write (milliseconds)
    #[serde(rename = "sink-retry-backoff-ms", default = "default_sink_retry_backoff_ms")]
    pub sink_retry_backoff_ms: u64,
}

fn default_depth_limit_enabled() -> bool {
    true
}

fn default_max_depth() -> u32 {
    2
}

fn default_worker_count() -> usize {
    8
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_pop_timeout_ms() -> u64 {
    50
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_max_body_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_csv_path() -> String {
    "crawled_data.csv".to_string()
}

fn default_sink_retry_backoff_ms() -> u64 {
    100
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            depth_limit_enabled: default_depth_limit_enabled(),
            max_depth: default_max_depth(),
            worker_count: default_worker_count(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            pop_timeout_ms: default_pop_timeout_ms(),
            fetch_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            include_failures: false,
            database_path: None,
            summary_path: None,
            sink_retry_backoff_ms: default_sink_retry_backoff_ms(),
        }
    }
}

/// Immutable per-run crawl settings
///
/// Built once before the run starts and shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub max_depth: u32,
    pub depth_limit_enabled: bool,
    pub worker_count: usize,
    /// Normalized seeds, in the order given
    pub seed_urls: Vec<Url>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub pop_timeout: Duration,
    pub fetch_retries: u32,
    pub retry_backoff: Duration,
    pub sink_retry_backoff: Duration,
    pub max_body_bytes: usize,
    /// Empty means the built-in pool
    pub user_agents: Vec<String>,
}

impl CrawlConfig {
    /// Creates a crawl configuration with default tuning for the given seeds
    pub fn new(seed_urls: Vec<Url>) -> Self {
        let crawler = CrawlerConfig::default();
        let output = OutputConfig::default();
        Self::assemble(&crawler, &output, Vec::new(), seed_urls)
    }

    /// Builds the run configuration from a file configuration and raw seed strings
    ///
    /// Every seed is validated and normalized here so that invalid input is
    /// rejected before any crawling begins.
    pub fn from_config(config: &Config, seeds: &[String]) -> Result<Self, TrawlError> {
        if seeds.is_empty() {
            return Err(TrawlError::NoSeeds);
        }

        let seed_urls = seeds
            .iter()
            .map(|seed| validate_seed_url(seed))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::assemble(
            &config.crawler,
            &config.output,
            config.user_agent.agents.clone(),
            seed_urls,
        ))
    }

    fn assemble(
        crawler: &CrawlerConfig,
        output: &OutputConfig,
        user_agents: Vec<String>,
        seed_urls: Vec<Url>,
    ) -> Self {
        Self {
            max_depth: crawler.max_depth,
            depth_limit_enabled: crawler.depth_limit_enabled,
            worker_count: crawler.worker_count,
            seed_urls,
            request_timeout: Duration::from_millis(crawler.request_timeout_ms),
            connect_timeout: Duration::from_millis(crawler.connect_timeout_ms),
            pop_timeout: Duration::from_millis(crawler.pop_timeout_ms),
            fetch_retries: crawler.fetch_retries,
            retry_backoff: Duration::from_millis(crawler.retry_backoff_ms),
            sink_retry_backoff: Duration::from_millis(output.sink_retry_backoff_ms),
            max_body_bytes: crawler.max_body_bytes,
            user_agents,
        }
    }
}

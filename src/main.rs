//! Meta-Trawl main entry point
//!
//! This is the command-line interface for the Meta-Trawl metadata crawler.

use anyhow::Context;
use clap::Parser;
use meta_trawl::config::{load_config_with_hash, validate, Config, CrawlConfig};
use meta_trawl::crawler::Engine;
use meta_trawl::output::{
    generate_markdown_summary, print_summary, CsvSink, MultiSink, Sink, SqliteSink,
};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Meta-Trawl: a depth-bounded metadata crawler
///
/// Meta-Trawl crawls breadth-first from a set of seed URLs, following links
/// up to a maximum depth, and writes each page's title, description and
/// keywords to a CSV file.
#[derive(Parser, Debug)]
#[command(name = "meta-trawl")]
#[command(version)]
#[command(about = "A depth-bounded metadata crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Seed URL to start from (repeatable)
    #[arg(long = "seed", value_name = "URL")]
    seeds: Vec<String>,

    /// File with one seed URL per line
    #[arg(long, value_name = "FILE")]
    seeds_file: Option<PathBuf>,

    /// Maximum number of link hops from a seed
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// Follow links without a depth limit
    #[arg(long, conflicts_with = "max_depth")]
    no_depth_limit: bool,

    /// Number of concurrent workers
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// CSV output path
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,

    /// Also record every page in this SQLite database
    #[arg(long, value_name = "FILE")]
    database: Option<String>,

    /// Write a markdown summary to this file
    #[arg(long, value_name = "FILE")]
    summary: Option<String>,

    /// Append log output to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and seeds and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("meta_trawl=info,warn"),
            1 => EnvFilter::new("meta_trawl=debug,info"),
            2 => EnvFilter::new("meta_trawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Load and validate configuration
    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    apply_overrides(&mut config, &cli);
    validate(&config).context("invalid configuration")?;

    let seeds = collect_seeds(&config, &cli)?;
    let crawl_config = CrawlConfig::from_config(&config, &seeds)?;

    if cli.dry_run {
        print_plan(&config, &crawl_config);
        return Ok(ExitCode::SUCCESS);
    }

    // Build sinks
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
    let csv = CsvSink::create(Path::new(&config.output.csv_path), config.output.include_failures)
        .with_context(|| format!("failed to create {}", config.output.csv_path))?;
    sinks.push(Box::new(csv));

    let database = match &config.output.database_path {
        Some(path) => {
            let hash = config_hash.as_deref().unwrap_or("none");
            let db = Arc::new(
                SqliteSink::open(Path::new(path), hash)
                    .with_context(|| format!("failed to open database {}", path))?,
            );
            sinks.push(Box::new(Arc::clone(&db)));
            Some(db)
        }
        None => None,
    };

    let mut engine = Engine::new(crawl_config, Arc::new(MultiSink::new(sinks)))?;

    let token = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            token.cancel();
        }
    });

    let mut summary = engine.run().await?;
    summary.config_hash = config_hash;

    if let Some(db) = database {
        if let Err(e) = db.finish_run(summary.status) {
            tracing::error!("Failed to record run status: {}", e);
        }
    }

    if let Some(path) = &config.output.summary_path {
        generate_markdown_summary(&summary, Path::new(path))
            .with_context(|| format!("failed to write summary {}", path))?;
        tracing::info!("Summary written to {}", path);
    }

    if !cli.quiet {
        print_summary(&summary);
    }

    Ok(ExitCode::from(summary.status.exit_code() as u8))
}

/// Applies command-line flags on top of the file configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(depth) = cli.max_depth {
        config.crawler.max_depth = depth;
        config.crawler.depth_limit_enabled = true;
    }
    if cli.no_depth_limit {
        config.crawler.depth_limit_enabled = false;
    }
    if let Some(workers) = cli.workers {
        config.crawler.worker_count = workers;
    }
    if let Some(output) = &cli.output {
        config.output.csv_path = output.clone();
    }
    if let Some(database) = &cli.database {
        config.output.database_path = Some(database.clone());
    }
    if let Some(summary) = &cli.summary {
        config.output.summary_path = Some(summary.clone());
    }
}

/// Gathers seeds from the config file, `--seed` flags and `--seeds-file`, in that order
fn collect_seeds(config: &Config, cli: &Cli) -> anyhow::Result<Vec<String>> {
    let mut seeds = config.seeds.clone();
    seeds.extend(cli.seeds.iter().cloned());

    if let Some(path) = &cli.seeds_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seeds file {}", path.display()))?;
        seeds.extend(parse_seed_lines(&content));
    }

    Ok(seeds)
}

/// One URL per line; blank lines and `#` comments are ignored
fn parse_seed_lines(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}

/// Handles the --dry-run mode: shows what would be crawled
fn print_plan(config: &Config, crawl: &CrawlConfig) {
    println!("=== Meta-Trawl Dry Run ===\n");

    println!("Crawler Configuration:");
    if crawl.depth_limit_enabled {
        println!("  Max depth: {}", crawl.max_depth);
    } else {
        println!("  Max depth: unlimited");
    }
    println!("  Workers: {}", crawl.worker_count);
    println!("  Request timeout: {}ms", crawl.request_timeout.as_millis());
    println!("  Fetch retries: {}", crawl.fetch_retries);

    println!("\nUser Agents:");
    if crawl.user_agents.is_empty() {
        println!("  built-in browser pool");
    } else {
        for agent in &crawl.user_agents {
            println!("  - {}", agent);
        }
    }

    println!("\nOutput:");
    println!("  CSV: {}", config.output.csv_path);
    if let Some(path) = &config.output.database_path {
        println!("  Database: {}", path);
    }
    if let Some(path) = &config.output.summary_path {
        println!("  Summary: {}", path);
    }

    println!("\nSeeds ({}):", crawl.seed_urls.len());
    for seed in &crawl.seed_urls {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling with {} seed URLs", crawl.seed_urls.len());
}

//! Configuration module for Meta-Trawl
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and turning them into the immutable [`CrawlConfig`] a run uses.
//!
//! # Example
//!
//! ```no_run
//! use meta_trawl::config::{load_config, CrawlConfig};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("trawl.toml")).unwrap();
//! let crawl = CrawlConfig::from_config(&config, &config.seeds).unwrap();
//! println!("Crawler will use {} workers", crawl.worker_count);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlConfig, CrawlerConfig, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

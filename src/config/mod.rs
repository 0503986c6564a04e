//! Configuration module for Frontier-Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use frontier_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Running {} workers", config.crawler.workers);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, DatabaseConfig, PaginatedSeed, SeedConfig, SourceConfig, StaticSeed,
    UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash};

//! Frontier-Crawl main entry point
//!
//! This is the command-line interface for the Frontier-Crawl corpus harvester.

use clap::Parser;
use frontier_crawl::config::{load_config_with_hash, Config, SeedConfig};
use frontier_crawl::crawler::Coordinator;
use frontier_crawl::output::{load_statistics, print_final_report, print_statistics};
use frontier_crawl::storage::open_storage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Frontier-Crawl: a polite, resumable multi-source crawler
///
/// Frontier-Crawl harvests documents from several named sources into a
/// SQLite store until each source reaches its target. Interrupted runs pick
/// up where they stopped; revisits only download pages that changed.
#[derive(Parser, Debug)]
#[command(name = "frontier-crawl")]
#[command(version)]
#[command(about = "A polite, resumable multi-source crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the crawl plan without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("frontier_crawl=info,warn"),
            1 => EnvFilter::new("frontier_crawl=debug,info"),
            2 => EnvFilter::new("frontier_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the crawl plan
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Frontier-Crawl Dry Run ===\n");

    let crawler = &config.crawler;
    println!("Crawler Configuration:");
    println!("  Workers: {}", crawler.workers);
    println!("  Request timeout: {}s", crawler.request_timeout_secs);
    println!("  Max retries: {}", crawler.max_retries);
    println!("  Delay between requests: {}ms", crawler.delay_ms);
    println!("  Retry delay: {}s", crawler.retry_delay_secs);
    println!("  Quota deferral: {}s", crawler.quota_deferral_secs);
    println!("  Revisit interval: {}s", crawler.revisit_interval_secs);

    println!("\nUser Agent: {}", config.user_agent.header_value());
    println!("Database: {}", config.database.path);

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        println!(
            "  - {} (target {}, priority {})",
            source.name, source.target, source.priority
        );
        match &source.seed {
            SeedConfig::Paginated(p) => {
                println!("    * paginated: {} list={} limit={}", p.api_url, p.list, p.limit);
            }
            SeedConfig::Static(s) => {
                for url in &s.urls {
                    println!("    * {}", url);
                }
            }
        }
        if let (true, Some(domain)) = (source.follows_links, &source.link_domain) {
            println!(
                "    follows links within {} (priority {})",
                domain, source.link_priority
            );
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl until {} documents are stored", config.total_target());

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.database.path);

    let storage = open_storage(Path::new(&config.database.path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats, config);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Sources: {}, combined target: {}",
        config.sources.len(),
        config.total_target()
    );

    let report = match Coordinator::new(config.clone())?.run().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    let storage = open_storage(Path::new(&config.database.path))?;
    let stats = load_statistics(&storage)?;
    print_final_report(&report, &stats, &config);

    Ok(())
}

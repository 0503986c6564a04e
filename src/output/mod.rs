//! Output module for store statistics and crawl reports
//!
//! This module handles:
//! - Loading document and frontier counts from the store
//! - Printing them against the configured targets (`--stats`)
//! - Printing the end-of-run report with worker counters

pub mod stats;

pub use stats::{
    format_final_report, format_statistics, load_statistics, print_final_report,
    print_statistics, CrawlStatistics,
};

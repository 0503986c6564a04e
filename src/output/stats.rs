//! Statistics generation from the crawl database
//!
//! This module provides functionality for extracting and displaying
//! store statistics and the end-of-run report.

use crate::config::Config;
use crate::crawler::{percent, CrawlReport, Outcome, WorkerStats};
use crate::state::JobStatus;
use crate::storage::Storage;
use crate::CrawlError;
use std::collections::BTreeMap;

/// Store statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Stored documents per source
    pub documents_by_source: BTreeMap<String, u64>,

    /// Total stored documents
    pub total_documents: u64,

    /// Frontier jobs per status
    pub jobs_by_status: BTreeMap<JobStatus, u64>,

    /// Frontier jobs per source
    pub jobs_by_source: BTreeMap<String, u64>,

    /// Total frontier jobs
    pub total_jobs: u64,
}

impl CrawlStatistics {
    pub fn documents(&self, source: &str) -> u64 {
        self.documents_by_source.get(source).copied().unwrap_or(0)
    }

    pub fn jobs(&self, status: JobStatus) -> u64 {
        self.jobs_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage
pub fn load_statistics<S: Storage>(storage: &S) -> Result<CrawlStatistics, CrawlError> {
    let documents_by_source = storage.documents_by_source()?;
    let jobs_by_status = storage.jobs_by_status()?;
    let jobs_by_source = storage.jobs_by_source()?;

    Ok(CrawlStatistics {
        total_documents: documents_by_source.values().sum(),
        total_jobs: jobs_by_status.values().sum(),
        documents_by_source,
        jobs_by_status,
        jobs_by_source,
    })
}

/// Renders store statistics, with progress against each configured target
///
/// Sources found in the store but no longer configured are listed without
/// a target.
pub fn format_statistics(stats: &CrawlStatistics, config: &Config) -> String {
    let mut out = String::new();

    out.push_str("Documents by Source:\n");
    for source in &config.sources {
        let current = stats.documents(&source.name);
        out.push_str(&format!(
            "  {}: {}/{} ({:.1}%)\n",
            source.name,
            current,
            source.target,
            percent(current, source.target)
        ));
    }
    for (name, count) in &stats.documents_by_source {
        if config.source(name).is_none() {
            out.push_str(&format!("  {}: {} (not configured)\n", name, count));
        }
    }
    out.push_str(&format!(
        "  Total: {}/{} ({:.1}%)\n\n",
        stats.total_documents,
        config.total_target(),
        percent(stats.total_documents, config.total_target())
    ));

    out.push_str("Queue by Status:\n");
    for status in JobStatus::all() {
        out.push_str(&format!("  {}: {}\n", status, stats.jobs(status)));
    }
    out.push_str(&format!("  Total: {}\n\n", stats.total_jobs));

    out.push_str("Queue by Source:\n");
    for (name, count) in &stats.jobs_by_source {
        out.push_str(&format!("  {}: {}\n", name, count));
    }

    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics, config: &Config) {
    println!("=== Crawl Statistics ===\n");
    print!("{}", format_statistics(stats, config));
}

fn format_worker_line(label: &str, stats: &WorkerStats) -> String {
    let counters: Vec<String> = Outcome::all()
        .iter()
        .map(|o| format!("{} {}", o, stats.total(*o)))
        .collect();
    format!(
        "  {}: {} jobs | {} | {} loop errors\n",
        label,
        stats.processed,
        counters.join(", "),
        stats.loop_errors
    )
}

/// Renders the end-of-run report: run summary, store state and worker counters
pub fn format_final_report(report: &CrawlReport, stats: &CrawlStatistics, config: &Config) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Stopped: {}\nElapsed: {:.1}s\nDocuments added this run: {}\n\n",
        report.reason,
        report.elapsed.as_secs_f64(),
        report.documents_added
    ));

    out.push_str(&format_statistics(stats, config));
    out.push('\n');

    out.push_str("Workers:\n");
    for worker in &report.workers {
        let label = match worker.worker_id {
            Some(id) => format!("worker {}", id),
            None => "worker ?".to_string(),
        };
        out.push_str(&format_worker_line(&label, worker));
    }
    out.push_str(&format_worker_line("all", &report.totals));

    let sources = report.totals.sources();
    if !sources.is_empty() {
        out.push_str("\nBy Source:\n");
        for source in sources {
            let counters: Vec<String> = Outcome::all()
                .iter()
                .map(|o| format!("{} {}", o, report.totals.get(source, *o)))
                .collect();
            out.push_str(&format!("  {}: {}\n", source, counters.join(", ")));
        }
    }

    out
}

/// Prints the end-of-run report to stdout
pub fn print_final_report(report: &CrawlReport, stats: &CrawlStatistics, config: &Config) {
    println!("\n=== Crawl Finished ===\n");
    print!("{}", format_final_report(report, stats, config));
}

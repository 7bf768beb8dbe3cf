//! Statistics from the database
//!
//! This module loads extraction statistics from the storage layer and
//! prints them for the `--stats` command.

use crate::output::OutputResult;
use crate::storage::{RunStats, Storage, OVERALL_CATEGORY};

/// Stored statistics plus the email count
#[derive(Debug, Clone)]
pub struct Statistics {
    /// Total email records in the database
    pub total_emails: u64,

    /// Statistics rows, newest run first
    pub rows: Vec<RunStats>,
}

impl Statistics {
    /// Sums the overall rows of every run
    pub fn totals(&self) -> (u64, u64, u64) {
        self.rows
            .iter()
            .filter(|row| row.category == OVERALL_CATEGORY)
            .fold((0, 0, 0), |(urls, ok, found), row| {
                (
                    urls + row.total_urls,
                    ok + row.successful_extractions,
                    found + row.total_emails_found,
                )
            })
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `category` - Restrict rows to one category
pub fn load_statistics(storage: &dyn Storage, category: Option<&str>) -> OutputResult<Statistics> {
    Ok(Statistics {
        total_emails: storage.count_emails()?,
        rows: storage.get_extraction_stats(category)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &Statistics) {
    println!("=== Extraction Statistics ===\n");

    println!("Emails in database: {}", stats.total_emails);

    let (urls, successful, found) = stats.totals();
    if urls > 0 {
        println!(
            "All runs: {} URLs, {} with emails ({:.1}%), {} emails found",
            urls,
            successful,
            successful as f64 / urls as f64 * 100.0,
            found
        );
    }
    println!();

    if stats.rows.is_empty() {
        println!("No runs recorded yet.");
        return;
    }

    println!(
        "{:>5}  {:<20} {:>6} {:>6} {:>7} {:>9}  {}",
        "Run", "Category", "URLs", "OK", "Emails", "Seconds", "Ended"
    );
    for row in &stats.rows {
        println!(
            "{:>5}  {:<20} {:>6} {:>6} {:>7} {:>9.1}  {}",
            row.run_id,
            row.category,
            row.total_urls,
            row.successful_extractions,
            row.total_emails_found,
            row.duration_seconds,
            row.ended_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "in progress".to_string())
        );
    }
}

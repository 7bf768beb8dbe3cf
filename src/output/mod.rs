//! Output module for reports and exports
//!
//! This module handles:
//! - Plain-text email lists
//! - Markdown summaries of a run
//! - Statistics printed to the terminal

mod email_list;
mod markdown;
pub mod stats;

pub use email_list::{format_email_list, write_email_list};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_statistics, Statistics};

use crate::storage::{
    from_db_timestamp, EmailFilter, EmailRecord, RunRecord, RunStats, Storage, StorageError,
    OVERALL_CATEGORY,
};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("No runs found in database")]
    NoRuns,
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Everything a run report shows
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run: RunRecord,

    /// Overall row, if the run got far enough to write one
    pub overall: Option<RunStats>,

    /// Per-category rows, sorted by category
    pub categories: Vec<RunStats>,

    /// Emails stored since the run started, newest first
    pub emails: Vec<EmailRecord>,

    /// Emails in the whole database
    pub total_emails_stored: u64,
}

/// Builds the summary of the most recent run
///
/// # Arguments
///
/// * `storage` - The storage backend containing run data
///
/// # Returns
///
/// * `Ok(RunSummary)` - Successfully generated summary
/// * `Err(OutputError)` - No run exists or a query failed
pub fn generate_summary(storage: &dyn Storage) -> OutputResult<RunSummary> {
    let run = storage.get_latest_run()?.ok_or(OutputError::NoRuns)?;

    let (overall, categories): (Vec<_>, Vec<_>) = storage
        .get_extraction_stats(None)?
        .into_iter()
        .filter(|stats| stats.run_id == run.id)
        .partition(|stats| stats.category == OVERALL_CATEGORY);

    let emails = storage.get_all_emails(&EmailFilter {
        since: from_db_timestamp(&run.started_at),
        ..EmailFilter::default()
    })?;

    Ok(RunSummary {
        overall: overall.into_iter().next(),
        categories,
        emails,
        total_emails_stored: storage.count_emails()?,
        run,
    })
}

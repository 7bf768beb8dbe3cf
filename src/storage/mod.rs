//! Storage module for persisting harvested data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Email records with provenance, unique on `(email, source_url)`
//! - Run tracking
//! - Per-category extraction statistics
//! - Retention cleanup and online backup

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{init_database, SqliteStorage};
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::RunState;
use chrono::{DateTime, SecondsFormat, Utc};

/// Category under which every target of a run is counted
pub const OVERALL_CATEGORY: &str = "all";

/// Category used for targets that carry none
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Formats a timestamp the way it is stored
///
/// Fixed-width microsecond precision in UTC, so stored values order the
/// same way as text and as time.
pub fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp
pub fn from_db_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// An extracted email with its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRecord {
    pub email: String,
    pub source_url: String,
    pub company_name: Option<String>,
    pub category: Option<String>,
    pub extracted_at: DateTime<Utc>,
}

impl EmailRecord {
    /// Creates a record stamped with the current time
    pub fn new(
        email: impl Into<String>,
        source_url: impl Into<String>,
        company_name: Option<String>,
        category: Option<String>,
    ) -> Self {
        Self {
            email: email.into(),
            source_url: source_url.into(),
            company_name,
            category,
            extracted_at: Utc::now(),
        }
    }
}

/// Filter for [`Storage::get_all_emails`]
///
/// Every field is optional; an empty filter matches all records.
#[derive(Debug, Clone, Default)]
pub struct EmailFilter {
    pub category: Option<String>,
    pub source_url: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl EmailFilter {
    /// Matches records of one category
    pub fn for_category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }
}

/// Extraction statistics for one category of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub run_id: i64,
    pub category: String,
    pub total_urls: u64,
    pub successful_extractions: u64,
    pub total_emails_found: u64,
    pub duration_seconds: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunStats {
    /// Creates an empty statistics row starting now
    pub fn new(run_id: i64, category: impl Into<String>) -> Self {
        Self::starting_at(run_id, category, Utc::now())
    }

    /// Creates an empty statistics row with an explicit start time
    pub fn starting_at(run_id: i64, category: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            category: category.into(),
            total_urls: 0,
            successful_extractions: 0,
            total_emails_found: 0,
            duration_seconds: 0.0,
            started_at,
            ended_at: None,
        }
    }

    /// Counts one processed URL and the unique emails found on it
    ///
    /// A URL is a successful extraction only when it yielded at least one
    /// email.
    pub fn record_url(&mut self, emails_found: Option<usize>) {
        self.total_urls += 1;
        if let Some(found) = emails_found.filter(|n| *n > 0) {
            self.successful_extractions += 1;
            self.total_emails_found += found as u64;
        }
    }

    /// Updates the running duration without finalizing
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.duration_seconds = elapsed_seconds(self.started_at, now);
    }

    /// Stamps the end time and final duration
    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.touch(now);
        self.ended_at = Some(now);
    }

    /// Returns the share of URLs that yielded emails, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_urls == 0 {
            0.0
        } else {
            self.successful_extractions as f64 / self.total_urls as f64 * 100.0
        }
    }
}

fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_microseconds().unwrap_or(0).max(0) as f64 / 1_000_000.0
}

/// Represents a harvesting run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub state: RunState,
}

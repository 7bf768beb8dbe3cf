//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::RunState;
use crate::storage::{EmailFilter, EmailRecord, RunRecord, RunStats};
use rusqlite::ErrorCode;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Disk I/O failure: {0}")]
    IoFailure(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(ffi_err, _) => ffi_err.code,
            _ => return Self::Sqlite(err),
        };

        match code {
            ErrorCode::ConstraintViolation => Self::ConstraintViolation(err.to_string()),
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::ReadOnly
            | ErrorCode::PermissionDenied => Self::Unavailable(err.to_string()),
            ErrorCode::SystemIoFailure | ErrorCode::DiskFull => Self::IoFailure(err.to_string()),
            _ => Self::Sqlite(err),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Writers take `&mut self`; callers sharing a backend between tasks wrap
/// it in a mutex.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the state of a run
    fn update_run_state(&mut self, run_id: i64, state: RunState) -> StorageResult<()>;

    /// Moves a run to a terminal state and stamps its finish time
    fn finish_run(&mut self, run_id: i64, state: RunState) -> StorageResult<()>;

    // ===== Emails =====

    /// Inserts an email unless `(email, source_url)` is already stored
    ///
    /// # Returns
    ///
    /// `true` if a new row was written, `false` for a duplicate
    fn upsert_email(&mut self, record: &EmailRecord) -> StorageResult<bool>;

    /// Returns records matching the filter, newest first
    fn get_all_emails(&self, filter: &EmailFilter) -> StorageResult<Vec<EmailRecord>>;

    /// Counts stored email records
    fn count_emails(&self) -> StorageResult<u64>;

    // ===== Statistics =====

    /// Writes a statistics row, replacing any row with the same
    /// `(run_id, category)`
    fn record_stats(&mut self, stats: &RunStats) -> StorageResult<()>;

    /// Returns statistics rows, newest run first
    ///
    /// # Arguments
    ///
    /// * `category` - Restrict to one category, or `None` for all rows
    fn get_extraction_stats(&self, category: Option<&str>) -> StorageResult<Vec<RunStats>>;

    // ===== Maintenance =====

    /// Deletes data older than the given number of days
    ///
    /// Removes emails extracted before the cutoff and finalized statistics
    /// rows that ended before it, in one transaction.
    ///
    /// # Returns
    ///
    /// The number of email rows deleted
    fn cleanup_old_data(&mut self, older_than_days: u32) -> StorageResult<u64>;

    /// Copies the whole database to `destination`
    ///
    /// Returns `true` on success. Failures are logged, not raised.
    fn backup(&self, destination: &Path) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: std::os::raw::c_int) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn test_maps_constraint_violation() {
        let err: StorageError = sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT).into();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));
    }

    #[test]
    fn test_maps_busy_to_unavailable() {
        let err: StorageError = sqlite_failure(rusqlite::ffi::SQLITE_BUSY).into();
        assert!(matches!(err, StorageError::Unavailable(_)));
    }

    #[test]
    fn test_maps_disk_full_to_io_failure() {
        let err: StorageError = sqlite_failure(rusqlite::ffi::SQLITE_FULL).into();
        assert!(matches!(err, StorageError::IoFailure(_)));
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err: StorageError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StorageError::Sqlite(_)));
    }
}

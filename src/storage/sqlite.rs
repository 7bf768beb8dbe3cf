//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::RunState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    from_db_timestamp, to_db_timestamp, EmailFilter, EmailRecord, RunRecord, RunStats,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::backup::Backup;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// Missing parent directories of `path` are created.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = init_database(path)?;
        tracing::debug!("Opened database at {}", path.display());
        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn copy_to(&self, destination: &Path) -> StorageResult<()> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut dst = Connection::open(destination)?;
        let backup = Backup::new(&self.conn, &mut dst)?;
        // All pages in one step: the copy runs inside a single read transaction.
        backup.run_to_completion(-1, Duration::ZERO, None)?;
        Ok(())
    }
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    from_db_timestamp(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp: {}", value).into(),
        )
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status: String = row.get(4)?;
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        state: RunState::from_db_string(&status).unwrap_or(RunState::Aborted),
    })
}

fn email_from_row(row: &Row<'_>) -> rusqlite::Result<EmailRecord> {
    let extracted_at: String = row.get(4)?;
    Ok(EmailRecord {
        email: row.get(0)?,
        source_url: row.get(1)?,
        company_name: row.get(2)?,
        category: row.get(3)?,
        extracted_at: parse_timestamp(4, &extracted_at)?,
    })
}

fn stats_from_row(row: &Row<'_>) -> rusqlite::Result<RunStats> {
    let started_at: String = row.get(6)?;
    let ended_at: Option<String> = row.get(7)?;
    Ok(RunStats {
        run_id: row.get(0)?,
        category: row.get(1)?,
        total_urls: row.get::<_, i64>(2)?.max(0) as u64,
        successful_extractions: row.get::<_, i64>(3)?.max(0) as u64,
        total_emails_found: row.get::<_, i64>(4)?.max(0) as u64,
        duration_seconds: row.get(5)?,
        started_at: parse_timestamp(6, &started_at)?,
        ended_at: ended_at
            .map(|value| parse_timestamp(7, &value))
            .transpose()?,
    })
}

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status";
const EMAIL_COLUMNS: &str = "email, source_url, company_name, category, extracted_at";
const STATS_COLUMNS: &str = "run_id, category, total_urls, successful_extractions, \
     total_emails_found, duration_seconds, started_at, ended_at";

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = to_db_timestamp(&Utc::now());
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunState::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run_state(&mut self, run_id: i64, state: RunState) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![state.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn finish_run(&mut self, run_id: i64, state: RunState) -> StorageResult<()> {
        let now = to_db_timestamp(&Utc::now());
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![state.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Emails =====

    fn upsert_email(&mut self, record: &EmailRecord) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO emails (email, source_url, company_name, category, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(email, source_url) DO NOTHING",
            params![
                record.email,
                record.source_url,
                record.company_name,
                record.category,
                to_db_timestamp(&record.extracted_at),
            ],
        )?;
        Ok(inserted == 1)
    }

    fn get_all_emails(&self, filter: &EmailFilter) -> StorageResult<Vec<EmailRecord>> {
        let mut conditions = Vec::new();
        let mut values = Vec::new();

        if let Some(category) = &filter.category {
            values.push(category.clone());
            conditions.push(format!("category = ?{}", values.len()));
        }
        if let Some(source_url) = &filter.source_url {
            values.push(source_url.clone());
            conditions.push(format!("source_url = ?{}", values.len()));
        }
        if let Some(since) = &filter.since {
            values.push(to_db_timestamp(since));
            conditions.push(format!("extracted_at >= ?{}", values.len()));
        }
        if let Some(until) = &filter.until {
            values.push(to_db_timestamp(until));
            conditions.push(format!("extracted_at <= ?{}", values.len()));
        }

        let mut sql = format!("SELECT {} FROM emails", EMAIL_COLUMNS);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY extracted_at DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let emails = stmt
            .query_map(params_from_iter(values.iter()), email_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(emails)
    }

    fn count_emails(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM emails", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Statistics =====

    fn record_stats(&mut self, stats: &RunStats) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO extraction_stats
             (run_id, category, total_urls, successful_extractions, total_emails_found,
              duration_seconds, started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(run_id, category) DO UPDATE SET
                total_urls = excluded.total_urls,
                successful_extractions = excluded.successful_extractions,
                total_emails_found = excluded.total_emails_found,
                duration_seconds = excluded.duration_seconds,
                started_at = excluded.started_at,
                ended_at = excluded.ended_at",
            params![
                stats.run_id,
                stats.category,
                stats.total_urls as i64,
                stats.successful_extractions as i64,
                stats.total_emails_found as i64,
                stats.duration_seconds,
                to_db_timestamp(&stats.started_at),
                stats.ended_at.as_ref().map(to_db_timestamp),
            ],
        )?;
        Ok(())
    }

    fn get_extraction_stats(&self, category: Option<&str>) -> StorageResult<Vec<RunStats>> {
        let stats = match category {
            Some(category) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM extraction_stats WHERE category = ?1
                     ORDER BY run_id DESC, category",
                    STATS_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![category], stats_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM extraction_stats ORDER BY run_id DESC, category",
                    STATS_COLUMNS
                ))?;
                let rows = stmt
                    .query_map([], stats_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        Ok(stats)
    }

    // ===== Maintenance =====

    fn cleanup_old_data(&mut self, older_than_days: u32) -> StorageResult<u64> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(older_than_days));
        let cutoff = to_db_timestamp(&cutoff);

        let tx = self.conn.transaction()?;
        let emails_deleted = tx.execute(
            "DELETE FROM emails WHERE extracted_at < ?1",
            params![cutoff],
        )?;
        let stats_deleted = tx.execute(
            "DELETE FROM extraction_stats WHERE ended_at IS NOT NULL AND ended_at < ?1",
            params![cutoff],
        )?;
        tx.commit()?;

        tracing::info!(
            "Cleanup removed {} emails and {} statistics rows older than {} days",
            emails_deleted,
            stats_deleted,
            older_than_days
        );

        Ok(emails_deleted as u64)
    }

    fn backup(&self, destination: &Path) -> bool {
        match self.copy_to(destination) {
            Ok(()) => {
                tracing::info!("Database backed up to {}", destination.display());
                true
            }
            Err(e) => {
                tracing::error!("Backup to {} failed: {}", destination.display(), e);
                false
            }
        }
    }
}

/// Initializes or opens a database at the given path
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(Connection)` - Successfully opened/created database
/// * `Err(rusqlite::Error)` - Failed to open database
pub fn init_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}

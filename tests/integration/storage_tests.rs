//! Integration tests for the SQLite store through its public API

use chrono::{Duration, Utc};
use sumi_sieve::output::{generate_markdown_summary, generate_summary, write_email_list};
use sumi_sieve::storage::{EmailFilter, EmailRecord, RunStats, SqliteStorage, Storage};
use sumi_sieve::RunState;
use tempfile::TempDir;

fn record(email: &str, source_url: &str, age_days: i64) -> EmailRecord {
    let mut record = EmailRecord::new(email, source_url, None, Some("shops".to_string()));
    record.extracted_at = Utc::now() - Duration::days(age_days);
    record
}

#[test]
fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("emails.db");

    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        assert!(storage
            .upsert_email(&record("sales@acme.com", "https://acme.com/", 0))
            .unwrap());
    }

    let mut storage = SqliteStorage::new(&db_path).unwrap();
    assert!(!storage
        .upsert_email(&record("sales@acme.com", "https://acme.com/", 0))
        .unwrap());
    assert_eq!(storage.count_emails().unwrap(), 1);
}

#[test]
fn test_cleanup_keeps_recent_emails() {
    let dir = TempDir::new().unwrap();
    let mut storage = SqliteStorage::new(&dir.path().join("emails.db")).unwrap();

    storage
        .upsert_email(&record("old@acme.com", "https://acme.com/", 40))
        .unwrap();
    storage
        .upsert_email(&record("new@acme.com", "https://acme.com/", 5))
        .unwrap();

    assert_eq!(storage.cleanup_old_data(30).unwrap(), 1);

    let remaining = storage.get_all_emails(&EmailFilter::default()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].email, "new@acme.com");
}

#[test]
fn test_backup_is_a_usable_database() {
    let dir = TempDir::new().unwrap();
    let mut storage = SqliteStorage::new(&dir.path().join("emails.db")).unwrap();
    let run_id = storage.create_run("hash").unwrap();
    storage.record_stats(&RunStats::new(run_id, "shops")).unwrap();
    storage
        .upsert_email(&record("sales@acme.com", "https://acme.com/", 0))
        .unwrap();

    let backup_path = dir.path().join("backup.db");
    assert!(storage.backup(&backup_path));

    let copy = SqliteStorage::new(&backup_path).unwrap();
    assert_eq!(copy.count_emails().unwrap(), 1);
    assert_eq!(copy.get_extraction_stats(Some("shops")).unwrap().len(), 1);
    assert_eq!(copy.get_run(run_id).unwrap().state, RunState::Running);
}

#[test]
fn test_reports_from_stored_run() {
    let dir = TempDir::new().unwrap();
    let mut storage = SqliteStorage::new(&dir.path().join("emails.db")).unwrap();
    let run_id = storage.create_run("hash").unwrap();
    storage
        .upsert_email(&record("sales@acme.com", "https://acme.com/", 0))
        .unwrap();
    storage
        .upsert_email(&record("help@acme.com", "https://acme.com/help", 0))
        .unwrap();
    storage.finish_run(run_id, RunState::Completed).unwrap();

    let emails = storage.get_all_emails(&EmailFilter::default()).unwrap();
    let list_path = dir.path().join("out").join("emails.txt");
    let count = write_email_list(emails.iter().map(|r| r.email.as_str()), &list_path).unwrap();
    assert_eq!(count, 2);

    let summary = generate_summary(&storage).unwrap();
    let summary_path = dir.path().join("out").join("summary.md");
    generate_markdown_summary(&summary, &summary_path).unwrap();

    let markdown = std::fs::read_to_string(&summary_path).unwrap();
    assert!(markdown.contains("help@acme.com"));
    assert!(markdown.contains("- **Status**: completed"));
}

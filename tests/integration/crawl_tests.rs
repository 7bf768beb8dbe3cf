//! Integration tests for the harvesting pipeline
//!
//! These tests use wiremock to create mock HTTP servers and drive the
//! real reqwest fetcher, the coordinator, and a file-backed SQLite store
//! end-to-end.

use std::net::TcpListener;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use sumi_sieve::config::{parse_config, Config};
use sumi_sieve::crawler::{Coordinator, CrawlTarget, HttpFetcher, MAX_BODY_BYTES};
use sumi_sieve::input::read_targets;
use sumi_sieve::storage::{EmailFilter, SqliteStorage, Storage, OVERALL_CATEGORY};
use sumi_sieve::RunState;
use tempfile::TempDir;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with a short delay and the given proxies
fn create_test_config(db_path: &Path, max_retries: u32, proxies: &[String]) -> Config {
    create_config_with(db_path, max_retries, proxies, "")
}

/// Same as [`create_test_config`] with extra `[extraction]` lines
fn create_config_with(
    db_path: &Path,
    max_retries: u32,
    proxies: &[String],
    extraction: &str,
) -> Config {
    let proxy_list = proxies
        .iter()
        .map(|p| format!("\"{}\"", p))
        .collect::<Vec<_>>()
        .join(", ");

    parse_config(&format!(
        r#"
[extraction]
delay-between-requests = 0.05
max-retries = {}
timeout = 5
use-proxies = {}
proxies = [{}]
{}

[database]
path = "{}"
"#,
        max_retries,
        !proxies.is_empty(),
        proxy_list,
        extraction,
        db_path.display()
    ))
    .expect("valid test config")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

fn open_storage(dir: &TempDir) -> Arc<Mutex<SqliteStorage>> {
    let storage = SqliteStorage::new(&dir.path().join("emails.db")).expect("open storage");
    Arc::new(Mutex::new(storage))
}

fn coordinator(
    config: &Config,
    storage: &Arc<Mutex<SqliteStorage>>,
) -> Coordinator<HttpFetcher, SqliteStorage> {
    Coordinator::from_config(config, Arc::clone(storage)).expect("build coordinator")
}

/// Returns a local URL nothing is listening on
fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/", port)
}

#[tokio::test]
async fn test_single_page_extraction() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contacts"))
        .respond_with(html(
            "<html><body><p>contact: sales@acme.com and invalid-email</p></body></html>",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir.path().join("emails.db"), 3, &[]);
    let storage = open_storage(&dir);
    let target = CrawlTarget::new(format!("{}/contacts", mock_server.uri()))
        .with_company("Acme")
        .with_category("shops");

    let stats = coordinator(&config, &storage).run(&[target]).await.unwrap();

    assert_eq!(stats.category, OVERALL_CATEGORY);
    assert_eq!(stats.total_urls, 1);
    assert_eq!(stats.successful_extractions, 1);
    assert_eq!(stats.total_emails_found, 1);

    let storage = storage.lock().unwrap();
    let emails = storage.get_all_emails(&EmailFilter::default()).unwrap();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].email, "sales@acme.com");
    assert_eq!(emails[0].company_name.as_deref(), Some("Acme"));
    assert_eq!(emails[0].category.as_deref(), Some("shops"));
    assert!(emails[0].source_url.ends_with("/contacts"));

    let run = storage.get_run(stats.run_id).unwrap();
    assert_eq!(run.state, RunState::Completed);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<a href=\"mailto:office@shop.org?subject=Hi\">Mail</a>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir.path().join("emails.db"), 3, &[]);
    let storage = open_storage(&dir);

    let stats = coordinator(&config, &storage)
        .run(&[CrawlTarget::new(mock_server.uri())])
        .await
        .unwrap();

    assert_eq!(stats.successful_extractions, 1);
    let emails = storage
        .lock()
        .unwrap()
        .get_all_emails(&EmailFilter::default())
        .unwrap();
    assert_eq!(emails[0].email, "office@shop.org");
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir.path().join("emails.db"), 3, &[]);
    let storage = open_storage(&dir);

    let stats = coordinator(&config, &storage)
        .run(&[CrawlTarget::new(format!("{}/gone", mock_server.uri()))])
        .await
        .unwrap();

    assert_eq!(stats.total_urls, 1);
    assert_eq!(stats.successful_extractions, 0);
}

#[tokio::test]
async fn test_unreachable_target_does_not_stop_batch() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<p>Write to hello [at] bistro [dot] fr</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir.path().join("emails.db"), 2, &[]);
    let storage = open_storage(&dir);
    let targets = [
        CrawlTarget::new(closed_port_url()),
        CrawlTarget::new(mock_server.uri()),
    ];

    let mut coordinator = coordinator(&config, &storage);
    let stats = coordinator.run(&targets).await.unwrap();

    assert_eq!(coordinator.state(), RunState::Completed);
    assert_eq!(stats.total_urls, 2);
    assert_eq!(stats.successful_extractions, 1);
    assert_eq!(storage.lock().unwrap().count_emails().unwrap(), 1);
}

#[tokio::test]
async fn test_requests_are_spaced() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("<p>team@acme.com</p>"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir.path().join("emails.db"), 0, &[]);
    let storage = open_storage(&dir);
    let targets: Vec<_> = ["/a", "/b", "/c"]
        .iter()
        .map(|p| CrawlTarget::new(format!("{}{}", mock_server.uri(), p)))
        .collect();

    let start = Instant::now();
    let stats = coordinator(&config, &storage).run(&targets).await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(100));
    assert_eq!(stats.total_emails_found, 3);
    // Same address from three pages is three records.
    assert_eq!(storage.lock().unwrap().count_emails().unwrap(), 3);
}

#[tokio::test]
async fn test_requests_go_through_proxy() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contacts"))
        .respond_with(html("<p>desk@acme-proxy-test.com</p>"))
        .expect(1)
        .mount(&proxy)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir.path().join("emails.db"), 0, &[proxy.uri()]);
    let storage = open_storage(&dir);

    let stats = coordinator(&config, &storage)
        .run(&[CrawlTarget::new("http://acme-proxy-test.com/contacts")])
        .await
        .unwrap();

    assert_eq!(stats.successful_extractions, 1);
}

#[tokio::test]
async fn test_run_from_target_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/one"))
        .respond_with(html(
            "<html><head><title>One Corp</title></head><body>info@one-corp.com</body></html>",
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(html("<p>no contacts</p>"))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let list = dir.path().join("urls.txt");
    std::fs::write(
        &list,
        format!(
            "# test list\n{uri}/one\n{uri}/two,Two Ltd\n",
            uri = mock_server.uri()
        ),
    )
    .unwrap();

    let config = create_test_config(&dir.path().join("emails.db"), 0, &[]);
    let storage = open_storage(&dir);
    let targets = read_targets(&list, Some("restaurants")).unwrap();

    coordinator(&config, &storage).run(&targets).await.unwrap();

    let storage = storage.lock().unwrap();
    let stats = storage.get_extraction_stats(Some("restaurants")).unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].total_urls, 2);
    assert_eq!(stats[0].successful_extractions, 1);

    let emails = storage
        .get_all_emails(&EmailFilter::for_category("restaurants"))
        .unwrap();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].company_name.as_deref(), Some("One Corp"));
}

#[tokio::test]
async fn test_user_agent_rotates_between_attempts() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "AgentA"))
        .and(header_exists("accept"))
        .and(header_exists("accept-language"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(header("user-agent", "AgentB"))
        .and(header_exists("accept-language"))
        .respond_with(html("<p>front@acme.com</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_config_with(
        &dir.path().join("emails.db"),
        1,
        &[],
        "user-agents = [\"AgentA\", \"AgentB\"]\nuser-agent-rotation = \"round-robin\"",
    );
    let storage = open_storage(&dir);

    let stats = coordinator(&config, &storage)
        .run(&[CrawlTarget::new(mock_server.uri())])
        .await
        .unwrap();

    assert_eq!(stats.successful_extractions, 1);
}

#[tokio::test]
async fn test_non_text_content_is_skipped() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/price.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"%PDF-1.4 sales@acme.com".to_vec(), "application/pdf"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir.path().join("emails.db"), 3, &[]);
    let storage = open_storage(&dir);

    let stats = coordinator(&config, &storage)
        .run(&[CrawlTarget::new(format!("{}/price.pdf", mock_server.uri()))])
        .await
        .unwrap();

    assert_eq!(stats.total_urls, 1);
    assert_eq!(stats.successful_extractions, 0);
    assert_eq!(storage.lock().unwrap().count_emails().unwrap(), 0);
}

#[tokio::test]
async fn test_oversized_body_is_skipped() {
    let mock_server = MockServer::start().await;
    let body = format!("<p>sales@acme.com</p>{}", "x".repeat(MAX_BODY_BYTES));
    Mock::given(method("GET"))
        .respond_with(html(&body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir.path().join("emails.db"), 3, &[]);
    let storage = open_storage(&dir);

    let stats = coordinator(&config, &storage)
        .run(&[CrawlTarget::new(mock_server.uri())])
        .await
        .unwrap();

    assert_eq!(stats.successful_extractions, 0);
    assert_eq!(storage.lock().unwrap().count_emails().unwrap(), 0);
}

#[tokio::test]
async fn test_declared_charset_is_decoded() {
    let mock_server = MockServer::start().await;
    // "Ромашка" in windows-1251
    let mut body = b"<html><head><title>".to_vec();
    body.extend_from_slice(&[0xD0, 0xEE, 0xEC, 0xE0, 0xF8, 0xEA, 0xE0]);
    body.extend_from_slice(b"</title></head><body>zakaz@romashka.ru</body></html>");
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=windows-1251"),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir.path().join("emails.db"), 0, &[]);
    let storage = open_storage(&dir);

    coordinator(&config, &storage)
        .run(&[CrawlTarget::new(mock_server.uri())])
        .await
        .unwrap();

    let emails = storage
        .lock()
        .unwrap()
        .get_all_emails(&EmailFilter::default())
        .unwrap();
    assert_eq!(emails[0].email, "zakaz@romashka.ru");
    assert_eq!(emails[0].company_name.as_deref(), Some("Ромашка"));
}

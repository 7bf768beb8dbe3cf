//! Run coordinator - main harvesting loop
//!
//! This module drives a batch of targets through the pipeline:
//! - Creating the run record and moving it through its states
//! - Fetching each target with retries, rate limiting, and proxies
//! - Extracting emails and persisting them with provenance
//! - Aggregating and checkpointing per-category statistics
//! - Aborting cleanly when the store becomes unusable

use crate::config::Config;
use crate::crawler::fetcher::{fetch, FetchPolicy, HttpFetcher, PageContent, PageFetcher};
use crate::crawler::proxy::ProxyPool;
use crate::crawler::rate_limiter::RateLimiter;
use crate::crawler::CrawlTarget;
use crate::email::{extract_company_name, extract_emails};
use crate::state::RunState;
use crate::storage::{
    EmailRecord, RunStats, Storage, StorageError, OVERALL_CATEGORY, UNKNOWN_CATEGORY,
};
use crate::SieveError;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedSender;

/// Per-URL progress notifications
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A target is about to be fetched
    Started {
        index: usize,
        total: usize,
        url: String,
    },

    /// A target was fetched and scanned
    Extracted {
        url: String,
        /// Every valid address on the page, sorted
        emails: Vec<String>,
        new_emails: usize,
    },

    /// A target could not be fetched
    Failed { url: String, error: String },

    /// The run completed; carries the overall statistics
    Finished(RunStats),

    /// The run stopped early
    Aborted { run_id: i64, reason: String },
}

/// What happened to one target
struct TargetOutcome {
    emails_found: Option<usize>,
}

/// Main run coordinator
///
/// Generic over the fetcher so tests can script responses, and over the
/// store so any [`Storage`] backend can be used.
pub struct Coordinator<F: PageFetcher, S: Storage> {
    fetcher: F,
    storage: Arc<Mutex<S>>,
    limiter: RateLimiter,
    proxies: Option<ProxyPool>,
    policy: FetchPolicy,
    config_hash: String,
    state: RunState,
    run_id: Option<i64>,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

impl<S: Storage> Coordinator<HttpFetcher, S> {
    /// Creates a coordinator with a reqwest fetcher configured from `config`
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `storage` - The shared store
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(SieveError)` - The HTTP client could not be built
    pub fn from_config(config: &Config, storage: Arc<Mutex<S>>) -> Result<Self, SieveError> {
        let extraction = &config.extraction;
        let proxy_pool = extraction.proxy_pool();
        let proxy_list = proxy_pool
            .as_ref()
            .map(|pool| pool.proxies().to_vec())
            .unwrap_or_default();

        let fetcher = HttpFetcher::new(
            extraction.timeout_duration(),
            extraction.user_agents(),
            &proxy_list,
        )?
        .with_agent_rotation(extraction.user_agent_rotation);

        let mut coordinator = Self::new(
            fetcher,
            storage,
            RateLimiter::new(extraction.delay()),
            extraction.fetch_policy(),
        );
        if let Some(pool) = proxy_pool {
            tracing::info!("Using {} proxies", pool.len());
            coordinator = coordinator.with_proxies(pool);
        }

        Ok(coordinator)
    }
}

impl<F: PageFetcher, S: Storage> Coordinator<F, S> {
    /// Creates a new coordinator in the `Idle` state
    pub fn new(
        fetcher: F,
        storage: Arc<Mutex<S>>,
        limiter: RateLimiter,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            fetcher,
            storage,
            limiter,
            proxies: None,
            policy,
            config_hash: String::new(),
            state: RunState::Idle,
            run_id: None,
            progress: None,
        }
    }

    /// Routes every attempt through the given pool
    pub fn with_proxies(mut self, pool: ProxyPool) -> Self {
        self.proxies = Some(pool);
        self
    }

    /// Sends progress events to `sender`; a dropped receiver is ignored
    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Records the configuration hash on the run
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// The run ID, once the run has started
    pub fn run_id(&self) -> Option<i64> {
        self.run_id
    }

    /// Processes every target in order and returns the overall statistics
    ///
    /// Per-URL failures are counted and skipped. A storage failure other
    /// than a constraint violation aborts the run.
    ///
    /// # Arguments
    ///
    /// * `targets` - The pages to visit
    ///
    /// # Returns
    ///
    /// * `Ok(RunStats)` - The `"all"` statistics row, finalized
    /// * `Err(SieveError::Aborted)` - The store failed mid-run
    /// * `Err(SieveError)` - The coordinator was not idle, or the run could
    ///   not be created
    pub async fn run(&mut self, targets: &[CrawlTarget]) -> Result<RunStats, SieveError> {
        if !self.state.can_transition_to(RunState::Running) {
            return Err(SieveError::InvalidTransition {
                from: self.state,
                to: RunState::Running,
            });
        }

        let run_id = match self.lock_storage().and_then(|mut s| {
            close_interrupted_run(&mut *s)?;
            s.create_run(&self.config_hash)
        }) {
            Ok(id) => id,
            Err(e) => {
                self.state = RunState::Aborted;
                return Err(e.into());
            }
        };
        self.run_id = Some(run_id);
        self.state = RunState::Running;

        tracing::info!("Run {} started with {} targets", run_id, targets.len());

        let started_at = Utc::now();
        let mut overall = RunStats::starting_at(run_id, OVERALL_CATEGORY, started_at);
        let mut by_category: BTreeMap<String, RunStats> = BTreeMap::new();

        for (index, target) in targets.iter().enumerate() {
            self.emit(ProgressEvent::Started {
                index,
                total: targets.len(),
                url: target.url.clone(),
            });

            let outcome = match self.process_target(target).await {
                Ok(outcome) => outcome,
                Err(e) => return Err(self.abort(run_id, e)),
            };

            let category = target.category.as_deref().unwrap_or(UNKNOWN_CATEGORY);
            let category_stats = by_category
                .entry(category.to_string())
                .or_insert_with(|| RunStats::starting_at(run_id, category, started_at));

            let now = Utc::now();
            overall.record_url(outcome.emails_found);
            overall.touch(now);
            category_stats.record_url(outcome.emails_found);
            category_stats.touch(now);

            let checkpoint = self.lock_storage().and_then(|mut s| {
                s.record_stats(category_stats)?;
                s.record_stats(&overall)
            });
            if let Err(e) = checkpoint {
                return Err(self.abort(run_id, e));
            }
        }

        let now = Utc::now();
        overall.finish(now);
        for stats in by_category.values_mut() {
            stats.finish(now);
        }

        let finalized = self.lock_storage().and_then(|mut s| {
            for stats in by_category.values() {
                s.record_stats(stats)?;
            }
            s.record_stats(&overall)?;
            s.finish_run(run_id, RunState::Completed)
        });
        if let Err(e) = finalized {
            return Err(self.abort(run_id, e));
        }
        self.state = RunState::Completed;

        tracing::info!(
            "Run {} completed: {}/{} URLs yielded {} emails in {:.1}s",
            run_id,
            overall.successful_extractions,
            overall.total_urls,
            overall.total_emails_found,
            overall.duration_seconds
        );
        self.emit(ProgressEvent::Finished(overall.clone()));

        Ok(overall)
    }

    async fn process_target(&self, target: &CrawlTarget) -> Result<TargetOutcome, StorageError> {
        let page = match fetch(
            &self.fetcher,
            &self.limiter,
            &target.url,
            &self.policy,
            self.proxies.as_ref(),
        )
        .await
        {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", target.url, e);
                self.emit(ProgressEvent::Failed {
                    url: target.url.clone(),
                    error: e.to_string(),
                });
                return Ok(TargetOutcome { emails_found: None });
            }
        };

        let emails = extract_emails(Some(&page));
        let new_emails = self.persist(target, &page, emails.iter())?;

        tracing::info!(
            "{}: {} emails ({} new)",
            page.url,
            emails.len(),
            new_emails
        );
        self.emit(ProgressEvent::Extracted {
            url: page.url.clone(),
            emails: emails.iter().cloned().collect(),
            new_emails,
        });

        Ok(TargetOutcome {
            emails_found: Some(emails.len()),
        })
    }

    /// Upserts the page's emails; returns how many were new
    fn persist<'a>(
        &self,
        target: &CrawlTarget,
        page: &PageContent,
        emails: impl Iterator<Item = &'a String>,
    ) -> Result<usize, StorageError> {
        let company_name = target
            .company_name
            .clone()
            .or_else(|| extract_company_name(&page.body));

        let mut storage = self.lock_storage()?;
        let mut new_emails = 0;

        for email in emails {
            let record = EmailRecord::new(
                email.clone(),
                page.url.clone(),
                company_name.clone(),
                target.category.clone(),
            );
            match storage.upsert_email(&record) {
                Ok(true) => new_emails += 1,
                Ok(false) => {}
                Err(StorageError::ConstraintViolation(msg)) => {
                    tracing::debug!("Duplicate {} from {}: {}", email, page.url, msg);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(new_emails)
    }

    fn abort(&mut self, run_id: i64, err: StorageError) -> SieveError {
        tracing::error!("Run {} aborted: {}", run_id, err);
        self.state = RunState::Aborted;

        let marked = self
            .lock_storage()
            .and_then(|mut s| s.finish_run(run_id, RunState::Aborted));
        if let Err(e) = marked {
            tracing::warn!("Could not mark run {} as aborted: {}", run_id, e);
        }

        self.emit(ProgressEvent::Aborted {
            run_id,
            reason: err.to_string(),
        });

        SieveError::Aborted {
            run_id,
            source: err,
        }
    }

    fn lock_storage(&self) -> Result<MutexGuard<'_, S>, StorageError> {
        self.storage
            .lock()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".to_string()))
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.progress {
            let _ = sender.send(event);
        }
    }
}

/// Marks the latest run aborted if a crash left it `running`
fn close_interrupted_run<S: Storage + ?Sized>(storage: &mut S) -> Result<(), StorageError> {
    if let Some(run) = storage.get_latest_run()? {
        if !run.state.is_terminal() {
            tracing::warn!("Run {} never finished; marking it aborted", run.id);
            storage.update_run_state(run.id, RunState::Aborted)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::{Backoff, FetchError};
    use crate::crawler::proxy::Rotation;
    use crate::storage::{EmailFilter, RunRecord, SqliteStorage};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;
    use url::Url;

    /// Serves fixed bodies by URL; unknown URLs are refused
    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, String>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl FakeFetcher {
        fn with_page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch_once(
            &self,
            url: &Url,
            proxy: Option<&str>,
        ) -> Result<PageContent, FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), proxy.map(str::to_string)));
            match self.pages.get(url.as_str()) {
                Some(body) => Ok(PageContent {
                    url: url.to_string(),
                    final_url: url.to_string(),
                    status_code: 200,
                    body: body.clone(),
                    content_type: Some("text/html".to_string()),
                }),
                None => Err(FetchError::ConnectionRefused {
                    url: url.to_string(),
                    message: "connection refused".to_string(),
                }),
            }
        }
    }

    /// Delegates to SQLite but fails every email write
    struct BrokenStorage {
        inner: SqliteStorage,
    }

    impl Storage for BrokenStorage {
        fn create_run(&mut self, config_hash: &str) -> Result<i64, StorageError> {
            self.inner.create_run(config_hash)
        }
        fn get_run(&self, run_id: i64) -> Result<RunRecord, StorageError> {
            self.inner.get_run(run_id)
        }
        fn get_latest_run(&self) -> Result<Option<RunRecord>, StorageError> {
            self.inner.get_latest_run()
        }
        fn update_run_state(&mut self, run_id: i64, state: RunState) -> Result<(), StorageError> {
            self.inner.update_run_state(run_id, state)
        }
        fn finish_run(&mut self, run_id: i64, state: RunState) -> Result<(), StorageError> {
            self.inner.finish_run(run_id, state)
        }
        fn upsert_email(&mut self, _record: &EmailRecord) -> Result<bool, StorageError> {
            Err(StorageError::Unavailable("disk detached".to_string()))
        }
        fn get_all_emails(&self, filter: &EmailFilter) -> Result<Vec<EmailRecord>, StorageError> {
            self.inner.get_all_emails(filter)
        }
        fn count_emails(&self) -> Result<u64, StorageError> {
            self.inner.count_emails()
        }
        fn record_stats(&mut self, stats: &RunStats) -> Result<(), StorageError> {
            self.inner.record_stats(stats)
        }
        fn get_extraction_stats(
            &self,
            category: Option<&str>,
        ) -> Result<Vec<RunStats>, StorageError> {
            self.inner.get_extraction_stats(category)
        }
        fn cleanup_old_data(&mut self, older_than_days: u32) -> Result<u64, StorageError> {
            self.inner.cleanup_old_data(older_than_days)
        }
        fn backup(&self, destination: &Path) -> bool {
            self.inner.backup(destination)
        }
    }

    fn coordinator(
        fetcher: FakeFetcher,
        max_retries: u32,
    ) -> (Coordinator<FakeFetcher, SqliteStorage>, Arc<Mutex<SqliteStorage>>) {
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let coordinator = Coordinator::new(
            fetcher,
            Arc::clone(&storage),
            RateLimiter::new(Duration::from_secs(30)),
            FetchPolicy::new(max_retries, Backoff::Fixed(Duration::from_secs(30))),
        );
        (coordinator, storage)
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_page_scenario() {
        let fetcher = FakeFetcher::default().with_page(
            "https://acme.com/",
            "<p>contact: sales@acme.com and invalid-email</p>",
        );
        let (mut coordinator, storage) = coordinator(fetcher, 3);
        let target = CrawlTarget::new("https://acme.com")
            .with_company("Acme")
            .with_category("shops");

        let stats = coordinator.run(&[target]).await.unwrap();

        assert_eq!(coordinator.state(), RunState::Completed);
        assert_eq!(stats.category, OVERALL_CATEGORY);
        assert_eq!(stats.total_urls, 1);
        assert_eq!(stats.successful_extractions, 1);
        assert_eq!(stats.total_emails_found, 1);
        assert!(stats.ended_at.is_some());

        let storage = storage.lock().unwrap();
        let emails = storage.get_all_emails(&EmailFilter::default()).unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].email, "sales@acme.com");
        assert_eq!(emails[0].source_url, "https://acme.com/");
        assert_eq!(emails[0].company_name.as_deref(), Some("Acme"));
        assert_eq!(emails[0].category.as_deref(), Some("shops"));

        let run = storage.get_run(stats.run_id).unwrap();
        assert_eq!(run.state, RunState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_target_is_retried_then_skipped() {
        let fetcher =
            FakeFetcher::default().with_page("https://next.com/", "<p>hello@next.com</p>");
        let (mut coordinator, storage) = coordinator(fetcher, 3);
        let targets = [
            CrawlTarget::new("https://down.com"),
            CrawlTarget::new("https://next.com"),
        ];

        let stats = coordinator.run(&targets).await.unwrap();

        assert_eq!(coordinator.fetcher.call_count(), 4 + 1);
        assert_eq!(stats.total_urls, 2);
        assert_eq!(stats.successful_extractions, 1);
        assert_eq!(storage.lock().unwrap().count_emails().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_company_name_falls_back_to_page() {
        let fetcher = FakeFetcher::default().with_page(
            "https://bistro.fr/",
            "<html><head><title>Bistro Nord</title></head><body>chef@bistro.fr</body></html>",
        );
        let (mut coordinator, storage) = coordinator(fetcher, 0);

        coordinator
            .run(&[CrawlTarget::new("https://bistro.fr")])
            .await
            .unwrap();

        let emails = storage
            .lock()
            .unwrap()
            .get_all_emails(&EmailFilter::default())
            .unwrap();
        assert_eq!(emails[0].company_name.as_deref(), Some("Bistro Nord"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_per_category() {
        let fetcher = FakeFetcher::default()
            .with_page("https://a.com/", "<p>x@a.com y@a.com</p>")
            .with_page("https://b.com/", "<p>nothing here</p>")
            .with_page("https://c.com/", "<p>z@c.com</p>");
        let (mut coordinator, storage) = coordinator(fetcher, 0);
        let targets = [
            CrawlTarget::new("https://a.com").with_category("shops"),
            CrawlTarget::new("https://b.com").with_category("shops"),
            CrawlTarget::new("https://c.com"),
        ];

        let overall = coordinator.run(&targets).await.unwrap();
        assert_eq!(overall.total_urls, 3);
        assert_eq!(overall.successful_extractions, 2);
        assert_eq!(overall.total_emails_found, 3);

        let storage = storage.lock().unwrap();
        let shops = storage.get_extraction_stats(Some("shops")).unwrap();
        assert_eq!(shops.len(), 1);
        assert_eq!(shops[0].total_urls, 2);
        assert_eq!(shops[0].successful_extractions, 1);
        assert_eq!(shops[0].total_emails_found, 2);

        let unknown = storage
            .get_extraction_stats(Some(UNKNOWN_CATEGORY))
            .unwrap();
        assert_eq!(unknown[0].total_emails_found, 1);
        assert!(unknown[0].ended_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_does_not_duplicate_emails() {
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        for _ in 0..2 {
            let fetcher =
                FakeFetcher::default().with_page("https://acme.com/", "<p>sales@acme.com</p>");
            let mut coordinator = Coordinator::new(
                fetcher,
                Arc::clone(&storage),
                RateLimiter::new(Duration::ZERO),
                FetchPolicy::new(0, Backoff::Fixed(Duration::ZERO)),
            );
            let stats = coordinator
                .run(&[CrawlTarget::new("https://acme.com")])
                .await
                .unwrap();
            assert_eq!(stats.total_emails_found, 1);
        }
        assert_eq!(storage.lock().unwrap().count_emails().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_spaced_by_delay() {
        let fetcher = FakeFetcher::default()
            .with_page("https://a.com/", "a@a.com")
            .with_page("https://b.com/", "b@b.com")
            .with_page("https://c.com/", "c@c.com");
        let (mut coordinator, _storage) = coordinator(fetcher, 0);
        let start = tokio::time::Instant::now();

        coordinator
            .run(&[
                CrawlTarget::new("https://a.com"),
                CrawlTarget::new("https://b.com"),
                CrawlTarget::new("https://c.com"),
            ])
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_proxies_are_used() {
        let fetcher = FakeFetcher::default().with_page("https://a.com/", "a@a.com");
        let (coordinator, _storage) = coordinator(fetcher, 0);
        let pool = ProxyPool::with_rotation(
            vec!["http://10.0.0.1:8080".to_string()],
            Rotation::RoundRobin,
        );
        let mut coordinator = coordinator.with_proxies(pool);

        coordinator
            .run(&[CrawlTarget::new("https://a.com")])
            .await
            .unwrap();

        let calls = coordinator.fetcher.calls.lock().unwrap().clone();
        assert_eq!(calls[0].1.as_deref(), Some("http://10.0.0.1:8080"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_run_is_closed_on_next_run() {
        let fetcher = FakeFetcher::default().with_page("https://a.com/", "a@a.com");
        let (mut coordinator, storage) = coordinator(fetcher, 0);
        let stale = storage.lock().unwrap().create_run("old").unwrap();

        let stats = coordinator
            .run(&[CrawlTarget::new("https://a.com")])
            .await
            .unwrap();

        let storage = storage.lock().unwrap();
        let stale = storage.get_run(stale).unwrap();
        assert_eq!(stale.state, RunState::Aborted);
        assert!(stale.finished_at.is_none());
        assert_eq!(storage.get_run(stats.run_id).unwrap().state, RunState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_events() {
        let fetcher = FakeFetcher::default().with_page("https://a.com/", "a@a.com");
        let (coordinator, _storage) = coordinator(fetcher, 0);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut coordinator = coordinator.with_progress(tx);

        coordinator
            .run(&[
                CrawlTarget::new("https://a.com"),
                CrawlTarget::new("mailto:x@a.com"),
            ])
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert!(matches!(events[0], ProgressEvent::Started { index: 0, total: 2, .. }));
        assert!(matches!(
            events[1],
            ProgressEvent::Extracted { new_emails: 1, .. }
        ));
        if let ProgressEvent::Extracted { emails, .. } = &events[1] {
            assert_eq!(emails, &vec!["a@a.com".to_string()]);
        }
        assert!(matches!(events[3], ProgressEvent::Failed { .. }));
        assert!(matches!(events.last(), Some(ProgressEvent::Finished(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_failure_aborts_run() {
        let inner = SqliteStorage::new_in_memory().unwrap();
        let storage = Arc::new(Mutex::new(BrokenStorage { inner }));
        let fetcher = FakeFetcher::default()
            .with_page("https://a.com/", "a@a.com")
            .with_page("https://b.com/", "b@b.com");
        let mut coordinator = Coordinator::new(
            fetcher,
            Arc::clone(&storage),
            RateLimiter::new(Duration::ZERO),
            FetchPolicy::new(0, Backoff::Fixed(Duration::ZERO)),
        );

        let result = coordinator
            .run(&[
                CrawlTarget::new("https://a.com"),
                CrawlTarget::new("https://b.com"),
            ])
            .await;

        let run_id = match result {
            Err(SieveError::Aborted { run_id, source }) => {
                assert!(matches!(source, StorageError::Unavailable(_)));
                run_id
            }
            other => panic!("expected abort, got {:?}", other),
        };
        assert_eq!(coordinator.state(), RunState::Aborted);
        assert_eq!(coordinator.fetcher.call_count(), 1);

        let run = storage.lock().unwrap().get_run(run_id).unwrap();
        assert_eq!(run.state, RunState::Aborted);
        assert!(run.finished_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_is_rejected() {
        let (mut coordinator, _storage) = coordinator(FakeFetcher::default(), 0);
        coordinator.run(&[]).await.unwrap();

        let result = coordinator.run(&[]).await;
        assert!(matches!(
            result,
            Err(SieveError::InvalidTransition {
                from: RunState::Completed,
                to: RunState::Running
            })
        ));
    }
}

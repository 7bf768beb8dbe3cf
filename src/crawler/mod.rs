//! Crawler module for fetching pages and running batches
//!
//! This module contains the core pipeline logic, including:
//! - HTTP fetching with retry logic and backoff
//! - User-Agent rotation
//! - A shared rate limiter spacing every request of a run
//! - Proxy pools with swappable rotation policies
//! - Overall run coordination and statistics

mod coordinator;
mod fetcher;
mod proxy;
mod rate_limiter;

pub use coordinator::{Coordinator, ProgressEvent};
pub use fetcher::{
    build_http_client, fetch, is_text_content, Backoff, FetchError, FetchPolicy, HttpFetcher,
    PageContent, PageFetcher, DEFAULT_USER_AGENTS, MAX_BODY_BYTES,
};
pub use proxy::{IndexSelector, ProxyPool, RandomSelector, RoundRobin, Rotation};
pub use rate_limiter::RateLimiter;

/// A page to visit, with the provenance copied onto its emails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub url: String,
    pub company_name: Option<String>,
    pub category: Option<String>,
}

impl CrawlTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            company_name: None,
            category: None,
        }
    }

    pub fn with_company(mut self, company_name: impl Into<String>) -> Self {
        self.company_name = Some(company_name.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

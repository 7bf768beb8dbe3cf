//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients with browser-like headers and a timeout
//! - One client per proxy endpoint
//! - A rotating User-Agent on every request
//! - GET requests to fetch page content, text bodies only, size-capped
//! - Retry logic with backoff for transient failures
//! - Error classification

use crate::crawler::proxy::{IndexSelector, ProxyPool, RandomSelector, Rotation};
use crate::crawler::rate_limiter::RateLimiter;
use crate::url::normalize_target_url;
use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// User agents rotated when none are configured
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:131.0) Gecko/20100101 Firefox/131.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:131.0) Gecko/20100101 Firefox/131.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36 Edg/130.0.0.0",
];

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGES: &str = "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7";

/// Largest body read from one response
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// A successfully fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    /// The requested URL, normalized
    pub url: String,
    /// Final URL after redirects
    pub final_url: String,
    /// HTTP status code
    pub status_code: u16,
    /// Page body
    pub body: String,
    /// Content-Type header value, if sent
    pub content_type: Option<String>,
}

/// Why a fetch failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("Connection to {url} failed: {message}")]
    ConnectionRefused { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Not a text page at {url}: {content_type}")]
    ContentMismatch { url: String, content_type: String },

    #[error("Body of {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

impl FetchError {
    /// Returns true if another attempt may succeed
    ///
    /// | Condition | Transient |
    /// |-----------|-----------|
    /// | Timeout | yes |
    /// | Connection or proxy failure | yes |
    /// | HTTP 429 | yes |
    /// | HTTP 5xx | yes |
    /// | Other HTTP status | no |
    /// | Invalid URL | no |
    /// | Non-text content or oversized body | no |
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::ConnectionRefused { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || (500..600).contains(status),
            Self::InvalidUrl { .. } | Self::ContentMismatch { .. } | Self::TooLarge { .. } => false,
        }
    }

    /// The URL the failure refers to
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::ConnectionRefused { url, .. }
            | Self::HttpStatus { url, .. }
            | Self::InvalidUrl { url, .. }
            | Self::ContentMismatch { url, .. }
            | Self::TooLarge { url, .. } => url,
        }
    }
}

/// Delay between attempts of one URL
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed(Duration),

    /// `base * 2^retry`, capped at `max`
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Returns the delay after the given failed attempt (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { base, max } => {
                let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
                base.checked_mul(factor).unwrap_or(max).min(max)
            }
        }
    }
}

/// Retry settings for [`fetch`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchPolicy {
    /// Extra attempts after the first, for transient failures only
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl FetchPolicy {
    pub fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }
}

/// A single HTTP GET, with no retry and no rate limiting
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` once, through `proxy` when given
    async fn fetch_once(&self, url: &Url, proxy: Option<&str>) -> Result<PageContent, FetchError>;
}

/// reqwest-backed fetcher
///
/// Holds a direct client plus one client per proxy endpoint, built up front
/// so connections are pooled per route. The User-Agent is chosen per request.
pub struct HttpFetcher {
    direct: Client,
    proxied: HashMap<String, Client>,
    user_agents: Vec<String>,
    agent_selector: Box<dyn IndexSelector>,
}

impl HttpFetcher {
    /// Builds clients for direct access and for each proxy
    ///
    /// # Arguments
    ///
    /// * `timeout` - Per-request timeout
    /// * `user_agents` - User-Agent values to rotate; empty means [`DEFAULT_USER_AGENTS`]
    /// * `proxies` - Proxy endpoints, e.g. `http://10.0.0.1:8080`
    ///
    /// # Returns
    ///
    /// * `Ok(HttpFetcher)` - All clients built
    /// * `Err(reqwest::Error)` - A proxy URL was rejected or TLS setup failed
    pub fn new(
        timeout: Duration,
        user_agents: Vec<String>,
        proxies: &[String],
    ) -> Result<Self, reqwest::Error> {
        let direct = build_http_client(timeout, None)?;

        let mut proxied = HashMap::new();
        for proxy in proxies {
            let client = build_http_client(timeout, Some(proxy))?;
            proxied.insert(proxy.clone(), client);
        }

        let user_agents = if user_agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect()
        } else {
            user_agents
        };

        Ok(Self {
            direct,
            proxied,
            user_agents,
            agent_selector: Box::new(RandomSelector),
        })
    }

    /// Sets how the User-Agent rotates between requests (random by default)
    pub fn with_agent_rotation(mut self, rotation: Rotation) -> Self {
        self.agent_selector = rotation.selector();
        self
    }

    fn client_for(&self, proxy: Option<&str>) -> &Client {
        match proxy {
            Some(proxy) => self.proxied.get(proxy).unwrap_or_else(|| {
                tracing::warn!("No client for proxy {}, fetching directly", proxy);
                &self.direct
            }),
            None => &self.direct,
        }
    }

    fn next_user_agent(&self) -> &str {
        let index = self.agent_selector.select(self.user_agents.len());
        self.user_agents
            .get(index)
            .map(String::as_str)
            .unwrap_or(DEFAULT_USER_AGENTS[0])
    }
}

/// Builds an HTTP client with proper configuration
///
/// Every request carries browser-like `Accept` and `Accept-Language`
/// headers; the User-Agent is set per request.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use sumi_sieve::crawler::build_http_client;
///
/// let client = build_http_client(Duration::from_secs(20), None);
/// assert!(client.is_ok());
/// ```
pub fn build_http_client(timeout: Duration, proxy: Option<&str>) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGES));

    let mut builder = Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }

    builder.build()
}

fn classify(url: &Url, err: reqwest::Error) -> FetchError {
    let url = url.to_string();
    if err.is_timeout() {
        FetchError::Timeout { url }
    } else if let Some(status) = err.status() {
        FetchError::HttpStatus {
            url,
            status: status.as_u16(),
        }
    } else {
        FetchError::ConnectionRefused {
            url,
            message: err.to_string(),
        }
    }
}

/// Returns true for content types worth scanning for addresses
///
/// A missing header is accepted; servers often omit it for HTML.
pub fn is_text_content(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime.is_empty()
        || mime.starts_with("text/")
        || mime == "application/xhtml+xml"
        || mime == "application/xml"
        || mime.ends_with("+xml")
}

/// Reads at most `limit` bytes of body and decodes it using the header charset
async fn read_body(
    url: &Url,
    mut response: Response,
    content_type: Option<&str>,
    limit: usize,
) -> Result<String, FetchError> {
    let too_large = || FetchError::TooLarge {
        url: url.to_string(),
        limit,
    };

    if response
        .content_length()
        .is_some_and(|length| length > limit as u64)
    {
        return Err(too_large());
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| classify(url, e))? {
        if bytes.len() + chunk.len() > limit {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }

    let encoding = content_type
        .and_then(|value| {
            value
                .split(';')
                .filter_map(|param| param.trim().strip_prefix("charset="))
                .next()
        })
        .and_then(|label| Encoding::for_label(label.trim_matches('"').as_bytes()))
        .unwrap_or(UTF_8);

    let (text, _, _) = encoding.decode(&bytes);
    Ok(text.into_owned())
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_once(&self, url: &Url, proxy: Option<&str>) -> Result<PageContent, FetchError> {
        let response = self
            .client_for(proxy)
            .get(url.clone())
            .header(USER_AGENT, self.next_user_agent())
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !is_text_content(content_type.as_deref()) {
            return Err(FetchError::ContentMismatch {
                url: url.to_string(),
                content_type: content_type.unwrap_or_default(),
            });
        }

        let body = read_body(url, response, content_type.as_deref(), MAX_BODY_BYTES).await?;

        Ok(PageContent {
            url: url.to_string(),
            final_url,
            status_code: status.as_u16(),
            body,
            content_type,
        })
    }
}

/// Fetches a URL with rate limiting, proxy rotation, and retries
///
/// # Request Flow
///
/// 1. Normalize the URL; failures return `InvalidUrl` with no request sent
/// 2. Pick a proxy from the pool, if any
/// 3. Wait on the shared rate limiter
/// 4. Send one GET
/// 5. On a transient failure, sleep for the backoff and go to 2
///
/// At most `1 + policy.max_retries` requests are sent.
///
/// # Arguments
///
/// * `fetcher` - Performs the single GET
/// * `limiter` - Shared limiter spacing every request of the run
/// * `url` - The target URL as supplied
/// * `policy` - Retry count and backoff
/// * `proxies` - Proxy pool, or `None` for direct access
pub async fn fetch<F>(
    fetcher: &F,
    limiter: &RateLimiter,
    url: &str,
    policy: &FetchPolicy,
    proxies: Option<&ProxyPool>,
) -> Result<PageContent, FetchError>
where
    F: PageFetcher + ?Sized,
{
    let target = normalize_target_url(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let mut attempt = 0;
    loop {
        let proxy = proxies.and_then(|pool| pool.next());
        limiter.acquire().await;

        tracing::debug!(
            "GET {} (attempt {}/{}{})",
            target,
            attempt + 1,
            policy.max_retries + 1,
            proxy.map(|p| format!(", via {}", p)).unwrap_or_default()
        );

        match fetcher.fetch_once(&target, proxy).await {
            Ok(page) => return Ok(page),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = policy.backoff.delay_for(attempt);
                tracing::warn!("{}; retrying in {:.1}s", e, delay.as_secs_f64());
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

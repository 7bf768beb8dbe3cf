use crate::crawler::{Backoff, FetchPolicy, ProxyPool, Rotation};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sumi-Sieve
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub extraction: ExtractionConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default, rename = "category")]
    pub categories: Vec<CategoryConfig>,
}

impl Config {
    /// Looks up a category by name
    pub fn category(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.name == name)
    }
}

/// Fetch and extraction behavior
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// Minimum time between the starts of any two requests (seconds)
    #[serde(rename = "delay-between-requests", default = "default_delay")]
    pub delay_between_requests: f64,

    /// Extra attempts for transient failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(rename = "use-proxies", default)]
    pub use_proxies: bool,

    /// Proxy endpoints, e.g. `http://10.0.0.1:8080`
    #[serde(default)]
    pub proxies: Vec<String>,

    #[serde(rename = "proxy-rotation", default)]
    pub proxy_rotation: Rotation,

    #[serde(default)]
    pub backoff: BackoffKind,

    /// Cap for exponential backoff (seconds)
    #[serde(rename = "max-backoff", default = "default_max_backoff")]
    pub max_backoff: f64,

    /// A single fixed User-Agent; ignored when `user-agents` is set
    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,

    /// User-Agent values rotated per request
    #[serde(rename = "user-agents", default)]
    pub user_agents: Vec<String>,

    #[serde(rename = "user-agent-rotation", default = "default_agent_rotation")]
    pub user_agent_rotation: Rotation,
}

fn default_delay() -> f64 {
    30.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout() -> u64 {
    20
}

fn default_max_backoff() -> f64 {
    300.0
}

fn default_agent_rotation() -> Rotation {
    Rotation::Random
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            delay_between_requests: default_delay(),
            max_retries: default_max_retries(),
            timeout: default_timeout(),
            use_proxies: false,
            proxies: Vec::new(),
            proxy_rotation: Rotation::default(),
            backoff: BackoffKind::default(),
            max_backoff: default_max_backoff(),
            user_agent: None,
            user_agents: Vec::new(),
            user_agent_rotation: default_agent_rotation(),
        }
    }
}

impl ExtractionConfig {
    pub fn delay(&self) -> Duration {
        seconds(self.delay_between_requests)
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// User agents to rotate; empty means the built-in browser list
    pub fn user_agents(&self) -> Vec<String> {
        if !self.user_agents.is_empty() {
            return self.user_agents.clone();
        }
        self.user_agent.iter().cloned().collect()
    }

    /// Retry settings; the backoff base is the request delay
    pub fn fetch_policy(&self) -> FetchPolicy {
        let backoff = match self.backoff {
            BackoffKind::Fixed => Backoff::Fixed(self.delay()),
            BackoffKind::Exponential => Backoff::Exponential {
                base: self.delay(),
                max: seconds(self.max_backoff),
            },
        };
        FetchPolicy::new(self.max_retries, backoff)
    }

    /// The proxy pool, when proxies are enabled and listed
    pub fn proxy_pool(&self) -> Option<ProxyPool> {
        if !self.use_proxies || self.proxies.is_empty() {
            return None;
        }
        Some(ProxyPool::with_rotation(
            self.proxies.clone(),
            self.proxy_rotation,
        ))
    }
}

/// Converts a validated seconds value; out-of-range values saturate
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

/// Backoff policy name in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// Database location
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

/// Report locations
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Plain-text list of every email
    #[serde(rename = "emails-path")]
    pub emails_path: Option<PathBuf>,

    /// Markdown summary of the last run
    #[serde(rename = "summary-path")]
    pub summary_path: Option<PathBuf>,
}

/// A named group of target URLs
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    pub name: String,

    /// File with one URL per line, optionally `url,company`
    #[serde(rename = "urls-file")]
    pub urls_file: PathBuf,

    /// Plain-text list of this category's emails
    #[serde(rename = "output-file")]
    pub output_file: Option<PathBuf>,
}

use crate::config::types::{CategoryConfig, Config, DatabaseConfig, ExtractionConfig};
use crate::{ConfigError, ConfigResult};
use std::collections::HashSet;

const MAX_TIMEOUT_SECS: u64 = 300;
const MAX_RETRIES: u32 = 10;
/// Upper bound for delay and backoff settings: one day
const MAX_WAIT_SECS: f64 = 86_400.0;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_extraction_config(&config.extraction)?;
    validate_database_config(&config.database)?;
    validate_categories(&config.categories)?;
    Ok(())
}

/// Validates fetch and extraction settings
fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    if !(0.0..=MAX_WAIT_SECS).contains(&config.delay_between_requests) {
        return Err(ConfigError::Validation(format!(
            "delay-between-requests must be between 0 and {} seconds, got {}",
            MAX_WAIT_SECS, config.delay_between_requests
        )));
    }

    if config.timeout < 1 || config.timeout > MAX_TIMEOUT_SECS {
        return Err(ConfigError::Validation(format!(
            "timeout must be between 1 and {} seconds, got {}",
            MAX_TIMEOUT_SECS, config.timeout
        )));
    }

    if config.max_retries > MAX_RETRIES {
        return Err(ConfigError::Validation(format!(
            "max-retries must be at most {}, got {}",
            MAX_RETRIES, config.max_retries
        )));
    }

    if !(0.0..=MAX_WAIT_SECS).contains(&config.max_backoff) {
        return Err(ConfigError::Validation(format!(
            "max-backoff must be between 0 and {} seconds, got {}",
            MAX_WAIT_SECS, config.max_backoff
        )));
    }

    let agents = config.user_agent.iter().chain(&config.user_agents);
    for user_agent in agents {
        if user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user-agent cannot be empty".to_string(),
            ));
        }
        reqwest::header::HeaderValue::from_str(user_agent).map_err(|_| {
            ConfigError::Validation(format!("user-agent '{}' is not a valid header value", user_agent))
        })?;
    }

    if config.use_proxies {
        if config.proxies.is_empty() {
            return Err(ConfigError::Validation(
                "use-proxies is set but no proxies are listed".to_string(),
            ));
        }
        for proxy in &config.proxies {
            reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| ConfigError::InvalidProxy(format!("'{}': {}", proxy, e)))?;
        }
    }

    Ok(())
}

/// Validates database configuration
fn validate_database_config(config: &DatabaseConfig) -> Result<(), ConfigError> {
    if config.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "database path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates category entries
fn validate_categories(categories: &[CategoryConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for category in categories {
        if category.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "category name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(category.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "category '{}' is defined more than once",
                category.name
            )));
        }

        if category.urls_file.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!(
                "category '{}' must have a urls-file",
                category.name
            )));
        }
    }

    Ok(())
}

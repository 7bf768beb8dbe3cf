//! Target list files
//!
//! One target per line: a URL, optionally followed by `,Company Name`.
//! Blank lines and lines starting with `#` are skipped. URLs are passed
//! through as written; normalization happens at fetch time so a bad line
//! fails on its own instead of failing the whole file.

use crate::crawler::CrawlTarget;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading a target list
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No targets in {0}")]
    NoTargets(PathBuf),
}

/// Reads targets from a list file, tagging each with `category`
///
/// # Arguments
///
/// * `path` - The list file
/// * `category` - Category copied onto every target, if any
///
/// # Returns
///
/// * `Ok(Vec<CrawlTarget>)` - Targets in file order
/// * `Err(InputError)` - The file could not be read or held no targets
pub fn read_targets(path: &Path, category: Option<&str>) -> Result<Vec<CrawlTarget>, InputError> {
    let content = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let targets = parse_targets(&content, category);
    if targets.is_empty() {
        return Err(InputError::NoTargets(path.to_path_buf()));
    }

    tracing::debug!("Read {} targets from {}", targets.len(), path.display());
    Ok(targets)
}

/// Parses list text into targets
pub fn parse_targets(content: &str, category: Option<&str>) -> Vec<CrawlTarget> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let (url, company) = match line.split_once(',') {
                Some((url, company)) => (url.trim(), Some(company.trim())),
                None => (line, None),
            };

            let mut target = CrawlTarget::new(url);
            if let Some(company) = company.filter(|c| !c.is_empty()) {
                target = target.with_company(company);
            }
            if let Some(category) = category {
                target = target.with_category(category);
            }
            target
        })
        .collect()
}

//! Plain-text email list export

use crate::output::OutputResult;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Adds emails to a one-per-line list file
///
/// Addresses already in the file are kept; the result is sorted and free
/// of duplicates. Missing parent directories are created.
///
/// # Arguments
///
/// * `emails` - Addresses to add
/// * `path` - The list file
///
/// # Returns
///
/// * `Ok(usize)` - Number of addresses now in the file
/// * `Err(OutputError)` - Failed to read or write the file
pub fn write_email_list<I, S>(emails: I, path: &Path) -> OutputResult<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut all: BTreeSet<String> = match fs::read_to_string(path) {
        Ok(existing) => existing
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) if e.kind() == ErrorKind::NotFound => BTreeSet::new(),
        Err(e) => return Err(e.into()),
    };

    all.extend(
        emails
            .into_iter()
            .map(|email| email.as_ref().trim().to_string())
            .filter(|email| !email.is_empty()),
    );

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, format_email_list(&all))?;

    tracing::debug!("Wrote {} emails to {}", all.len(), path.display());
    Ok(all.len())
}

/// Renders addresses one per line, sorted and without duplicates
///
/// Used for stdout when no list file is configured.
pub fn format_email_list<I, S>(emails: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let sorted: BTreeSet<String> = emails
        .into_iter()
        .map(|email| email.as_ref().trim().to_string())
        .filter(|email| !email.is_empty())
        .collect();
    let mut content = sorted.into_iter().collect::<Vec<_>>().join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    content
}

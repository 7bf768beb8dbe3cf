//! Email validation and normalization

use crate::email::filters;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// RFC 5322 dot-atom local part, hostname labels, alphabetic TLD
static EMAIL_GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,63}$",
    )
    .expect("valid regex")
});

const MAX_LOCAL_PART_LEN: usize = 64;
const MAX_EMAIL_LEN: usize = 254;

/// Returns true if the candidate is a syntactically valid email address that
/// no false-positive filter rejects
///
/// Deterministic and side-effect free.
///
/// # Examples
///
/// ```
/// use sumi_sieve::email::is_valid_email;
///
/// assert!(is_valid_email("sales@acme.com"));
/// assert!(!is_valid_email("invalid-email"));
/// assert!(!is_valid_email("logo@2x.png"));
/// ```
pub fn is_valid_email(candidate: &str) -> bool {
    if candidate.is_empty() || candidate.len() > MAX_EMAIL_LEN {
        return false;
    }

    let Some((local, _)) = candidate.rsplit_once('@') else {
        return false;
    };
    if local.len() > MAX_LOCAL_PART_LEN {
        return false;
    }

    if !EMAIL_GRAMMAR.is_match(candidate) {
        return false;
    }

    match filters::rejected_by(candidate) {
        Some(rule) => {
            tracing::trace!("Rejected {} by {} filter", candidate, rule);
            false
        }
        None => true,
    }
}

/// Normalizes an email address: trims whitespace and lowercases the domain
///
/// The local part keeps its case. Mailbox names are case-sensitive per
/// RFC 5321, so `Info@acme.com` and `info@acme.com` stay distinct.
///
/// # Examples
///
/// ```
/// use sumi_sieve::email::normalize;
///
/// assert_eq!(normalize(" Sales@ACME.Com "), "Sales@acme.com");
/// ```
pub fn normalize(email: &str) -> String {
    let trimmed = email.trim();
    match trimmed.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_ascii_lowercase()),
        None => trimmed.to_string(),
    }
}

/// Filters, normalizes, and deduplicates candidates
///
/// The output keeps the order in which each normalized address was first
/// seen, so the same input always produces the same sequence. Applying it to
/// its own output changes nothing.
pub fn validate_many<I, S>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut valid = Vec::new();

    for candidate in candidates {
        let candidate = candidate.as_ref().trim();
        if !is_valid_email(candidate) {
            continue;
        }
        let normalized = normalize(candidate);
        if seen.insert(normalized.clone()) {
            valid.push(normalized);
        }
    }

    valid
}

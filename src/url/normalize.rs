use crate::{UrlError, UrlResult};
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "yclid",
    "mc_eid",
];

/// Normalizes a target URL before it is fetched and recorded as provenance
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace; reject empty input
/// 2. Prepend `https://` when the input has no scheme
/// 3. Parse the URL; reject if malformed
/// 4. Reject anything other than `http` and `https`
/// 5. Require a host (the parser lowercases it)
/// 6. Remove fragment (everything after #)
/// 7. Remove tracking query parameters, keeping the rest in their original order
///
/// The scheme of an explicit `http://` URL is kept as-is: some of the sites
/// in contact lists still do not serve TLS.
///
/// # Examples
///
/// ```
/// use sumi_sieve::url::normalize_target_url;
///
/// let url = normalize_target_url("Example.COM/contacts#team").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/contacts");
/// ```
pub fn normalize_target_url(input: &str) -> UrlResult<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let with_scheme = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(UrlError::MissingDomain),
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Ok(url)
}

/// Returns true if the input starts with `<scheme>://` or a known opaque scheme
fn has_scheme(input: &str) -> bool {
    if let Some(idx) = input.find("://") {
        let scheme = &input[..idx];
        return !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    }

    let lower = input.to_ascii_lowercase();
    ["mailto:", "javascript:", "data:", "tel:", "file:"]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

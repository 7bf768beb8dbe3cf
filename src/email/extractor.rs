//! Email extraction from fetched HTML
//!
//! Candidates are gathered from several places on the page, in this order:
//!
//! - `mailto:` link targets (query stripped, percent-decoded, `Name <addr>` unwrapped)
//! - `data-email`, `data-mail`, `data-e-mail` attributes
//! - text of elements whose class marks them as an email holder
//! - all visible document text
//! - a raw scan of the HTML source
//!
//! Bracketed obfuscations such as `sales [at] acme [dot] com` are resolved
//! before scanning. Everything then goes through
//! [`validate_many`](crate::email::validate_many).

use crate::crawler::PageContent;
use crate::email::validator::validate_many;
use percent_encoding::percent_decode_str;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Broad pattern for raw candidates; validation narrows it down
static EMAIL_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid regex")
});

static OBFUSCATED_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[\[\(\{]\s*(?:at|собака)\s*[\]\)\}]\s*").expect("valid regex")
});

static OBFUSCATED_DOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[\[\(\{]\s*(?:dot|точка)\s*[\]\)\}]\s*").expect("valid regex")
});

const DATA_EMAIL_ATTRS: &[&str] = &["data-email", "data-mail", "data-e-mail"];
const EMAIL_CLASSES: &[&str] = &["email", "mail", "e-mail", "contact-email", "contact-mail"];

/// Extracts validated emails from fetched page content
///
/// Absent or empty content yields an empty set.
pub fn extract_emails(content: Option<&PageContent>) -> BTreeSet<String> {
    match content {
        Some(page) => extract_emails_from_html(&page.body),
        None => BTreeSet::new(),
    }
}

/// Extracts validated emails from an HTML string
///
/// # Example
///
/// ```
/// use sumi_sieve::email::extract_emails_from_html;
///
/// let html = r#"<p>contact: sales@acme.com and invalid-email</p>"#;
/// let emails = extract_emails_from_html(html);
/// assert_eq!(emails.len(), 1);
/// assert!(emails.contains("sales@acme.com"));
/// ```
pub fn extract_emails_from_html(html: &str) -> BTreeSet<String> {
    if html.trim().is_empty() {
        return BTreeSet::new();
    }

    validate_many(extract_candidates(html)).into_iter().collect()
}

/// Collects raw candidates from every source on the page, unvalidated
pub fn extract_candidates(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut candidates = Vec::new();

    candidates.extend(mailto_targets(&document));

    if let Ok(selector) = Selector::parse("[data-email], [data-mail], [data-e-mail]") {
        for element in document.select(&selector) {
            for attr in DATA_EMAIL_ATTRS {
                if let Some(value) = element.value().attr(attr) {
                    candidates.extend(scan_text(value));
                }
            }
        }
    }

    for class in EMAIL_CLASSES {
        if let Ok(selector) = Selector::parse(&format!(".{}", class)) {
            for element in document.select(&selector) {
                let text = element.text().collect::<Vec<_>>().join(" ");
                candidates.extend(scan_text(&text));
            }
        }
    }

    // Text nodes are joined with spaces so adjacent inline elements do not
    // glue onto an address.
    let page_text = document.root_element().text().collect::<Vec<_>>().join(" ");
    candidates.extend(scan_text(&page_text));

    candidates.extend(scan_text(html));

    candidates
}

/// Finds candidates in free text after resolving bracketed obfuscation
pub fn scan_text(text: &str) -> Vec<String> {
    let resolved = deobfuscate(text);
    EMAIL_CANDIDATE
        .find_iter(&resolved)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Rewrites `[at]`/`(dot)` style markers to `@` and `.`
pub fn deobfuscate(text: &str) -> String {
    let with_at = OBFUSCATED_AT.replace_all(text, "@");
    OBFUSCATED_DOT.replace_all(&with_at, ".").into_owned()
}

/// Returns addresses from `mailto:` links
fn mailto_targets(document: &Html) -> Vec<String> {
    let mut targets = Vec::new();

    let Ok(selector) = Selector::parse("a[href]") else {
        return targets;
    };

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        let Some(rest) = href
            .get(..7)
            .filter(|scheme| scheme.eq_ignore_ascii_case("mailto:"))
            .and_then(|_| href.get(7..))
        else {
            continue;
        };

        let addresses = rest.split('?').next().unwrap_or_default();
        let decoded = percent_decode_str(addresses).decode_utf8_lossy();
        // `"Sales Team" <sales@acme.com>` and plain lists both reduce to a scan
        for address in decoded.split(',') {
            targets.extend(scan_text(address));
        }
    }

    targets
}

/// Best-effort company name for a page
///
/// Prefers `og:site_name`, then the `<title>` text.
pub fn extract_company_name(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    if let Ok(selector) = Selector::parse("meta[property='og:site_name'][content]") {
        let site_name = document
            .select(&selector)
            .filter_map(|element| element.value().attr("content"))
            .map(|content| content.trim().to_string())
            .find(|content| !content.is_empty());
        if site_name.is_some() {
            return site_name;
        }
    }

    let title_selector = Selector::parse("title").ok()?;
    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

//! False-positive filters for email candidates
//!
//! Pages are full of strings that look like addresses but are not: retina
//! image names (`logo@2x.png`), template placeholders, half-resolved
//! obfuscations, and tracking ids embedded in scripts. Each rule here is an
//! independent predicate over an already grammar-checked candidate; a
//! candidate is rejected if any rule fires.

use regex::Regex;
use std::sync::LazyLock;

/// Extensions that show up as a "TLD" when a filename contains `@`
const FILE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "ico", "tif", "tiff", "avif", "js", "css",
];

/// Domains used in templates and documentation rather than real mailboxes
const PLACEHOLDER_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "test.com",
    "domain.com",
    "yourdomain.com",
    "email.com",
];

/// Markers left behind by obfuscation the extractor failed to resolve
const OBFUSCATION_MARKERS: &[&str] = &["[at]", "(at)", "{at}", "[dot]", "(dot)", "{dot}", "%40"];

/// A `%XX` escape: text lifted out of a URL without decoding
static PERCENT_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%[0-9A-Fa-f]{2}").expect("valid regex"));

/// Minimum length of an all-hex local part treated as a generated id
const HASH_LOCAL_PART_MIN_LEN: usize = 24;

/// A named false-positive rule
pub struct FalsePositiveFilter {
    pub name: &'static str,
    pub rejects: fn(&str) -> bool,
}

/// All rules applied by [`crate::email::is_valid_email`], in evaluation order
pub const FALSE_POSITIVE_FILTERS: &[FalsePositiveFilter] = &[
    FalsePositiveFilter {
        name: "file_extension",
        rejects: has_file_extension,
    },
    FalsePositiveFilter {
        name: "placeholder_domain",
        rejects: is_placeholder_domain,
    },
    FalsePositiveFilter {
        name: "obfuscation_marker",
        rejects: has_obfuscation_marker,
    },
    FalsePositiveFilter {
        name: "percent_escape",
        rejects: has_percent_escape,
    },
    FalsePositiveFilter {
        name: "hash_local_part",
        rejects: is_hash_local_part,
    },
];

/// Returns the name of the first filter that rejects the candidate
pub fn rejected_by(candidate: &str) -> Option<&'static str> {
    FALSE_POSITIVE_FILTERS
        .iter()
        .find(|filter| (filter.rejects)(candidate))
        .map(|filter| filter.name)
}

/// The domain ends in an image or asset extension, e.g. `icon@2x.png`
pub fn has_file_extension(candidate: &str) -> bool {
    let Some((_, domain)) = candidate.rsplit_once('@') else {
        return false;
    };
    domain
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            FILE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// The domain is a documentation placeholder or one of its subdomains
pub fn is_placeholder_domain(candidate: &str) -> bool {
    let Some((_, domain)) = candidate.rsplit_once('@') else {
        return false;
    };
    let domain = domain.to_ascii_lowercase();
    PLACEHOLDER_DOMAINS.iter().any(|placeholder| {
        domain == *placeholder
            || domain
                .strip_suffix(placeholder)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// The candidate still carries an `[at]`/`(dot)` style marker or an encoded `@`
pub fn has_obfuscation_marker(candidate: &str) -> bool {
    let lower = candidate.to_ascii_lowercase();
    OBFUSCATION_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// The candidate contains a URL escape such as `%20` or `%3C`
pub fn has_percent_escape(candidate: &str) -> bool {
    PERCENT_ESCAPE.is_match(candidate)
}

/// The local part is a long hexadecimal id (error-tracker DSNs and the like)
pub fn is_hash_local_part(candidate: &str) -> bool {
    let Some((local, _)) = candidate.rsplit_once('@') else {
        return false;
    };
    local.len() >= HASH_LOCAL_PART_MIN_LEN && local.chars().all(|c| c.is_ascii_hexdigit())
}

//! URL handling module for Sumi-Sieve
//!
//! Target URLs arrive from hand-maintained lists, so they are cleaned up
//! before the fetcher sees them: a missing scheme is filled in, fragments and
//! tracking parameters are dropped, and anything that is not HTTP(S) is
//! rejected.

mod normalize;

pub use normalize::normalize_target_url;

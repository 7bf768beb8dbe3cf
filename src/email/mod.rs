//! Email module: candidate extraction, validation, and normalization
//!
//! This module is pure: nothing here touches the network or the database.
//!
//! - `validator`: grammar check, normalization, bulk validation
//! - `filters`: independent false-positive rules
//! - `extractor`: HTML → set of validated addresses

pub mod filters;
mod extractor;
mod validator;

pub use extractor::{
    deobfuscate, extract_candidates, extract_company_name, extract_emails,
    extract_emails_from_html, scan_text,
};
pub use validator::{is_valid_email, normalize, validate_many};

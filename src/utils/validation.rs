//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;

/// Loose address check; deliverability is Google's or the mail server's problem
static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Domain names as stored on wildcard allow-list entries
static DOMAIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)+$").unwrap()
});

/// Trim and lowercase an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Domain part of a normalized email, if it has a non-empty local and domain part
pub fn email_domain(email: &str) -> Option<&str> {
    let (local, domain) = email.rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(domain)
}

/// Validate an email address
pub fn validate_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

/// Validate a domain name (expects lowercase input)
pub fn validate_domain(domain: &str) -> bool {
    !domain.is_empty() && domain.len() <= 253 && DOMAIN_REGEX.is_match(domain)
}

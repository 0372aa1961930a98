//! Allow-list resolution and login admission
//!
//! An address is admitted when it has an active exact entry, or failing that,
//! when its domain has an active wildcard entry. Exact entries always win.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::db::AllowedEmailStore;
use crate::models::{AccessLevel, AllowedEmail};
use crate::utils::error::is_unique_violation;
use crate::utils::validation::{email_domain, normalize_email};

/// Resolve the active allow-list entry for an address
pub async fn is_email_allowed(
    store: &dyn AllowedEmailStore,
    email: &str,
) -> Result<Option<AllowedEmail>> {
    let email = normalize_email(email);
    let Some(domain) = email_domain(&email) else {
        debug!(email = %email, "Malformed address rejected by allow-list");
        return Ok(None);
    };

    if let Some(entry) = store.find_active_by_email(&email).await? {
        return Ok(Some(entry));
    }

    store.find_active_domain(domain).await
}

/// Whether `email` is one of the configured override addresses
pub fn is_override_email(email: &str, override_emails: &[String]) -> bool {
    let email = normalize_email(email);
    override_emails
        .iter()
        .any(|candidate| normalize_email(candidate) == email)
}

/// Create the admin entry for an override address that has none yet
///
/// Returns the created entry, or `None` when the address is not an override
/// address or already has an entry of its own.
pub async fn bootstrap_override_email(
    store: &dyn AllowedEmailStore,
    email: &str,
    override_emails: &[String],
) -> Result<Option<AllowedEmail>> {
    if !is_override_email(email, override_emails) {
        return Ok(None);
    }

    let email = normalize_email(email);
    let Some(domain) = email_domain(&email) else {
        return Ok(None);
    };
    if store.find_active_by_email(&email).await?.is_some() {
        return Ok(None);
    }

    let mut entry = AllowedEmail::for_email(&email, domain, AccessLevel::Admin);
    entry.is_override_email = true;
    entry.notes = "Override email".to_string();

    // A deactivated entry for the address stays deactivated
    match store.insert(&entry).await {
        Ok(()) => {
            info!(email = %email, "Granted admin allow-list entry to override email");
            Ok(Some(entry))
        }
        Err(e)
            if e
                .downcast_ref::<sqlx::Error>()
                .is_some_and(is_unique_violation) =>
        {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Gate a sign-in: bootstrap override addresses, resolve the entry, and
/// record the login against it
pub async fn admit_login(
    store: &dyn AllowedEmailStore,
    email: &str,
    override_emails: &[String],
    at: DateTime<Utc>,
) -> Result<Option<AllowedEmail>> {
    bootstrap_override_email(store, email, override_emails).await?;

    let Some(entry) = is_email_allowed(store, email).await? else {
        info!(email = %normalize_email(email), "Login denied by allow-list");
        return Ok(None);
    };

    let tracked = store.track_login(entry.id, at).await?;
    Ok(Some(tracked.unwrap_or(entry)))
}

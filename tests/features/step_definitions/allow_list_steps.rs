//! Allow-list step definitions

use chrono::{Duration, Utc};
use cucumber::{given, then, when};

use brainybees::{
    db::{AllowedEmailRepository, AllowedEmailStore},
    models::{AccessLevel, AllowedEmail},
    services::allow_list::{admit_login, is_email_allowed},
    utils::{
        error::is_unique_violation,
        validation::{email_domain, normalize_email},
    },
};

use crate::features::support::TestWorld;

fn access_level(name: &str) -> AccessLevel {
    name.parse().expect("Unknown access level in scenario")
}

fn email_entry(email: &str, level: AccessLevel) -> AllowedEmail {
    let email = normalize_email(email);
    let domain = email_domain(&email).expect("Scenario email has no domain");
    AllowedEmail::for_email(&email, domain, level)
}

#[given(expr = "the domain {string} is allow-listed with access {string}")]
async fn domain_allow_listed(world: &mut TestWorld, domain: String, level: String) {
    let pool = world.db().await;
    let entry = AllowedEmail::for_domain(&domain, access_level(&level));
    AllowedEmailRepository::new(&pool)
        .insert(&entry)
        .await
        .expect("Failed to insert domain entry");
    world.last_entry = Some(entry);
}

#[given(expr = "the email {string} is allow-listed with access {string}")]
async fn email_allow_listed(world: &mut TestWorld, email: String, level: String) {
    let pool = world.db().await;
    let entry = email_entry(&email, access_level(&level));
    AllowedEmailRepository::new(&pool)
        .insert(&entry)
        .await
        .expect("Failed to insert email entry");
    world.last_entry = Some(entry);
}

#[given(expr = "the entry for {string} is deactivated")]
async fn entry_deactivated(world: &mut TestWorld, email: String) {
    let pool = world.db().await;
    let repo = AllowedEmailRepository::new(&pool);
    let entry = repo
        .get_by_email(&normalize_email(&email))
        .await
        .unwrap()
        .expect("No entry to deactivate");
    assert!(repo.set_active(entry.id, false).await.unwrap());
}

#[when(expr = "I resolve the email {string}")]
async fn resolve_email(world: &mut TestWorld, email: String) {
    let pool = world.db().await;
    let resolved = is_email_allowed(&AllowedEmailRepository::new(&pool), &email)
        .await
        .expect("Allow-list lookup failed");
    world.resolved = Some(resolved);
}

#[when(expr = "I allow-list the email {string} again")]
async fn allow_list_again(world: &mut TestWorld, email: String) {
    let pool = world.db().await;
    let entry = email_entry(&email, AccessLevel::Basic);
    world.last_error = match AllowedEmailRepository::new(&pool).insert(&entry).await {
        Ok(()) => None,
        Err(e) => {
            let duplicate = e
                .downcast_ref::<sqlx::Error>()
                .is_some_and(is_unique_violation);
            Some(if duplicate { "duplicate".to_string() } else { e.to_string() })
        }
    };
}

#[when(expr = "{string} logs in")]
async fn logs_in(world: &mut TestWorld, email: String) {
    let pool = world.db().await;
    let entry = admit_login(&AllowedEmailRepository::new(&pool), &email, &[], Utc::now())
        .await
        .expect("Login admission failed");
    world.last_entry = entry;
}

#[when(expr = "{string} logs in again later")]
async fn logs_in_later(world: &mut TestWorld, email: String) {
    let previous = world
        .last_entry
        .as_ref()
        .and_then(|e| e.last_login_at)
        .expect("No earlier login in scenario");

    let pool = world.db().await;
    let entry = admit_login(
        &AllowedEmailRepository::new(&pool),
        &email,
        &[],
        previous + Duration::hours(1),
    )
    .await
    .expect("Login admission failed");
    world.last_entry = entry;
}

#[when(expr = "the override email {string} logs in")]
async fn override_logs_in(world: &mut TestWorld, email: String) {
    let pool = world.db().await;
    let overrides = vec![email.clone()];
    let entry = admit_login(&AllowedEmailRepository::new(&pool), &email, &overrides, Utc::now())
        .await
        .expect("Login admission failed");
    world.last_entry = entry;
}

#[then(expr = "the email is allowed with access {string}")]
async fn email_allowed(world: &mut TestWorld, level: String) {
    let entry = world
        .resolved
        .clone()
        .expect("No resolution in scenario")
        .expect("Email was not allowed");
    assert_eq!(entry.access_level, access_level(&level));
}

#[then(expr = "the email {string} is allowed with access {string}")]
async fn named_email_allowed(world: &mut TestWorld, email: String, level: String) {
    let pool = world.db().await;
    let entry = is_email_allowed(&AllowedEmailRepository::new(&pool), &email)
        .await
        .unwrap()
        .expect("Email was not allowed");
    assert_eq!(entry.access_level, access_level(&level));
    assert!(entry.is_override_email);
}

#[then("the email is not allowed")]
async fn email_not_allowed(world: &mut TestWorld) {
    let resolved = world.resolved.clone().expect("No resolution in scenario");
    assert!(resolved.is_none(), "Expected no entry, got {:?}", resolved);
}

#[then("the matching entry is a domain wildcard")]
async fn matching_entry_is_wildcard(world: &mut TestWorld) {
    let entry = world.resolved.clone().flatten().expect("Email was not allowed");
    assert!(entry.is_domain_wildcard());
}

#[then("the insert fails as a duplicate")]
async fn insert_fails_as_duplicate(world: &mut TestWorld) {
    assert_eq!(world.last_error.as_deref(), Some("duplicate"));
}

#[then(expr = "the entry has {int} login and its first login equals its last login")]
async fn single_login_tracked(world: &mut TestWorld, count: i64) {
    let entry = world.last_entry.as_ref().expect("Login was denied");
    assert_eq!(entry.login_count, count);
    assert!(entry.first_login_at.is_some());
    assert_eq!(entry.first_login_at, entry.last_login_at);
}

#[then(expr = "the entry has {int} logins and its first login precedes its last login")]
async fn repeated_logins_tracked(world: &mut TestWorld, count: i64) {
    let entry = world.last_entry.as_ref().expect("Login was denied");
    assert_eq!(entry.login_count, count);
    let first = entry.first_login_at.expect("First login not recorded");
    let last = entry.last_login_at.expect("Last login not recorded");
    assert!(first < last);
}

//! Worksheet generation gate tests
//!
//! Drives `POST /api/worksheets/generate` through each gate and checks the
//! request stops at the first one that refuses it.

use axum::http::{header::RETRY_AFTER, StatusCode};
use serde_json::Value;
use uuid::Uuid;

use brainybees::{
    db::{AllowedEmailRepository, AllowedEmailStore, RateLimitRepository, UserRepository},
    models::AccessLevel,
};

use crate::common::{
    emails, mount_provider_failure, test_config, KidFixtures, TestApp, WorksheetFixtures,
};

const GENERATE: &str = "/api/worksheets/generate";

async fn ai_requests_used(app: &TestApp, user_id: Uuid) -> i64 {
    UserRepository::new(&app.state.db)
        .get_subscription(user_id)
        .await
        .unwrap()
        .unwrap()
        .ai_requests_used
}

#[tokio::test]
async fn test_generation_completes_and_consumes_quota() {
    let app = TestApp::new().await;
    let (user, token) = app.signed_in_user(emails::PARENT, AccessLevel::Basic, 5).await;

    let response = app
        .post_json_auth(GENERATE, &token, WorksheetFixtures::generate_request())
        .await;
    response.assert_created();

    let json: Value = response.json();
    assert_eq!(json["success"], true);
    assert_eq!(json["worksheet"]["topic"], "Adding within 20");
    assert_eq!(json["usage"]["aiRequestsUsed"], 1);
    assert_eq!(json["usage"]["remaining"], 4);
    assert_eq!(ai_requests_used(&app, user.id).await, 1);
}

#[tokio::test]
async fn test_revoked_access_is_denied_before_other_gates() {
    let app = TestApp::new().await;
    let (user, token) = app.signed_in_user(emails::PARENT, AccessLevel::Basic, 5).await;

    let repo = AllowedEmailRepository::new(&app.state.db);
    let entry = repo.get_by_email(emails::PARENT).await.unwrap().unwrap();
    assert!(repo.set_active(entry.id, false).await.unwrap());

    let response = app
        .post_json_auth(GENERATE, &token, WorksheetFixtures::generate_request())
        .await;
    response.assert_forbidden();
    let json: Value = response.json();
    assert_eq!(json["error"], "forbidden");
    assert!(json.get("requiresSubscription").is_none());

    // Denied requests touch neither the rate-limit counters nor the quota
    assert_eq!(RateLimitRepository::new(&app.state.db).count().await.unwrap(), 0);
    assert_eq!(ai_requests_used(&app, user.id).await, 0);
}

#[tokio::test]
async fn test_domain_wildcard_admits_generation() {
    let app = TestApp::new().await;
    let (_, token) = app.signed_in_user(emails::TEACHER, AccessLevel::Basic, 5).await;

    // Replace the exact entry with a domain wildcard
    let repo = AllowedEmailRepository::new(&app.state.db);
    let entry = repo.get_by_email(emails::TEACHER).await.unwrap().unwrap();
    repo.set_active(entry.id, false).await.unwrap();
    app.allow_domain(emails::SCHOOL_DOMAIN, AccessLevel::Basic).await;

    app.post_json_auth(GENERATE, &token, WorksheetFixtures::generate_request())
        .await
        .assert_created();
}

#[tokio::test]
async fn test_rate_limit_throttles_with_retry_after() {
    let mut config = test_config();
    config.rate_limit.max_hits = 2;
    config.rate_limit.window_secs = 3600;
    let app = TestApp::with_config(config).await;
    let (user, token) = app.signed_in_user(emails::PARENT, AccessLevel::Basic, 10).await;

    for _ in 0..2 {
        app.post_json_auth(GENERATE, &token, WorksheetFixtures::generate_request())
            .await
            .assert_created();
    }

    let response = app
        .post_json_auth(GENERATE, &token, WorksheetFixtures::generate_request())
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);

    let retry_after: u64 = response
        .headers
        .get(RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=3600).contains(&retry_after));
    let json: Value = response.json();
    assert_eq!(json["retryAfter"], retry_after);

    // Throttled requests do not reach the quota gate
    assert_eq!(ai_requests_used(&app, user.id).await, 2);
}

#[tokio::test]
async fn test_quota_exhaustion_requires_subscription() {
    let app = TestApp::new().await;
    let (user, token) = app.signed_in_user(emails::PARENT, AccessLevel::Basic, 1).await;

    app.post_json_auth(GENERATE, &token, WorksheetFixtures::generate_request())
        .await
        .assert_created();

    let response = app
        .post_json_auth(GENERATE, &token, WorksheetFixtures::generate_request())
        .await;
    response.assert_forbidden();

    let json: Value = response.json();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "quota_exceeded");
    assert_eq!(json["requiresSubscription"], true);
    assert_eq!(ai_requests_used(&app, user.id).await, 1);
}

#[tokio::test]
async fn test_unlimited_plan_never_exhausts() {
    let app = TestApp::new().await;
    let (user, token) = app.signed_in_user(emails::PARENT, AccessLevel::Premium, -1).await;

    for _ in 0..5 {
        app.post_json_auth(GENERATE, &token, WorksheetFixtures::generate_request())
            .await
            .assert_created();
    }
    assert_eq!(ai_requests_used(&app, user.id).await, 5);
}

#[tokio::test]
async fn test_provider_error_releases_quota() {
    let app = TestApp::new().await;
    let (user, token) = app.signed_in_user(emails::PARENT, AccessLevel::Basic, 5).await;
    mount_provider_failure(&app.upstream, 503).await;

    let response = app
        .post_json_auth(GENERATE, &token, WorksheetFixtures::generate_request())
        .await;
    response.assert_status(StatusCode::BAD_GATEWAY);

    let json: Value = response.json();
    assert_eq!(json["error"], "provider_error");
    assert_eq!(ai_requests_used(&app, user.id).await, 0);

    let listed: Value = app.get_auth("/api/worksheets", &token).await.json();
    assert!(listed["worksheets"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_foreign_kid_profile_is_not_found() {
    let app = TestApp::new().await;
    let (_, owner) = app.signed_in_user(emails::PARENT, AccessLevel::Basic, 5).await;
    let (other_user, other) = app.signed_in_user(emails::TEACHER, AccessLevel::Basic, 5).await;

    let kid: Value = app
        .post_json_auth("/api/kid-profiles", &owner, KidFixtures::create_request())
        .await
        .json();
    let kid_id = kid["kidProfile"]["id"].as_str().unwrap();

    app.post_json_auth(
        GENERATE,
        &other,
        WorksheetFixtures::generate_request_for(kid_id),
    )
    .await
    .assert_not_found();
    assert_eq!(ai_requests_used(&app, other_user.id).await, 0);
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_gates() {
    let app = TestApp::new().await;
    let (user, token) = app.signed_in_user(emails::PARENT, AccessLevel::Basic, 5).await;

    let mut body = WorksheetFixtures::generate_request();
    body["questionCount"] = 500.into();

    app.post_json_auth(GENERATE, &token, body)
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(ai_requests_used(&app, user.id).await, 0);
}

//! Allow-list administration tests

use axum::http::StatusCode;
use serde_json::{json, Value};

use brainybees::{
    db::{AllowedEmailRepository, AllowedEmailStore},
    models::{AccessLevel, UpdateAllowedEmailRequest},
};

use crate::common::{emails, TestApp};

#[tokio::test]
async fn test_admin_routes_reject_non_admins() {
    let app = TestApp::new().await;
    let (_, token) = app.signed_in_user(emails::PARENT, AccessLevel::Premium, 10).await;

    app.get_auth("/api/allowed-emails", &token)
        .await
        .assert_forbidden();
    app.post_json_auth(
        "/api/allowed-emails",
        &token,
        json!({"email": emails::STRANGER}),
    )
    .await
    .assert_forbidden();
    app.get_auth("/api/allowed-emails/check?email=a@b.test", &token)
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_admin_adds_and_checks_entries() {
    let app = TestApp::new().await;
    let (admin, token) = app.signed_in_user(emails::ADMIN, AccessLevel::Admin, 10).await;

    let created = app
        .post_json_auth(
            "/api/allowed-emails",
            &token,
            json!({"domain": emails::SCHOOL_DOMAIN, "accessLevel": "premium", "notes": "District"}),
        )
        .await;
    created.assert_created();
    let json: Value = created.json();
    assert!(json["entry"]["email"].is_null());
    assert_eq!(json["entry"]["addedBy"], admin.id.to_string());

    let check: Value = app
        .get_auth(
            "/api/allowed-emails/check?email=Kim@School.test",
            &token,
        )
        .await
        .json();
    assert_eq!(check["allowed"], true);
    assert_eq!(check["email"], "kim@school.test");
    assert_eq!(check["entry"]["accessLevel"], "premium");

    let check: Value = app
        .get_auth(
            &format!("/api/allowed-emails/check?email={}", emails::STRANGER),
            &token,
        )
        .await
        .json();
    assert_eq!(check["allowed"], false);
    assert!(check.get("entry").is_none());
}

#[tokio::test]
async fn test_duplicate_entry_conflicts() {
    let app = TestApp::new().await;
    let (_, token) = app.signed_in_user(emails::ADMIN, AccessLevel::Admin, 10).await;

    app.post_json_auth(
        "/api/allowed-emails",
        &token,
        json!({"email": emails::PARENT}),
    )
    .await
    .assert_created();

    let response = app
        .post_json_auth(
            "/api/allowed-emails",
            &token,
            json!({"email": "PARENT@family.test"}),
        )
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error"], "conflict");
}

#[tokio::test]
async fn test_deactivated_entry_hidden_from_default_list() {
    let app = TestApp::new().await;
    let (_, token) = app.signed_in_user(emails::ADMIN, AccessLevel::Admin, 10).await;
    let entry = app.allow_email(emails::PARENT, AccessLevel::Basic).await;

    let updated = app
        .put_json_auth(
            &format!("/api/allowed-emails/{}", entry.id),
            &token,
            json!({"isActive": false, "notes": "Left the school"}),
        )
        .await;
    updated.assert_ok();
    assert_eq!(updated.json::<Value>()["entry"]["isActive"], false);

    let active: Value = app.get_auth("/api/allowed-emails", &token).await.json();
    let all: Value = app
        .get_auth("/api/allowed-emails?includeInactive=true", &token)
        .await
        .json();
    assert_eq!(active["entries"].as_array().unwrap().len(), 1);
    assert_eq!(all["entries"].as_array().unwrap().len(), 2);

    let check: Value = app
        .get_auth(
            &format!("/api/allowed-emails/check?email={}", emails::PARENT),
            &token,
        )
        .await
        .json();
    assert_eq!(check["allowed"], false);
}

#[tokio::test]
async fn test_update_unknown_entry() {
    let app = TestApp::new().await;
    let (_, token) = app.signed_in_user(emails::ADMIN, AccessLevel::Admin, 10).await;

    app.put_json_auth(
        &format!("/api/allowed-emails/{}", uuid::Uuid::new_v4()),
        &token,
        json!({"accessLevel": "premium"}),
    )
    .await
    .assert_not_found();
}

#[tokio::test]
async fn test_revoked_admin_loses_admin_routes() {
    let app = TestApp::new().await;
    let (_, token) = app.signed_in_user(emails::ADMIN, AccessLevel::Admin, 10).await;
    app.get_auth("/api/allowed-emails", &token).await.assert_ok();

    let repo = AllowedEmailRepository::new(&app.state.db);
    let entry = repo.get_by_email(emails::ADMIN).await.unwrap().unwrap();
    assert!(repo.set_active(entry.id, false).await.unwrap());

    app.get_auth("/api/allowed-emails", &token)
        .await
        .assert_forbidden();
    app.post_json_auth(
        "/api/allowed-emails",
        &token,
        json!({"email": emails::STRANGER}),
    )
    .await
    .assert_forbidden();
}

#[tokio::test]
async fn test_demoted_admin_loses_admin_routes() {
    let app = TestApp::new().await;
    let (_, token) = app.signed_in_user(emails::ADMIN, AccessLevel::Admin, 10).await;

    let repo = AllowedEmailRepository::new(&app.state.db);
    let entry = repo.get_by_email(emails::ADMIN).await.unwrap().unwrap();
    let update = UpdateAllowedEmailRequest {
        access_level: Some(AccessLevel::Basic),
        is_active: None,
        notes: None,
    };
    repo.update(entry.id, &update).await.unwrap();

    app.get_auth(
        &format!("/api/allowed-emails/check?email={}", emails::PARENT),
        &token,
    )
    .await
    .assert_forbidden();
}

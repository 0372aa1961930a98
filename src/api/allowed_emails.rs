//! Allow-list administration endpoints
//!
//! Every handler requires an admin token whose allow-list entry still grants admin.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{AllowedEmailRepository, AllowedEmailStore},
    middleware::AuthUser,
    models::{AllowedEmail, CreateAllowedEmailRequest, UpdateAllowedEmailRequest},
    services::allow_list::is_email_allowed,
    utils::{
        validation::{email_domain, normalize_email, validate_domain},
        AppError, AppResult,
    },
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_entries).post(create_entry))
        .route("/check", get(check_email))
        .route("/{id}", put(update_entry))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    #[serde(default)]
    include_inactive: bool,
}

#[derive(Debug, Deserialize)]
struct CheckQuery {
    email: String,
}

#[derive(Debug, Serialize)]
struct EntryListResponse {
    success: bool,
    entries: Vec<AllowedEmail>,
}

#[derive(Debug, Serialize)]
struct EntryResponse {
    success: bool,
    entry: AllowedEmail,
}

#[derive(Debug, Serialize)]
struct CheckResponse {
    success: bool,
    email: String,
    allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry: Option<AllowedEmail>,
}

async fn list_entries(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<EntryListResponse>> {
    auth_user
        .require_active_admin(&AllowedEmailRepository::new(&state.db))
        .await?;

    let entries = AllowedEmailRepository::new(&state.db)
        .list(query.include_inactive)
        .await?;

    Ok(Json(EntryListResponse {
        success: true,
        entries,
    }))
}

/// Build the entry described by a create request
fn entry_from_request(req: &CreateAllowedEmailRequest) -> AppResult<AllowedEmail> {
    let mut entry = match (req.email.as_deref(), req.domain.as_deref()) {
        (Some(email), None) => {
            let email = normalize_email(email);
            let domain = email_domain(&email)
                .ok_or_else(|| AppError::ValidationError("Invalid email address".to_string()))?
                .to_string();
            AllowedEmail::for_email(&email, &domain, req.access_level)
        }
        (None, Some(domain)) => {
            let domain = domain.trim().trim_start_matches('@').to_lowercase();
            if !validate_domain(&domain) {
                return Err(AppError::ValidationError(format!(
                    "Invalid domain: {}",
                    domain
                )));
            }
            AllowedEmail::for_domain(&domain, req.access_level)
        }
        _ => {
            return Err(AppError::bad_request(
                "Provide exactly one of email or domain",
            ))
        }
    };
    entry.notes = req.notes.trim().to_string();
    Ok(entry)
}

async fn create_entry(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateAllowedEmailRequest>,
) -> AppResult<(StatusCode, Json<EntryResponse>)> {
    auth_user
        .require_active_admin(&AllowedEmailRepository::new(&state.db))
        .await?;
    payload.validate()?;

    let mut entry = entry_from_request(&payload)?;
    entry.added_by = Some(auth_user.id);

    AllowedEmailRepository::new(&state.db)
        .insert(&entry)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::conflict("Allow-list entry already exists"),
            other => other,
        })?;

    info!(
        entry_id = %entry.id,
        domain = %entry.domain,
        access_level = %entry.access_level,
        added_by = %auth_user.id,
        "Allow-list entry added"
    );

    Ok((
        StatusCode::CREATED,
        Json(EntryResponse {
            success: true,
            entry,
        }),
    ))
}

async fn update_entry(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAllowedEmailRequest>,
) -> AppResult<Json<EntryResponse>> {
    auth_user
        .require_active_admin(&AllowedEmailRepository::new(&state.db))
        .await?;
    payload.validate()?;

    let repo = AllowedEmailRepository::new(&state.db);
    let entry = repo
        .update(id, &payload)
        .await?
        .ok_or_else(|| AppError::not_found("Allow-list entry not found"))?;

    info!(
        entry_id = %id,
        is_active = entry.is_active,
        access_level = %entry.access_level,
        "Allow-list entry updated"
    );

    Ok(Json(EntryResponse {
        success: true,
        entry,
    }))
}

async fn check_email(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<CheckQuery>,
) -> AppResult<Json<CheckResponse>> {
    auth_user
        .require_active_admin(&AllowedEmailRepository::new(&state.db))
        .await?;

    let store = AllowedEmailRepository::new(&state.db);
    let entry = is_email_allowed(&store, &query.email).await?;

    Ok(Json(CheckResponse {
        success: true,
        email: normalize_email(&query.email),
        allowed: entry.is_some(),
        entry,
    }))
}

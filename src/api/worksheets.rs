//! Worksheet endpoints
//!
//! Generation runs through the gated pipeline; the remaining handlers only
//! touch worksheets owned by the caller.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::WorksheetRepository,
    middleware::AuthUser,
    models::{GenerateWorksheetRequest, QuotaUsage, Worksheet, WorksheetResultRequest},
    utils::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_worksheets))
        .route("/generate", post(generate_worksheet))
        .route("/{id}", get(get_worksheet).delete(delete_worksheet))
        .route("/{id}/result", post(record_result))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WorksheetListQuery {
    kid_profile_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    success: bool,
    worksheet: Worksheet,
    usage: QuotaUsage,
}

#[derive(Debug, Serialize)]
struct WorksheetResponse {
    success: bool,
    worksheet: Worksheet,
}

#[derive(Debug, Serialize)]
struct WorksheetListResponse {
    success: bool,
    worksheets: Vec<Worksheet>,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    success: bool,
}

/// POST /api/worksheets/generate
async fn generate_worksheet(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<GenerateWorksheetRequest>,
) -> AppResult<(StatusCode, Json<GenerateResponse>)> {
    payload.validate()?;

    let generated = state
        .generator
        .generate(auth_user.id, &auth_user.email, &payload)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(GenerateResponse {
            success: true,
            worksheet: generated.worksheet,
            usage: generated.usage,
        }),
    ))
}

async fn list_worksheets(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<WorksheetListQuery>,
) -> AppResult<Json<WorksheetListResponse>> {
    let worksheets = WorksheetRepository::new(&state.db)
        .list_for_user(auth_user.id, query.kid_profile_id)
        .await?;

    Ok(Json(WorksheetListResponse {
        success: true,
        worksheets,
    }))
}

async fn get_worksheet(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<WorksheetResponse>> {
    let worksheet = WorksheetRepository::new(&state.db)
        .get_for_user(auth_user.id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Worksheet not found"))?;

    Ok(Json(WorksheetResponse {
        success: true,
        worksheet,
    }))
}

async fn delete_worksheet(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeleteResponse>> {
    let deleted = WorksheetRepository::new(&state.db)
        .delete_for_user(auth_user.id, id)
        .await?;
    if !deleted {
        return Err(AppError::not_found("Worksheet not found"));
    }

    info!(user_id = %auth_user.id, worksheet_id = %id, "Worksheet deleted");
    Ok(Json(DeleteResponse { success: true }))
}

/// POST /api/worksheets/{id}/result
async fn record_result(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<WorksheetResultRequest>,
) -> AppResult<Json<WorksheetResponse>> {
    payload.validate()?;

    let worksheet = WorksheetRepository::new(&state.db)
        .record_result(auth_user.id, id, payload.score, Utc::now())
        .await?
        .ok_or_else(|| AppError::not_found("Worksheet not found"))?;

    info!(
        user_id = %auth_user.id,
        worksheet_id = %id,
        score = payload.score,
        "Worksheet result recorded"
    );

    Ok(Json(WorksheetResponse {
        success: true,
        worksheet,
    }))
}

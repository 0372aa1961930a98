//! Kid profile endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::KidProfileRepository,
    middleware::AuthUser,
    models::{CreateKidProfileRequest, KidProfile},
    utils::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_profiles).post(create_profile))
        .route("/{id}", get(get_profile).delete(delete_profile))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KidProfileResponse {
    success: bool,
    kid_profile: KidProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KidProfileListResponse {
    success: bool,
    kid_profiles: Vec<KidProfile>,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    success: bool,
}

async fn list_profiles(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<KidProfileListResponse>> {
    let kid_profiles = KidProfileRepository::new(&state.db)
        .list_for_user(auth_user.id)
        .await?;

    Ok(Json(KidProfileListResponse {
        success: true,
        kid_profiles,
    }))
}

async fn create_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateKidProfileRequest>,
) -> AppResult<(StatusCode, Json<KidProfileResponse>)> {
    payload.validate()?;

    let profile = KidProfile {
        id: Uuid::new_v4(),
        user_id: auth_user.id,
        name: payload.name.trim().to_string(),
        grade: payload.grade.trim().to_string(),
        age: payload.age,
        created_at: Utc::now(),
    };
    KidProfileRepository::new(&state.db).create(&profile).await?;

    info!(user_id = %auth_user.id, kid_profile_id = %profile.id, "Kid profile created");
    Ok((
        StatusCode::CREATED,
        Json(KidProfileResponse {
            success: true,
            kid_profile: profile,
        }),
    ))
}

async fn get_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<KidProfileResponse>> {
    let kid_profile = KidProfileRepository::new(&state.db)
        .get_for_user(auth_user.id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Kid profile not found"))?;

    Ok(Json(KidProfileResponse {
        success: true,
        kid_profile,
    }))
}

async fn delete_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeleteResponse>> {
    let deleted = KidProfileRepository::new(&state.db)
        .delete_for_user(auth_user.id, id)
        .await?;
    if !deleted {
        return Err(AppError::not_found("Kid profile not found"));
    }

    info!(user_id = %auth_user.id, kid_profile_id = %id, "Kid profile deleted");
    Ok(Json(DeleteResponse { success: true }))
}

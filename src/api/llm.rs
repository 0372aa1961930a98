//! LLM usage endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{
    middleware::AuthUser,
    models::QuotaUsage,
    services::QuotaGate,
    utils::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/usage", get(get_usage))
}

#[derive(Debug, Serialize)]
struct UsageResponse {
    success: bool,
    usage: QuotaUsage,
}

/// Current AI request counters for the caller
pub(super) async fn load_usage(state: &AppState, auth_user: &AuthUser) -> AppResult<QuotaUsage> {
    QuotaGate::new(state.db.clone())
        .usage(auth_user.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

async fn get_usage(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<UsageResponse>> {
    let usage = load_usage(&state, &auth_user).await?;
    Ok(Json(UsageResponse {
        success: true,
        usage,
    }))
}

//! Performance analytics endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    middleware::AuthUser,
    models::{AnalyticsOverview, KidAnalytics},
    services::AnalyticsService,
    utils::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/overview", get(get_overview))
        .route("/kids/{id}", get(get_kid_analytics))
}

#[derive(Debug, Serialize)]
struct OverviewResponse {
    success: bool,
    overview: AnalyticsOverview,
}

#[derive(Debug, Serialize)]
struct KidAnalyticsResponse {
    success: bool,
    analytics: KidAnalytics,
}

async fn get_overview(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<OverviewResponse>> {
    let overview = AnalyticsService::new(&state.db)
        .overview(auth_user.id)
        .await?;

    Ok(Json(OverviewResponse {
        success: true,
        overview,
    }))
}

async fn get_kid_analytics(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<KidAnalyticsResponse>> {
    let analytics = AnalyticsService::new(&state.db)
        .for_kid(auth_user.id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Kid profile not found"))?;

    Ok(Json(KidAnalyticsResponse {
        success: true,
        analytics,
    }))
}

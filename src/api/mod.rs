//! API routes and handlers
//!
//! This module defines all API endpoints and their routing.

use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::{
    middleware::{burst_limit_middleware, BurstLimitState},
    AppState,
};

mod allowed_emails;
mod analytics;
mod auth;
mod health;
mod kid_profiles;
mod llm;
mod payments;
mod worksheets;

pub use health::*;

/// Public API routes (no authentication required)
///
/// The sign-in endpoints sit behind the per-IP burst limiter.
pub fn public_routes(burst: BurstLimitState) -> Router<AppState> {
    Router::new()
        // Health check endpoints
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::health_check_detailed))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        // Authentication endpoints (no auth required)
        .nest(
            "/auth",
            auth::public_routes().route_layer(from_fn_with_state(burst, burst_limit_middleware)),
        )
}

/// Protected API routes (authentication required)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::protected_routes())
        .nest("/allowed-emails", allowed_emails::routes())
        .nest("/worksheets", worksheets::routes())
        .nest("/kid-profiles", kid_profiles::routes())
        .nest("/analytics", analytics::routes())
        .nest("/llm", llm::routes())
        .nest("/payments", payments::routes())
}

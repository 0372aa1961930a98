//! BrainyBees API Library
//!
//! This crate provides the HTTP backend of the BrainyBees worksheet platform:
//! allow-list gated sign-in, rate-limited and quota-gated worksheet
//! generation, kid profiles and performance analytics.

use std::sync::Arc;

use anyhow::Result;
use axum::{http::HeaderValue, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

pub mod api;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;
pub use middleware::{auth_middleware, AuthUser, Claims};

use middleware::BurstLimitState;
use services::{GoogleVerifier, WorksheetGenerator, WorksheetProvider};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
    /// Gated worksheet generation pipeline
    pub generator: WorksheetGenerator,
    /// Google ID token verification
    pub google: GoogleVerifier,
    /// Per-IP burst limits for the sign-in endpoints
    pub auth_burst: BurstLimitState,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        provider: Arc<dyn WorksheetProvider>,
    ) -> Result<Self> {
        Ok(Self {
            generator: WorksheetGenerator::new(db.clone(), &config.rate_limit, provider),
            google: GoogleVerifier::new(config.auth.google.clone())?,
            auth_burst: BurstLimitState::new(config.auth_burst.clone()),
            config,
            db,
        })
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Authentication is applied only to the protected routes so sign-in and
    // health checks stay reachable
    let api_router = api::public_routes(state.auth_burst.clone()).merge(
        api::protected_routes().route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        )),
    );

    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .nest("/api", api_router)
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(trace_layer)
        .layer(cors)
}

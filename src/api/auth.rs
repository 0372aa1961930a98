//! Authentication API endpoints
//!
//! Provides registration, password login and Google sign-in. Every path that
//! issues a token goes through the allow-list first.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use validator::Validate;

use crate::{
    db::{AllowedEmailRepository, UserRepository},
    middleware::auth::{create_access_token, AuthUser},
    models::{
        AllowedEmail, AuthResponse, GoogleLoginRequest, LoginRequest, Plan, RegisterRequest, User,
        UserPublic,
    },
    services::{allow_list::admit_login, AuthService, GoogleAuthError},
    utils::{validation::normalize_email, AppError, AppResult},
    AppState,
};

const NOT_ALLOWED: &str = "This email is not authorized to access BrainyBees";

/// Create public routes for authentication endpoints (no auth required)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/google", post(google_login))
}

/// Create protected routes for authentication endpoints (auth required)
pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_current_user))
}

#[derive(Debug, Serialize)]
struct MeResponse {
    success: bool,
    user: UserPublic,
}

/// Issue a token for `user` and wrap it in the response envelope
fn issue_token(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let token = create_access_token(
        &user.id,
        &user.email,
        user.access_level,
        &state.config.auth.jwt_secret,
        state.config.auth.token_expiry_hours,
    )?;

    Ok(AuthResponse {
        success: true,
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.auth.token_expiry_hours * 3600,
        user: user.into(),
    })
}

/// Run the allow-list gate for a sign-in
async fn admit(state: &AppState, email: &str) -> AppResult<AllowedEmail> {
    let store = AllowedEmailRepository::new(&state.db);
    admit_login(&store, email, &state.config.auth.override_emails, Utc::now())
        .await?
        .ok_or_else(|| AppError::forbidden(NOT_ALLOWED))
}

/// Bring the stored access level in line with the allow-list entry
async fn sync_access_level(state: &AppState, user: &mut User, entry: &AllowedEmail) -> AppResult<()> {
    if user.access_level != entry.access_level {
        UserRepository::new(&state.db)
            .set_access_level(user.id, entry.access_level)
            .await?;
        user.access_level = entry.access_level;
    }
    Ok(())
}

fn new_user(state: &AppState, email: String, name: String, entry: &AllowedEmail) -> User {
    let limit = state.config.subscriptions.limit_for(Plan::Free);
    User::new(email, name, entry.access_level, Plan::Free, limit)
}

/// Register handler
///
/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    payload.validate()?;

    let min_length = state.config.auth.password_min_length;
    if payload.password.chars().count() < min_length {
        return Err(AppError::ValidationError(format!(
            "Password must be at least {} characters",
            min_length
        )));
    }

    let email = normalize_email(&payload.email);
    let users = UserRepository::new(&state.db);
    if users.get_by_email(&email).await?.is_some() {
        return Err(AppError::conflict("An account with this email already exists"));
    }

    let entry = admit(&state, &email).await?;

    let mut user = new_user(&state, email, payload.name.trim().to_string(), &entry);
    user.password_hash = Some(AuthService::hash_password(&payload.password)?);
    users.create(&user).await?;

    info!(user_id = %user.id, access_level = %user.access_level, "User registered");
    Ok((StatusCode::CREATED, Json(issue_token(&state, user)?)))
}

/// Login handler
///
/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.validate()?;

    let email = normalize_email(&payload.email);
    let invalid = || AppError::unauthorized("Invalid email or password");

    let mut user = UserRepository::new(&state.db)
        .get_by_email(&email)
        .await?
        .ok_or_else(invalid)?;
    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !AuthService::verify_password(&payload.password, hash)? {
        warn!(email = %email, "Failed login attempt");
        return Err(invalid());
    }

    // Access may have been revoked since registration
    let entry = admit(&state, &email).await?;
    sync_access_level(&state, &mut user, &entry).await?;

    info!(user_id = %user.id, "User logged in");
    Ok(Json(issue_token(&state, user)?))
}

/// Google sign-in handler
///
/// POST /api/auth/google
async fn google_login(
    State(state): State<AppState>,
    Json(payload): Json<GoogleLoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.validate()?;

    let identity = state
        .google
        .verify(&payload.credential)
        .await
        .map_err(|e| match e {
            GoogleAuthError::NotConfigured => AppError::bad_request(e.to_string()),
            GoogleAuthError::Upstream(_) => AppError::Provider(e.to_string()),
            _ => AppError::unauthorized(e.to_string()),
        })?;

    let email = normalize_email(&identity.email);
    let entry = admit(&state, &email).await?;

    let users = UserRepository::new(&state.db);
    let mut user = match users.get_by_google_id(&identity.subject).await? {
        Some(user) => user,
        None => match users.get_by_email(&email).await? {
            Some(mut user) => {
                users.link_google_id(user.id, &identity.subject).await?;
                user.google_id = Some(identity.subject.clone());
                info!(user_id = %user.id, "Linked Google account to existing user");
                user
            }
            None => {
                let name = identity
                    .name
                    .clone()
                    .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
                let mut user = new_user(&state, email.clone(), name, &entry);
                user.google_id = Some(identity.subject.clone());
                users.create(&user).await?;
                info!(user_id = %user.id, "User created from Google sign-in");
                user
            }
        },
    };

    sync_access_level(&state, &mut user, &entry).await?;
    Ok(Json(issue_token(&state, user)?))
}

/// Get current user handler
///
/// GET /api/auth/me
async fn get_current_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<MeResponse>> {
    let user = UserRepository::new(&state.db)
        .get_by_id(auth_user.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(MeResponse {
        success: true,
        user: user.into(),
    }))
}

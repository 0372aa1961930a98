//! Test application setup utilities
//!
//! Provides utilities for setting up test instances of the application
//! with temporary databases and a mock upstream for the LLM provider and
//! Google token verification.

use std::sync::Arc;

use axum::{body::Body, http::Request, Router};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::MockServer;

use brainybees::{
    config::{AppConfig, BurstSettings, DatabaseConfig, GoogleConfig},
    create_router,
    db::{AllowedEmailRepository, AllowedEmailStore, UserRepository},
    middleware::auth::create_access_token,
    models::{AccessLevel, AllowedEmail, Plan, User},
    services::{OpenAiProvider, WorksheetProvider},
    utils::validation::email_domain,
    AppState,
};

use super::mocks;

pub const TEST_JWT_SECRET: &str = "test_secret_key_that_is_at_least_32_bytes_long";
pub const TEST_GOOGLE_CLIENT_ID: &str = "test-client.apps.googleusercontent.com";
pub const OVERRIDE_EMAIL: &str = "owner@brainybees.test";

/// Test application wrapper for integration testing
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    /// Stands in for the LLM provider and Google's tokeninfo endpoint
    pub upstream: MockServer,
}

impl TestApp {
    /// Create a new test application with a temporary SQLite database
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Create a test application with Google sign-in enabled
    pub async fn with_google() -> Self {
        let mut config = test_config();
        config.auth.google = Some(GoogleConfig {
            client_id: TEST_GOOGLE_CLIENT_ID.to_string(),
            client_secret: None,
            tokeninfo_url: String::new(),
        });
        Self::with_config(config).await
    }

    /// Create a new test application with custom configuration
    ///
    /// Upstream URLs are pointed at the mock server; a successful worksheet
    /// completion is mounted by default.
    pub async fn with_config(mut config: AppConfig) -> Self {
        let upstream = MockServer::start().await;
        config.llm.base_url = format!("{}/v1", upstream.uri());
        if let Some(google) = config.auth.google.as_mut() {
            google.tokeninfo_url = format!("{}/tokeninfo", upstream.uri());
        }
        mocks::mount_worksheet_completion(&upstream).await;

        let db = brainybees::db::init_pool(&config.database)
            .await
            .expect("Failed to initialize test database");

        let provider: Arc<dyn WorksheetProvider> =
            Arc::new(OpenAiProvider::new(&config.llm).expect("Failed to build provider"));
        let state = AppState::new(config, db, provider).expect("Failed to build state");
        let router = create_router(state.clone());

        Self {
            router,
            state,
            upstream,
        }
    }

    /// Add an active allow-list entry for an exact address
    pub async fn allow_email(&self, email: &str, level: AccessLevel) -> AllowedEmail {
        let domain = email_domain(email).expect("test email has a domain");
        let entry = AllowedEmail::for_email(email, domain, level);
        AllowedEmailRepository::new(&self.state.db)
            .insert(&entry)
            .await
            .expect("Failed to seed allow-list");
        entry
    }

    /// Add an active wildcard allow-list entry
    pub async fn allow_domain(&self, domain: &str, level: AccessLevel) -> AllowedEmail {
        let entry = AllowedEmail::for_domain(domain, level);
        AllowedEmailRepository::new(&self.state.db)
            .insert(&entry)
            .await
            .expect("Failed to seed allow-list");
        entry
    }

    /// Insert an allow-listed user directly and return it with a valid token
    pub async fn signed_in_user(&self, email: &str, level: AccessLevel, limit: i64) -> (User, String) {
        self.allow_email(email, level).await;
        let user = User::new(
            email.to_string(),
            "Test Parent".to_string(),
            level,
            Plan::Free,
            limit,
        );
        UserRepository::new(&self.state.db)
            .create(&user)
            .await
            .expect("Failed to seed user");
        let token = self.token_for(&user);
        (user, token)
    }

    /// Token for an existing user
    pub fn token_for(&self, user: &User) -> String {
        create_access_token(
            &user.id,
            &user.email,
            user.access_level,
            &self.state.config.auth.jwt_secret,
            1,
        )
        .expect("Failed to generate test token")
    }

    /// Make a GET request to the test application
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.request(json_request("POST", uri, body)).await
    }

    pub async fn get_auth(&self, uri: &str, token: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.request_with_auth(request, token).await
    }

    pub async fn post_json_auth(
        &self,
        uri: &str,
        token: &str,
        body: serde_json::Value,
    ) -> TestResponse {
        self.request_with_auth(json_request("POST", uri, body), token)
            .await
    }

    pub async fn put_json_auth(
        &self,
        uri: &str,
        token: &str,
        body: serde_json::Value,
    ) -> TestResponse {
        self.request_with_auth(json_request("PUT", uri, body), token)
            .await
    }

    pub async fn delete_auth(&self, uri: &str, token: &str) -> TestResponse {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.request_with_auth(request, token).await
    }

    /// Make a request with authentication
    pub async fn request_with_auth(&self, request: Request<Body>, token: &str) -> TestResponse {
        let (mut parts, body) = request.into_parts();
        parts.headers.insert(
            "Authorization",
            format!("Bearer {}", token).parse().unwrap(),
        );
        self.request(Request::from_parts(parts, body)).await
    }

    /// Make an arbitrary request
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: axum::http::StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: bytes::Bytes,
}

impl TestResponse {
    /// Get the response body as a string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Parse the response body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse response as JSON")
    }

    /// Assert the response status
    pub fn assert_status(&self, expected: axum::http::StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    /// Assert the response status is OK (200)
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::OK)
    }

    /// Assert the response status is Created (201)
    pub fn assert_created(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::CREATED)
    }

    /// Assert the response status is Unauthorized (401)
    pub fn assert_unauthorized(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::UNAUTHORIZED)
    }

    /// Assert the response status is Forbidden (403)
    pub fn assert_forbidden(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::FORBIDDEN)
    }

    /// Assert the response status is Not Found (404)
    pub fn assert_not_found(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::NOT_FOUND)
    }
}

/// Create a test configuration with a temporary SQLite database
pub fn test_config() -> AppConfig {
    // Use a unique temp file for each test to avoid conflicts
    let db_path = std::env::temp_dir().join(format!("brainybees_test_{}.db", Uuid::new_v4().simple()));

    let mut config = AppConfig::default();
    config.database = DatabaseConfig {
        url: format!("sqlite://{}?mode=rwc", db_path.display()),
        max_connections: 1,
        connect_timeout_secs: 30,
    };
    config.auth.jwt_secret = TEST_JWT_SECRET.to_string();
    config.auth.token_expiry_hours = 24;
    config.auth.override_emails = vec![OVERRIDE_EMAIL.to_string()];
    config.llm.api_key = "sk-test".to_string();
    config.llm.timeout_secs = 5;
    // Sign-in tests make many requests from the same (unknown) address
    config.auth_burst = BurstSettings {
        requests_per_second: 1000,
        burst_size: 1000,
    };
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_creation() {
        let app = TestApp::new().await;
        assert!(!app.state.google.is_configured());
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = TestApp::new().await;
        let response = app.get("/api/health").await;
        response.assert_ok();
    }
}

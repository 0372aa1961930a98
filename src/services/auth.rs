//! Authentication service
//!
//! Provides password hashing with Argon2 and verification of Google ID tokens.

use std::time::Duration;

use anyhow::{Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GoogleConfig;

/// Password hashing for email/password accounts
pub struct AuthService;

impl AuthService {
    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(password_hash)
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

/// Identity asserted by a verified Google ID token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

/// Google reports `email_verified` as a string or a bool depending on the endpoint
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    fn is_true(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Text(s) => s.eq_ignore_ascii_case("true"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<Flag>,
    name: Option<String>,
}

/// Why a Google credential was not accepted
#[derive(Debug, thiserror::Error)]
pub enum GoogleAuthError {
    #[error("Google sign-in is not configured")]
    NotConfigured,
    #[error("Google rejected the credential")]
    InvalidToken,
    #[error("Credential was issued for a different client")]
    AudienceMismatch,
    #[error("Google account email is not verified")]
    UnverifiedEmail,
    #[error("Token verification failed: {0}")]
    Upstream(String),
}

/// Validates Google ID tokens against the tokeninfo endpoint
#[derive(Clone)]
pub struct GoogleVerifier {
    client: Client,
    config: Option<GoogleConfig>,
}

impl GoogleVerifier {
    pub fn new(config: Option<GoogleConfig>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build Google HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    pub async fn verify(&self, credential: &str) -> Result<GoogleIdentity, GoogleAuthError> {
        let config = self.config.as_ref().ok_or(GoogleAuthError::NotConfigured)?;

        let response = self
            .client
            .get(&config.tokeninfo_url)
            .query(&[("id_token", credential)])
            .send()
            .await
            .map_err(|e| GoogleAuthError::Upstream(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            debug!(status = %status, "Google tokeninfo rejected credential");
            return Err(GoogleAuthError::InvalidToken);
        }
        if !status.is_success() {
            warn!(status = %status, "Google tokeninfo returned an error");
            return Err(GoogleAuthError::Upstream(format!("tokeninfo returned {}", status)));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| GoogleAuthError::Upstream(e.to_string()))?;

        if info.aud != config.client_id {
            warn!(aud = %info.aud, "Google credential audience mismatch");
            return Err(GoogleAuthError::AudienceMismatch);
        }
        let verified = info.email_verified.as_ref().is_some_and(Flag::is_true);
        let email = match info.email {
            Some(email) if verified => email,
            _ => return Err(GoogleAuthError::UnverifiedEmail),
        };

        Ok(GoogleIdentity {
            subject: info.sub,
            email,
            name: info.name,
        })
    }
}

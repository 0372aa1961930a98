//! User and subscription models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::AccessLevel;

/// Subscription plan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Basic,
    Premium,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Free, Plan::Basic, Plan::Premium];
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Plan::Free => write!(f, "free"),
            Plan::Basic => write!(f, "basic"),
            Plan::Premium => write!(f, "premium"),
        }
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "basic" => Ok(Plan::Basic),
            "premium" => Ok(Plan::Premium),
            _ => Err(format!("Invalid plan: {}", s)),
        }
    }
}

/// Value of `ai_requests_limit` meaning no ceiling
pub const UNLIMITED: i64 = -1;

/// AI generation quota attached to a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan: Plan,
    pub ai_requests_used: i64,
    pub ai_requests_limit: i64,
}

impl Subscription {
    pub fn is_unlimited(&self) -> bool {
        self.ai_requests_limit == UNLIMITED
    }

    /// Requests left before the gate closes; `None` when unlimited
    pub fn remaining(&self) -> Option<i64> {
        if self.is_unlimited() {
            None
        } else {
            Some((self.ai_requests_limit - self.ai_requests_used).max(0))
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.is_unlimited() || self.ai_requests_used < self.ai_requests_limit
    }
}

/// Quota report returned by the usage endpoints
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaUsage {
    pub plan: Plan,
    pub ai_requests_used: i64,
    pub ai_requests_limit: i64,
    /// `None` on unlimited plans
    pub remaining: Option<i64>,
}

impl From<Subscription> for QuotaUsage {
    fn from(sub: Subscription) -> Self {
        Self {
            remaining: sub.remaining(),
            plan: sub.plan,
            ai_requests_used: sub.ai_requests_used,
            ai_requests_limit: sub.ai_requests_limit,
        }
    }
}

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub access_level: AccessLevel,
    pub subscription: Subscription,
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user on the given plan; `email` must already be normalized
    pub fn new(email: String, name: String, access_level: AccessLevel, plan: Plan, limit: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            password_hash: None,
            google_id: None,
            access_level,
            subscription: Subscription {
                plan,
                ai_requests_used: 0,
                ai_requests_limit: limit,
            },
            stripe_customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// User without credentials for safe serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub access_level: AccessLevel,
    pub subscription: Subscription,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            access_level: user.access_level,
            subscription: user.subscription,
            created_at: user.created_at,
        }
    }
}

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub password: String,
}

/// Login request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

/// Google sign-in request carrying the ID token from the client
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GoogleLoginRequest {
    #[validate(length(min = 1))]
    pub credential: String,
}

/// Authentication response with token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserPublic,
}

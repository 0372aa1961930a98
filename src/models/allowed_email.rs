//! Allow-list entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Access tier granted by an allow-list entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Basic,
    Premium,
    Admin,
}

impl AccessLevel {
    pub fn is_admin(&self) -> bool {
        matches!(self, AccessLevel::Admin)
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessLevel::Basic => write!(f, "basic"),
            AccessLevel::Premium => write!(f, "premium"),
            AccessLevel::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(AccessLevel::Basic),
            "premium" => Ok(AccessLevel::Premium),
            "admin" => Ok(AccessLevel::Admin),
            _ => Err(format!("Invalid access level: {}", s)),
        }
    }
}

/// Allow-list entry
///
/// An entry without `email` is a wildcard admitting every address at `domain`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllowedEmail {
    pub id: Uuid,
    pub email: Option<String>,
    pub domain: String,
    pub access_level: AccessLevel,
    pub added_by: Option<Uuid>,
    pub is_active: bool,
    pub notes: String,
    pub first_login_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub login_count: i64,
    pub is_override_email: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AllowedEmail {
    /// New active entry for an exact address; `email` must already be normalized
    pub fn for_email(email: &str, domain: &str, access_level: AccessLevel) -> Self {
        let mut entry = Self::for_domain(domain, access_level);
        entry.email = Some(email.to_string());
        entry
    }

    /// New active wildcard entry for a domain
    pub fn for_domain(domain: &str, access_level: AccessLevel) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: None,
            domain: domain.to_string(),
            access_level,
            added_by: None,
            is_active: true,
            notes: String::new(),
            first_login_at: None,
            last_login_at: None,
            login_count: 0,
            is_override_email: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_domain_wildcard(&self) -> bool {
        self.email.is_none()
    }
}

/// Request to add an allow-list entry (exactly one of `email` or `domain`)
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAllowedEmailRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 3, max = 253))]
    pub domain: Option<String>,
    #[serde(default)]
    pub access_level: AccessLevel,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub notes: String,
}

/// Partial update of an allow-list entry
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAllowedEmailRequest {
    pub access_level: Option<AccessLevel>,
    pub is_active: Option<bool>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

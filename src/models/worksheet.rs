//! Worksheet models and the generation request lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Difficulty requested from the provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(format!("Invalid difficulty: {}", s)),
        }
    }
}

/// Persisted worksheet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Worksheet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kid_profile_id: Option<Uuid>,
    pub subject: String,
    pub grade: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_count: i64,
    /// Provider output; opaque to this service beyond the `questions` array
    pub content: serde_json::Value,
    pub score: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/worksheets/generate`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWorksheetRequest {
    pub kid_profile_id: Option<Uuid>,
    #[validate(length(min = 1, max = 60))]
    pub subject: String,
    #[validate(length(min = 1, max = 20))]
    pub grade: String,
    #[validate(length(min = 1, max = 200))]
    pub topic: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_question_count")]
    #[validate(range(min = 1, max = 50))]
    pub question_count: i64,
}

fn default_question_count() -> i64 {
    10
}

/// Body of `POST /api/worksheets/{id}/result`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WorksheetResultRequest {
    #[validate(range(min = 0, max = 100))]
    pub score: i64,
}

/// Where a generation request ended up
///
/// `Pending` moves to exactly one of the rejection states or to `Forwarded`,
/// which then ends in `Completed` or `ProviderError`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationState {
    Pending,
    Denied,
    Throttled,
    QuotaExceeded,
    Forwarded,
    Completed,
    ProviderError,
}

impl GenerationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationState::Pending | GenerationState::Forwarded)
    }
}

impl std::fmt::Display for GenerationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GenerationState::Pending => "PENDING",
            GenerationState::Denied => "DENIED",
            GenerationState::Throttled => "THROTTLED",
            GenerationState::QuotaExceeded => "QUOTA_EXCEEDED",
            GenerationState::Forwarded => "FORWARDED",
            GenerationState::Completed => "COMPLETED",
            GenerationState::ProviderError => "PROVIDER_ERROR",
        };
        f.write_str(name)
    }
}

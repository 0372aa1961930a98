//! Kid profile model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A learner a parent or teacher generates worksheets for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KidProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub grade: String,
    pub age: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateKidProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub grade: String,
    #[validate(range(min = 2, max = 19))]
    pub age: Option<i64>,
}

//! Worksheet repository

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{parse_db_timestamp, parse_uuid};
use crate::models::{Difficulty, Worksheet};

#[derive(Debug, sqlx::FromRow)]
struct WorksheetRow {
    id: String,
    user_id: String,
    kid_profile_id: Option<String>,
    subject: String,
    grade: String,
    topic: String,
    difficulty: String,
    question_count: i64,
    content: String,
    score: Option<i64>,
    completed_at: Option<String>,
    created_at: String,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, kid_profile_id, subject, grade, topic, difficulty,
           question_count, content, score, completed_at, created_at
    FROM worksheets
"#;

pub struct WorksheetRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> WorksheetRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, worksheet: &Worksheet) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO worksheets (
                id, user_id, kid_profile_id, subject, grade, topic, difficulty,
                question_count, content, score, completed_at, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(worksheet.id.to_string())
        .bind(worksheet.user_id.to_string())
        .bind(worksheet.kid_profile_id.map(|id| id.to_string()))
        .bind(&worksheet.subject)
        .bind(&worksheet.grade)
        .bind(&worksheet.topic)
        .bind(worksheet.difficulty.to_string())
        .bind(worksheet.question_count)
        .bind(worksheet.content.to_string())
        .bind(worksheet.score)
        .bind(worksheet.completed_at.map(|d| d.to_rfc3339()))
        .bind(worksheet.created_at.to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to save worksheet")?;

        Ok(())
    }

    /// Newest first, optionally restricted to one kid
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        kid_profile_id: Option<Uuid>,
    ) -> Result<Vec<Worksheet>> {
        let rows = match kid_profile_id {
            Some(kid) => {
                sqlx::query_as::<_, WorksheetRow>(&format!(
                    "{} WHERE user_id = ? AND kid_profile_id = ? ORDER BY created_at DESC",
                    SELECT_COLUMNS
                ))
                .bind(user_id.to_string())
                .bind(kid.to_string())
                .fetch_all(self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, WorksheetRow>(&format!(
                    "{} WHERE user_id = ? ORDER BY created_at DESC",
                    SELECT_COLUMNS
                ))
                .bind(user_id.to_string())
                .fetch_all(self.pool)
                .await
            }
        }
        .context("Failed to list worksheets")?;

        rows.into_iter().map(row_to_worksheet).collect()
    }

    /// Worksheets for a kid in the order they were generated
    pub async fn list_for_kid(&self, kid_profile_id: Uuid) -> Result<Vec<Worksheet>> {
        let rows = sqlx::query_as::<_, WorksheetRow>(&format!(
            "{} WHERE kid_profile_id = ? ORDER BY created_at",
            SELECT_COLUMNS
        ))
        .bind(kid_profile_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to list worksheets for kid")?;

        rows.into_iter().map(row_to_worksheet).collect()
    }

    pub async fn get_for_user(&self, user_id: Uuid, id: Uuid) -> Result<Option<Worksheet>> {
        let row = sqlx::query_as::<_, WorksheetRow>(&format!(
            "{} WHERE id = ? AND user_id = ?",
            SELECT_COLUMNS
        ))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to get worksheet")?;

        row.map(row_to_worksheet).transpose()
    }

    pub async fn delete_for_user(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM worksheets WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to delete worksheet")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn record_result(
        &self,
        user_id: Uuid,
        id: Uuid,
        score: i64,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<Worksheet>> {
        let result = sqlx::query(
            "UPDATE worksheets SET score = ?, completed_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(score)
        .bind(completed_at.to_rfc3339())
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to record worksheet result")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_for_user(user_id, id).await
    }
}

fn row_to_worksheet(row: WorksheetRow) -> Result<Worksheet> {
    Ok(Worksheet {
        id: parse_uuid(&row.id, "worksheet")?,
        user_id: parse_uuid(&row.user_id, "user")?,
        kid_profile_id: row
            .kid_profile_id
            .as_deref()
            .map(|id| parse_uuid(id, "kid profile"))
            .transpose()?,
        subject: row.subject,
        grade: row.grade,
        topic: row.topic,
        difficulty: row
            .difficulty
            .parse::<Difficulty>()
            .map_err(anyhow::Error::msg)?,
        question_count: row.question_count,
        content: serde_json::from_str(&row.content).context("Corrupt worksheet content")?,
        score: row.score,
        completed_at: row.completed_at.as_deref().map(parse_db_timestamp),
        created_at: parse_db_timestamp(&row.created_at),
    })
}

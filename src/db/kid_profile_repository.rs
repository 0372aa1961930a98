//! Kid profile repository

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{parse_db_timestamp, parse_uuid};
use crate::models::KidProfile;

#[derive(Debug, sqlx::FromRow)]
struct KidProfileRow {
    id: String,
    user_id: String,
    name: String,
    grade: String,
    age: Option<i64>,
    created_at: String,
}

pub struct KidProfileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> KidProfileRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, profile: &KidProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kid_profiles (id, user_id, name, grade, age, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(profile.id.to_string())
        .bind(profile.user_id.to_string())
        .bind(&profile.name)
        .bind(&profile.grade)
        .bind(profile.age)
        .bind(profile.created_at.to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to create kid profile")?;

        Ok(())
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<KidProfile>> {
        let rows = sqlx::query_as::<_, KidProfileRow>(
            r#"
            SELECT id, user_id, name, grade, age, created_at
            FROM kid_profiles
            WHERE user_id = ?
            ORDER BY created_at
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to list kid profiles")?;

        rows.into_iter().map(row_to_kid_profile).collect()
    }

    /// Profile `id` if it belongs to `user_id`
    pub async fn get_for_user(&self, user_id: Uuid, id: Uuid) -> Result<Option<KidProfile>> {
        let row = sqlx::query_as::<_, KidProfileRow>(
            r#"
            SELECT id, user_id, name, grade, age, created_at
            FROM kid_profiles
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to get kid profile")?;

        row.map(row_to_kid_profile).transpose()
    }

    pub async fn delete_for_user(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kid_profiles WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to delete kid profile")?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_kid_profile(row: KidProfileRow) -> Result<KidProfile> {
    Ok(KidProfile {
        id: parse_uuid(&row.id, "kid profile")?,
        user_id: parse_uuid(&row.user_id, "user")?,
        name: row.name,
        grade: row.grade,
        age: row.age,
        created_at: parse_db_timestamp(&row.created_at),
    })
}

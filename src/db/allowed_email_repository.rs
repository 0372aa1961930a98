//! Allow-list repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{parse_db_timestamp, parse_uuid};
use crate::models::{AccessLevel, AllowedEmail, UpdateAllowedEmailRequest};

/// Storage capabilities the allow-list resolver and login flow rely on
#[async_trait]
pub trait AllowedEmailStore: Send + Sync {
    /// Active entry whose address equals `email` (already normalized)
    async fn find_active_by_email(&self, email: &str) -> Result<Option<AllowedEmail>>;

    /// Active wildcard entry (no address) for `domain`
    async fn find_active_domain(&self, domain: &str) -> Result<Option<AllowedEmail>>;

    /// Insert a new entry; fails on a duplicate address or domain wildcard
    async fn insert(&self, entry: &AllowedEmail) -> Result<()>;

    /// Insert or overwrite the access level, notes and active flag of the
    /// entry with the same address (or the same domain wildcard)
    async fn upsert(&self, entry: &AllowedEmail) -> Result<AllowedEmail>;

    /// Record a successful login at `at`
    async fn track_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<AllowedEmail>>;

    /// All entries, optionally including deactivated ones
    async fn list(&self, include_inactive: bool) -> Result<Vec<AllowedEmail>>;

    /// Flip the active flag; returns false when the entry does not exist
    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<bool>;
}

#[derive(Debug, sqlx::FromRow)]
struct AllowedEmailRow {
    id: String,
    email: Option<String>,
    domain: String,
    access_level: String,
    added_by: Option<String>,
    is_active: bool,
    notes: String,
    first_login_at: Option<String>,
    last_login_at: Option<String>,
    login_count: i64,
    is_override_email: bool,
    created_at: String,
    updated_at: String,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, email, domain, access_level, added_by, is_active, notes,
           first_login_at, last_login_at, login_count, is_override_email,
           created_at, updated_at
    FROM allowed_emails
"#;

pub struct AllowedEmailRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AllowedEmailRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<AllowedEmail>> {
        let row = sqlx::query_as::<_, AllowedEmailRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await
            .context("Failed to get allowed email")?;

        row.map(row_to_allowed_email).transpose()
    }

    /// Entry for an address regardless of its active flag
    pub async fn get_by_email(&self, email: &str) -> Result<Option<AllowedEmail>> {
        let row =
            sqlx::query_as::<_, AllowedEmailRow>(&format!("{} WHERE email = ?", SELECT_COLUMNS))
                .bind(email)
                .fetch_optional(self.pool)
                .await
                .context("Failed to get allowed email by address")?;

        row.map(row_to_allowed_email).transpose()
    }

    pub async fn update(
        &self,
        id: Uuid,
        req: &UpdateAllowedEmailRequest,
    ) -> Result<Option<AllowedEmail>> {
        let Some(existing) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE allowed_emails
            SET access_level = ?, is_active = ?, notes = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.access_level.unwrap_or(existing.access_level).to_string())
        .bind(req.is_active.unwrap_or(existing.is_active))
        .bind(req.notes.as_deref().unwrap_or(&existing.notes))
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to update allowed email")?;

        self.get_by_id(id).await
    }
}

#[async_trait]
impl AllowedEmailStore for AllowedEmailRepository<'_> {
    async fn find_active_by_email(&self, email: &str) -> Result<Option<AllowedEmail>> {
        let row = sqlx::query_as::<_, AllowedEmailRow>(&format!(
            "{} WHERE email = ? AND is_active = 1",
            SELECT_COLUMNS
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await
        .context("Failed to look up allowed email")?;

        row.map(row_to_allowed_email).transpose()
    }

    async fn find_active_domain(&self, domain: &str) -> Result<Option<AllowedEmail>> {
        let row = sqlx::query_as::<_, AllowedEmailRow>(&format!(
            "{} WHERE domain = ? AND email IS NULL AND is_active = 1",
            SELECT_COLUMNS
        ))
        .bind(domain)
        .fetch_optional(self.pool)
        .await
        .context("Failed to look up allowed domain")?;

        row.map(row_to_allowed_email).transpose()
    }

    async fn insert(&self, entry: &AllowedEmail) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO allowed_emails (
                id, email, domain, access_level, added_by, is_active, notes,
                first_login_at, last_login_at, login_count, is_override_email,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.email.as_deref().map(str::to_lowercase))
        .bind(entry.domain.to_lowercase())
        .bind(entry.access_level.to_string())
        .bind(entry.added_by.map(|id| id.to_string()))
        .bind(entry.is_active)
        .bind(&entry.notes)
        .bind(entry.first_login_at.map(|d| d.to_rfc3339()))
        .bind(entry.last_login_at.map(|d| d.to_rfc3339()))
        .bind(entry.login_count)
        .bind(entry.is_override_email)
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.updated_at.to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to insert allowed email")?;

        Ok(())
    }

    async fn upsert(&self, entry: &AllowedEmail) -> Result<AllowedEmail> {
        let conflict_target = if entry.email.is_some() {
            "(email)"
        } else {
            "(domain) WHERE email IS NULL"
        };
        let sql = format!(
            r#"
            INSERT INTO allowed_emails (
                id, email, domain, access_level, added_by, is_active, notes,
                login_count, is_override_email, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
            ON CONFLICT {} DO UPDATE SET
                access_level = excluded.access_level,
                is_active = excluded.is_active,
                notes = excluded.notes,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
            conflict_target
        );

        let now = Utc::now().to_rfc3339();
        let id: String = sqlx::query_scalar(&sql)
            .bind(entry.id.to_string())
            .bind(entry.email.as_deref().map(str::to_lowercase))
            .bind(entry.domain.to_lowercase())
            .bind(entry.access_level.to_string())
            .bind(entry.added_by.map(|id| id.to_string()))
            .bind(entry.is_active)
            .bind(&entry.notes)
            .bind(entry.is_override_email)
            .bind(&now)
            .bind(&now)
            .fetch_one(self.pool)
            .await
            .context("Failed to upsert allowed email")?;

        self.get_by_id(parse_uuid(&id, "allowed email")?)
            .await?
            .context("Upserted allowed email vanished")
    }

    async fn track_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<AllowedEmail>> {
        // Single statement so concurrent logins cannot drop an increment
        let at = at.to_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE allowed_emails
            SET login_count = login_count + 1,
                last_login_at = ?,
                first_login_at = COALESCE(first_login_at, ?),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&at)
        .bind(&at)
        .bind(&at)
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to track login")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<AllowedEmail>> {
        let sql = if include_inactive {
            format!("{} ORDER BY domain, email", SELECT_COLUMNS)
        } else {
            format!("{} WHERE is_active = 1 ORDER BY domain, email", SELECT_COLUMNS)
        };
        let rows = sqlx::query_as::<_, AllowedEmailRow>(&sql)
            .fetch_all(self.pool)
            .await
            .context("Failed to list allowed emails")?;

        rows.into_iter().map(row_to_allowed_email).collect()
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<bool> {
        let result =
            sqlx::query("UPDATE allowed_emails SET is_active = ?, updated_at = ? WHERE id = ?")
                .bind(is_active)
                .bind(Utc::now().to_rfc3339())
                .bind(id.to_string())
                .execute(self.pool)
                .await
                .context("Failed to change allowed email status")?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_allowed_email(row: AllowedEmailRow) -> Result<AllowedEmail> {
    Ok(AllowedEmail {
        id: parse_uuid(&row.id, "allowed email")?,
        email: row.email,
        domain: row.domain,
        access_level: row
            .access_level
            .parse::<AccessLevel>()
            .map_err(anyhow::Error::msg)?,
        added_by: row
            .added_by
            .as_deref()
            .map(|id| parse_uuid(id, "user"))
            .transpose()?,
        is_active: row.is_active,
        notes: row.notes,
        first_login_at: row.first_login_at.as_deref().map(parse_db_timestamp),
        last_login_at: row.last_login_at.as_deref().map(parse_db_timestamp),
        login_count: row.login_count,
        is_override_email: row.is_override_email,
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    })
}

//! User repository, including the atomic quota counters

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{parse_db_timestamp, parse_uuid};
use crate::models::{AccessLevel, Plan, Subscription, User};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: String,
    password_hash: Option<String>,
    google_id: Option<String>,
    access_level: String,
    plan: String,
    ai_requests_used: i64,
    ai_requests_limit: i64,
    stripe_customer_id: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    plan: String,
    ai_requests_used: i64,
    ai_requests_limit: i64,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, email, name, password_hash, google_id, access_level, plan,
           ai_requests_used, ai_requests_limit, stripe_customer_id, created_at, updated_at
    FROM users
"#;

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, name, password_hash, google_id, access_level, plan,
                ai_requests_used, ai_requests_limit, stripe_customer_id, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.google_id)
        .bind(user.access_level.to_string())
        .bind(user.subscription.plan.to_string())
        .bind(user.subscription.ai_requests_used)
        .bind(user.subscription.ai_requests_limit)
        .bind(&user.stripe_customer_id)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(self.pool)
        .await
        .context("Failed to create user")?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await
            .context("Failed to fetch user by ID")?;

        row.map(row_to_user).transpose()
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{} WHERE email = ?", SELECT_COLUMNS))
            .bind(email)
            .fetch_optional(self.pool)
            .await
            .context("Failed to fetch user by email")?;

        row.map(row_to_user).transpose()
    }

    pub async fn get_by_google_id(&self, google_id: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{} WHERE google_id = ?", SELECT_COLUMNS))
            .bind(google_id)
            .fetch_optional(self.pool)
            .await
            .context("Failed to fetch user by Google ID")?;

        row.map(row_to_user).transpose()
    }

    pub async fn link_google_id(&self, id: Uuid, google_id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET google_id = ?, updated_at = ? WHERE id = ?")
            .bind(google_id)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to link Google account")?;
        Ok(())
    }

    /// Keep the user's access level in step with their allow-list entry
    pub async fn set_access_level(&self, id: Uuid, level: AccessLevel) -> Result<()> {
        sqlx::query("UPDATE users SET access_level = ?, updated_at = ? WHERE id = ?")
            .bind(level.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to update access level")?;
        Ok(())
    }

    /// Move a user to a plan with a new limit; usage is kept
    pub async fn set_plan(&self, id: Uuid, plan: Plan, limit: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET plan = ?, ai_requests_limit = ?, updated_at = ? WHERE id = ?",
        )
        .bind(plan.to_string())
        .bind(limit)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to change plan")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT plan, ai_requests_used, ai_requests_limit FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to fetch subscription")?;

        row.map(row_to_subscription).transpose()
    }

    /// Take one AI request from the user's quota.
    ///
    /// The ceiling is part of the UPDATE filter, so concurrent callers can never
    /// push usage past the limit. Returns the new counters, or `None` when the
    /// quota is exhausted or the user does not exist.
    pub async fn try_consume_ai_request(&self, id: Uuid) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            UPDATE users
            SET ai_requests_used = ai_requests_used + 1, updated_at = ?
            WHERE id = ? AND (ai_requests_limit = -1 OR ai_requests_used < ai_requests_limit)
            RETURNING plan, ai_requests_used, ai_requests_limit
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await
        .context("Failed to consume AI request")?;

        row.map(row_to_subscription).transpose()
    }

    /// Give back a request taken by `try_consume_ai_request`
    pub async fn release_ai_request(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET ai_requests_used = ai_requests_used - 1, updated_at = ?
            WHERE id = ? AND ai_requests_used > 0
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(self.pool)
        .await
        .context("Failed to release AI request")?;
        Ok(())
    }
}

fn row_to_subscription(row: SubscriptionRow) -> Result<Subscription> {
    Ok(Subscription {
        plan: row.plan.parse::<Plan>().map_err(anyhow::Error::msg)?,
        ai_requests_used: row.ai_requests_used,
        ai_requests_limit: row.ai_requests_limit,
    })
}

fn row_to_user(row: UserRow) -> Result<User> {
    Ok(User {
        id: parse_uuid(&row.id, "user")?,
        email: row.email,
        name: row.name,
        password_hash: row.password_hash,
        google_id: row.google_id,
        access_level: row
            .access_level
            .parse::<AccessLevel>()
            .map_err(anyhow::Error::msg)?,
        subscription: row_to_subscription(SubscriptionRow {
            plan: row.plan,
            ai_requests_used: row.ai_requests_used,
            ai_requests_limit: row.ai_requests_limit,
        })?,
        stripe_customer_id: row.stripe_customer_id,
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    })
}

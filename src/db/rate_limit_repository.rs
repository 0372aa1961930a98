//! Rate-limit counter repository

use anyhow::{Context, Result};
use sqlx::SqlitePool;

pub struct RateLimitRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RateLimitRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Count one hit for `key` in the window starting at `window_start`
    /// (unix seconds) and return the window's total
    pub async fn record_hit(&self, key: &str, window_start: i64) -> Result<i64> {
        let hits: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO rate_limits (key, timestamp, hits)
            VALUES (?, ?, 1)
            ON CONFLICT (key, timestamp) DO UPDATE SET hits = hits + 1
            RETURNING hits
            "#,
        )
        .bind(key)
        .bind(window_start)
        .fetch_one(self.pool)
        .await
        .context("Failed to record rate limit hit")?;

        Ok(hits)
    }

    /// Hits recorded for `key` in the given window
    pub async fn hits(&self, key: &str, window_start: i64) -> Result<i64> {
        let hits: Option<i64> =
            sqlx::query_scalar("SELECT hits FROM rate_limits WHERE key = ? AND timestamp = ?")
                .bind(key)
                .bind(window_start)
                .fetch_optional(self.pool)
                .await
                .context("Failed to read rate limit hits")?;

        Ok(hits.unwrap_or(0))
    }

    /// Delete counters whose window started before `cutoff` (unix seconds)
    pub async fn delete_older_than(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM rate_limits WHERE timestamp < ?")
            .bind(cutoff)
            .execute(self.pool)
            .await
            .context("Failed to reap rate limit counters")?;

        Ok(result.rows_affected())
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rate_limits")
            .fetch_one(self.pool)
            .await
            .context("Failed to count rate limit counters")?;
        Ok(count)
    }
}

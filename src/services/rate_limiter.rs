//! Fixed-window rate limiter backed by the `rate_limits` table
//!
//! Each `(key, window_start)` pair holds a hit counter that is incremented with
//! a single upsert, so concurrent requests from the same identity are counted
//! exactly. Old windows are removed by [`spawn_rate_limit_reaper`], which plays
//! the part of a TTL index.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RateLimitSettings;
use crate::db::{DbPool, RateLimitRepository};

/// Age in seconds after which a counter row is expired
pub const RATE_LIMIT_TTL_SECS: u64 = 86_400;

/// Outcome of counting one request against its window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { hits: i64, remaining: i64 },
    Throttled { retry_after_secs: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Rate-limit identity for an authenticated user
pub fn user_key(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

#[derive(Clone)]
pub struct FixedWindowLimiter {
    pool: DbPool,
    window_secs: i64,
    max_hits: i64,
}

impl FixedWindowLimiter {
    pub fn new(pool: DbPool, settings: &RateLimitSettings) -> Self {
        Self {
            pool,
            window_secs: settings.window_secs.max(1) as i64,
            max_hits: i64::from(settings.max_hits),
        }
    }

    /// Start of the window containing `now` (unix seconds)
    pub fn window_start(&self, now: i64) -> i64 {
        now.div_euclid(self.window_secs) * self.window_secs
    }

    pub async fn check(&self, key: &str) -> Result<RateLimitDecision> {
        self.check_at(key, Utc::now().timestamp()).await
    }

    /// Count a hit for `key` at `now` and decide whether it may proceed
    pub async fn check_at(&self, key: &str, now: i64) -> Result<RateLimitDecision> {
        let window_start = self.window_start(now);
        let hits = RateLimitRepository::new(&self.pool)
            .record_hit(key, window_start)
            .await?;

        if hits > self.max_hits {
            let retry_after_secs = (window_start + self.window_secs - now).max(1) as u64;
            debug!(key, hits, retry_after_secs, "Rate limit exceeded");
            return Ok(RateLimitDecision::Throttled { retry_after_secs });
        }

        Ok(RateLimitDecision::Allowed {
            hits,
            remaining: self.max_hits - hits,
        })
    }
}

/// Delete counter rows older than `ttl_secs` relative to `now`
pub async fn reap_expired(pool: &DbPool, ttl_secs: u64, now: i64) -> Result<u64> {
    let cutoff = now - ttl_secs as i64;
    RateLimitRepository::new(pool).delete_older_than(cutoff).await
}

/// Start the background task that expires old counter rows
pub fn spawn_rate_limit_reaper(pool: DbPool, settings: RateLimitSettings) -> JoinHandle<()> {
    let period = Duration::from_secs(settings.reap_interval_secs.max(1));
    info!(
        ttl_secs = settings.ttl_secs,
        interval_secs = period.as_secs(),
        "Rate limit reaper started"
    );

    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            match reap_expired(&pool, settings.ttl_secs, Utc::now().timestamp()).await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "Reaped expired rate limit counters"),
                Err(e) => error!("Rate limit reaper failed: {:#}", e),
            }
            if pool.is_closed() {
                warn!("Database pool closed, stopping rate limit reaper");
                break;
            }
        }
    })
}

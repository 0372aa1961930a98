//! Subscription quota gate

use anyhow::Result;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{DbPool, UserRepository};
use crate::models::{QuotaUsage, Subscription};

/// Reserves and returns AI generation requests against a user's plan limit
#[derive(Clone)]
pub struct QuotaGate {
    pool: DbPool,
}

impl QuotaGate {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Reserve one request; `None` when the quota is exhausted
    pub async fn try_consume(&self, user_id: Uuid) -> Result<Option<Subscription>> {
        let consumed = UserRepository::new(&self.pool)
            .try_consume_ai_request(user_id)
            .await?;

        match &consumed {
            Some(sub) => debug!(
                user_id = %user_id,
                used = sub.ai_requests_used,
                limit = sub.ai_requests_limit,
                "AI request reserved"
            ),
            None => info!(user_id = %user_id, "AI request quota exhausted"),
        }
        Ok(consumed)
    }

    /// Return a reserved request after the provider failed
    pub async fn release(&self, user_id: Uuid) -> Result<()> {
        UserRepository::new(&self.pool)
            .release_ai_request(user_id)
            .await?;
        debug!(user_id = %user_id, "AI request released");
        Ok(())
    }

    pub async fn usage(&self, user_id: Uuid) -> Result<Option<QuotaUsage>> {
        Ok(UserRepository::new(&self.pool)
            .get_subscription(user_id)
            .await?
            .map(QuotaUsage::from))
    }
}

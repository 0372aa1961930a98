//! Worksheet generation pipeline
//!
//! Every request walks the gates in a fixed order and stops at the first one
//! that refuses it:
//!
//! ```text
//! PENDING -> DENIED | THROTTLED | QUOTA_EXCEEDED | FORWARDED
//! FORWARDED -> COMPLETED | PROVIDER_ERROR
//! ```
//!
//! The caller has already been authenticated. A quota slot is reserved before
//! the provider is called and handed back if the provider fails.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::RateLimitSettings;
use crate::db::{AllowedEmailRepository, DbPool, KidProfileRepository, WorksheetRepository};
use crate::models::{GenerateWorksheetRequest, GenerationState, QuotaUsage, Worksheet};
use crate::services::allow_list::is_email_allowed;
use crate::services::llm::{ProviderError, WorksheetPrompt, WorksheetProvider};
use crate::services::quota::QuotaGate;
use crate::services::rate_limiter::{user_key, FixedWindowLimiter, RateLimitDecision};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Your email is not on the allow-list")]
    Denied,
    #[error("Too many generation requests, retry in {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },
    #[error("AI request limit reached for your plan")]
    QuotaExceeded,
    #[error("Kid profile not found")]
    KidProfileNotFound,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GenerationError {
    /// Terminal state a request failing with this error ends in
    pub fn state(&self) -> GenerationState {
        match self {
            GenerationError::Denied | GenerationError::KidProfileNotFound => {
                GenerationState::Denied
            }
            GenerationError::Throttled { .. } => GenerationState::Throttled,
            GenerationError::QuotaExceeded => GenerationState::QuotaExceeded,
            GenerationError::Provider(_) | GenerationError::Internal(_) => {
                GenerationState::ProviderError
            }
        }
    }
}

/// A persisted worksheet and the quota left after producing it
#[derive(Debug, Clone)]
pub struct GeneratedWorksheet {
    pub worksheet: Worksheet,
    pub usage: QuotaUsage,
}

/// Runs generation requests through the allow-list, rate-limit and quota gates
#[derive(Clone)]
pub struct WorksheetGenerator {
    pool: DbPool,
    limiter: FixedWindowLimiter,
    quota: QuotaGate,
    provider: Arc<dyn WorksheetProvider>,
}

impl WorksheetGenerator {
    pub fn new(
        pool: DbPool,
        rate_limit: &RateLimitSettings,
        provider: Arc<dyn WorksheetProvider>,
    ) -> Self {
        Self {
            limiter: FixedWindowLimiter::new(pool.clone(), rate_limit),
            quota: QuotaGate::new(pool.clone()),
            pool,
            provider,
        }
    }

    pub async fn generate(
        &self,
        user_id: Uuid,
        email: &str,
        req: &GenerateWorksheetRequest,
    ) -> Result<GeneratedWorksheet, GenerationError> {
        let mut state = GenerationState::Pending;
        info!(user_id = %user_id, state = %state, topic = %req.topic, "Worksheet requested");

        // Access may have been revoked since the token was issued
        let store = AllowedEmailRepository::new(&self.pool);
        if is_email_allowed(&store, email).await?.is_none() {
            return Err(self.reject(user_id, GenerationError::Denied));
        }

        if let Some(kid_id) = req.kid_profile_id {
            let kid = KidProfileRepository::new(&self.pool)
                .get_for_user(user_id, kid_id)
                .await?;
            if kid.is_none() {
                return Err(self.reject(user_id, GenerationError::KidProfileNotFound));
            }
        }

        let key = user_key(user_id);
        if let RateLimitDecision::Throttled { retry_after_secs } = self.limiter.check(&key).await? {
            return Err(self.reject(user_id, GenerationError::Throttled { retry_after_secs }));
        }

        let Some(subscription) = self.quota.try_consume(user_id).await? else {
            return Err(self.reject(user_id, GenerationError::QuotaExceeded));
        };

        state = GenerationState::Forwarded;
        info!(user_id = %user_id, state = %state, provider = self.provider.name(), "Forwarding to provider");

        let prompt = WorksheetPrompt {
            subject: req.subject.clone(),
            grade: req.grade.clone(),
            topic: req.topic.clone(),
            difficulty: req.difficulty,
            question_count: req.question_count,
        };

        let content = match self.provider.generate(&prompt).await {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    state = %GenerationState::ProviderError,
                    "Provider failed: {}",
                    e
                );
                self.release_quota(user_id).await;
                return Err(GenerationError::Provider(e));
            }
        };

        let worksheet = Worksheet {
            id: Uuid::new_v4(),
            user_id,
            kid_profile_id: req.kid_profile_id,
            subject: req.subject.clone(),
            grade: req.grade.clone(),
            topic: req.topic.clone(),
            difficulty: req.difficulty,
            question_count: req.question_count,
            content,
            score: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        if let Err(e) = WorksheetRepository::new(&self.pool).create(&worksheet).await {
            error!(user_id = %user_id, "Failed to store generated worksheet: {:#}", e);
            self.release_quota(user_id).await;
            return Err(e.into());
        }

        state = GenerationState::Completed;
        info!(user_id = %user_id, state = %state, worksheet_id = %worksheet.id, "Worksheet generated");

        Ok(GeneratedWorksheet {
            worksheet,
            usage: QuotaUsage::from(subscription),
        })
    }

    /// Give back the request reserved for a generation that did not complete
    async fn release_quota(&self, user_id: Uuid) {
        if let Err(e) = self.quota.release(user_id).await {
            error!(user_id = %user_id, "Failed to release AI request: {:#}", e);
        }
    }

    fn reject(&self, user_id: Uuid, err: GenerationError) -> GenerationError {
        info!(user_id = %user_id, state = %err.state(), "Worksheet request rejected: {}", err);
        err
    }
}

//! Business logic services

pub mod allow_list;
pub mod analytics;
pub mod auth;
pub mod generation;
pub mod llm;
pub mod quota;
pub mod rate_limiter;

pub use analytics::AnalyticsService;
pub use auth::{AuthService, GoogleAuthError, GoogleIdentity, GoogleVerifier};
pub use generation::{GeneratedWorksheet, GenerationError, WorksheetGenerator};
pub use llm::{OpenAiProvider, ProviderError, WorksheetPrompt, WorksheetProvider};
pub use quota::QuotaGate;
pub use rate_limiter::{spawn_rate_limit_reaper, FixedWindowLimiter, RateLimitDecision};

//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides (the variables the platform has always used)
//! - Multiple configuration file locations
//! - Default values for all settings
//! - Subscription plan quotas and rate-limit windows

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::models::Plan;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Per-IP burst protection for the authentication endpoints
    #[serde(default)]
    pub auth_burst: BurstSettings,
    #[serde(default)]
    pub subscriptions: SubscriptionConfig,
    pub llm: LlmConfig,
    /// Stripe billing (optional; checkout itself happens outside this service)
    #[serde(default)]
    pub stripe: Option<StripeConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_expiry")]
    pub token_expiry_hours: u64,
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,
    /// Addresses that receive an admin allow-list entry on their first login
    #[serde(default)]
    pub override_emails: Vec<String>,
    #[serde(default)]
    pub google: Option<GoogleConfig>,
}

fn default_token_expiry() -> u64 {
    24 * 7
}

fn default_password_min_length() -> usize {
    8
}

/// Google sign-in configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoogleConfig {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_tokeninfo_url")]
    pub tokeninfo_url: String,
}

fn default_tokeninfo_url() -> String {
    "https://oauth2.googleapis.com/tokeninfo".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_timeout() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Log output target (console or file)
    #[serde(default)]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file" or "both")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to console (stdout/stderr) - default for development
    #[default]
    Console,
    /// Log to file with optional rotation - recommended for production
    File,
    /// Log to both console and file
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_log_prefix() -> String {
    "brainybees".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

/// Fixed-window rate limit applied to worksheet generation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_max_hits")]
    pub max_hits: u32,
    /// Age after which counter rows are reaped
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_hits() -> u32 {
    10
}

fn default_ttl_secs() -> u64 {
    crate::services::rate_limiter::RATE_LIMIT_TTL_SECS
}

fn default_reap_interval() -> u64 {
    60
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_hits: default_max_hits(),
            ttl_secs: default_ttl_secs(),
            reap_interval_secs: default_reap_interval(),
        }
    }
}

/// Token-bucket settings for the in-memory per-IP limiter
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BurstSettings {
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

fn default_requests_per_second() -> u32 {
    1
}

fn default_burst_size() -> u32 {
    5
}

impl Default for BurstSettings {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
        }
    }
}

/// AI request quota per plan (-1 means unlimited)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionConfig {
    #[serde(default = "default_free_requests")]
    pub free_requests: i64,
    #[serde(default = "default_basic_requests")]
    pub basic_requests: i64,
    #[serde(default = "default_premium_requests")]
    pub premium_requests: i64,
}

fn default_free_requests() -> i64 {
    10
}

fn default_basic_requests() -> i64 {
    100
}

fn default_premium_requests() -> i64 {
    -1
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            free_requests: default_free_requests(),
            basic_requests: default_basic_requests(),
            premium_requests: default_premium_requests(),
        }
    }
}

impl SubscriptionConfig {
    /// Quota for a plan
    pub fn limit_for(&self, plan: Plan) -> i64 {
        match plan {
            Plan::Free => self.free_requests,
            Plan::Basic => self.basic_requests,
            Plan::Premium => self.premium_requests,
        }
    }
}

/// LLM provider connection (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    pub api_key: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_llm_temperature() -> f32 {
    0.7
}

/// Stripe billing configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StripeConfig {
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub basic_price_id: Option<String>,
    #[serde(default)]
    pub premium_price_id: Option<String>,
    #[serde(default)]
    pub annual_price_id: Option<String>,
}

impl StripeConfig {
    /// Plan purchased by a Stripe price ID
    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        if self.basic_price_id.as_deref() == Some(price_id) {
            Some(Plan::Basic)
        } else if self.premium_price_id.as_deref() == Some(price_id)
            || self.annual_price_id.as_deref() == Some(price_id)
        {
            Some(Plan::Premium)
        } else {
            None
        }
    }

    /// Names of the settings that are not configured
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.secret_key.is_none() {
            missing.push("STRIPE_SECRET_KEY");
        }
        if self.basic_price_id.is_none() {
            missing.push("STRIPE_BASIC_PRICE_ID");
        }
        if self.premium_price_id.is_none() {
            missing.push("STRIPE_PREMIUM_PRICE_ID");
        }
        if self.annual_price_id.is_none() {
            missing.push("STRIPE_ANNUAL_PRICE_ID");
        }
        missing
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                cors_origins: Vec::new(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production-minimum-32-characters-long".to_string(),
                token_expiry_hours: default_token_expiry(),
                password_min_length: default_password_min_length(),
                override_emails: Vec::new(),
                google: None,
            },
            database: DatabaseConfig {
                url: "sqlite://./data/brainybees.db?mode=rwc".to_string(),
                max_connections: default_max_connections(),
                connect_timeout_secs: default_connect_timeout(),
            },
            logging: LoggingConfig::default(),
            rate_limit: RateLimitSettings::default(),
            auth_burst: BurstSettings::default(),
            subscriptions: SubscriptionConfig::default(),
            llm: LlmConfig {
                api_key: String::new(),
                base_url: default_llm_base_url(),
                model: default_llm_model(),
                timeout_secs: default_llm_timeout(),
                temperature: default_llm_temperature(),
            },
            stripe: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("BRAINYBEES_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => {
                eprintln!("[CONFIG] Loading configuration from: {:?}", path);
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                serde_norway::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))?
            }
            Some(ref path) => {
                eprintln!("[CONFIG] Config file not found: {:?}, using defaults", path);
                AppConfig::default()
            }
            None => {
                eprintln!("[CONFIG] No config file found, using defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            PathBuf::from("/etc/brainybees/config.yaml"),
            dirs::config_dir()
                .map(|p| p.join("brainybees/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable source
    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("BRAINYBEES_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("BRAINYBEES_PORT").or_else(|| var("PORT")) {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        // The platform historically pointed at MongoDB through MONGODB_URI
        if let Some(url) = var("DATABASE_URL").or_else(|| var("MONGODB_URI")) {
            self.database.url = url;
        }

        if let Some(secret) = var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(emails) = var("OVERRIDE_EMAILS") {
            self.auth.override_emails = emails
                .split(',')
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
        }
        if let Some(client_id) = var("GOOGLE_CLIENT_ID") {
            let google = self.auth.google.get_or_insert_with(|| GoogleConfig {
                client_id: String::new(),
                client_secret: None,
                tokeninfo_url: default_tokeninfo_url(),
            });
            google.client_id = client_id;
            if let Some(secret) = var("GOOGLE_CLIENT_SECRET") {
                google.client_secret = Some(secret);
            }
        }

        if let Some(key) = var("OPENAI_API_KEY").or_else(|| var("OPENROUTER_API_KEY")) {
            self.llm.api_key = key;
        }
        if let Some(url) = var("LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = var("LLM_MODEL") {
            self.llm.model = model;
        }

        let stripe_vars = [
            var("STRIPE_SECRET_KEY"),
            var("STRIPE_BASIC_PRICE_ID"),
            var("STRIPE_PREMIUM_PRICE_ID"),
            var("STRIPE_ANNUAL_PRICE_ID"),
        ];
        if stripe_vars.iter().any(Option::is_some) {
            let [secret_key, basic, premium, annual] = stripe_vars;
            let stripe = self.stripe.get_or_insert_with(StripeConfig::default);
            stripe.secret_key = secret_key.or(stripe.secret_key.take());
            stripe.basic_price_id = basic.or(stripe.basic_price_id.take());
            stripe.premium_price_id = premium.or(stripe.premium_price_id.take());
            stripe.annual_price_id = annual.or(stripe.annual_price_id.take());
        }

        if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Some(format) = var("BRAINYBEES_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }
        if let Some(target) = var("BRAINYBEES_LOG_TARGET") {
            self.logging.target = match target.to_lowercase().as_str() {
                "file" => LogTarget::File,
                "both" => LogTarget::Both,
                _ => LogTarget::Console,
            };
        }
        if let Some(dir) = var("BRAINYBEES_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(dir);
        }
    }

    /// Validate configuration
    ///
    /// Required settings fail startup; optional integrations are reported by
    /// `warn_missing_optional`.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < 32 {
            anyhow::bail!("JWT secret must be at least 32 characters long");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.llm.api_key.trim().is_empty() {
            anyhow::bail!("LLM API key is required (set OPENAI_API_KEY)");
        }

        if self.rate_limit.window_secs == 0 || self.rate_limit.max_hits == 0 {
            anyhow::bail!("Rate limit window and max hits must be greater than 0");
        }

        for (plan, limit) in [
            ("free", self.subscriptions.free_requests),
            ("basic", self.subscriptions.basic_requests),
            ("premium", self.subscriptions.premium_requests),
        ] {
            if limit < -1 {
                anyhow::bail!("Invalid request quota for {} plan: {}", plan, limit);
            }
        }

        if let Some(ref google) = self.auth.google {
            if google.client_id.is_empty() {
                anyhow::bail!("Google client ID cannot be empty when Google sign-in is configured");
            }
        }

        Ok(())
    }

    /// Warn about optional integrations that are not configured
    ///
    /// Called once logging is up, since `load` runs before the subscriber exists.
    pub fn warn_missing_optional(&self) {
        match self.stripe {
            Some(ref stripe) => {
                for name in stripe.missing_settings() {
                    warn!("{} is not set; subscription checkout is degraded", name);
                }
            }
            None => warn!("Stripe is not configured; subscription checkout is disabled"),
        }

        if self.auth.google.is_none() {
            warn!("GOOGLE_CLIENT_ID is not set; Google sign-in is disabled");
        }
        if self.auth.override_emails.is_empty() {
            warn!("No override emails configured; the allow-list must be seeded manually");
        }
    }
}

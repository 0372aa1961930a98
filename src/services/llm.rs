//! LLM provider client
//!
//! Worksheets are authored by an OpenAI-compatible chat-completions endpoint
//! (OpenAI itself or OpenRouter). The service only checks that the reply is a
//! JSON object carrying a `questions` array; the content is stored as-is.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::LlmConfig;
use crate::models::Difficulty;

/// What to ask the provider for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorksheetPrompt {
    pub subject: String,
    pub grade: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_count: i64,
}

impl WorksheetPrompt {
    fn user_message(&self) -> String {
        format!(
            "Create a {} worksheet for grade {} on \"{}\" with {} {} questions.",
            self.subject, self.grade, self.topic, self.question_count, self.difficulty
        )
    }
}

const SYSTEM_PROMPT: &str = "You write printable worksheets for children. \
Reply with a single JSON object of the form \
{\"title\": string, \"instructions\": string, \"questions\": [{\"question\": string, \"answer\": string}]} \
and nothing else.";

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Provider response malformed: {0}")]
    Malformed(String),
}

/// Source of worksheet content
#[async_trait]
pub trait WorksheetProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Generate worksheet content; no retries are attempted
    async fn generate(&self, prompt: &WorksheetPrompt) -> Result<Value, ProviderError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// OpenAI-compatible chat-completions provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build LLM HTTP client")?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl WorksheetProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn generate(&self, prompt: &WorksheetPrompt) -> Result<Value, ProviderError> {
        let start = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user_message(),
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(model = %self.model, topic = %prompt.topic, "Sending worksheet request to provider");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("no choices returned".to_string()))?;

        let worksheet = parse_worksheet(&content)?;
        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            "Provider returned worksheet"
        );
        Ok(worksheet)
    }
}

/// Parse provider output into a worksheet document
pub fn parse_worksheet(content: &str) -> Result<Value, ProviderError> {
    // Some models wrap JSON in a markdown fence
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| ProviderError::Malformed(format!("content is not JSON: {}", e)))?;

    match value.get("questions") {
        Some(Value::Array(_)) if value.is_object() => Ok(value),
        _ => Err(ProviderError::Malformed(
            "content has no questions array".to_string(),
        )),
    }
}

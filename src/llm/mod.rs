//! LLM completion backend
//!
//! The pipeline only needs one thing from a language model: turn a prompt
//! into text. [`LlmClient`] is that contract. [`HttpLlmClient`] speaks to
//! either an Ollama-style `/api/generate` endpoint or an OpenAI-compatible
//! `/v1/chat/completions` endpoint; [`DisabledLlmClient`] always fails so
//! the parser takes its deterministic path.

use crate::config::{LlmConfig, LlmProvider};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Errors from the completion collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("LLM is disabled in configuration")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("LLM returned empty response")]
    EmptyResponse,

    #[error("Unexpected response shape: {0}")]
    InvalidResponse(String),
}

/// Text completion contract
///
/// Implementations must be safe to share between concurrently running
/// queries.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete a prompt into text
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Model identifier, for logging
    fn model_name(&self) -> &str;
}

/// Client that never answers; forces heuristic parsing and plain output
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLlmClient;

#[async_trait]
impl LlmClient for DisabledLlmClient {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }

    fn model_name(&self) -> &str {
        "disabled"
    }
}

/// HTTP completion client
pub struct HttpLlmClient {
    config: LlmConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.config.timeout_secs)
        } else {
            LlmError::Http(format!("Request failed: {}", e))
        }
    }

    async fn call_ollama(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.config.temperature },
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(LlmError::Http(format!("HTTP {} from Ollama", response.status())));
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        parsed.response.ok_or(LlmError::EmptyResponse)
    }

    async fn call_openai_compatible(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.config.temperature,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(LlmError::Http(format!(
                "HTTP {} from OpenAI-compatible API",
                response.status()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }

        let start = Instant::now();
        debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Requesting completion"
        );

        let result = match self.config.provider {
            LlmProvider::Ollama => self.call_ollama(prompt).await,
            LlmProvider::OpenAi => self.call_openai_compatible(prompt).await,
        };
        let result = result.and_then(|text| {
            if text.trim().is_empty() {
                Err(LlmError::EmptyResponse)
            } else {
                Ok(text)
            }
        });

        let elapsed = start.elapsed();
        debug!(
            elapsed_ms = elapsed.as_millis() as u64,
            success = result.is_ok(),
            "Completion finished"
        );

        result
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Build the configured client
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    if !config.enabled {
        return Ok(Arc::new(DisabledLlmClient));
    }
    Ok(Arc::new(HttpLlmClient::new(config.clone())?))
}

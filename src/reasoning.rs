//! Reasoning service client used by the classifier
//!
//! Wraps the Anthropic Messages API behind a small trait so routing logic
//! stays testable without network access.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::OrchestratorError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Trait for the text-completion dependency (LLM controlled)
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Run one completion over the prompt and return the raw text reply.
    async fn complete(&self, prompt: &str) -> crate::Result<String>;
}

/// Reusable Anthropic client (connection-pooled)
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            model,
            base_url: "https://api.anthropic.com/v1/messages".to_string(),
        }
    }
}

#[async_trait]
impl ReasoningService for AnthropicClient {
    async fn complete(&self, prompt: &str) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(OrchestratorError::ReasoningError(
                "ANTHROPIC_API_KEY not configured".to_string(),
            ));
        }

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: 256,
            temperature: 0.0,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        info!("Calling reasoning service");

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Reasoning service request failed: {}", e);
                OrchestratorError::ReasoningError(format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Reasoning service error response: {}", error_text);
            return Err(OrchestratorError::ReasoningError(format!(
                "service returned error: {}",
                error_text
            )));
        }

        let reply: MessagesResponse = response.json().await.map_err(|e| {
            error!("Failed to parse reasoning response: {}", e);
            OrchestratorError::ReasoningError(format!("parse error: {}", e))
        })?;

        let text = reply
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| {
                OrchestratorError::ReasoningError("empty response from reasoning service".to_string())
            })?;

        Ok(text)
    }
}

/// Offline reasoning stub for development & testing
/// Keeps the routing pipeline functional without LLM dependency
pub struct MockReasoning {
    reply: String,
}

impl MockReasoning {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl ReasoningService for MockReasoning {
    async fn complete(&self, _prompt: &str) -> crate::Result<String> {
        Ok(self.reply.clone())
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

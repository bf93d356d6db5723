//! Completion service client (OpenAI-compatible chat completions)
//!
//! The tutor only depends on the `CompletionService` trait: an ordered list of
//! turns plus sampling parameters in, one reply text out.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::types::Message;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model for the tutor
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Errors from a single completion attempt
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("failed to reach completion service: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion service error ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to parse completion response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("completion response contained no message content")]
    EmptyResponse,
}

/// Sampling parameters sent with every request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

/// Anything that can turn a conversation into one reply
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<String, CompletionError>;
}

/// Where an OpenAI-compatible provider lives and how to authenticate
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL for the API (e.g., "https://api.openai.com/v1")
    pub base_url: String,
    pub api_key: String,
}

impl ProviderConfig {
    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Message> for ChatMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            role: message.role.to_openai_string(),
            content: &message.content,
        }
    }
}

/// Chat completion client over reqwest
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    provider: ProviderConfig,
}

impl OpenAiClient {
    /// Client whose requests give up after `timeout`
    pub fn with_timeout(provider: ProviderConfig, timeout: Duration) -> Result<Self, CompletionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, provider })
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &params.model,
            messages: messages.iter().map(ChatMessage::from).collect(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.provider.base_url))
            .bearer_auth(&self.provider.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status, body });
        }

        let body = response.text().await?;
        debug!("Completion response: {} bytes", body.len());

        let raw: Value = serde_json::from_str(&body)?;
        extract_content(&raw).ok_or(CompletionError::EmptyResponse)
    }
}

/// Pull `choices[0].message.content` out of a response, accepting both a plain
/// string and an array of text parts.
fn extract_content(raw: &Value) -> Option<String> {
    let content = raw
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))?;

    let text = match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter(|part| part.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(""),
        _ => return None,
    };

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

//! LLM client for a locally hosted Ollama server

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::types::Role;

/// Model-boundary failures
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model request timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to reach model service: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("model API error ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected model response: {0}")]
    Decode(String),
}

/// A single chat message sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }
}

/// "Messages in, text out" chat completion
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, model: &str, messages: Vec<ChatMessage>) -> Result<String, ModelError>;
}

/// Connection settings for the model service
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL, e.g. "http://localhost:11434"
    pub base_url: String,
    /// Bound on a whole request/response
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn from_config(config: &crate::config::ModelConfig) -> Self {
        Self::new(config.host.clone(), Duration::from_secs(config.timeout_secs))
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_HOST, Duration::from_secs(120))
    }
}

/// Ollama `/api/chat` client
#[derive(Clone)]
pub struct OllamaClient {
    client: Arc<Client>,
    provider: ProviderConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OllamaClient {
    /// Create a client with a specific provider configuration
    pub fn with_provider(provider: ProviderConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(provider.timeout)
            .build()
            .map_err(ModelError::Transport)?;
        Ok(Self {
            client: Arc::new(client),
            provider,
        })
    }

    fn classify(&self, e: reqwest::Error) -> ModelError {
        if e.is_timeout() {
            ModelError::Timeout(self.provider.timeout)
        } else {
            ModelError::Transport(e)
        }
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn complete(&self, model: &str, messages: Vec<ChatMessage>) -> Result<String, ModelError> {
        let request = ChatRequest {
            model,
            messages,
            stream: false,
        };

        tracing::debug!("Sending {} message(s) to {}", request.messages.len(), model);

        let response = self.client
            .post(format!("{}/api/chat", self.provider.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status { status, body });
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::Decode(format!("{} (body: {})", e, truncate(&body, 200))))?;

        if let Some(err) = parsed.error {
            return Err(ModelError::Decode(err));
        }

        parsed
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| ModelError::Decode("response has no message content".to_string()))
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}

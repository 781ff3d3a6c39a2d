use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Transport-level failures. Bad model output is never one of these.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI request timed out after {0:?}")]
    Timeout(Duration),

    #[error("AI provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("AI transport error: {0}")]
    Transport(String),

    #[error("AI provider returned empty text")]
    EmptyResponse,

    #[error("AI provider not configured: {0}")]
    NotConfigured(String),
}

impl AiError {
    pub(crate) fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            AiError::Timeout(timeout)
        } else {
            AiError::Transport(e.to_string())
        }
    }

    /// Worth another attempt inside the same job run.
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::Timeout(_) | AiError::Transport(_) => true,
            AiError::Http { status, .. } => *status == 429 || *status >= 500,
            AiError::EmptyResponse | AiError::NotConfigured(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

impl Usage {
    /// Accepts both `input/output_tokens` and `prompt/completion_tokens` naming.
    pub fn from_envelope(envelope: &JsonValue) -> Option<Self> {
        let u = envelope.get("usage")?.as_object()?;
        let field = |names: &[&str]| names.iter().find_map(|n| u.get(*n).and_then(JsonValue::as_i64));

        let input_tokens = field(&["input_tokens", "prompt_tokens"]).unwrap_or(0);
        let output_tokens = field(&["output_tokens", "completion_tokens"]).unwrap_or(0);
        let total_tokens = field(&["total_tokens"]).unwrap_or(input_tokens + output_tokens);
        Some(Self {
            input_tokens,
            output_tokens,
            total_tokens,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub input: String,
    pub temperature: f32,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<Usage>,
    /// Provider-native envelope, kept for diagnostics.
    pub raw: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub base_url: String,
    pub default_model: String,
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> Result<Completion, AiError>;
    fn info(&self) -> ProviderInfo;
}

/// POSTs `body` as JSON and returns the decoded envelope.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &JsonValue,
    timeout: Duration,
) -> Result<JsonValue, AiError> {
    let resp = client
        .post(url)
        .bearer_auth(api_key)
        .timeout(timeout)
        .json(body)
        .send()
        .await
        .map_err(|e| AiError::from_reqwest(e, timeout))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AiError::Http {
            status: status.as_u16(),
            body,
        });
    }
    resp.json().await.map_err(|e| AiError::from_reqwest(e, timeout))
}

pub(crate) fn non_empty(text: String) -> Result<String, AiError> {
    if text.trim().is_empty() {
        Err(AiError::EmptyResponse)
    } else {
        Ok(text)
    }
}

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::time::Instant;
use tracing::warn;

use crate::provider::{non_empty, post_json, AiError, Completion, CompletionRequest, LLMProvider, ProviderInfo, Usage};

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// In-call retries for transient transport errors, on top of the job retry policy.
/// Attempts and backoff together never outlast the request timeout.
const TRANSPORT_RETRIES: u32 = 2;
const BACKOFF_BASE: Duration = Duration::from_millis(200);

/// OpenAI Responses API.
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

/// `output_text`, then the first output item with content blocks, then chat-style `choices`.
pub fn extract_responses_text(resp: &JsonValue) -> String {
    if let Some(text) = resp.get("output_text").and_then(JsonValue::as_str) {
        if !text.is_empty() {
            return text.to_string();
        }
    }

    let first_content = resp
        .get("output")
        .and_then(JsonValue::as_array)
        .and_then(|items| items.iter().find_map(|i| i.get("content").and_then(JsonValue::as_array)));
    if let Some(blocks) = first_content {
        if let Some(text) = blocks.iter().find_map(|b| b.get("text").and_then(JsonValue::as_str)) {
            return text.to_string();
        }
        return blocks
            .iter()
            .map(|b| b.get("text").and_then(JsonValue::as_str).unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n");
    }

    if let Some(choices) = resp.get("choices").and_then(JsonValue::as_array) {
        return choices
            .iter()
            .map(|c| {
                c.get("text")
                    .and_then(JsonValue::as_str)
                    .or_else(|| c.pointer("/message/content").and_then(JsonValue::as_str))
                    .unwrap_or("")
            })
            .collect::<Vec<_>>()
            .join("\n");
    }

    resp.to_string()
}

/// Calls `attempt` with whatever is left of `budget`, retrying transient errors
/// only while the backoff still fits before the deadline.
async fn retry_within<F, Fut>(budget: Duration, mut attempt: F) -> Result<JsonValue, AiError>
where
    F: FnMut(Duration) -> Fut,
    Fut: Future<Output = Result<JsonValue, AiError>>,
{
    let deadline = Instant::now() + budget;
    let mut retries = 0;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        let err = match attempt(left).await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        if !err.is_transient() || retries >= TRANSPORT_RETRIES {
            return Err(give_up(err, budget));
        }

        retries += 1;
        let backoff = BACKOFF_BASE * 2u32.pow(retries);
        if Instant::now() + backoff >= deadline {
            return Err(give_up(err, budget));
        }
        warn!(provider = "openai", attempt = retries, "transient AI error, retrying in {backoff:?}: {err}");
        tokio::time::sleep(backoff).await;
    }
}

/// A timeout is reported against the whole budget, not the last slice of it.
fn give_up(err: AiError, budget: Duration) -> AiError {
    match err {
        AiError::Timeout(_) => AiError::Timeout(budget),
        other => other,
    }
}

#[async_trait]
impl LLMProvider for OpenAiProvider {
    async fn complete(&self, req: &CompletionRequest) -> Result<Completion, AiError> {
        let body = serde_json::json!({
            "model": req.model,
            "input": req.input,
            "temperature": req.temperature,
        });
        let url = format!("{}/responses", self.base_url);

        let envelope = retry_within(req.timeout, |left| {
            post_json(&self.client, &url, &self.api_key, &body, left)
        })
        .await?;

        Ok(Completion {
            text: non_empty(extract_responses_text(&envelope))?,
            usage: Usage::from_envelope(&envelope),
            raw: envelope,
        })
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "openai".to_string(),
            base_url: self.base_url.clone(),
            default_model: OPENAI_DEFAULT_MODEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_output_text() {
        let r = json!({"output_text": "{\"a\":1}", "output": [{"content": [{"text": "other"}]}]});
        assert_eq!(extract_responses_text(&r), "{\"a\":1}");
    }

    #[test]
    fn falls_back_to_output_blocks_then_choices() {
        let r = json!({"output": [{"type": "message", "content": [{"type": "output_text", "text": "hello"}]}]});
        assert_eq!(extract_responses_text(&r), "hello");

        let r = json!({"choices": [{"message": {"content": "a"}}, {"text": "b"}]});
        assert_eq!(extract_responses_text(&r), "a\nb");
    }

    #[test]
    fn unknown_envelope_is_serialized() {
        let r = json!({"weird": true});
        assert_eq!(extract_responses_text(&r), r#"{"weird":true}"#);
    }

    #[tokio::test]
    async fn slow_timeouts_do_not_stretch_past_the_budget() {
        let budget = Duration::from_millis(300);
        let mut calls = 0;
        let started = std::time::Instant::now();

        let res = retry_within(budget, |left| {
            calls += 1;
            async move {
                tokio::time::sleep(left).await;
                Err(AiError::Timeout(left))
            }
        })
        .await;

        assert!(matches!(res, Err(AiError::Timeout(d)) if d == budget));
        assert_eq!(calls, 1);
        assert!(started.elapsed() < budget + Duration::from_millis(250));
    }

    #[tokio::test]
    async fn quick_transient_errors_use_both_retries() {
        let mut calls = 0;
        let res = retry_within(Duration::from_secs(10), |_| {
            calls += 1;
            async { Err(AiError::Transport("connection reset".into())) }
        })
        .await;

        assert!(matches!(res, Err(AiError::Transport(_))));
        assert_eq!(calls, 1 + TRANSPORT_RETRIES);
    }

    #[tokio::test]
    async fn recovers_after_one_transient_error() {
        let mut calls = 0;
        let res = retry_within(Duration::from_secs(10), |_| {
            calls += 1;
            let n = calls;
            async move {
                if n == 1 {
                    Err(AiError::Http { status: 503, body: "busy".into() })
                } else {
                    Ok(json!({"output_text": "{}"}))
                }
            }
        })
        .await;

        assert_eq!(res.unwrap(), json!({"output_text": "{}"}));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut calls = 0;
        let res = retry_within(Duration::from_secs(10), |_| {
            calls += 1;
            async { Err(AiError::Http { status: 401, body: "bad key".into() }) }
        })
        .await;

        assert!(matches!(res, Err(AiError::Http { status: 401, .. })));
        assert_eq!(calls, 1);
    }
}

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::provider::{non_empty, post_json, AiError, Completion, CompletionRequest, LLMProvider, ProviderInfo, Usage};

/// Any OpenAI-compatible `/chat/completions` endpoint (DeepSeek, local servers).
pub struct ChatCompletionsProvider {
    name: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl ChatCompletionsProvider {
    pub fn new(name: &str, base_url: &str, api_key: &str, default_model: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            default_model: default_model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

/// `choices[0].message.content` (string or part array), then `choices[0].text`.
pub fn extract_chat_text(resp: &JsonValue) -> String {
    let choice = resp.pointer("/choices/0");
    let content = choice.and_then(|c| c.pointer("/message/content"));

    if let Some(parts) = content.and_then(JsonValue::as_array) {
        let texts: Vec<&str> = parts
            .iter()
            .filter_map(|p| {
                p.get("text")
                    .and_then(JsonValue::as_str)
                    .or_else(|| p.get("content").and_then(JsonValue::as_str))
            })
            .filter(|s| !s.is_empty())
            .collect();
        if !texts.is_empty() {
            return texts.join("\n");
        }
    }
    if let Some(text) = content.and_then(JsonValue::as_str) {
        return text.to_string();
    }
    if let Some(text) = choice.and_then(|c| c.get("text")).and_then(JsonValue::as_str) {
        return text.to_string();
    }
    resp.to_string()
}

#[async_trait]
impl LLMProvider for ChatCompletionsProvider {
    async fn complete(&self, req: &CompletionRequest) -> Result<Completion, AiError> {
        let body = serde_json::json!({
            "model": req.model,
            "messages": [{"role": "user", "content": req.input}],
            "temperature": req.temperature,
        });
        let url = format!("{}/chat/completions", self.base_url);
        let envelope = post_json(&self.client, &url, &self.api_key, &body, req.timeout).await?;

        Ok(Completion {
            text: non_empty(extract_chat_text(&envelope))?,
            usage: Usage::from_envelope(&envelope),
            raw: envelope,
        })
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            base_url: self.base_url.clone(),
            default_model: self.default_model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_string_content() {
        let r = json!({"choices": [{"message": {"role": "assistant", "content": "{\"ok\":true}"}}]});
        assert_eq!(extract_chat_text(&r), "{\"ok\":true}");
    }

    #[test]
    fn joins_part_arrays() {
        let r = json!({"choices": [{"message": {"content": [{"type": "text", "text": "a"}, {"text": ""}, {"content": "b"}]}}]});
        assert_eq!(extract_chat_text(&r), "a\nb");
    }

    #[test]
    fn legacy_text_then_envelope() {
        assert_eq!(extract_chat_text(&json!({"choices": [{"text": "t"}]})), "t");
        assert_eq!(extract_chat_text(&json!({"id": 1})), r#"{"id":1}"#);
    }
}

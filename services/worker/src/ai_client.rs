//! Prompt in, validated report out. Bad model output is data, not an error.

use std::sync::Arc;
use std::time::Duration;

use insight::{sanitize_json_text, validate_report, SchemaViolation};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::provider::{AiError, CompletionRequest, LLMProvider, Usage, DEFAULT_TEMPERATURE};
use crate::registry::ResolvedProvider;

#[derive(Debug, Clone, PartialEq)]
pub struct AiResponse {
    /// Set only when the text parsed as JSON and passed validation.
    pub parsed: Option<JsonValue>,
    pub raw: JsonValue,
    pub text: String,
    pub usage: Option<Usage>,
    /// Set only when the text parsed but did not match the report shape.
    pub validation_errors: Option<Vec<SchemaViolation>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Valid,
    Unparseable,
    SchemaMismatch,
}

impl AiResponse {
    pub fn kind(&self) -> ResponseKind {
        match (&self.parsed, &self.validation_errors) {
            (Some(_), _) => ResponseKind::Valid,
            (None, Some(_)) => ResponseKind::SchemaMismatch,
            (None, None) => ResponseKind::Unparseable,
        }
    }
}

#[derive(Clone)]
pub struct AiClient {
    provider: Arc<dyn LLMProvider>,
    model: String,
    timeout: Duration,
}

impl AiClient {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout,
        }
    }

    pub fn from_resolved(resolved: ResolvedProvider, timeout: Duration) -> Self {
        Self::new(resolved.provider, resolved.model, timeout)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Errors only on transport failure; malformed or off-schema output comes back with `parsed: None`.
    pub async fn get_response(&self, prompt: &str) -> Result<AiResponse, AiError> {
        let req = CompletionRequest {
            model: self.model.clone(),
            input: prompt.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: self.timeout,
        };
        let completion = self.provider.complete(&req).await?;
        debug!(provider = %self.provider.info().name, model = %self.model, chars = completion.text.len(), "AI text received");

        let mut resp = AiResponse {
            parsed: None,
            raw: completion.raw,
            text: completion.text,
            usage: completion.usage,
            validation_errors: None,
        };

        let candidate: JsonValue = match serde_json::from_str(sanitize_json_text(&resp.text)) {
            Ok(v) => v,
            Err(e) => {
                warn!(model = %self.model, "AI response is not valid JSON: {e}");
                return Ok(resp);
            }
        };

        match validate_report(&candidate) {
            Ok(()) => resp.parsed = Some(candidate),
            Err(errors) => {
                warn!(model = %self.model, violations = errors.len(), "AI response failed schema validation");
                resp.validation_errors = Some(errors);
            }
        }
        Ok(resp)
    }
}

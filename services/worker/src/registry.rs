//! Provider registry, resolved once at startup.

use std::sync::Arc;

use crate::config::AiConfig;
use crate::provider::{AiError, LLMProvider};
use crate::provider_chat::ChatCompletionsProvider;
use crate::provider_openai::{OpenAiProvider, OPENAI_DEFAULT_MODEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Responses,
    ChatCompletions,
}

#[derive(Debug, Clone)]
pub struct ProviderDef {
    pub id: &'static str,
    pub api_format: ApiFormat,
    pub base_url: String,
    pub api_key: Option<String>,
    pub default_model: String,
}

pub struct ProviderRegistry {
    providers: Vec<ProviderDef>,
}

/// The backend every report job talks to, plus the model id to send.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub provider: Arc<dyn LLMProvider>,
    pub model: String,
}

impl ProviderRegistry {
    pub fn from_config(cfg: &AiConfig) -> Self {
        Self {
            providers: vec![
                ProviderDef {
                    id: "openai",
                    api_format: ApiFormat::Responses,
                    base_url: cfg.openai_base_url.clone(),
                    api_key: cfg.openai_api_key.clone(),
                    default_model: OPENAI_DEFAULT_MODEL.to_string(),
                },
                ProviderDef {
                    id: "deepseek",
                    api_format: ApiFormat::ChatCompletions,
                    base_url: cfg.deepseek_base_url.clone(),
                    api_key: cfg.deepseek_api_key.clone(),
                    default_model: cfg.deepseek_model.clone(),
                },
            ],
        }
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id).collect()
    }

    pub fn get(&self, id: &str) -> Option<&ProviderDef> {
        let normalized = id.trim().to_lowercase();
        self.providers.iter().find(|p| p.id == normalized)
    }

    /// Unknown ids and missing keys fail here rather than on the first job.
    pub fn resolve(&self, id: &str, model_override: Option<&str>) -> Result<ResolvedProvider, AiError> {
        let def = self.get(id).ok_or_else(|| {
            AiError::NotConfigured(format!("unknown AI provider '{id}' (known: {})", self.ids().join(", ")))
        })?;
        let key = def
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::NotConfigured(format!("{} requires an API key", def.id)))?;

        let provider: Arc<dyn LLMProvider> = match def.api_format {
            ApiFormat::Responses => Arc::new(OpenAiProvider::new(&def.base_url, key)),
            ApiFormat::ChatCompletions => {
                Arc::new(ChatCompletionsProvider::new(def.id, &def.base_url, key, &def.default_model))
            }
        };

        // DeepSeek rejects OpenAI model ids, so its own model setting wins over AI_MODEL.
        let model = match (def.api_format, model_override) {
            (ApiFormat::Responses, Some(m)) => m.to_string(),
            _ => def.default_model.clone(),
        };

        Ok(ResolvedProvider { provider, model })
    }
}

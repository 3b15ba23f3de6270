use std::collections::HashMap;

use async_trait::async_trait;

use crate::backend::http::HttpGenerator;
use crate::backend::{GenerateRequest, ModelBackend, TokenFn};
use crate::config::Config;
use crate::error::QuillError;

/// Backend family for a model entry. One variant per wire family —
/// prevents invalid states (an Anthropic entry with bearer-token auth).
#[derive(Clone)]
pub enum BackendConfig {
    /// OpenAI-compatible chat completions (OpenAI, OpenRouter, Ollama's
    /// compatibility endpoint, most self-hosted gateways).
    OpenAiCompat { base_url: String, api_key: String },
    /// Anthropic messages API (different headers, SSE format).
    Anthropic { base_url: String, api_key: String },
}

#[derive(Clone)]
pub struct ModelEntry {
    /// Provider-side model identifier sent in request bodies.
    pub model_id: String,
    /// Provider name, used in error messages.
    pub provider: String,
    pub backend: BackendConfig,
}

impl ModelEntry {
    /// Returns the backend family as a string for display purposes.
    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            BackendConfig::OpenAiCompat { .. } => "openai",
            BackendConfig::Anthropic { .. } => "anthropic",
        }
    }
}

impl std::fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("ModelEntry");
        s.field("model_id", &self.model_id)
            .field("provider", &self.provider);

        match &self.backend {
            BackendConfig::OpenAiCompat { base_url, .. } => {
                s.field("backend", &"openai")
                    .field("base_url", base_url)
                    .field("api_key", &"[REDACTED]");
            }
            BackendConfig::Anthropic { base_url, .. } => {
                s.field("backend", &"anthropic")
                    .field("base_url", base_url)
                    .field("api_key", &"[REDACTED]");
            }
        }

        s.finish()
    }
}

/// Resolves model identifiers to backend entries and dispatches generation
/// to the matching wire family.
pub struct Registry {
    models: HashMap<String, ModelEntry>,
    http: HttpGenerator,
}

impl Registry {
    pub fn from_config(config: Config) -> Self {
        Self {
            models: config.models,
            http: HttpGenerator::new(),
        }
    }

    pub fn get(&self, model: &str) -> Option<&ModelEntry> {
        self.models.get(model)
    }

    pub fn list_models(&self) -> Vec<(&String, &ModelEntry)> {
        self.models.iter().collect()
    }

    /// Best-effort provider name for user-facing messages. Callers discard
    /// the miss; messaging falls back to the bare model key.
    pub fn provider_name(&self, model: &str) -> Option<&str> {
        self.models.get(model).map(|e| e.provider.as_str())
    }

    /// Suggest similar model names for a failed lookup (substring match).
    /// Sorted alphabetically, capped at 5 to keep error messages readable.
    pub fn suggest_models(&self, query: &str) -> Vec<String> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return vec![];
        }
        let mut suggestions: Vec<String> = self
            .models
            .keys()
            .filter(|k| {
                let k_lower = k.to_lowercase();
                k_lower.contains(&q) || q.contains(&k_lower)
            })
            .cloned()
            .collect();
        suggestions.sort();
        suggestions.truncate(5);
        suggestions
    }
}

#[async_trait]
impl ModelBackend for Registry {
    async fn generate(
        &self,
        req: &GenerateRequest,
        on_token: Option<&TokenFn>,
    ) -> Result<Option<String>, QuillError> {
        let entry = self.models.get(&req.model).ok_or_else(|| {
            let suggestions = self.suggest_models(&req.model);
            QuillError::ModelNotFound {
                model: req.model.clone(),
                suggestions,
            }
        })?;

        // Substitute the provider's model_id for the registry key.
        // e.g. "sonnet" → "claude-sonnet-4-5" in the API request body.
        let resolved = GenerateRequest {
            model: entry.model_id.clone(),
            ..(*req).clone()
        };
        let req = &resolved;

        match &entry.backend {
            BackendConfig::OpenAiCompat { base_url, api_key } => {
                self.http
                    .generate_openai(req, &entry.provider, base_url, api_key, on_token)
                    .await
            }
            BackendConfig::Anthropic { base_url, api_key } => {
                self.http
                    .generate_anthropic(req, &entry.provider, base_url, api_key, on_token)
                    .await
            }
        }
    }
}

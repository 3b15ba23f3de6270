use std::collections::HashMap;
use std::env;
use std::path::Path;

use serde::Deserialize;

use crate::backend::registry::{BackendConfig, ModelEntry};
use crate::error::QuillError;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// Model table consumed by the registry. Key material is always read from
/// the environment — config files name the variable, never the key.
#[derive(Debug)]
pub struct Config {
    pub models: HashMap<String, ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    models: HashMap<String, ModelTable>,
}

#[derive(Debug, Deserialize)]
struct ModelTable {
    provider: String,
    model_id: String,
    base_url: String,
    api_key_env: String,
    format: WireFormat,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireFormat {
    Openai,
    Anthropic,
}

impl Config {
    /// Load `.env`, build env-derived defaults, then overlay `quill.toml`
    /// from the working directory if present.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::from_env();

        let path = Path::new("quill.toml");
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(text) => match Self::from_toml_str(&text) {
                    Ok(overlay) => config.models.extend(overlay.models),
                    Err(e) => tracing::warn!("ignoring quill.toml: {e}"),
                },
                Err(e) => tracing::warn!("failed to read quill.toml: {e}"),
            }
        }

        config
    }

    pub fn from_env() -> Self {
        let openai_key = env::var("OPENAI_API_KEY").ok();
        let anthropic_key = env::var("ANTHROPIC_API_KEY").ok();

        let mut models = HashMap::new();

        if let Some(key) = openai_key {
            models.insert(
                "gpt-4o".to_string(),
                ModelEntry {
                    model_id: "gpt-4o".to_string(),
                    provider: "openai".to_string(),
                    backend: BackendConfig::OpenAiCompat {
                        base_url: OPENAI_CHAT_URL.to_string(),
                        api_key: key.clone(),
                    },
                },
            );

            models.insert(
                "gpt-4o-mini".to_string(),
                ModelEntry {
                    model_id: "gpt-4o-mini".to_string(),
                    provider: "openai".to_string(),
                    backend: BackendConfig::OpenAiCompat {
                        base_url: OPENAI_CHAT_URL.to_string(),
                        api_key: key,
                    },
                },
            );
        } else {
            tracing::warn!("OPENAI_API_KEY not set — openai models unavailable");
        }

        if let Some(key) = anthropic_key {
            models.insert(
                "claude-sonnet".to_string(),
                ModelEntry {
                    model_id: "claude-sonnet-4-5".to_string(),
                    provider: "anthropic".to_string(),
                    backend: BackendConfig::Anthropic {
                        base_url: ANTHROPIC_MESSAGES_URL.to_string(),
                        api_key: key,
                    },
                },
            );
        } else {
            tracing::warn!("ANTHROPIC_API_KEY not set — anthropic models unavailable");
        }

        if models.is_empty() {
            tracing::error!("no models configured — set an API key or provide quill.toml");
        }

        Config { models }
    }

    /// Parse a `[models.<key>]` table. Entries whose `api_key_env` variable
    /// is unset are skipped with a warning rather than failing the load.
    pub fn from_toml_str(text: &str) -> Result<Self, QuillError> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| QuillError::SchemaParse(format!("config: {e}")))?;

        let mut models = HashMap::new();

        for (key, table) in file.models {
            let Ok(api_key) = env::var(&table.api_key_env) else {
                tracing::warn!(
                    model = %key,
                    env = %table.api_key_env,
                    "skipping model: key variable not set"
                );
                continue;
            };

            let backend = match table.format {
                WireFormat::Openai => BackendConfig::OpenAiCompat {
                    base_url: table.base_url,
                    api_key,
                },
                WireFormat::Anthropic => BackendConfig::Anthropic {
                    base_url: table.base_url,
                    api_key,
                },
            };

            models.insert(
                key,
                ModelEntry {
                    model_id: table.model_id,
                    provider: table.provider,
                    backend,
                },
            );
        }

        Ok(Config { models })
    }
}

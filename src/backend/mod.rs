pub mod http;
pub mod registry;

use async_trait::async_trait;

use crate::error::QuillError;

/// Incremental-fragment callback for streaming generation.
pub type TokenFn = dyn Fn(&str) + Send + Sync;

/// Internal request type — every backend family accepts this.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub model: String,
    /// System prompt that sets the model's task.
    pub system_instruction: String,
    /// Document text the instruction operates on.
    pub input: String,
    /// Extra user-supplied prompt fragment, appended after the input.
    pub extra_prompt: Option<String>,
    /// Sampling temperature (0 = deterministic, 1 = creative).
    pub temperature: Option<f64>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u64>,
    /// Incremental delivery requested. Callers pass `on_token` iff true.
    pub stream: bool,
}

impl GenerateRequest {
    /// The user-role message body: input text plus the optional extra prompt.
    pub fn user_content(&self) -> String {
        match &self.extra_prompt {
            Some(extra) if !extra.trim().is_empty() => {
                format!("{}\n\n{extra}", self.input)
            }
            _ => self.input.clone(),
        }
    }
}

/// A capability that turns an instruction plus input text into generated
/// text, selected per request by model identifier.
///
/// Contract:
/// - `on_token: None` — one-shot mode; returns `Ok(Some(full_text))`.
/// - `on_token: Some(_)` — streaming mode; every fragment is delivered to the
///   callback in production order with a final flush before the call
///   resolves, and the call returns `Ok(None)`.
/// - On failure the call returns `Err` and `on_token` is never invoked
///   afterwards.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(
        &self,
        req: &GenerateRequest,
        on_token: Option<&TokenFn>,
    ) -> Result<Option<String>, QuillError>;
}

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;

use crate::backend::{GenerateRequest, TokenFn};
use crate::error::QuillError;

pub const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024; // 2MB

/// Anthropic requires an explicit output cap; used when the request has none.
const ANTHROPIC_DEFAULT_MAX_TOKENS: u64 = 1024;

pub struct HttpGenerator {
    client: Client,
}

// --- OpenAI-compatible response shapes ---

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: Delta,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

// --- Anthropic response shapes ---

#[derive(Deserialize)]
struct AnthropicMessage {
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicEvent {
    #[serde(rename = "type")]
    kind: String,
    delta: Option<AnthropicDelta>,
}

#[derive(Deserialize)]
struct AnthropicDelta {
    text: Option<String>,
}

impl Default for HttpGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpGenerator {
    pub fn new() -> Self {
        // No per-request timeout: cancellation is the only mechanism to
        // abandon a slow model call.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build HTTP client");

        Self { client }
    }

    /// OpenAI-compatible chat completions: one-shot JSON or SSE streaming
    /// terminated by `[DONE]`.
    pub async fn generate_openai(
        &self,
        req: &GenerateRequest,
        provider: &str,
        base_url: &str,
        api_key: &str,
        on_token: Option<&TokenFn>,
    ) -> Result<Option<String>, QuillError> {
        let streaming = on_token.is_some();

        let mut body = serde_json::json!({
            "model": req.model,
            "messages": [
                {"role": "system", "content": req.system_instruction},
                {"role": "user", "content": req.user_content()},
            ],
        });
        if let Some(t) = req.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if let Some(n) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(n);
        }
        if streaming {
            body["stream"] = serde_json::json!(true);
        }

        let response = self
            .client
            .post(base_url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let response = check_status(provider, response).await?;

        match on_token {
            None => {
                let bytes = read_capped(provider, response).await?;
                let completion: ChatCompletion = serde_json::from_slice(&bytes)
                    .map_err(|e| QuillError::SchemaParse(format!("failed to parse response: {e}")))?;
                let text = completion
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| QuillError::Upstream {
                        provider: provider.to_string(),
                        message: "empty choices or null content".to_string(),
                        status: None,
                    })?;
                Ok(Some(text))
            }
            Some(on_token) => {
                let mut events = response.bytes_stream().eventsource();
                let mut delivered = 0usize;

                while let Some(event) = events.next().await {
                    let event = event.map_err(|e| QuillError::Upstream {
                        provider: provider.to_string(),
                        message: format!("stream error: {e}"),
                        status: None,
                    })?;

                    if event.data.trim() == "[DONE]" {
                        break;
                    }

                    // Tolerate non-JSON keepalive lines; fail only on
                    // well-formed chunks we cannot use.
                    let Ok(chunk) = serde_json::from_str::<ChatChunk>(&event.data) else {
                        continue;
                    };
                    let Some(fragment) =
                        chunk.choices.into_iter().next().and_then(|c| c.delta.content)
                    else {
                        continue;
                    };

                    delivered += fragment.len();
                    if delivered > MAX_RESPONSE_BYTES {
                        return Err(stream_too_large(provider));
                    }
                    on_token(&fragment);
                }

                Ok(None)
            }
        }
    }

    /// Anthropic messages API: different headers and SSE event format.
    pub async fn generate_anthropic(
        &self,
        req: &GenerateRequest,
        provider: &str,
        base_url: &str,
        api_key: &str,
        on_token: Option<&TokenFn>,
    ) -> Result<Option<String>, QuillError> {
        let streaming = on_token.is_some();

        let mut body = serde_json::json!({
            "model": req.model,
            "max_tokens": req.max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
            "system": req.system_instruction,
            "messages": [
                {"role": "user", "content": req.user_content()},
            ],
        });
        if let Some(t) = req.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if streaming {
            body["stream"] = serde_json::json!(true);
        }

        let response = self
            .client
            .post(base_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let response = check_status(provider, response).await?;

        match on_token {
            None => {
                let bytes = read_capped(provider, response).await?;
                let message: AnthropicMessage = serde_json::from_slice(&bytes)
                    .map_err(|e| QuillError::SchemaParse(format!("failed to parse response: {e}")))?;
                let text = message
                    .content
                    .into_iter()
                    .find_map(|b| b.text)
                    .ok_or_else(|| QuillError::Upstream {
                        provider: provider.to_string(),
                        message: "no text block in response".to_string(),
                        status: None,
                    })?;
                Ok(Some(text))
            }
            Some(on_token) => {
                let mut events = response.bytes_stream().eventsource();
                let mut delivered = 0usize;

                while let Some(event) = events.next().await {
                    let event = event.map_err(|e| QuillError::Upstream {
                        provider: provider.to_string(),
                        message: format!("stream error: {e}"),
                        status: None,
                    })?;

                    let Ok(parsed) = serde_json::from_str::<AnthropicEvent>(&event.data) else {
                        continue;
                    };

                    match parsed.kind.as_str() {
                        "content_block_delta" => {
                            let Some(fragment) = parsed.delta.and_then(|d| d.text) else {
                                continue;
                            };
                            delivered += fragment.len();
                            if delivered > MAX_RESPONSE_BYTES {
                                return Err(stream_too_large(provider));
                            }
                            on_token(&fragment);
                        }
                        "message_stop" => break,
                        "error" => {
                            return Err(QuillError::Upstream {
                                provider: provider.to_string(),
                                message: event.data.clone(),
                                status: None,
                            });
                        }
                        // ping, message_start, content_block_start, ...
                        _ => {}
                    }
                }

                Ok(None)
            }
        }
    }
}

/// Map non-success statuses to structured errors. Error bodies are capped to
/// MAX_RESPONSE_BYTES before inclusion in the message.
async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, QuillError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(QuillError::RateLimited {
            provider: provider.to_string(),
        });
    }

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(QuillError::AuthFailed {
            provider: provider.to_string(),
            message: format!("{status}"),
        });
    }

    if !status.is_success() {
        let error_bytes = response.bytes().await.unwrap_or_default();
        let truncated = &error_bytes[..error_bytes.len().min(MAX_RESPONSE_BYTES)];
        let text = String::from_utf8_lossy(truncated);
        return Err(QuillError::Upstream {
            provider: provider.to_string(),
            message: format!("{status}: {text}"),
            status: Some(status.as_u16()),
        });
    }

    Ok(response)
}

/// Read a full response body, enforcing the size limit before parsing.
async fn read_capped(provider: &str, response: reqwest::Response) -> Result<Vec<u8>, QuillError> {
    let bytes = response.bytes().await.map_err(|e| QuillError::Upstream {
        provider: provider.to_string(),
        message: format!("failed to read response body: {e}"),
        status: None,
    })?;

    if bytes.len() > MAX_RESPONSE_BYTES {
        return Err(QuillError::Upstream {
            provider: provider.to_string(),
            message: format!(
                "response too large: {} bytes (max {})",
                bytes.len(),
                MAX_RESPONSE_BYTES
            ),
            status: None,
        });
    }

    Ok(bytes.to_vec())
}

fn stream_too_large(provider: &str) -> QuillError {
    QuillError::Upstream {
        provider: provider.to_string(),
        message: format!("streamed response exceeded {MAX_RESPONSE_BYTES} bytes"),
        status: None,
    }
}

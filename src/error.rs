use thiserror::Error;

use crate::host::HostError;

#[derive(Debug, Error)]
pub enum QuillError {
    /// A second `start()` arrived while a session was active. Returned to
    /// the programmatic caller, never shown as a notification.
    #[error("streaming already active")]
    StreamBusy,

    #[error("model not found: {model}")]
    ModelNotFound {
        model: String,
        suggestions: Vec<String>,
    },

    #[error("rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("auth failed for {provider}: {message}")]
    AuthFailed { provider: String, message: String },

    #[error("upstream error from {provider}: {message}")]
    Upstream {
        provider: String,
        message: String,
        status: Option<u16>,
    },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("response parse error: {0}")]
    SchemaParse(String),

    /// A completion sink raised an error. Unlike token sinks this is not
    /// best-effort: the session terminates as Failed.
    #[error("completion sink failed: {0}")]
    Sink(String),

    #[error("host error: {0}")]
    Host(#[from] HostError),

    #[error("{0}")]
    Other(String),
}

/// Failure origin, derived from error text. Drives user-facing guidance
/// only — never control flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    Connectivity,
    Credentials,
    RateLimit,
    Timeout,
    Other,
}

impl QuillError {
    /// Extract provider name from structured error variants.
    /// Returns None for variants that don't carry provider context.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::RateLimited { provider } => Some(provider),
            Self::AuthFailed { provider, .. } => Some(provider),
            Self::Upstream { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Classify the failure by matching known substrings in the error text.
    /// Structured variants short-circuit; everything else falls back to the
    /// rendered message.
    pub fn fault(&self) -> Fault {
        match self {
            Self::RateLimited { .. } => Fault::RateLimit,
            Self::AuthFailed { .. } => Fault::Credentials,
            Self::Request(e) if e.is_timeout() => Fault::Timeout,
            Self::Request(e) if e.is_connect() => Fault::Connectivity,
            _ => classify_text(&self.to_string()),
        }
    }

    /// Produce a user-facing message with guidance matched to the fault.
    /// Safe to display: does not leak URLs or key material.
    pub fn user_message(&self) -> String {
        if let Self::ModelNotFound { model, suggestions } = self {
            return if suggestions.is_empty() {
                format!("model not found: {model}")
            } else {
                format!(
                    "model not found: {model}. Did you mean: {}?",
                    suggestions.join(", ")
                )
            };
        }

        let origin = match self.provider() {
            Some(p) => format!("{p} request failed"),
            None => "request failed".to_string(),
        };

        match self.fault() {
            Fault::Connectivity => {
                format!("{origin}: network error — check your connection and the endpoint URL")
            }
            Fault::Credentials => {
                format!("{origin}: authentication error — check your API key")
            }
            Fault::RateLimit => {
                format!("{origin}: rate limited — wait a moment and try again")
            }
            Fault::Timeout => {
                format!("{origin}: timed out — try again or switch to a faster model")
            }
            Fault::Other => format!("{origin}: {self}"),
        }
    }
}

fn classify_text(text: &str) -> Fault {
    let t = text.to_lowercase();
    if t.contains("network") || t.contains("fetch") || t.contains("connection") {
        Fault::Connectivity
    } else if t.contains("api key") || t.contains("auth") || t.contains("unauthorized") {
        Fault::Credentials
    } else if t.contains("rate limit") || t.contains("quota") || t.contains("429") {
        Fault::RateLimit
    } else if t.contains("timeout") || t.contains("timed out") {
        Fault::Timeout
    } else {
        Fault::Other
    }
}

//! Inference client error types and classification.

use thiserror::Error;

pub type InferenceResult<T> = Result<T, InferenceError>;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Gemini API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Response blocked: {0}")]
    Blocked(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How the retry policy should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Remote quota or rate limit; worth waiting out.
    RateLimited,
    /// Server-side or network hiccup.
    Transient,
    /// Retrying will not help.
    Fatal,
}

impl InferenceError {
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    /// Classify this error for retry decisions.
    ///
    /// API errors are judged on status and body only, never on the rendered
    /// message, so a resource name that happens to contain `429` stays fatal.
    pub fn classify(&self) -> ErrorClass {
        match self {
            InferenceError::Api { status: 429, .. } => ErrorClass::RateLimited,
            InferenceError::Api { body, .. } if is_rate_limit_signal(body) => ErrorClass::RateLimited,
            InferenceError::Api { status, .. } if *status >= 500 => ErrorClass::Transient,
            InferenceError::Api { .. } => ErrorClass::Fatal,
            InferenceError::Network(e) if e.is_timeout() || e.is_connect() => ErrorClass::Transient,
            other if is_rate_limit_signal(&other.to_string()) => ErrorClass::RateLimited,
            _ => ErrorClass::Fatal,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.classify() == ErrorClass::RateLimited
    }
}

/// Whether error text carries a rate-limit or quota signal.
///
/// `429` only counts as a standalone token, not inside an identifier.
pub fn is_rate_limit_signal(text: &str) -> bool {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| token == "429")
        || text.contains("RATE_LIMIT")
        || text.contains("RESOURCE_EXHAUSTED")
        || text.to_lowercase().contains("quota")
}

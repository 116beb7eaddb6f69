//! Provider errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LLMError>;

/// Why a provider call produced no usable completion
#[derive(Error, Debug)]
pub enum LLMError {
    #[error("model request failed: {0}")]
    RequestFailed(String),

    #[error("provider rejected the API key")]
    AuthenticationFailed,

    #[error("provider rate limit hit: {0}")]
    RateLimitExceeded(String),

    /// The provider refused the request body (HTTP 400)
    #[error("provider rejected the request: {0}")]
    InvalidRequest(String),

    #[error("unknown model '{0}'")]
    ModelNotFound(String),

    #[error("JSON encoding failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "openai")]
    #[error("transport error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// A response arrived but could not be interpreted
    #[error("unexpected provider response: {0}")]
    UnexpectedResponse(String),

    #[error("provider configuration: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// Map a non-success HTTP status and its body to an error
    pub fn from_status(status: u16, model: &str, body: String) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed,
            429 => Self::RateLimitExceeded(body),
            400 | 422 => Self::InvalidRequest(body),
            404 => Self::ModelNotFound(model.to_string()),
            _ => Self::RequestFailed(format!("HTTP {status}: {body}")),
        }
    }
}

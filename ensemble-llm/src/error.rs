//! Inference and parsing error types.

use thiserror::Error;

/// Errors that can occur while calling the remote model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InferenceError {
    /// Connection refused, reset, or a 5xx from the service.
    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    /// The service asked us to slow down (HTTP 429).
    #[error("rate limited (retryable: {retryable}): {message}")]
    RateLimited {
        /// `false` when the limit cannot clear on its own, e.g. an exhausted quota.
        retryable: bool,
        /// Service-supplied detail.
        message: String,
    },

    /// A single attempt exceeded its deadline.
    #[error("inference attempt timed out after {0}ms")]
    Timeout(u64),

    /// The service rejected the request itself (4xx other than 429).
    #[error("inference request rejected with HTTP {status}: {message}")]
    NonRetryableClient {
        /// HTTP status code.
        status: u16,
        /// Service-supplied detail.
        message: String,
    },

    /// The reply could not be decoded.
    #[error("malformed inference response: {0}")]
    MalformedResponse(String),

    /// No inference provider is configured.
    #[error("inference is disabled")]
    Disabled,

    /// Every allowed attempt failed.
    #[error("inference unavailable after {attempts} attempts: {last_error}")]
    Unavailable {
        /// Attempts made, including the first.
        attempts: u32,
        /// Display text of the final failure.
        last_error: String,
    },

    /// Invalid client configuration.
    #[error("inference configuration error: {0}")]
    Config(String),
}

impl InferenceError {
    /// Whether the retry loop should try again after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransientNetwork(_) | Self::Timeout(_) => true,
            Self::RateLimited { retryable, .. } => *retryable,
            Self::NonRetryableClient { .. }
            | Self::MalformedResponse(_)
            | Self::Disabled
            | Self::Unavailable { .. }
            | Self::Config(_) => false,
        }
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InferenceError::Timeout(0)
        } else if err.is_builder() {
            InferenceError::Config(err.to_string())
        } else if err.is_decode() {
            InferenceError::MalformedResponse(err.to_string())
        } else {
            InferenceError::TransientNetwork(err.to_string())
        }
    }
}

/// A model reply that names no legal action.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Unparseable {
    /// The reply was empty or whitespace.
    #[error("empty response")]
    Empty,

    /// There were no actions to choose from.
    #[error("no actions available to match against")]
    NoActions,

    /// Nothing in the reply matched the action vocabulary.
    #[error("no legal action found in response: {excerpt:?}")]
    NoMatch {
        /// Start of the reply, for logs.
        excerpt: String,
    },
}

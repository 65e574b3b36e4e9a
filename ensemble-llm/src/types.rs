//! Core types for inference requests, credentials and usage accounting.

use std::fmt;

use ensemble_core::config::InferenceConfig;
use serde::Serialize;

/// Which remote service the HTTP backend talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// Ollama `/api/generate`.
    Ollama {
        /// Service root, e.g. `http://localhost:11434`.
        base_url: String,
    },
    /// Any OpenAI-compatible `/v1/chat/completions` endpoint.
    OpenAiCompatible {
        /// Service root, e.g. `https://api.openai.com`.
        base_url: String,
    },
    /// No provider; every call fails fast and routes to fallback.
    None,
}

impl Provider {
    /// Resolve the provider named in configuration.
    ///
    /// Unknown names resolve to [`Provider::None`].
    #[must_use]
    pub fn from_config(config: &InferenceConfig) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        match config.provider.to_ascii_lowercase().as_str() {
            "ollama" => Self::Ollama { base_url },
            "openai" | "openai_compatible" | "openai-compatible" => Self::OpenAiCompatible { base_url },
            _ => Self::None,
        }
    }
}

/// Caller-supplied credential.
///
/// `identity` partitions the cache and usage counters; `secret` is sent to
/// the service. Neither is ever logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    identity: String,
    secret: String,
}

impl Credential {
    /// Create a credential.
    #[must_use]
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    /// Credential for services that need no key (local Ollama).
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new("anonymous", "")
    }

    /// Stable identity used for partitioning.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Secret sent to the service.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A single completion request handed to a backend.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    /// Full prompt text.
    pub prompt: String,
    /// Model name.
    pub model: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Per-credential call accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    /// `infer` calls.
    pub calls: u64,
    /// Calls answered from cache.
    pub cache_hits: u64,
    /// Backend attempts, retries included.
    pub attempts: u64,
    /// Calls that ended in an error.
    pub failures: u64,
}

//! Inference Client: cached, retried, concurrency-bounded model calls.
//!
//! ```text
//! infer(prompt, credential)
//!   ├─ cache hit ──────────────────────────────▶ Ok(reply)
//!   └─ miss ─▶ [semaphore] ─▶ backend.complete ─┬─ Ok ─▶ cache ─▶ Ok(reply)
//!                  ▲                             └─ Err
//!                  └────── backoff ◀── retryable?    └─ no ─▶ Err
//! ```
//!
//! One client is built by the caller and shared (`Arc`) by every pipeline,
//! so the HTTP connection pool, cache and concurrency limit are shared
//! across agents and turns.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ensemble_core::config::InferenceConfig;
use lru::LruCache;
use parking_lot::Mutex;
use reqwest::Client;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::cache::{self, CacheConfig, InferenceCache};
use crate::error::InferenceError;
use crate::retry::RetryPolicy;
use crate::types::{Credential, InferenceRequest, Provider, UsageStats};

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Something that turns a prompt into a completion, one attempt at a time.
///
/// Implementations must not retry; [`InferenceClient`] owns retry policy.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Make one attempt.
    async fn complete(&self, request: &InferenceRequest, credential: &Credential) -> Result<String, InferenceError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Backend used when no provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBackend;

#[async_trait]
impl InferenceBackend for DisabledBackend {
    async fn complete(&self, _request: &InferenceRequest, _credential: &Credential) -> Result<String, InferenceError> {
        Err(InferenceError::Disabled)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Ollama or OpenAI-compatible service over a pooled HTTP client.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    provider: Provider,
    http: Client,
}

impl HttpBackend {
    /// Build a backend with a bounded idle connection pool.
    ///
    /// # Errors
    /// `InferenceError::Config` if the provider is `None` or the HTTP client
    /// cannot be built.
    pub fn new(provider: Provider, pool_max_idle_per_host: usize) -> Result<Self, InferenceError> {
        if provider == Provider::None {
            return Err(InferenceError::Config("HTTP backend needs a provider".into()));
        }
        let http = Client::builder()
            .pool_max_idle_per_host(pool_max_idle_per_host)
            .build()
            .map_err(|e| InferenceError::Config(e.to_string()))?;
        Ok(Self { provider, http })
    }

    async fn complete_ollama(&self, base_url: &str, request: &InferenceRequest) -> Result<String, InferenceError> {
        let body = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            }
        });

        let resp = self.http.post(format!("{base_url}/api/generate")).json(&body).send().await?;
        let json = read_json(resp).await?;
        json["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| InferenceError::MalformedResponse("missing `response` field".into()))
    }

    async fn complete_openai(
        &self,
        base_url: &str,
        request: &InferenceRequest,
        credential: &Credential,
    ) -> Result<String, InferenceError> {
        let body = json!({
            "model": request.model,
            "messages": [
                { "role": "user", "content": request.prompt },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let mut builder = self.http.post(format!("{base_url}/v1/chat/completions")).json(&body);
        if !credential.secret().is_empty() {
            builder = builder.bearer_auth(credential.secret());
        }
        let json = read_json(builder.send().await?).await?;
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| InferenceError::MalformedResponse("missing `choices[0].message.content`".into()))
    }
}

#[async_trait]
impl InferenceBackend for HttpBackend {
    async fn complete(&self, request: &InferenceRequest, credential: &Credential) -> Result<String, InferenceError> {
        match &self.provider {
            Provider::Ollama { base_url } => self.complete_ollama(base_url, request).await,
            Provider::OpenAiCompatible { base_url } => self.complete_openai(base_url, request, credential).await,
            Provider::None => Err(InferenceError::Disabled),
        }
    }

    fn name(&self) -> &'static str {
        match self.provider {
            Provider::Ollama { .. } => "ollama",
            Provider::OpenAiCompatible { .. } => "openai",
            Provider::None => "none",
        }
    }
}

async fn read_json(resp: reqwest::Response) -> Result<serde_json::Value, InferenceError> {
    let status = resp.status();
    if status.is_success() {
        return resp
            .json()
            .await
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()));
    }
    let body = resp.text().await.unwrap_or_default();
    Err(classify_status(status.as_u16(), &body))
}

/// Map a non-success HTTP status to an error class.
///
/// 429 is retryable unless the body reports an exhausted quota; 5xx is
/// transient; every other status is a non-retryable client error.
#[must_use]
pub fn classify_status(status: u16, body: &str) -> InferenceError {
    let message: String = body.chars().take(200).collect();
    match status {
        429 => InferenceError::RateLimited {
            retryable: !body.contains("insufficient_quota"),
            message,
        },
        500..=599 => InferenceError::TransientNetwork(format!("HTTP {status}: {message}")),
        _ => InferenceError::NonRetryableClient { status, message },
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Knobs for an [`InferenceClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Model name sent with every request.
    pub model: String,
    /// Generation limit.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Retry schedule.
    pub retry: RetryPolicy,
    /// Cache sizing.
    pub cache: CacheConfig,
    /// Backend calls allowed in flight at once.
    pub max_concurrent: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from(&InferenceConfig::default())
    }
}

impl From<&InferenceConfig> for ClientOptions {
    fn from(config: &InferenceConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            retry: RetryPolicy::from(config),
            cache: CacheConfig::from(config),
            max_concurrent: config.max_concurrent_requests.max(1),
        }
    }
}

/// Shared entry point for all model calls.
pub struct InferenceClient {
    backend: Arc<dyn InferenceBackend>,
    options: ClientOptions,
    cache: InferenceCache,
    permits: Semaphore,
    usage: Mutex<LruCache<String, UsageStats>>,
}

impl std::fmt::Debug for InferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceClient")
            .field("backend", &self.backend.name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl InferenceClient {
    /// Create a client over any backend.
    #[must_use]
    pub fn new(backend: Arc<dyn InferenceBackend>, options: ClientOptions) -> Self {
        Self {
            backend,
            cache: InferenceCache::new(&options.cache),
            permits: Semaphore::new(options.max_concurrent.max(1)),
            usage: Mutex::new(LruCache::new(usage_slots(&options.cache))),
            options,
        }
    }

    /// Create a client from configuration. An unknown or `none` provider
    /// yields a client whose calls always fail with `Disabled`.
    ///
    /// # Errors
    /// `InferenceError::Config` if the HTTP client cannot be built.
    pub fn from_config(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let backend: Arc<dyn InferenceBackend> = match Provider::from_config(config) {
            Provider::None => Arc::new(DisabledBackend),
            provider => Arc::new(HttpBackend::new(provider, config.pool_max_idle_per_host)?),
        };
        Ok(Self::new(backend, ClientOptions::from(config)))
    }

    /// Client with no backend; every call fails fast.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledBackend), ClientOptions::default())
    }

    /// Complete `prompt`, using the cache and retrying transient failures.
    ///
    /// `timeout` bounds each attempt; an expired attempt counts as a
    /// retryable [`InferenceError::Timeout`].
    ///
    /// # Errors
    /// A non-retryable error as soon as one occurs, or
    /// [`InferenceError::Unavailable`] after `1 + max_retries` failed attempts.
    pub async fn infer(&self, prompt: &str, credential: &Credential, timeout: Duration) -> Result<String, InferenceError> {
        let partition = cache::partition_key(credential.identity());
        self.bump(&partition, |u| u.calls += 1);

        if let Some(hit) = self.cache.get(credential.identity(), prompt) {
            self.bump(&partition, |u| u.cache_hits += 1);
            debug!(partition = %cache::short(&partition), "inference cache hit");
            return Ok(hit);
        }

        let request = InferenceRequest {
            prompt: prompt.to_string(),
            model: self.options.model.clone(),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        };

        let result = self
            .options
            .retry
            .run(|attempt| self.attempt(&request, credential, &partition, timeout, attempt))
            .await;

        match &result {
            Ok(reply) => self.cache.insert(credential.identity(), prompt, reply.as_str()),
            Err(err) => {
                self.bump(&partition, |u| u.failures += 1);
                warn!(partition = %cache::short(&partition), error = %err, "inference failed");
            }
        }
        result
    }

    async fn attempt(
        &self,
        request: &InferenceRequest,
        credential: &Credential,
        partition: &str,
        timeout: Duration,
        attempt: u32,
    ) -> Result<String, InferenceError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| InferenceError::Config("inference semaphore closed".into()))?;
        self.bump(partition, |u| u.attempts += 1);
        debug!(
            backend = self.backend.name(),
            partition = %cache::short(partition),
            attempt = attempt + 1,
            "inference attempt"
        );

        match tokio::time::timeout(timeout, self.backend.complete(request, credential)).await {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))),
        }
    }

    fn bump(&self, partition: &str, f: impl FnOnce(&mut UsageStats)) {
        let mut usage = self.usage.lock();
        if let Some(stats) = usage.get_mut(partition) {
            f(stats);
            return;
        }
        let mut stats = UsageStats::default();
        f(&mut stats);
        if let Some((evicted, _)) = usage.push(partition.to_string(), stats) {
            debug!(partition = %cache::short(&evicted), "usage counters evicted");
        }
    }

    /// Call accounting for one credential.
    ///
    /// Counters are kept for as many credentials as the cache keeps
    /// partitions; the least recently active credential is forgotten first.
    #[must_use]
    pub fn usage(&self, credential: &Credential) -> UsageStats {
        self.usage
            .lock()
            .peek(&cache::partition_key(credential.identity()))
            .copied()
            .unwrap_or_default()
    }

    /// The reply cache.
    #[must_use]
    pub fn cache(&self) -> &InferenceCache {
        &self.cache
    }

    /// Options in effect.
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }
}

fn usage_slots(cache: &CacheConfig) -> NonZeroUsize {
    NonZeroUsize::new(cache.max_partitions)
        .or_else(|| NonZeroUsize::new(CacheConfig::default().max_partitions))
        .unwrap_or(NonZeroUsize::MIN)
}

//! # ensemble-llm: Inference Layer for ENSEMBLE
//!
//! Everything between an agent's situation and its chosen action that
//! involves a language model:
//!   - **Prompt building**: deterministic, byte-stable decision prompts
//!   - **Inference client**: Ollama or OpenAI-compatible backends behind a
//!     shared, credential-partitioned cache, bounded concurrency and
//!     exponential-backoff retry
//!   - **Response parsing**: strict matching against the turn's legal actions
//!
//! Every failure here is recoverable: callers route errors to the
//! rule-based fallback in `ensemble-core`.
//!
//! # Architecture
//!
//! ```text
//! PromptBuilder ──▶ InferenceClient ──▶ ResponseParser ──▶ CharacterAction
//!                     │  cache (LRU per credential)
//!                     │  semaphore (max in flight)
//!                     │  retry (backoff + jitter)
//!                     ▼
//!                   InferenceBackend: HttpBackend | DisabledBackend | test doubles
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod parse;
pub mod prompt;
pub mod retry;
pub mod types;

pub use cache::{CacheConfig, InferenceCache};
pub use client::{ClientOptions, DisabledBackend, HttpBackend, InferenceBackend, InferenceClient};
pub use error::{InferenceError, Unparseable};
pub use parse::ResponseParser;
pub use prompt::PromptBuilder;
pub use retry::RetryPolicy;
pub use types::{Credential, InferenceRequest, Provider, UsageStats};

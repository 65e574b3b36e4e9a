//! Configuration for the ENSEMBLE simulation core.
//!
//! Maps directly to `ensemble.toml`. Every field has a default, so an empty
//! document is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::{EnsembleError, Result};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Per-agent memory limits and decay.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Memory retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Remote inference settings.
    #[serde(default)]
    pub inference: InferenceConfig,
    /// Turn orchestration settings.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl EnsembleConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `EnsembleError::Config` if the TOML is invalid or a value is out of range.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| EnsembleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    /// Returns `EnsembleError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.memory.validate()?;
        if self.inference.max_concurrent_requests == 0 {
            return Err(EnsembleError::Config("inference.max_concurrent_requests must be > 0".into()));
        }
        if self.orchestrator.max_concurrent_agents == 0 {
            return Err(EnsembleError::Config("orchestrator.max_concurrent_agents must be > 0".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Per-agent memory capacity and decay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Working-memory cap (7 ± 2).
    #[serde(default = "default_7_usize")]
    pub working_capacity: usize,
    /// Episodic-memory cap.
    #[serde(default = "default_200")]
    pub episodic_capacity: usize,
    /// Semantic-memory cap.
    #[serde(default = "default_50")]
    pub semantic_capacity: usize,
    /// Emotional-memory cap.
    #[serde(default = "default_50")]
    pub emotional_capacity: usize,
    /// Items whose decay falls below this are purged on the next tick.
    #[serde(default = "default_min_decay")]
    pub min_decay: f32,
    /// Items whose relevance × decay falls below this are purged on the next tick.
    #[serde(default = "default_eviction_threshold")]
    pub eviction_threshold: f32,
    /// A working item evicted for capacity after at least this many recalls
    /// is promoted to episodic memory instead of being dropped. 0 disables.
    #[serde(default = "default_2_u32")]
    pub promote_after_accesses: u32,
    /// Per-kind multiplicative decay factors.
    #[serde(default)]
    pub decay: DecayConfig,
}

impl MemoryConfig {
    fn validate(&self) -> Result<()> {
        if !(5..=9).contains(&self.working_capacity) {
            return Err(EnsembleError::Config(format!(
                "memory.working_capacity must be within 7 ± 2, got {}",
                self.working_capacity
            )));
        }
        self.decay.validate()
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            working_capacity: 7,
            episodic_capacity: 200,
            semantic_capacity: 50,
            emotional_capacity: 50,
            min_decay: 0.05,
            eviction_threshold: 0.01,
            promote_after_accesses: 2,
            decay: DecayConfig::default(),
        }
    }
}

/// Per-turn decay factors. Each must be in (0, 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Working memory fades fastest.
    #[serde(default = "default_decay_working")]
    pub working: f32,
    /// Episodic memory.
    #[serde(default = "default_decay_episodic")]
    pub episodic: f32,
    /// Semantic memory is nearly permanent.
    #[serde(default = "default_decay_semantic")]
    pub semantic: f32,
    /// Emotional memory.
    #[serde(default = "default_decay_emotional")]
    pub emotional: f32,
}

impl DecayConfig {
    fn validate(&self) -> Result<()> {
        for (name, factor) in [
            ("working", self.working),
            ("episodic", self.episodic),
            ("semantic", self.semantic),
            ("emotional", self.emotional),
        ] {
            if !(factor > 0.0 && factor < 1.0) {
                return Err(EnsembleError::Config(format!(
                    "memory.decay.{name} must be in (0, 1), got {factor}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            working: 0.85,
            episodic: 0.95,
            semantic: 0.99,
            emotional: 0.97,
        }
    }
}

/// Memory retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of memories fed into each decision prompt.
    #[serde(default = "default_5_usize")]
    pub top_k: usize,
    /// Ranking weights.
    #[serde(default)]
    pub weights: RetrievalWeights,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            weights: RetrievalWeights::default(),
        }
    }
}

/// Retrieval scoring weights: should sum to ~1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalWeights {
    /// Weight for term overlap with the world context.
    #[serde(default = "default_0_5")]
    pub context: f32,
    /// Weight for |emotional weight|.
    #[serde(default = "default_0_3")]
    pub emotional: f32,
    /// Weight for the item's stored relevance.
    #[serde(default = "default_0_2")]
    pub relevance: f32,
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self {
            context: 0.5,
            emotional: 0.3,
            relevance: 0.2,
        }
    }
}

/// Remote inference configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Provider: "ollama", "openai", "none".
    #[serde(default = "default_ollama")]
    pub provider: String,
    /// Base URL for the model API.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Hard timeout for a single attempt, in milliseconds.
    #[serde(default = "default_5000")]
    pub request_timeout_ms: u64,
    /// Retries after the first attempt.
    #[serde(default = "default_3_u32")]
    pub max_retries: u32,
    /// First backoff delay in milliseconds.
    #[serde(default = "default_100")]
    pub base_backoff_ms: u64,
    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_2000")]
    pub max_backoff_ms: u64,
    /// Backoff growth factor.
    #[serde(default = "default_2_0")]
    pub backoff_multiplier: f64,
    /// Add ±10% jitter to backoff delays.
    #[serde(default = "default_true")]
    pub jitter: bool,
    /// Cached responses per credential partition.
    #[serde(default = "default_512")]
    pub cache_capacity: usize,
    /// Cache validity window in seconds. 0 = entries never expire.
    #[serde(default = "default_600")]
    pub cache_ttl_secs: u64,
    /// Number of credential partitions kept in the cache.
    #[serde(default = "default_16")]
    pub cache_partitions: usize,
    /// Idle connections kept per host in the shared pool.
    #[serde(default = "default_8")]
    pub pool_max_idle_per_host: usize,
    /// Maximum concurrent in-flight requests.
    #[serde(default = "default_4")]
    pub max_concurrent_requests: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: default_ollama(),
            base_url: default_ollama_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_ms: 5000,
            max_retries: 3,
            base_backoff_ms: 100,
            max_backoff_ms: 2000,
            backoff_multiplier: 2.0,
            jitter: true,
            cache_capacity: 512,
            cache_ttl_secs: 600,
            cache_partitions: 16,
            pool_max_idle_per_host: 8,
            max_concurrent_requests: 4,
        }
    }
}

/// Turn orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Decision pipelines allowed to run at once within a turn.
    #[serde(default = "default_8")]
    pub max_concurrent_agents: usize,
    /// Per-agent decision deadline in milliseconds. 0 = no deadline.
    #[serde(default)]
    pub agent_deadline_ms: u64,
    /// Turn results kept in history. 0 = unbounded.
    #[serde(default)]
    pub max_history: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_agents: 8,
            agent_deadline_ms: 0,
            max_history: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_ollama() -> String { "ollama".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_model() -> String { "qwen2.5:1.5b".to_string() }
fn default_max_tokens() -> u32 { 120 }
fn default_temperature() -> f32 { 0.4 }
fn default_min_decay() -> f32 { 0.05 }
fn default_eviction_threshold() -> f32 { 0.01 }
fn default_decay_working() -> f32 { 0.85 }
fn default_decay_episodic() -> f32 { 0.95 }
fn default_decay_semantic() -> f32 { 0.99 }
fn default_decay_emotional() -> f32 { 0.97 }
fn default_0_2() -> f32 { 0.2 }
fn default_0_3() -> f32 { 0.3 }
fn default_0_5() -> f32 { 0.5 }
fn default_2_0() -> f64 { 2.0 }
fn default_2_u32() -> u32 { 2 }
fn default_3_u32() -> u32 { 3 }
fn default_4() -> usize { 4 }
fn default_5_usize() -> usize { 5 }
fn default_7_usize() -> usize { 7 }
fn default_8() -> usize { 8 }
fn default_16() -> usize { 16 }
fn default_50() -> usize { 50 }
fn default_100() -> u64 { 100 }
fn default_200() -> usize { 200 }
fn default_512() -> usize { 512 }
fn default_600() -> u64 { 600 }
fn default_2000() -> u64 { 2000 }
fn default_5000() -> u64 { 5000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = EnsembleConfig::from_toml("").expect("empty config parses");
        assert_eq!(config.memory.working_capacity, 7);
        assert_eq!(config.inference.max_retries, 3);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.orchestrator.max_history, 0);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EnsembleConfig::from_toml(
            r#"
            [inference]
            provider = "openai"
            max_retries = 1

            [memory.decay]
            working = 0.5
            "#,
        )
        .expect("parses");
        assert_eq!(config.inference.provider, "openai");
        assert_eq!(config.inference.max_retries, 1);
        assert_eq!(config.inference.base_backoff_ms, 100);
        assert!((config.memory.decay.working - 0.5).abs() < f32::EPSILON);
        assert!((config.memory.decay.semantic - 0.99).abs() < f32::EPSILON);
    }

    #[test]
    fn working_capacity_outside_seven_plus_minus_two_is_rejected() {
        let err = EnsembleConfig::from_toml("[memory]\nworking_capacity = 12\n");
        assert!(matches!(err, Err(EnsembleError::Config(_))));
    }

    #[test]
    fn decay_factor_of_one_is_rejected() {
        let err = EnsembleConfig::from_toml("[memory.decay]\nepisodic = 1.0\n");
        assert!(matches!(err, Err(EnsembleError::Config(_))));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ensemble.toml");
        std::fs::write(&path, "[orchestrator]\nmax_concurrent_agents = 2\n").expect("write");

        let config = EnsembleConfig::from_file(&path).expect("load");
        assert_eq!(config.orchestrator.max_concurrent_agents, 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EnsembleConfig::from_file(std::path::Path::new("/nonexistent/ensemble.toml"));
        assert!(matches!(err, Err(EnsembleError::Io(_))));
    }
}

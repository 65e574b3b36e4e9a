//! Per-agent decision pipeline.
//!
//! ```text
//! Building ──▶ Inferring ──▶ Parsing ──▶ Validated ──▶ Done
//!                  │             │
//!                  └─────────────┴──▶ FallingBack ──▶ Done
//! ```
//!
//! Building cannot fail. Any inference error or unparseable reply routes to
//! the rule-based fallback, so `Done` always carries exactly one legal action.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ensemble_core::config::EnsembleConfig;
use ensemble_core::memory::MemoryQuery;
use ensemble_core::world::{ActionSet, WorldStateSnapshot};
use ensemble_core::{AgentState, CharacterAction, FallbackPolicy, MemoryStore};
use ensemble_llm::{Credential, InferenceClient, InferenceError, PromptBuilder, ResponseParser, Unparseable};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Produces one action for one agent on one turn.
///
/// The orchestrator only sees this seam; tests plug in scripted deciders.
/// An `Err` is reported as an `Internal` failure for that agent.
#[async_trait]
pub trait Decide: Send + Sync {
    /// Choose an action from `actions`.
    async fn decide(
        &self,
        agent: &AgentState,
        world: &WorldStateSnapshot,
        actions: &ActionSet,
    ) -> anyhow::Result<CharacterAction>;
}

/// Pipeline state visited while deciding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Retrieving memories and rendering the prompt.
    Building,
    /// Waiting on the inference client (cache or network).
    Inferring,
    /// Matching the reply against the legal actions.
    Parsing,
    /// The reply named a legal action.
    Validated,
    /// The rule-based policy is choosing instead.
    FallingBack,
    /// An action is available.
    Done,
}

/// Why the fallback policy was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The inference client gave up.
    Inference(InferenceError),
    /// The reply did not name a legal action.
    Unparseable(Unparseable),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inference(e) => write!(f, "inference failed: {e}"),
            Self::Unparseable(e) => write!(f, "unparseable reply: {e}"),
        }
    }
}

/// Outcome of one pipeline run, with its trace.
#[derive(Debug, Clone)]
pub struct Decision {
    /// The chosen action.
    pub action: CharacterAction,
    /// States visited, in order.
    pub stages: Vec<Stage>,
    /// Set when the action came from the fallback policy.
    pub fallback_reason: Option<FallbackReason>,
}

impl Decision {
    /// Whether the fallback policy produced the action.
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Pipeline tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Memories included in the prompt.
    pub memory_top_k: usize,
    /// Timeout for each inference attempt.
    pub inference_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            memory_top_k: 5,
            inference_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&EnsembleConfig> for PipelineConfig {
    fn from(config: &EnsembleConfig) -> Self {
        Self {
            memory_top_k: config.retrieval.top_k,
            inference_timeout: Duration::from_millis(config.inference.request_timeout_ms),
        }
    }
}

/// Memory retrieval, prompt, inference, parse, fallback.
#[derive(Debug)]
pub struct DecisionPipeline {
    client: Arc<InferenceClient>,
    memory: Arc<MemoryStore>,
    prompts: PromptBuilder,
    parser: ResponseParser,
    fallback: FallbackPolicy,
    credential: Credential,
    config: PipelineConfig,
}

impl DecisionPipeline {
    /// Pipeline with the default prompt, parser and fallback rules.
    #[must_use]
    pub fn new(client: Arc<InferenceClient>, memory: Arc<MemoryStore>, credential: Credential) -> Self {
        Self {
            client,
            memory,
            prompts: PromptBuilder::new(),
            parser: ResponseParser::new(),
            fallback: FallbackPolicy::default(),
            credential,
            config: PipelineConfig::default(),
        }
    }

    /// Override tuning.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the prompt builder.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    /// Override the fallback rules.
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Current tuning.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The shared inference client.
    #[must_use]
    pub fn client(&self) -> &Arc<InferenceClient> {
        &self.client
    }

    /// The memory store prompts are built from. The pipeline only reads it.
    #[must_use]
    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    /// Run the pipeline and keep the trace.
    pub async fn decide_traced(
        &self,
        agent: &AgentState,
        world: &WorldStateSnapshot,
        actions: &ActionSet,
    ) -> Decision {
        let mut stages = vec![Stage::Building];
        let query = MemoryQuery::from_snapshot(world);
        let memories = self.memory.query(&agent.id, &query, self.config.memory_top_k);
        let prompt = self.prompts.build(agent, world, &memories, actions);
        debug!(agent = %agent.id, memories = memories.len(), prompt_len = prompt.len(), "prompt built");

        stages.push(Stage::Inferring);
        let outcome = match self
            .client
            .infer(&prompt, &self.credential, self.config.inference_timeout)
            .await
        {
            Ok(reply) => {
                stages.push(Stage::Parsing);
                self.parser.parse(&reply, actions).map_err(FallbackReason::Unparseable)
            }
            Err(e) => Err(FallbackReason::Inference(e)),
        };

        let (action, fallback_reason) = match outcome {
            Ok(action) => {
                stages.push(Stage::Validated);
                (action, None)
            }
            Err(reason) => {
                stages.push(Stage::FallingBack);
                warn!(agent = %agent.id, %reason, "falling back to rule-based decision");
                (self.fallback.decide(agent, world, actions), Some(reason))
            }
        };
        stages.push(Stage::Done);

        debug!(agent = %agent.id, action = action.action_type(), fallback = fallback_reason.is_some(), "decision done");

        Decision {
            action,
            stages,
            fallback_reason,
        }
    }
}

#[async_trait]
impl Decide for DecisionPipeline {
    async fn decide(
        &self,
        agent: &AgentState,
        world: &WorldStateSnapshot,
        actions: &ActionSet,
    ) -> anyhow::Result<CharacterAction> {
        Ok(self.decide_traced(agent, world, actions).await.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_core::action::ActionSource;
    use ensemble_core::memory::{MemoryItem, MemoryKind};
    use ensemble_core::world::{ActionSpec, ThreatLevel};
    use ensemble_llm::{ClientOptions, InferenceBackend, InferenceRequest, RetryPolicy};

    struct Reply(Result<String, InferenceError>);

    #[async_trait]
    impl InferenceBackend for Reply {
        async fn complete(&self, _: &InferenceRequest, _: &Credential) -> Result<String, InferenceError> {
            self.0.clone()
        }

        fn name(&self) -> &'static str {
            "reply"
        }
    }

    fn pipeline(reply: Result<&str, InferenceError>) -> DecisionPipeline {
        let options = ClientOptions {
            retry: RetryPolicy::none(),
            ..ClientOptions::default()
        };
        let client = InferenceClient::new(Arc::new(Reply(reply.map(str::to_string))), options);
        DecisionPipeline::new(Arc::new(client), Arc::new(MemoryStore::default()), Credential::new("tenant", "key"))
    }

    fn actions() -> ActionSet {
        ActionSet::new()
            .with(ActionSpec::new("wait", "hold position"))
            .with(ActionSpec::new("investigate", "gather more data"))
    }

    #[tokio::test]
    async fn legal_reply_is_validated() {
        let agent = AgentState::new("Scout");
        let world = WorldStateSnapshot::new(1, "quiet");
        let decision = pipeline(Ok("2) investigate")).decide_traced(&agent, &world, &actions()).await;

        assert_eq!(decision.action.action_type(), "investigate");
        assert_eq!(decision.action.produced_by(), ActionSource::Inference);
        assert_eq!(
            decision.stages,
            vec![Stage::Building, Stage::Inferring, Stage::Parsing, Stage::Validated, Stage::Done]
        );
        assert!(!decision.used_fallback());
    }

    #[tokio::test]
    async fn unparseable_reply_falls_back() {
        let agent = AgentState::new("Scout");
        let world = WorldStateSnapshot::new(1, "quiet");
        let decision = pipeline(Ok("I would like to dance")).decide_traced(&agent, &world, &actions()).await;

        assert!(decision.action.is_fallback());
        assert!(matches!(decision.fallback_reason, Some(FallbackReason::Unparseable(_))));
        assert_eq!(decision.stages[3], Stage::FallingBack);
        assert_eq!(decision.stages.last(), Some(&Stage::Done));
    }

    #[tokio::test]
    async fn inference_error_skips_parsing() {
        let agent = AgentState::new("Guard");
        let world = WorldStateSnapshot::new(1, "raid").with_threat(ThreatLevel::High);
        let decision = pipeline(Err(InferenceError::Disabled)).decide_traced(&agent, &world, &actions()).await;

        assert!(!decision.stages.contains(&Stage::Parsing));
        assert_eq!(decision.fallback_reason, Some(FallbackReason::Inference(InferenceError::Disabled)));
        assert!(actions().contains(decision.action.action_type()));
    }

    #[tokio::test]
    async fn caller_memories_are_read_not_written() {
        let agent = AgentState::new("Scout");
        let world = WorldStateSnapshot::new(4, "quiet");
        let pipeline = pipeline(Err(InferenceError::Disabled));
        for i in 0..7 {
            let item = MemoryItem::new(agent.id, MemoryKind::Working, format!("note {i}")).with_relevance(0.2);
            pipeline.memory().record(agent.id, item);
        }

        for _ in 0..3 {
            pipeline.decide_traced(&agent, &world, &actions()).await;
        }

        let items = pipeline.memory().items(&agent.id);
        assert_eq!(items.len(), 7);
        assert!(items.iter().all(|m| m.content.starts_with("note ")));
    }

    #[test]
    fn config_follows_sections() {
        let mut config = EnsembleConfig::default();
        config.retrieval.top_k = 3;
        config.inference.request_timeout_ms = 250;
        let pipeline = PipelineConfig::from(&config);
        assert_eq!(pipeline.memory_top_k, 3);
        assert_eq!(pipeline.inference_timeout, Duration::from_millis(250));
    }
}

//! Turn orchestration.
//!
//! One call to [`TurnOrchestrator::run_turn`] is one turn:
//!
//! ```text
//! snapshot ──▶ spawn one task per agent (semaphore-bounded)
//!          ──▶ join all, classifying Err / panic / deadline as failures
//!          ──▶ apply actions in registration order (ActionApplier)
//!          ──▶ memory decay tick
//!          ──▶ TurnResult appended to history
//! ```
//!
//! `run_turn` never returns an error: every per-agent problem ends up in
//! `TurnResult::failures`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use ensemble_core::config::{EnsembleConfig, OrchestratorConfig};
use ensemble_core::{AgentId, AgentState, CharacterAction, EnsembleError, MemoryStore, WorldStateSnapshot};
use ensemble_llm::{Credential, InferenceClient, InferenceError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::pipeline::{Decide, DecisionPipeline, PipelineConfig};

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Applies decided actions to the host world, in registration order.
///
/// Returning an error moves that agent into the turn's failures with
/// [`FailureReason::ApplyRejected`].
pub trait ActionApplier: Send {
    /// Apply one action.
    fn apply(&mut self, agent: &AgentState, action: &CharacterAction) -> anyhow::Result<()>;
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopApplier;

impl ActionApplier for NoopApplier {
    fn apply(&mut self, _agent: &AgentState, _action: &CharacterAction) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<F> ActionApplier for F
where
    F: FnMut(&AgentState, &CharacterAction) -> anyhow::Result<()> + Send,
{
    fn apply(&mut self, agent: &AgentState, action: &CharacterAction) -> anyhow::Result<()> {
        self(agent, action)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Why an agent produced no action this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The decider returned an error.
    Internal,
    /// The decision task panicked.
    Panicked,
    /// The per-agent deadline passed.
    TimedOut,
    /// The action applier refused the action.
    ApplyRejected,
}

/// One agent's failure within a turn.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{reason:?}: {message}")]
pub struct AgentDecisionFailure {
    /// Failure class.
    pub reason: FailureReason,
    /// Human-readable detail.
    pub message: String,
}

impl AgentDecisionFailure {
    fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// Everything that happened in one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    /// 1-based turn counter of this orchestrator.
    pub turn_number: u64,
    /// Applied actions, in registration order.
    pub actions: Vec<(AgentId, CharacterAction)>,
    /// Agents without an applied action, in registration order.
    pub failures: Vec<(AgentId, AgentDecisionFailure)>,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end.
    pub completed_at: DateTime<Utc>,
    /// Monotonic duration.
    pub duration: Duration,
}

impl TurnResult {
    /// The action applied for `agent`, if any.
    #[must_use]
    pub fn action_for(&self, agent: &AgentId) -> Option<&CharacterAction> {
        self.actions.iter().find(|(id, _)| id == agent).map(|(_, a)| a)
    }

    /// The failure recorded for `agent`, if any.
    #[must_use]
    pub fn failure_for(&self, agent: &AgentId) -> Option<&AgentDecisionFailure> {
        self.failures.iter().find(|(id, _)| id == agent).map(|(_, f)| f)
    }

    /// Actions that came from the fallback policy.
    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.actions.iter().filter(|(_, a)| a.is_fallback()).count()
    }

    /// Agents accounted for (actions plus failures).
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.actions.len() + self.failures.len()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

enum TaskFailure {
    Failed(anyhow::Error),
    TimedOut(Duration),
}

/// Drives turns for a fixed roster of agents.
pub struct TurnOrchestrator {
    decider: Arc<dyn Decide>,
    memory: Arc<MemoryStore>,
    applier: Box<dyn ActionApplier>,
    agents: Vec<AgentState>,
    limit: Arc<Semaphore>,
    deadline: Option<Duration>,
    history: VecDeque<TurnResult>,
    max_history: Option<usize>,
    turn_number: u64,
}

impl std::fmt::Debug for TurnOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("agents", &self.agents.len())
            .field("turn_number", &self.turn_number)
            .field("deadline", &self.deadline)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl TurnOrchestrator {
    /// Create an orchestrator around a decider and the memory store it shares.
    #[must_use]
    pub fn new(decider: Arc<dyn Decide>, memory: Arc<MemoryStore>, config: &OrchestratorConfig) -> Self {
        Self {
            decider,
            memory,
            applier: Box::new(NoopApplier),
            agents: Vec::new(),
            limit: Arc::new(Semaphore::new(config.max_concurrent_agents.max(1))),
            deadline: (config.agent_deadline_ms > 0).then(|| Duration::from_millis(config.agent_deadline_ms)),
            history: VecDeque::new(),
            max_history: (config.max_history > 0).then_some(config.max_history),
            turn_number: 0,
        }
    }

    /// Wire the full stack from configuration: memory store, inference
    /// client and decision pipeline.
    ///
    /// # Errors
    /// `InferenceError::Config` if the HTTP backend cannot be built.
    pub fn from_config(config: &EnsembleConfig, credential: Credential) -> Result<Self, InferenceError> {
        let memory = Arc::new(MemoryStore::new(config.memory.clone(), config.retrieval.clone()));
        let client = Arc::new(InferenceClient::from_config(&config.inference)?);
        let pipeline = DecisionPipeline::new(client, Arc::clone(&memory), credential)
            .with_config(PipelineConfig::from(config));
        Ok(Self::new(Arc::new(pipeline), memory, &config.orchestrator))
    }

    /// Replace the action applier.
    #[must_use]
    pub fn with_applier(mut self, applier: impl ActionApplier + 'static) -> Self {
        self.applier = Box::new(applier);
        self
    }

    /// Add an agent. IDs must be unique.
    ///
    /// # Errors
    /// `EnsembleError::AlreadyRegistered` if the ID is taken.
    pub fn register_agent(&mut self, agent: AgentState) -> Result<(), EnsembleError> {
        if self.agents.iter().any(|a| a.id == agent.id) {
            return Err(EnsembleError::AlreadyRegistered(agent.id));
        }
        debug!(agent = %agent.id, name = %agent.name, "agent registered");
        self.agents.push(agent);
        Ok(())
    }

    /// Remove an agent and drop its memories.
    ///
    /// # Errors
    /// `EnsembleError::AgentNotFound` if the ID is not registered.
    pub fn remove_agent(&mut self, id: &AgentId) -> Result<AgentState, EnsembleError> {
        let index = self
            .agents
            .iter()
            .position(|a| a.id == *id)
            .ok_or(EnsembleError::AgentNotFound(*id))?;
        self.memory.remove_agent(id);
        debug!(agent = %id, "agent removed");
        Ok(self.agents.remove(index))
    }

    /// Bound the history. `None` keeps every turn.
    pub fn set_max_history(&mut self, max: Option<usize>) {
        self.max_history = max;
        self.trim_history();
    }

    /// Past turns, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TurnResult> {
        self.history.iter()
    }

    /// Turns run so far.
    #[must_use]
    pub fn turn_number(&self) -> u64 {
        self.turn_number
    }

    /// Registered agents, in registration order.
    #[must_use]
    pub fn agents(&self) -> &[AgentState] {
        &self.agents
    }

    /// The memory store shared with the decider.
    #[must_use]
    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    /// Run one turn against `snapshot`.
    pub async fn run_turn(&mut self, snapshot: WorldStateSnapshot) -> TurnResult {
        self.turn_number += 1;
        let turn_number = self.turn_number;
        let started_at = Utc::now();
        let clock = Instant::now();
        let span = info_span!("turn", turn = turn_number, world_turn = snapshot.turn);

        let decided = self.decide_all(Arc::new(snapshot)).instrument(span.clone()).await;

        let _entered = span.enter();
        let mut actions = Vec::with_capacity(decided.len());
        let mut failures = Vec::new();
        for (id, outcome) in decided {
            let Some(agent) = self.agents.iter_mut().find(|a| a.id == id) else {
                continue;
            };
            let result = outcome.and_then(|action| match self.applier.apply(agent, &action) {
                Ok(()) => Ok(action),
                Err(e) => Err(AgentDecisionFailure::new(FailureReason::ApplyRejected, format!("{e:#}"))),
            });
            match result {
                Ok(action) => {
                    agent.last_action_at = Some(action.timestamp());
                    actions.push((id, action));
                }
                Err(failure) => {
                    warn!(agent = %id, reason = ?failure.reason, message = %failure.message, "agent produced no action");
                    failures.push((id, failure));
                }
            }
        }

        let decay = self.memory.decay_tick();
        let result = TurnResult {
            turn_number,
            actions,
            failures,
            started_at,
            completed_at: Utc::now(),
            duration: clock.elapsed(),
        };
        info!(
            actions = result.actions.len(),
            fallbacks = result.fallback_count(),
            failures = result.failures.len(),
            decayed = decay.decayed,
            purged = decay.purged.len(),
            duration_ms = result.duration.as_millis() as u64,
            "turn complete"
        );

        self.history.push_back(result.clone());
        self.trim_history();
        result
    }

    async fn decide_all(
        &self,
        world: Arc<WorldStateSnapshot>,
    ) -> Vec<(AgentId, Result<CharacterAction, AgentDecisionFailure>)> {
        let handles: Vec<_> = self
            .agents
            .iter()
            .map(|agent| {
                let agent = agent.clone();
                let id = agent.id;
                let world = Arc::clone(&world);
                let decider = Arc::clone(&self.decider);
                let limit = Arc::clone(&self.limit);
                let deadline = self.deadline;
                let span = info_span!("agent", agent = %id, name = %agent.name);
                let task = async move {
                    let _permit = limit
                        .acquire_owned()
                        .await
                        .map_err(|e| TaskFailure::Failed(anyhow::anyhow!(e)))?;
                    let actions = world.actions_for(&agent.id);
                    let decision = decider.decide(&agent, &world, actions);
                    match deadline {
                        Some(within) => tokio::time::timeout(within, decision)
                            .await
                            .map_err(|_| TaskFailure::TimedOut(within))?
                            .map_err(TaskFailure::Failed),
                        None => decision.await.map_err(TaskFailure::Failed),
                    }
                };
                (id, tokio::spawn(task.instrument(span)))
            })
            .collect();

        let mut decided = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(action)) => Ok(action),
                Ok(Err(TaskFailure::Failed(e))) => {
                    Err(AgentDecisionFailure::new(FailureReason::Internal, format!("{e:#}")))
                }
                Ok(Err(TaskFailure::TimedOut(limit))) => Err(AgentDecisionFailure::new(
                    FailureReason::TimedOut,
                    format!("no decision within {} ms", limit.as_millis()),
                )),
                Err(e) => Err(join_failure(e)),
            };
            decided.push((id, outcome));
        }
        decided
    }

    fn trim_history(&mut self) {
        if let Some(max) = self.max_history {
            while self.history.len() > max {
                self.history.pop_front();
            }
        }
    }
}

fn join_failure(error: JoinError) -> AgentDecisionFailure {
    if !error.is_panic() {
        return AgentDecisionFailure::new(FailureReason::Internal, error.to_string());
    }
    let payload = error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "decision task panicked".to_string());
    AgentDecisionFailure::new(FailureReason::Panicked, message)
}

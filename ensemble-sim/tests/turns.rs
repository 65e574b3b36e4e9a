//! Turn mechanics: ordering, isolation, deadlines, concurrency and roster
//! changes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use proptest::prelude::*;

use ensemble_core::action::ActionSource;
use ensemble_core::config::OrchestratorConfig;
use ensemble_core::memory::{MemoryItem, MemoryKind};
use ensemble_core::world::ActionSet;
use ensemble_core::{AgentId, AgentState, CharacterAction, MemoryStore, WorldStateSnapshot};
use ensemble_sim::{Decide, FailureReason, TurnOrchestrator};

/// Behaviour keyed on the agent's name.
#[derive(Default)]
struct Roster {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Decide for Roster {
    async fn decide(
        &self,
        agent: &AgentState,
        _world: &WorldStateSnapshot,
        _actions: &ActionSet,
    ) -> anyhow::Result<CharacterAction> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let delay = match agent.name.as_str() {
            "slow" => Duration::from_secs(60),
            name if name.starts_with("late") => Duration::from_millis(50),
            _ => Duration::from_millis(10),
        };
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match agent.name.as_str() {
            "panics" => panic!("decision exploded"),
            "errors" => anyhow::bail!("no route"),
            _ => Ok(CharacterAction::builder("wait", ActionSource::Inference)
                .reasoning(agent.name.clone())
                .build()),
        }
    }
}

fn orchestrator(config: OrchestratorConfig) -> (TurnOrchestrator, Arc<Roster>) {
    let roster = Arc::new(Roster::default());
    let orch = TurnOrchestrator::new(roster.clone(), Arc::new(MemoryStore::default()), &config);
    (orch, roster)
}

fn register(orch: &mut TurnOrchestrator, names: &[&str]) -> Vec<AgentId> {
    names
        .iter()
        .map(|name| {
            let agent = AgentState::new(*name);
            let id = agent.id;
            orch.register_agent(agent).unwrap();
            id
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn actions_follow_registration_order() {
    let (mut orch, _) = orchestrator(OrchestratorConfig::default());
    let ids = register(&mut orch, &["late-1", "fast", "late-2", "quick"]);

    let result = orch.run_turn(WorldStateSnapshot::new(1, "")).await;

    let order: Vec<AgentId> = result.actions.iter().map(|(id, _)| *id).collect();
    assert_eq!(order, ids);
}

#[tokio::test(start_paused = true)]
async fn applier_sees_registration_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let (orch, _) = orchestrator(OrchestratorConfig::default());
    let mut orch = orch.with_applier(move |agent: &AgentState, _: &CharacterAction| -> anyhow::Result<()> {
        log.lock().push(agent.name.clone());
        Ok(())
    });
    register(&mut orch, &["late-1", "fast", "late-2"]);

    orch.run_turn(WorldStateSnapshot::new(1, "")).await;

    assert_eq!(*seen.lock(), vec!["late-1", "fast", "late-2"]);
}

#[tokio::test(start_paused = true)]
async fn panics_are_isolated() {
    let (mut orch, _) = orchestrator(OrchestratorConfig::default());
    let ids = register(&mut orch, &["fast", "panics", "errors"]);

    let result = orch.run_turn(WorldStateSnapshot::new(1, "")).await;

    assert_eq!(result.actions.len(), 1);
    assert!(result.action_for(&ids[0]).is_some());
    let panicked = result.failure_for(&ids[1]).expect("panic recorded");
    assert_eq!(panicked.reason, FailureReason::Panicked);
    assert!(panicked.message.contains("decision exploded"));
    assert_eq!(result.failure_for(&ids[2]).map(|f| f.reason), Some(FailureReason::Internal));
}

#[tokio::test(start_paused = true)]
async fn deadline_turns_slow_agents_into_failures() {
    let (mut orch, _) = orchestrator(OrchestratorConfig {
        agent_deadline_ms: 1_000,
        ..OrchestratorConfig::default()
    });
    let ids = register(&mut orch, &["slow", "fast"]);

    let result = orch.run_turn(WorldStateSnapshot::new(1, "")).await;

    assert_eq!(result.failure_for(&ids[0]).map(|f| f.reason), Some(FailureReason::TimedOut));
    assert!(result.action_for(&ids[1]).is_some());
    assert!(orch.agents()[0].last_action_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn rejected_actions_are_failures() {
    let (orch, _) = orchestrator(OrchestratorConfig::default());
    let mut orch = orch.with_applier(|agent: &AgentState, _: &CharacterAction| -> anyhow::Result<()> {
        if agent.name == "fast" {
            anyhow::bail!("tile occupied");
        }
        Ok(())
    });
    let ids = register(&mut orch, &["fast", "quick"]);

    let result = orch.run_turn(WorldStateSnapshot::new(1, "")).await;

    let rejected = result.failure_for(&ids[0]).expect("rejection recorded");
    assert_eq!(rejected.reason, FailureReason::ApplyRejected);
    assert_eq!(rejected.message, "tile occupied");
    assert!(result.action_for(&ids[1]).is_some());
}

#[tokio::test(start_paused = true)]
async fn concurrency_is_bounded() {
    let (mut orch, roster) = orchestrator(OrchestratorConfig {
        max_concurrent_agents: 2,
        ..OrchestratorConfig::default()
    });
    register(&mut orch, &["a", "b", "c", "d", "e", "f"]);

    let result = orch.run_turn(WorldStateSnapshot::new(1, "")).await;

    assert_eq!(result.actions.len(), 6);
    assert!(roster.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn removing_an_agent_drops_its_memories() {
    let (mut orch, _) = orchestrator(OrchestratorConfig::default());
    let ids = register(&mut orch, &["fast", "quick"]);
    orch.memory()
        .record(ids[0], MemoryItem::new(ids[0], MemoryKind::Episodic, "the bridge collapsed"));

    let removed = orch.remove_agent(&ids[0]).unwrap();

    assert_eq!(removed.name, "fast");
    assert!(orch.memory().items(&ids[0]).is_empty());
    assert_eq!(orch.agents().len(), 1);
}

#[test]
fn turn_result_serializes() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (mut orch, _) = orchestrator(OrchestratorConfig::default());
    register(&mut orch, &["fast", "errors"]);

    let result = rt.block_on(orch.run_turn(WorldStateSnapshot::new(1, "")));
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["turn_number"], 1);
    assert_eq!(json["failures"][0][1]["reason"], "internal");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_agent_is_accounted_for(kinds in proptest::collection::vec(0u8..3, 0..12)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let (mut orch, _) = orchestrator(OrchestratorConfig::default());
        let names: Vec<&str> = kinds
            .iter()
            .map(|k| match k {
                0 => "fast",
                1 => "errors",
                _ => "panics",
            })
            .collect();
        let ids = register(&mut orch, &names);

        let result = rt.block_on(orch.run_turn(WorldStateSnapshot::new(1, "")));

        prop_assert_eq!(result.agent_count(), ids.len());
        for id in &ids {
            let acted = result.action_for(id).is_some();
            let failed = result.failure_for(id).is_some();
            prop_assert!(acted ^ failed);
        }
    }
}

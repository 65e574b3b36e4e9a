//! ENSEMBLE decision-path benchmarks.
//!
//! Everything an agent does per turn except the model call:
//!   memory_record_full_partition ...... record with eviction
//!   memory_query_top5_from_full ....... ranked retrieval over a full partition
//!   memory_decay_tick_50_agents ....... one decay pass
//!   prompt_build_scout ................ prompt rendering
//!   parse_numbered_reply / parse_fuzzy_reply
//!   fallback_decide ................... rule-based choice

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use ensemble_core::memory::{MemoryItem, MemoryKind, MemoryQuery};
use ensemble_core::types::PersonalityWeights;
use ensemble_core::world::{ActionSet, ActionSpec, ThreatLevel};
use ensemble_core::{AgentId, AgentState, FallbackPolicy, MemoryStore, WorldStateSnapshot};
use ensemble_llm::{PromptBuilder, ResponseParser};

const EVENTS: [&str; 5] = [
    "raiders crossed the river near the mill",
    "the blacksmith traded a sword for grain",
    "a stranger asked about the watchtower",
    "wolves were heard north of the village",
    "the captain ordered the gates closed",
];

fn item(agent: AgentId, i: usize) -> MemoryItem {
    let kind = if i % 3 == 0 { MemoryKind::Working } else { MemoryKind::Episodic };
    MemoryItem::new(agent, kind, format!("{} (day {})", EVENTS[i % EVENTS.len()], i))
        .with_relevance((i % 10) as f32 / 10.0)
        .with_emotional_weight((i % 7) as f32 - 3.0)
}

fn full_store(agents: usize) -> (MemoryStore, Vec<AgentId>) {
    let store = MemoryStore::default();
    let ids: Vec<AgentId> = (0..agents).map(|_| AgentId::new()).collect();
    for id in &ids {
        for i in 0..200 {
            store.record(*id, item(*id, i));
        }
    }
    (store, ids)
}

fn scout() -> AgentState {
    AgentState::new("Scout")
        .with_faction("Rangers")
        .with_location("Old Mill")
        .with_personality(PersonalityWeights::new(0.2, 0.4, 0.9, 0.3, 0.4))
}

fn world() -> WorldStateSnapshot {
    WorldStateSnapshot::new(7, "Smoke rises over the river crossing")
        .with_threat(ThreatLevel::Moderate)
        .with_hostile("raiders")
        .with_opportunity("abandoned watchtower")
}

fn actions() -> ActionSet {
    ActionSet::new()
        .with(ActionSpec::new("wait", "hold position"))
        .with(ActionSpec::new("investigate", "gather more data"))
        .with(ActionSpec::new("attack", "strike first"))
        .with(ActionSpec::new("flee", "fall back to the village"))
        .with(ActionSpec::new("talk", "hail the stranger"))
}

fn bench_memory(c: &mut Criterion) {
    let (store, ids) = full_store(1);
    let agent = ids[0];
    let mut next = 200;
    c.bench_function("memory_record_full_partition", |b| {
        b.iter(|| {
            next += 1;
            black_box(store.record(agent, item(agent, next)));
        });
    });

    let query = MemoryQuery::from_snapshot(&world());
    c.bench_function("memory_query_top5_from_full", |b| {
        b.iter(|| black_box(store.query(black_box(&agent), black_box(&query), 5)));
    });

    let (many, _) = full_store(50);
    c.bench_function("memory_decay_tick_50_agents", |b| {
        b.iter(|| black_box(many.decay_tick()));
    });
}

fn bench_prompt(c: &mut Criterion) {
    let agent = scout();
    let world = world();
    let actions = actions();
    let memories: Vec<MemoryItem> = (0..5).map(|i| item(agent.id, i)).collect();
    let builder = PromptBuilder::new();
    c.bench_function("prompt_build_scout", |b| {
        b.iter(|| black_box(builder.build(&agent, &world, &memories, &actions)));
    });
}

fn bench_parse(c: &mut Criterion) {
    let actions = actions();
    let parser = ResponseParser::new();
    c.bench_function("parse_numbered_reply", |b| {
        b.iter(|| black_box(parser.parse(black_box("2) investigate - gather more data"), &actions)));
    });
    let rambling = "Given the smoke and the raiders I think the wisest course is to \
                    investigate the watchtower before anyone else does.";
    c.bench_function("parse_fuzzy_reply", |b| {
        b.iter(|| black_box(parser.parse(black_box(rambling), &actions)));
    });
}

fn bench_fallback(c: &mut Criterion) {
    let policy = FallbackPolicy::default();
    let agent = scout();
    let world = world();
    let actions = actions();
    c.bench_function("fallback_decide", |b| {
        b.iter(|| black_box(policy.decide(&agent, &world, &actions)));
    });
}

criterion_group!(benches, bench_memory, bench_prompt, bench_parse, bench_fallback);
criterion_main!(benches);

//! The per-agent memory store.
//!
//! Partitioned by agent: each agent's items sit behind their own lock, so
//! concurrent pipelines for different agents never contend on the same
//! partition, and no partition is ever written by two writers at once.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::{DecayConfig, MemoryConfig, RetrievalConfig};
use crate::consolidation;
use crate::decay;
use crate::eviction;
use crate::memory::{MemoryItem, MemoryKind, MemoryQuery};
use crate::retrieval::{RankedMemory, RetrievalEngine};
use crate::types::{AgentId, MemoryId};

#[derive(Debug, Default)]
struct Partition {
    items: Vec<MemoryItem>,
    decay_override: Option<DecayConfig>,
}

/// What a [`MemoryStore::record`] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// The item replaced an existing one with the same id.
    pub updated: bool,
    /// Items dropped to honour capacity.
    pub evicted: Vec<MemoryId>,
    /// Working items moved to episodic memory instead of being dropped.
    pub promoted: Vec<MemoryId>,
}

/// Summary of one [`MemoryStore::decay_tick`].
#[derive(Debug, Clone, Default)]
pub struct DecayReport {
    /// Items that were decayed.
    pub decayed: usize,
    /// Items purged for falling below a threshold.
    pub purged: Vec<(AgentId, MemoryId)>,
}

/// Per-layer item counts for one agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Working items.
    pub working: usize,
    /// Episodic items.
    pub episodic: usize,
    /// Semantic items.
    pub semantic: usize,
    /// Emotional items.
    pub emotional: usize,
}

impl MemoryStats {
    /// Total across all layers.
    #[must_use]
    pub fn total(&self) -> usize {
        self.working + self.episodic + self.semantic + self.emotional
    }
}

/// Layered memory for every agent in the simulation.
#[derive(Debug)]
pub struct MemoryStore {
    partitions: DashMap<AgentId, Arc<Mutex<Partition>>>,
    config: MemoryConfig,
    retrieval: RetrievalEngine,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryConfig::default(), RetrievalConfig::default())
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(config: MemoryConfig, retrieval: RetrievalConfig) -> Self {
        Self {
            partitions: DashMap::new(),
            config,
            retrieval: RetrievalEngine::new(retrieval.weights),
        }
    }

    /// Memory configuration in effect.
    #[must_use]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Cap for one layer.
    #[must_use]
    pub fn capacity(&self, kind: MemoryKind) -> usize {
        match kind {
            MemoryKind::Working => self.config.working_capacity,
            MemoryKind::Episodic => self.config.episodic_capacity,
            MemoryKind::Semantic => self.config.semantic_capacity,
            MemoryKind::Emotional => self.config.emotional_capacity,
        }
    }

    fn partition(&self, agent: &AgentId) -> Option<Arc<Mutex<Partition>>> {
        self.partitions.get(agent).map(|entry| Arc::clone(entry.value()))
    }

    fn partition_or_create(&self, agent: AgentId) -> Arc<Mutex<Partition>> {
        Arc::clone(self.partitions.entry(agent).or_default().value())
    }

    /// Insert a new item or update the item with the same id.
    ///
    /// Enforces the layer cap afterwards; the evicted item is always the one
    /// with the lowest `relevance × decay`.
    pub fn record(&self, agent: AgentId, mut item: MemoryItem) -> RecordOutcome {
        item.owner = agent;
        let kind = item.kind;
        let id = item.id;

        let partition = self.partition_or_create(agent);
        let mut partition = partition.lock();
        let mut outcome = RecordOutcome::default();

        if let Some(existing) = partition.items.iter_mut().find(|i| i.id == id) {
            item.created_at = existing.created_at;
            item.access_count = item.access_count.max(existing.access_count);
            item.last_accessed_at = item.last_accessed_at.max(existing.last_accessed_at);
            *existing = item;
            outcome.updated = true;
        } else {
            partition.items.push(item);
        }

        self.enforce_capacity(&mut partition.items, kind, &mut outcome);

        debug!(
            %agent,
            memory = %id,
            %kind,
            updated = outcome.updated,
            evicted = outcome.evicted.len(),
            promoted = outcome.promoted.len(),
            "memory recorded"
        );
        outcome
    }

    fn enforce_capacity(&self, items: &mut Vec<MemoryItem>, kind: MemoryKind, outcome: &mut RecordOutcome) {
        let cap = self.capacity(kind);
        while eviction::count_kind(items, kind) > cap {
            let Some(index) = eviction::select_victim(items, kind) else {
                break;
            };
            let victim = items.remove(index);
            let victim_id = victim.id;
            match consolidation::promote_rehearsed(victim, self.config.promote_after_accesses) {
                Some(promoted) => {
                    items.push(promoted);
                    outcome.promoted.push(victim_id);
                    self.enforce_capacity(items, MemoryKind::Episodic, outcome);
                }
                None => outcome.evicted.push(victim_id),
            }
        }
    }

    /// The `k` most relevant memories for the given context, best first.
    ///
    /// Unknown agents get an empty result. Returned items are recorded as
    /// accessed; the returned copies show their state before this access.
    #[must_use]
    pub fn query(&self, agent: &AgentId, context: &MemoryQuery, k: usize) -> Vec<MemoryItem> {
        self.query_ranked(agent, context, k)
            .into_iter()
            .map(|ranked| ranked.memory)
            .collect()
    }

    /// Like [`query`](Self::query) but keeps the score breakdown.
    #[must_use]
    pub fn query_ranked(&self, agent: &AgentId, context: &MemoryQuery, k: usize) -> Vec<RankedMemory> {
        let Some(partition) = self.partition(agent) else {
            return Vec::new();
        };
        let mut partition = partition.lock();
        let ranked = self.retrieval.rank(&partition.items, context, k);

        let now = Utc::now();
        for hit in &ranked {
            if let Some(item) = partition.items.iter_mut().find(|i| i.id == hit.memory.id) {
                item.record_access(now);
            }
        }
        ranked
    }

    /// Apply one turn of decay to every agent and purge faded items.
    pub fn decay_tick(&self) -> DecayReport {
        let partitions: Vec<(AgentId, Arc<Mutex<Partition>>)> = self
            .partitions
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let mut report = DecayReport::default();
        for (agent, partition) in partitions {
            let mut partition = partition.lock();
            let factors = partition
                .decay_override
                .clone()
                .unwrap_or_else(|| self.config.decay.clone());
            decay::apply_decay(&mut partition.items, &factors);
            report.decayed += partition.items.len();
            let purged = decay::purge_faded(&mut partition.items, &self.config);
            report.purged.extend(purged.into_iter().map(|id| (agent, id)));
        }

        debug!(decayed = report.decayed, purged = report.purged.len(), "memory decay tick");
        report
    }

    /// Use agent-specific decay factors instead of the global ones (`None` resets).
    pub fn set_decay_override(&self, agent: AgentId, factors: Option<DecayConfig>) {
        self.partition_or_create(agent).lock().decay_override = factors;
    }

    /// Drop an agent's whole partition. Returns whether it existed.
    pub fn remove_agent(&self, agent: &AgentId) -> bool {
        self.partitions.remove(agent).is_some()
    }

    /// Copy of every item an agent holds, in insertion order.
    #[must_use]
    pub fn items(&self, agent: &AgentId) -> Vec<MemoryItem> {
        self.partition(agent)
            .map(|p| p.lock().items.clone())
            .unwrap_or_default()
    }

    /// Per-layer counts, or `None` for unknown agents.
    #[must_use]
    pub fn stats(&self, agent: &AgentId) -> Option<MemoryStats> {
        let partition = self.partition(agent)?;
        let partition = partition.lock();
        let mut stats = MemoryStats::default();
        for item in &partition.items {
            match item.kind {
                MemoryKind::Working => stats.working += 1,
                MemoryKind::Episodic => stats.episodic += 1,
                MemoryKind::Semantic => stats.semantic += 1,
                MemoryKind::Emotional => stats.emotional += 1,
            }
        }
        Some(stats)
    }

    /// Number of agents with a partition.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.partitions.len()
    }
}

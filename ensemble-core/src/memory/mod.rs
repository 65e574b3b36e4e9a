//! Memory item definitions and the per-agent [`MemoryStore`].
//!
//! Every agent owns four logical partitions of one flat item list:
//!
//! - **Working**: "What I'm thinking about right now" (Miller's 7 ± 2, 1956)
//! - **Episodic**: "What happened" (Tulving, 1972)
//! - **Semantic**: "What I know" (Tulving, 1985)
//! - **Emotional**: "How I feel about it"
//!
//! Items are created by the caller's event subsystem and pushed in through
//! [`MemoryStore::record`]; this crate only ranks, decays and evicts them.

pub mod store;

pub use store::{DecayReport, MemoryStats, MemoryStore, RecordOutcome};

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentId, MemoryId, clamp_unit};
use crate::world::WorldStateSnapshot;

/// Which layer of memory an item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Small, capacity-bounded, rapidly decaying.
    Working,
    /// Events the agent lived through.
    Episodic,
    /// Distilled facts and beliefs.
    Semantic,
    /// Feelings attached to people, places or things.
    Emotional,
}

impl MemoryKind {
    /// All kinds in declaration order.
    pub const ALL: [MemoryKind; 4] = [Self::Working, Self::Episodic, Self::Semantic, Self::Emotional];
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Working => "working",
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Emotional => "emotional",
        };
        f.write_str(s)
    }
}

/// A single remembered thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Unique identifier.
    pub id: MemoryId,
    /// Agent whose memory this is. Overwritten by [`MemoryStore::record`].
    pub owner: AgentId,
    /// Memory layer.
    pub kind: MemoryKind,
    /// Natural-language content.
    pub content: String,
    /// How charged the memory is (-10 traumatic .. +10 elating).
    pub emotional_weight: f32,
    /// Stored relevance (0.0 to 1.0).
    pub relevance: f32,
    /// Current strength (1.0 = fresh, 0.0 = forgotten).
    pub decay: f32,
    /// When the item was formed.
    pub created_at: DateTime<Utc>,
    /// Last time the item was recalled.
    pub last_accessed_at: DateTime<Utc>,
    /// How many times the item was recalled.
    pub access_count: u32,
}

impl MemoryItem {
    /// Create a fresh item with neutral emotion, relevance 0.5 and full strength.
    #[must_use]
    pub fn new(owner: AgentId, kind: MemoryKind, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: MemoryId::new(),
            owner,
            kind,
            content: content.into(),
            emotional_weight: 0.0,
            relevance: 0.5,
            decay: 1.0,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
        }
    }

    /// Pin the ID.
    #[must_use]
    pub fn with_id(mut self, id: MemoryId) -> Self {
        self.id = id;
        self
    }

    /// Set the emotional weight, clamped to [-10, 10].
    #[must_use]
    pub fn with_emotional_weight(mut self, weight: f32) -> Self {
        self.emotional_weight = if weight.is_nan() { 0.0 } else { weight.clamp(-10.0, 10.0) };
        self
    }

    /// Set the relevance, clamped to [0, 1].
    #[must_use]
    pub fn with_relevance(mut self, relevance: f32) -> Self {
        self.relevance = clamp_unit(relevance);
        self
    }

    /// Set the decay strength, clamped to [0, 1].
    #[must_use]
    pub fn with_decay(mut self, decay: f32) -> Self {
        self.decay = clamp_unit(decay);
        self
    }

    /// Pin both timestamps.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.created_at = timestamp;
        self.last_accessed_at = timestamp;
        self
    }

    /// `relevance × decay`: the quantity capacity eviction and threshold purges use.
    #[must_use]
    pub fn retention(&self) -> f32 {
        self.relevance * self.decay
    }

    /// Record a recall.
    pub fn record_access(&mut self, now: DateTime<Utc>) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = now;
    }
}

/// The world context a memory query is matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryQuery {
    terms: BTreeSet<String>,
}

impl MemoryQuery {
    /// Build a query from free text.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self { terms: terms(text) }
    }

    /// Build a query from everything a snapshot says about the situation.
    #[must_use]
    pub fn from_snapshot(snapshot: &WorldStateSnapshot) -> Self {
        Self::from_text(&snapshot.context_text())
    }

    /// Normalized query terms.
    #[must_use]
    pub fn terms(&self) -> &BTreeSet<String> {
        &self.terms
    }

    /// Whether the query carries no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Lower-cased alphanumeric words of three letters or more, minus stop words.
#[must_use]
pub fn terms(text: &str) -> BTreeSet<String> {
    const STOP_WORDS: &[&str] = &[
        "the", "and", "for", "with", "that", "this", "from", "was", "were", "are", "has", "have", "had",
        "not", "but", "its", "into", "onto", "then", "than", "they", "them", "their", "there",
    ];

    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_clamp_ranges() {
        let item = MemoryItem::new(AgentId::new(), MemoryKind::Episodic, "x")
            .with_emotional_weight(42.0)
            .with_relevance(-3.0)
            .with_decay(1.5);
        assert_eq!(item.emotional_weight, 10.0);
        assert_eq!(item.relevance, 0.0);
        assert_eq!(item.decay, 1.0);
    }

    #[test]
    fn retention_is_relevance_times_decay() {
        let item = MemoryItem::new(AgentId::new(), MemoryKind::Working, "x")
            .with_relevance(0.5)
            .with_decay(0.4);
        assert!((item.retention() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn terms_drop_short_and_stop_words() {
        let t = terms("The raiders, and THE wolves at the gate!");
        assert!(t.contains("raiders"));
        assert!(t.contains("wolves"));
        assert!(t.contains("gate"));
        assert!(!t.contains("the"));
        assert!(!t.contains("at"));
    }
}

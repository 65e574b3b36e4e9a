//! Memory Retrieval: context-matched, emotion-weighted ranking.
//!
//! The ranking combines three weighted factors scaled by the item's decay:
//!   Score = (w₁·Context + w₂·Emotional + w₃·Relevance) × Decay
//!
//! Ordering is total and deterministic: higher score first, then most
//! recently accessed, then lowest memory id.

pub mod scoring;

use std::cmp::Ordering;

use crate::config::RetrievalWeights;
use crate::memory::{MemoryItem, MemoryQuery};
use crate::types::RetrievalScore;

/// A scored retrieval result.
#[derive(Debug, Clone)]
pub struct RankedMemory {
    /// The retrieved memory.
    pub memory: MemoryItem,
    /// Combined retrieval score.
    pub score: RetrievalScore,
    /// Per-factor breakdown (useful when debugging a decision).
    pub breakdown: ScoreBreakdown,
}

/// Breakdown of a retrieval score into its component factors.
#[derive(Debug, Clone, Default)]
pub struct ScoreBreakdown {
    /// Weighted context-match contribution.
    pub context: f64,
    /// Weighted emotional-salience contribution.
    pub emotional: f64,
    /// Weighted stored-relevance contribution.
    pub relevance: f64,
    /// Decay multiplier applied to the sum.
    pub decay: f64,
}

impl ScoreBreakdown {
    /// Final score.
    #[must_use]
    pub fn total(&self) -> f64 {
        (self.context + self.emotional + self.relevance) * self.decay
    }
}

/// The retrieval engine that ranks memories against a world context.
#[derive(Debug, Clone)]
pub struct RetrievalEngine {
    weights: RetrievalWeights,
}

impl RetrievalEngine {
    /// Create a new retrieval engine with the given weights.
    #[must_use]
    pub fn new(weights: RetrievalWeights) -> Self {
        Self { weights }
    }

    /// Rank `memories` against `query` and keep the best `k`.
    #[must_use]
    pub fn rank(&self, memories: &[MemoryItem], query: &MemoryQuery, k: usize) -> Vec<RankedMemory> {
        let mut results: Vec<RankedMemory> = memories
            .iter()
            .map(|memory| {
                let breakdown = scoring::compute_breakdown(memory, query, &self.weights);
                #[allow(clippy::cast_possible_truncation)]
                let score = RetrievalScore::new(breakdown.total() as f32);
                RankedMemory {
                    memory: memory.clone(),
                    score,
                    breakdown,
                }
            })
            .collect();

        results.sort_by(compare_ranked);
        results.truncate(k);
        results
    }
}

/// Higher score first, then most recent access, then lowest id.
fn compare_ranked(a: &RankedMemory, b: &RankedMemory) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.memory.last_accessed_at.cmp(&a.memory.last_accessed_at))
        .then_with(|| a.memory.id.cmp(&b.memory.id))
}

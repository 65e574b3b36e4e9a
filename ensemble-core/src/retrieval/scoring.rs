//! Per-factor scoring functions for memory retrieval.
//!
//! Score = (w₁·Context(m) + w₂·Emotional(m) + w₃·Relevance(m)) × decay(m)
//!
//! Where:
//!   Context(m)   = overlap coefficient between memory terms and query terms
//!   Emotional(m) = |emotional_weight| / 10
//!   Relevance(m) = stored relevance (0–1)

use crate::config::RetrievalWeights;
use crate::memory::{MemoryItem, MemoryQuery, terms};
use crate::retrieval::ScoreBreakdown;

/// Compute the full score breakdown for a single memory.
#[must_use]
pub fn compute_breakdown(item: &MemoryItem, query: &MemoryQuery, weights: &RetrievalWeights) -> ScoreBreakdown {
    let context = f64::from(weights.context) * context_score(item, query);
    let emotional = f64::from(weights.emotional) * emotional_score(item);
    let relevance = f64::from(weights.relevance) * f64::from(item.relevance);
    let decay = f64::from(item.decay);

    ScoreBreakdown {
        context,
        emotional,
        relevance,
        decay,
    }
}

/// Overlap coefficient |A ∩ B| / min(|A|, |B|). 0 when either side is empty.
fn context_score(item: &MemoryItem, query: &MemoryQuery) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let item_terms = terms(&item.content);
    if item_terms.is_empty() {
        return 0.0;
    }
    let shared = item_terms.intersection(query.terms()).count();
    let smaller = item_terms.len().min(query.terms().len());
    shared as f64 / smaller as f64
}

/// Emotionally salient memories dominate recall (flashbulb effect: Brown & Kulik, 1977).
fn emotional_score(item: &MemoryItem) -> f64 {
    f64::from(item.emotional_weight.abs() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKind;
    use crate::types::AgentId;

    fn item(content: &str) -> MemoryItem {
        MemoryItem::new(AgentId::new(), MemoryKind::Episodic, content)
    }

    #[test]
    fn context_overlap_rewards_shared_terms() {
        let query = MemoryQuery::from_text("raiders near the northern gate");
        let related = context_score(&item("Raiders burned the northern farms"), &query);
        let unrelated = context_score(&item("Bought bread at the market"), &query);

        assert!(related > unrelated);
        assert!(unrelated.abs() < f64::EPSILON);
    }

    #[test]
    fn emotional_magnitude_counts_both_signs() {
        let joy = item("x").with_emotional_weight(8.0);
        let dread = item("x").with_emotional_weight(-8.0);
        assert!((emotional_score(&joy) - emotional_score(&dread)).abs() < f64::EPSILON);
        assert!((emotional_score(&joy) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn decay_scales_the_total() {
        let weights = RetrievalWeights::default();
        let query = MemoryQuery::from_text("wolves");
        let fresh = compute_breakdown(&item("wolves howled").with_decay(1.0), &query, &weights);
        let faded = compute_breakdown(&item("wolves howled").with_decay(0.2), &query, &weights);
        assert!(fresh.total() > faded.total());
    }
}

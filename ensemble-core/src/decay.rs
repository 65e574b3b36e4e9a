//! Per-turn memory decay.
//!
//! Each turn every item's strength is multiplied by its layer's factor:
//!   decay(t+1) = decay(t) × f_kind,   0 < f_kind < 1
//!
//! Working memory fades fastest; semantic knowledge barely fades. Items
//! whose strength falls below `min_decay`, or whose `relevance × decay`
//! falls below `eviction_threshold`, are purged.

use crate::config::{DecayConfig, MemoryConfig};
use crate::memory::{MemoryItem, MemoryKind};
use crate::types::MemoryId;

/// Decay factor for one layer.
#[must_use]
pub fn factor_for(kind: MemoryKind, factors: &DecayConfig) -> f32 {
    match kind {
        MemoryKind::Working => factors.working,
        MemoryKind::Episodic => factors.episodic,
        MemoryKind::Semantic => factors.semantic,
        MemoryKind::Emotional => factors.emotional,
    }
}

/// Apply one tick of decay to every item.
pub fn apply_decay(items: &mut [MemoryItem], factors: &DecayConfig) {
    for item in items {
        item.decay = (item.decay * factor_for(item.kind, factors)).clamp(0.0, 1.0);
    }
}

/// Remove items that fell below either threshold. Returns the removed IDs.
pub fn purge_faded(items: &mut Vec<MemoryItem>, config: &MemoryConfig) -> Vec<MemoryId> {
    let mut removed = Vec::new();
    items.retain(|item| {
        let keep = item.decay >= config.min_decay && item.retention() >= config.eviction_threshold;
        if !keep {
            removed.push(item.id);
        }
        keep
    });
    removed
}

/// Turns until an item starting at `decay` drops below `min_decay`.
///
/// Returns `None` when the factor would never get there.
#[must_use]
pub fn turns_until_forgotten(decay: f32, factor: f32, min_decay: f32) -> Option<u32> {
    if decay < min_decay {
        return Some(0);
    }
    if !(factor > 0.0 && factor < 1.0) || min_decay <= 0.0 {
        return None;
    }
    let turns = (f64::from(min_decay) / f64::from(decay)).ln() / f64::from(factor).ln();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(turns.floor() as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgentId;

    fn item(kind: MemoryKind) -> MemoryItem {
        MemoryItem::new(AgentId::new(), kind, "x").with_relevance(1.0)
    }

    #[test]
    fn decay_is_strictly_decreasing() {
        let factors = DecayConfig::default();
        let mut items = vec![item(MemoryKind::Working), item(MemoryKind::Semantic)];
        apply_decay(&mut items, &factors);
        assert!(items.iter().all(|i| i.decay < 1.0));
    }

    #[test]
    fn working_memory_fades_faster_than_semantic() {
        let factors = DecayConfig::default();
        let mut items = vec![item(MemoryKind::Working), item(MemoryKind::Semantic)];
        for _ in 0..5 {
            apply_decay(&mut items, &factors);
        }
        assert!(items[0].decay < items[1].decay);
    }

    #[test]
    fn purge_removes_faded_items() {
        let config = MemoryConfig::default();
        let mut items = vec![
            item(MemoryKind::Episodic).with_decay(0.01),
            item(MemoryKind::Episodic).with_decay(0.9),
            item(MemoryKind::Episodic).with_relevance(0.001),
        ];
        let faded = items[0].id;
        let irrelevant = items[2].id;
        let removed = purge_faded(&mut items, &config);
        assert_eq!(removed, vec![faded, irrelevant]);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn forgetting_horizon_matches_repeated_decay() {
        let turns = turns_until_forgotten(1.0, 0.85, 0.05).expect("finite");
        let mut decay = 1.0_f32;
        for _ in 0..turns {
            decay *= 0.85;
        }
        assert!(decay < 0.05);
        assert!(decay / 0.85 >= 0.05);
    }
}

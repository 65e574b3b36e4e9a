//! Capacity eviction.
//!
//! When a layer is over its cap, the victim is the item with the lowest
//! `relevance × decay`. Ties go to the item accessed longest ago, then to
//! the highest id, so eviction is fully deterministic.
//!
//! ```text
//! record ──▶ over cap? ──no──▶ done
//!                │
//!               yes
//!                ▼
//!      lowest relevance×decay ──▶ evicted (or promoted, see consolidation)
//! ```

use std::cmp::Ordering;

use crate::memory::{MemoryItem, MemoryKind};

/// Order items from first-to-evict to last-to-evict.
#[must_use]
pub fn eviction_order(a: &MemoryItem, b: &MemoryItem) -> Ordering {
    a.retention()
        .total_cmp(&b.retention())
        .then_with(|| a.last_accessed_at.cmp(&b.last_accessed_at))
        .then_with(|| b.id.cmp(&a.id))
}

/// Index of the item of `kind` that should be evicted next.
#[must_use]
pub fn select_victim(items: &[MemoryItem], kind: MemoryKind) -> Option<usize> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.kind == kind)
        .min_by(|(_, a), (_, b)| eviction_order(a, b))
        .map(|(index, _)| index)
}

/// Number of items of `kind`.
#[must_use]
pub fn count_kind(items: &[MemoryItem], kind: MemoryKind) -> usize {
    items.iter().filter(|item| item.kind == kind).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentId, MemoryId};
    use chrono::{Duration, Utc};

    #[test]
    fn lowest_retention_is_the_victim() {
        let owner = AgentId::new();
        let items = vec![
            MemoryItem::new(owner, MemoryKind::Working, "a").with_relevance(0.9),
            MemoryItem::new(owner, MemoryKind::Working, "b").with_relevance(0.1),
            MemoryItem::new(owner, MemoryKind::Episodic, "c").with_relevance(0.0),
        ];
        assert_eq!(select_victim(&items, MemoryKind::Working), Some(1));
        assert_eq!(select_victim(&items, MemoryKind::Semantic), None);
    }

    #[test]
    fn ties_evict_oldest_access_then_highest_id() {
        let owner = AgentId::new();
        let t0 = Utc::now();
        let items = vec![
            MemoryItem::new(owner, MemoryKind::Working, "a")
                .with_id(MemoryId::from_u128(1))
                .at(t0 + Duration::seconds(10)),
            MemoryItem::new(owner, MemoryKind::Working, "b")
                .with_id(MemoryId::from_u128(2))
                .at(t0),
            MemoryItem::new(owner, MemoryKind::Working, "c")
                .with_id(MemoryId::from_u128(3))
                .at(t0),
        ];
        assert_eq!(select_victim(&items, MemoryKind::Working), Some(2));
    }
}

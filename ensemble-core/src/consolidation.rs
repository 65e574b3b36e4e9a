//! Memory Consolidation: "What stuck with me"
//!
//! A working-memory item pushed out by capacity pressure is not always
//! lost: if the agent kept coming back to it (rehearsal), it moves into
//! episodic memory instead.
//!
//! Grounded in the rehearsal account of short- to long-term transfer:
//!   - Atkinson, R.C. & Shiffrin, R.M. (1968). "Human Memory: A Proposed System."

use crate::memory::{MemoryItem, MemoryKind};

/// Turn an evicted working item into an episodic one if it was rehearsed enough.
///
/// `promote_after_accesses == 0` disables promotion.
#[must_use]
pub fn promote_rehearsed(evicted: MemoryItem, promote_after_accesses: u32) -> Option<MemoryItem> {
    if evicted.kind != MemoryKind::Working
        || promote_after_accesses == 0
        || evicted.access_count < promote_after_accesses
    {
        return None;
    }
    Some(MemoryItem {
        kind: MemoryKind::Episodic,
        ..evicted
    })
}

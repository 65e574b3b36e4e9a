//! Core type definitions shared across the ENSEMBLE workspace.
//!
//! Identity newtypes, personality weights and the retrieval score wrapper.
//! All types are serializable so callers can persist them however they like.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier for a simulated character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Create a new random agent ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build a stable ID from a number (handy for fixtures and replays).
    #[must_use]
    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a memory item.
///
/// Ordered so retrieval can break ties by lowest id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    /// Create a new random memory ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build a stable ID from a number.
    #[must_use]
    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Personality
// ---------------------------------------------------------------------------

/// Numeric personality traits. Each ranges 0.0–1.0.
///
/// They emphasise sections of the decision prompt and drive the rule
/// table of the fallback policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonalityWeights {
    /// Willingness to start a fight (0 = pacifist, 1 = belligerent).
    pub aggression: f32,
    /// Preference for safety (0 = reckless, 1 = careful).
    pub caution: f32,
    /// Drive to explore and gather information.
    pub curiosity: f32,
    /// Preference for talking, trading and helping.
    pub sociability: f32,
    /// Attachment to the character's factions.
    pub loyalty: f32,
}

impl PersonalityWeights {
    /// Create a new set of weights, clamping every trait to [0, 1].
    #[must_use]
    pub fn new(aggression: f32, caution: f32, curiosity: f32, sociability: f32, loyalty: f32) -> Self {
        Self {
            aggression: clamp_unit(aggression),
            caution: clamp_unit(caution),
            curiosity: clamp_unit(curiosity),
            sociability: clamp_unit(sociability),
            loyalty: clamp_unit(loyalty),
        }
    }

    /// Value of a single trait.
    #[must_use]
    pub fn get(&self, trait_: Trait) -> f32 {
        match trait_ {
            Trait::Aggression => self.aggression,
            Trait::Caution => self.caution,
            Trait::Curiosity => self.curiosity,
            Trait::Sociability => self.sociability,
            Trait::Loyalty => self.loyalty,
        }
    }

    /// The trait with the highest weight (first in declaration order on ties).
    #[must_use]
    pub fn dominant(&self) -> Trait {
        let mut best = Trait::Aggression;
        for t in Trait::ALL {
            if self.get(t) > self.get(best) {
                best = t;
            }
        }
        best
    }
}

impl Default for PersonalityWeights {
    fn default() -> Self {
        Self {
            aggression: 0.5,
            caution: 0.5,
            curiosity: 0.5,
            sociability: 0.5,
            loyalty: 0.5,
        }
    }
}

/// Names of the personality traits, in a fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trait {
    /// See [`PersonalityWeights::aggression`].
    Aggression,
    /// See [`PersonalityWeights::caution`].
    Caution,
    /// See [`PersonalityWeights::curiosity`].
    Curiosity,
    /// See [`PersonalityWeights::sociability`].
    Sociability,
    /// See [`PersonalityWeights::loyalty`].
    Loyalty,
}

impl Trait {
    /// All traits in declaration order.
    pub const ALL: [Trait; 5] = [
        Trait::Aggression,
        Trait::Caution,
        Trait::Curiosity,
        Trait::Sociability,
        Trait::Loyalty,
    ];

    /// Lower-case label used in prompts and reasoning text.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Aggression => "aggression",
            Self::Caution => "caution",
            Self::Curiosity => "curiosity",
            Self::Sociability => "sociability",
            Self::Loyalty => "loyalty",
        }
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Retrieval Score
// ---------------------------------------------------------------------------

/// Composite score used to rank memories during retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RetrievalScore(pub OrderedFloat<f32>);

impl RetrievalScore {
    /// Create a retrieval score from a raw f32.
    #[must_use]
    pub fn new(score: f32) -> Self {
        Self(OrderedFloat(score))
    }

    /// Get the raw score value.
    #[must_use]
    pub fn value(self) -> f32 {
        self.0.into_inner()
    }
}

/// Clamp to [0, 1], mapping NaN to 0.
#[must_use]
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn personality_is_clamped() {
        let p = PersonalityWeights::new(2.0, -1.0, f32::NAN, 0.5, 0.5);
        assert_eq!(p.aggression, 1.0);
        assert_eq!(p.caution, 0.0);
        assert_eq!(p.curiosity, 0.0);
    }

    #[test]
    fn dominant_trait_prefers_declaration_order_on_ties() {
        let p = PersonalityWeights::default();
        assert_eq!(p.dominant(), Trait::Aggression);

        let cautious = PersonalityWeights::new(0.2, 0.9, 0.4, 0.1, 0.3);
        assert_eq!(cautious.dominant(), Trait::Caution);
    }

    #[test]
    fn memory_ids_order_by_value() {
        assert!(MemoryId::from_u128(1) < MemoryId::from_u128(2));
    }
}

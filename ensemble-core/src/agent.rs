//! Agent identity and runtime state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentId, PersonalityWeights};

/// A registered character: identity, personality and mutable runtime fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Stable identity.
    pub id: AgentId,
    /// Display name used in prompts and logs.
    pub name: String,
    /// Faction tags. Empty means "unknown" in prompts.
    pub factions: Vec<String>,
    /// Personality traits.
    pub personality: PersonalityWeights,
    /// Where the character currently is, if known.
    pub location: Option<String>,
    /// When the character's last action was applied.
    pub last_action_at: Option<DateTime<Utc>>,
}

impl AgentState {
    /// Create a new agent with a random ID and default personality.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(AgentId::new(), name)
    }

    /// Create a new agent with an explicit ID.
    #[must_use]
    pub fn with_id(id: AgentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            factions: Vec::new(),
            personality: PersonalityWeights::default(),
            location: None,
            last_action_at: None,
        }
    }

    /// Set the personality weights.
    #[must_use]
    pub fn with_personality(mut self, personality: PersonalityWeights) -> Self {
        self.personality = personality;
        self
    }

    /// Add a faction tag.
    #[must_use]
    pub fn with_faction(mut self, faction: impl Into<String>) -> Self {
        self.factions.push(faction.into());
        self
    }

    /// Set the current location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

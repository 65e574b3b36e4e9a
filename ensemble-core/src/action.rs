//! Character actions: the single output of every decision.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Urgency of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    /// Can wait.
    Low,
    /// Default.
    Normal,
    /// Should happen soon.
    High,
    /// Must happen now.
    Critical,
}

impl Default for ActionPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for ActionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Which path produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSource {
    /// Parsed from a language-model response.
    Inference,
    /// Chosen by the deterministic rule table.
    Fallback,
}

impl fmt::Display for ActionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inference => f.write_str("inference"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// One decided action. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterAction {
    action_type: String,
    target: Option<String>,
    parameters: BTreeMap<String, String>,
    priority: ActionPriority,
    reasoning: String,
    produced_by: ActionSource,
    timestamp: DateTime<Utc>,
}

impl CharacterAction {
    /// Start building an action of the given type.
    #[must_use]
    pub fn builder(action_type: impl Into<String>, produced_by: ActionSource) -> CharacterActionBuilder {
        CharacterActionBuilder {
            action_type: action_type.into(),
            target: None,
            parameters: BTreeMap::new(),
            priority: ActionPriority::Normal,
            reasoning: String::new(),
            produced_by,
            timestamp: None,
        }
    }

    /// Name of the action, always a member of the turn's action set
    /// (or the built-in `wait` when the set was empty).
    #[must_use]
    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    /// Optional target (entity, place or object).
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Free-form parameters, ordered by key.
    #[must_use]
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Urgency.
    #[must_use]
    pub fn priority(&self) -> ActionPriority {
        self.priority
    }

    /// Why the character chose this.
    #[must_use]
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Which path produced the action.
    #[must_use]
    pub fn produced_by(&self) -> ActionSource {
        self.produced_by
    }

    /// When the action was created.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether this action came from the fallback policy.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.produced_by == ActionSource::Fallback
    }
}

/// Builder for [`CharacterAction`].
#[derive(Debug, Clone)]
pub struct CharacterActionBuilder {
    action_type: String,
    target: Option<String>,
    parameters: BTreeMap<String, String>,
    priority: ActionPriority,
    reasoning: String,
    produced_by: ActionSource,
    timestamp: Option<DateTime<Utc>>,
}

impl CharacterActionBuilder {
    /// Set the target.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set the target if present.
    #[must_use]
    pub fn maybe_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    /// Add a parameter.
    #[must_use]
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn priority(mut self, priority: ActionPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the reasoning text.
    #[must_use]
    pub fn reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// Pin the timestamp (defaults to now).
    #[must_use]
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Finish the action.
    #[must_use]
    pub fn build(self) -> CharacterAction {
        CharacterAction {
            action_type: self.action_type,
            target: self.target,
            parameters: self.parameters,
            priority: self.priority,
            reasoning: self.reasoning,
            produced_by: self.produced_by,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let action = CharacterAction::builder("attack", ActionSource::Inference)
            .target("Raider")
            .parameter("weapon", "spear")
            .priority(ActionPriority::High)
            .reasoning("they threaten the camp")
            .build();

        assert_eq!(action.action_type(), "attack");
        assert_eq!(action.target(), Some("Raider"));
        assert_eq!(action.parameters().get("weapon").map(String::as_str), Some("spear"));
        assert_eq!(action.priority(), ActionPriority::High);
        assert!(!action.is_fallback());
    }

    #[test]
    fn priorities_are_ordered() {
        assert!(ActionPriority::Low < ActionPriority::Normal);
        assert!(ActionPriority::High < ActionPriority::Critical);
    }
}

//! World-state snapshots and the per-turn legal action vocabulary.
//!
//! A [`WorldStateSnapshot`] is built by the caller at the start of a turn and
//! never mutated while the turn runs; pipelines only ever see a shared
//! reference to it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::AgentId;

// ---------------------------------------------------------------------------
// Threat
// ---------------------------------------------------------------------------

/// Coarse danger signal for the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    /// Nothing threatening.
    None,
    /// Minor danger.
    Low,
    /// Noticeable danger.
    Moderate,
    /// Serious danger.
    High,
    /// Lethal, immediate danger.
    Critical,
}

impl ThreatLevel {
    /// Threat as a 0–1 signal.
    #[must_use]
    pub fn intensity(self) -> f32 {
        match self {
            Self::None => 0.0,
            Self::Low => 0.25,
            Self::Moderate => 0.5,
            Self::High => 0.75,
            Self::Critical => 1.0,
        }
    }
}

impl Default for ThreatLevel {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Broad family an action belongs to. Drives the fallback rule table.
///
/// Declaration order is the fixed tie-break order used by the fallback
/// policy (earlier wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    /// Protecting self or others: defend, guard, hide, flee.
    Defensive,
    /// Information gathering: investigate, scout, observe.
    Investigative,
    /// Talking, trading, helping.
    Social,
    /// Going somewhere.
    Movement,
    /// Attacking or threatening.
    Aggressive,
    /// Doing nothing in particular.
    Passive,
}

impl ActionCategory {
    /// Guess the category from an action name.
    #[must_use]
    pub fn infer(name: &str) -> Self {
        const AGGRESSIVE: &[&str] = &["attack", "fight", "strike", "ambush", "charge", "raid", "kill", "threaten", "duel"];
        const DEFENSIVE: &[&str] = &["defend", "guard", "hide", "flee", "retreat", "protect", "block", "fortify", "evade"];
        const INVESTIGATIVE: &[&str] = &["investigate", "scout", "observe", "explore", "search", "inspect", "study", "listen", "track"];
        const SOCIAL: &[&str] = &["talk", "negotiate", "trade", "help", "ally", "greet", "persuade", "bargain", "recruit", "gossip"];
        const MOVEMENT: &[&str] = &["move", "travel", "go", "walk", "approach", "follow", "return"];

        let name = normalize_action_name(name);
        let has = |words: &[&str]| name.split('_').any(|part| words.contains(&part));

        if has(AGGRESSIVE) {
            Self::Aggressive
        } else if has(DEFENSIVE) {
            Self::Defensive
        } else if has(INVESTIGATIVE) {
            Self::Investigative
        } else if has(SOCIAL) {
            Self::Social
        } else if has(MOVEMENT) {
            Self::Movement
        } else {
            Self::Passive
        }
    }
}

/// One legal action for a turn.
///
/// Deserialized names are normalized the same way as [`ActionSpec::new`];
/// a missing category is inferred from the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawActionSpec")]
pub struct ActionSpec {
    /// Normalized name (lower-case, `_` separated).
    pub name: String,
    /// Short human description shown in prompts.
    pub description: String,
    /// Action family.
    pub category: ActionCategory,
}

impl ActionSpec {
    /// Create an action with a category inferred from its name.
    #[must_use]
    pub fn new(name: impl AsRef<str>, description: impl Into<String>) -> Self {
        let name = normalize_action_name(name.as_ref());
        let category = ActionCategory::infer(&name);
        Self {
            name,
            description: description.into(),
            category,
        }
    }

    /// Override the inferred category.
    #[must_use]
    pub fn with_category(mut self, category: ActionCategory) -> Self {
        self.category = category;
        self
    }
}

#[derive(Deserialize)]
struct RawActionSpec {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: Option<ActionCategory>,
}

impl From<RawActionSpec> for ActionSpec {
    fn from(raw: RawActionSpec) -> Self {
        let spec = Self::new(raw.name, raw.description);
        match raw.category {
            Some(category) => spec.with_category(category),
            None => spec,
        }
    }
}

/// Ordered, de-duplicated set of legal actions.
///
/// Serialized as a plain list. Deserializing goes through [`ActionSet::push`],
/// so duplicates and blank names are dropped there too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ActionSpec>", into = "Vec<ActionSpec>")]
pub struct ActionSet {
    actions: Vec<ActionSpec>,
}

impl From<Vec<ActionSpec>> for ActionSet {
    fn from(specs: Vec<ActionSpec>) -> Self {
        specs.into_iter().collect()
    }
}

impl From<ActionSet> for Vec<ActionSpec> {
    fn from(set: ActionSet) -> Self {
        set.actions
    }
}

impl FromIterator<ActionSpec> for ActionSet {
    fn from_iter<I: IntoIterator<Item = ActionSpec>>(iter: I) -> Self {
        let mut set = Self::new();
        for spec in iter {
            set.push(spec);
        }
        set
    }
}

impl ActionSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from bare names with empty descriptions.
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for name in names {
            set.push(ActionSpec::new(name, ""));
        }
        set
    }

    /// Add an action. Duplicates (after normalization) and blank names are ignored.
    pub fn push(&mut self, spec: ActionSpec) {
        if spec.name.is_empty() || self.contains(&spec.name) {
            return;
        }
        self.actions.push(spec);
    }

    /// Builder-style [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, spec: ActionSpec) -> Self {
        self.push(spec);
        self
    }

    /// Whether an action with this name is legal.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Look up an action by (un-normalized) name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ActionSpec> {
        let key = normalize_action_name(name);
        self.actions.iter().find(|a| a.name == key)
    }

    /// Action at a zero-based position.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&ActionSpec> {
        self.actions.get(index)
    }

    /// Zero-based position of an action.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        let key = normalize_action_name(name);
        self.actions.iter().position(|a| a.name == key)
    }

    /// Iterate in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ActionSpec> {
        self.actions.iter()
    }

    /// Number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no action is legal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Lower-case, trim, and collapse spaces/dashes into `_`.
#[must_use]
pub fn normalize_action_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else if c == '_' || c == '-' || c.is_whitespace() {
            pending_sep = true;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Immutable, turn-scoped view of the world handed to every agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldStateSnapshot {
    /// Turn this snapshot belongs to.
    pub turn: u64,
    /// One-paragraph description of the situation.
    pub summary: String,
    /// Coarse danger signal.
    pub threat: ThreatLevel,
    /// Things worth pursuing this turn.
    pub opportunities: Vec<String>,
    /// Nearby named entities.
    pub entities: Vec<String>,
    /// Entities known to be hostile.
    pub hostiles: Vec<String>,
    /// Free-form context tags.
    pub tags: Vec<String>,
    /// Actions legal for every agent unless overridden.
    pub actions: ActionSet,
    /// Per-agent action overrides.
    pub agent_actions: BTreeMap<AgentId, ActionSet>,
}

impl WorldStateSnapshot {
    /// Start a snapshot for a turn.
    #[must_use]
    pub fn new(turn: u64, summary: impl Into<String>) -> Self {
        Self {
            turn,
            summary: summary.into(),
            ..Self::default()
        }
    }

    /// Set the threat level.
    #[must_use]
    pub fn with_threat(mut self, threat: ThreatLevel) -> Self {
        self.threat = threat;
        self
    }

    /// Set the default action set.
    #[must_use]
    pub fn with_actions(mut self, actions: ActionSet) -> Self {
        self.actions = actions;
        self
    }

    /// Override the action set for one agent.
    #[must_use]
    pub fn with_agent_actions(mut self, agent: AgentId, actions: ActionSet) -> Self {
        self.agent_actions.insert(agent, actions);
        self
    }

    /// Add an opportunity.
    #[must_use]
    pub fn with_opportunity(mut self, opportunity: impl Into<String>) -> Self {
        self.opportunities.push(opportunity.into());
        self
    }

    /// Add a nearby entity.
    #[must_use]
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entities.push(entity.into());
        self
    }

    /// Add a hostile entity.
    #[must_use]
    pub fn with_hostile(mut self, hostile: impl Into<String>) -> Self {
        self.hostiles.push(hostile.into());
        self
    }

    /// Add a context tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Legal actions for an agent this turn.
    #[must_use]
    pub fn actions_for(&self, agent: &AgentId) -> &ActionSet {
        self.agent_actions.get(agent).unwrap_or(&self.actions)
    }

    /// Opportunity signal in [0, 1]; saturates at three opportunities.
    #[must_use]
    pub fn opportunity_signal(&self) -> f32 {
        (self.opportunities.len() as f32 / 3.0).min(1.0)
    }

    /// All free text describing the situation, used for memory matching.
    #[must_use]
    pub fn context_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.summary.as_str()];
        parts.extend(self.opportunities.iter().map(String::as_str));
        parts.extend(self.entities.iter().map(String::as_str));
        parts.extend(self.hostiles.iter().map(String::as_str));
        parts.extend(self.tags.iter().map(String::as_str));
        let mut text = parts.join(" ");
        if self.threat != ThreatLevel::None {
            text.push_str(" threat danger");
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_normalized() {
        assert_eq!(normalize_action_name("  Move To "), "move_to");
        assert_eq!(normalize_action_name("move-to"), "move_to");
        assert_eq!(normalize_action_name("INVESTIGATE"), "investigate");
        assert_eq!(normalize_action_name("--"), "");
    }

    #[test]
    fn categories_are_inferred() {
        assert_eq!(ActionCategory::infer("attack"), ActionCategory::Aggressive);
        assert_eq!(ActionCategory::infer("flee"), ActionCategory::Defensive);
        assert_eq!(ActionCategory::infer("investigate"), ActionCategory::Investigative);
        assert_eq!(ActionCategory::infer("trade_goods"), ActionCategory::Social);
        assert_eq!(ActionCategory::infer("move_to"), ActionCategory::Movement);
        assert_eq!(ActionCategory::infer("wait"), ActionCategory::Passive);
    }

    #[test]
    fn action_set_dedupes_and_keeps_order() {
        let set = ActionSet::from_names(["wait", "Investigate", "investigate", "attack", ""]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.position("attack"), Some(2));
        assert!(set.contains("INVESTIGATE"));
        assert!(!set.contains("flee"));
    }

    #[test]
    fn per_agent_actions_override_default() {
        let agent = AgentId::from_u128(7);
        let snapshot = WorldStateSnapshot::new(1, "camp")
            .with_actions(ActionSet::from_names(["wait"]))
            .with_agent_actions(agent, ActionSet::from_names(["attack"]));

        assert!(snapshot.actions_for(&agent).contains("attack"));
        assert!(snapshot.actions_for(&AgentId::from_u128(8)).contains("wait"));
    }

    #[test]
    fn partial_snapshot_json_fills_defaults() {
        let snapshot: WorldStateSnapshot =
            serde_json::from_str(r#"{"turn": 3, "summary": "fog", "threat": "high"}"#).expect("valid json");
        assert_eq!(snapshot.turn, 3);
        assert_eq!(snapshot.threat, ThreatLevel::High);
        assert!(snapshot.actions.is_empty());
        assert!(snapshot.hostiles.is_empty());
    }

    #[test]
    fn host_json_actions_are_normalized_and_deduplicated() {
        let snapshot: WorldStateSnapshot = serde_json::from_str(
            r#"{"turn": 2, "actions": [
                {"name": "Attack", "description": "strike"},
                {"name": "attack", "description": "again"},
                {"name": "Move To", "category": "movement"},
                {"name": "  "}
            ]}"#,
        )
        .expect("valid json");

        let names: Vec<&str> = snapshot.actions.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["attack", "move_to"]);
        assert!(snapshot.actions.contains("attack"));
        assert_eq!(snapshot.actions.get("ATTACK").map(|a| a.category), Some(ActionCategory::Aggressive));
        assert_eq!(snapshot.actions.get("move to").map(|a| a.category), Some(ActionCategory::Movement));
    }

    #[test]
    fn action_set_serializes_as_a_list() {
        let set = ActionSet::from_names(["wait", "attack"]);
        let json = serde_json::to_value(&set).expect("serializable");
        assert_eq!(json[1]["name"], "attack");
        let back: ActionSet = serde_json::from_value(json).expect("round trip");
        assert_eq!(back, set);
    }
}

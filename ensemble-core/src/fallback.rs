//! Fallback decisions: personality shaping actions without a model.
//!
//! When inference fails or its reply can't be parsed, an agent still has to
//! act. The fallback scores every action category with a weighted rule
//! table keyed by personality trait and a coarse world signal:
//!
//!   score(category) = Σ weight × trait(agent) × signal(world)
//!
//! and picks the best-scoring legal action. Nothing here reads a clock or a
//! random source except the action timestamp, so the same inputs always
//! choose the same action.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::action::{ActionPriority, ActionSource, CharacterAction};
use crate::agent::AgentState;
use crate::types::Trait;
use crate::world::{ActionCategory, ActionSet, ActionSpec, ThreatLevel, WorldStateSnapshot};

/// Name of the action chosen when the action set is empty.
pub const WAIT_ACTION: &str = "wait";

/// World signal a rule reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Constant 1.0.
    Always,
    /// Threat intensity, 0–1.
    Threat,
    /// `1 - threat intensity`.
    Calm,
    /// Number of opportunities, saturating at three.
    Opportunity,
}

impl Signal {
    fn strength(self, world: &WorldStateSnapshot) -> f32 {
        match self {
            Self::Always => 1.0,
            Self::Threat => world.threat.intensity(),
            Self::Calm => 1.0 - world.threat.intensity(),
            Self::Opportunity => world.opportunity_signal(),
        }
    }
}

/// One row of the rule table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackRule {
    /// Category the rule votes for.
    pub category: ActionCategory,
    /// Personality trait that scales the vote.
    pub trait_: Trait,
    /// World signal that scales the vote.
    pub signal: Signal,
    /// Rule weight.
    pub weight: f32,
}

impl FallbackRule {
    const fn new(category: ActionCategory, trait_: Trait, signal: Signal, weight: f32) -> Self {
        Self {
            category,
            trait_,
            signal,
            weight,
        }
    }
}

const DEFAULT_RULES: &[FallbackRule] = &[
    FallbackRule::new(ActionCategory::Aggressive, Trait::Aggression, Signal::Threat, 1.0),
    FallbackRule::new(ActionCategory::Aggressive, Trait::Aggression, Signal::Always, 0.2),
    FallbackRule::new(ActionCategory::Defensive, Trait::Caution, Signal::Threat, 1.0),
    FallbackRule::new(ActionCategory::Defensive, Trait::Loyalty, Signal::Threat, 0.5),
    FallbackRule::new(ActionCategory::Investigative, Trait::Curiosity, Signal::Calm, 0.6),
    FallbackRule::new(ActionCategory::Investigative, Trait::Curiosity, Signal::Opportunity, 0.8),
    FallbackRule::new(ActionCategory::Social, Trait::Sociability, Signal::Calm, 0.6),
    FallbackRule::new(ActionCategory::Social, Trait::Sociability, Signal::Opportunity, 0.4),
    FallbackRule::new(ActionCategory::Social, Trait::Loyalty, Signal::Always, 0.1),
    FallbackRule::new(ActionCategory::Movement, Trait::Curiosity, Signal::Always, 0.2),
    FallbackRule::new(ActionCategory::Passive, Trait::Caution, Signal::Calm, 0.3),
    FallbackRule::new(ActionCategory::Passive, Trait::Caution, Signal::Always, 0.1),
];

/// Deterministic rule-based action generator.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    rules: Vec<FallbackRule>,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.to_vec(),
        }
    }
}

impl FallbackPolicy {
    /// Policy with a custom rule table.
    #[must_use]
    pub fn with_rules(rules: Vec<FallbackRule>) -> Self {
        Self { rules }
    }

    /// The active rule table.
    #[must_use]
    pub fn rules(&self) -> &[FallbackRule] {
        &self.rules
    }

    /// Score one category for this agent and world.
    #[must_use]
    pub fn score(&self, category: ActionCategory, agent: &AgentState, world: &WorldStateSnapshot) -> f32 {
        self.rules
            .iter()
            .filter(|rule| rule.category == category)
            .map(|rule| rule.weight * agent.personality.get(rule.trait_) * rule.signal.strength(world))
            .sum()
    }

    /// Choose an action. Never fails.
    #[must_use]
    pub fn decide(&self, agent: &AgentState, world: &WorldStateSnapshot, actions: &ActionSet) -> CharacterAction {
        self.decide_at(agent, world, actions, Utc::now())
    }

    /// [`decide`](Self::decide) with an explicit timestamp.
    #[must_use]
    pub fn decide_at(
        &self,
        agent: &AgentState,
        world: &WorldStateSnapshot,
        actions: &ActionSet,
        timestamp: DateTime<Utc>,
    ) -> CharacterAction {
        let (spec, score) = match self.best_action(agent, world, actions) {
            Some((spec, score)) => (spec.clone(), score),
            None => (
                ActionSpec::new(WAIT_ACTION, "stay put").with_category(ActionCategory::Passive),
                0.0,
            ),
        };

        let target = match spec.category {
            ActionCategory::Aggressive | ActionCategory::Defensive => world.hostiles.first().cloned(),
            ActionCategory::Investigative | ActionCategory::Social => world.opportunities.first().cloned(),
            ActionCategory::Movement | ActionCategory::Passive => None,
        };

        debug!(
            agent = %agent.id,
            action = %spec.name,
            category = ?spec.category,
            score,
            "fallback decision"
        );

        CharacterAction::builder(&spec.name, ActionSource::Fallback)
            .maybe_target(target)
            .priority(priority_for(world.threat))
            .parameter("category", format!("{:?}", spec.category).to_lowercase())
            .reasoning(format!(
                "fallback: {} scored {score:.2} for a {} personality under {} threat",
                spec.name,
                agent.personality.dominant(),
                world.threat
            ))
            .timestamp(timestamp)
            .build()
    }

    fn best_action<'a>(
        &self,
        agent: &AgentState,
        world: &WorldStateSnapshot,
        actions: &'a ActionSet,
    ) -> Option<(&'a ActionSpec, f32)> {
        let mut best: Option<(&ActionSpec, f32)> = None;
        for spec in actions.iter() {
            let score = self.score(spec.category, agent, world);
            let better = match best {
                None => true,
                // Strictly higher score, or equal score in an earlier category.
                // Equal score and category keeps the earlier action.
                Some((current, current_score)) => {
                    score > current_score || (score == current_score && spec.category < current.category)
                }
            };
            if better {
                best = Some((spec, score));
            }
        }
        best
    }
}

fn priority_for(threat: ThreatLevel) -> ActionPriority {
    match threat {
        ThreatLevel::None => ActionPriority::Low,
        ThreatLevel::Low | ThreatLevel::Moderate => ActionPriority::Normal,
        ThreatLevel::High => ActionPriority::High,
        ThreatLevel::Critical => ActionPriority::Critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PersonalityWeights;

    fn actions() -> ActionSet {
        ActionSet::from_names(["attack", "defend", "investigate", "negotiate", "wait"])
    }

    fn agent(personality: PersonalityWeights) -> AgentState {
        AgentState::new("Brenna").with_personality(personality)
    }

    #[test]
    fn aggressive_agent_attacks_under_threat() {
        let world = WorldStateSnapshot::new(1, "raiders at the gate")
            .with_threat(ThreatLevel::High)
            .with_hostile("raider captain");
        let brute = agent(PersonalityWeights::new(0.9, 0.1, 0.2, 0.2, 0.2));

        let action = FallbackPolicy::default().decide(&brute, &world, &actions());
        assert_eq!(action.action_type(), "attack");
        assert_eq!(action.target(), Some("raider captain"));
        assert_eq!(action.priority(), ActionPriority::High);
        assert!(action.is_fallback());
    }

    #[test]
    fn cautious_agent_defends_under_threat() {
        let world = WorldStateSnapshot::new(1, "raiders at the gate").with_threat(ThreatLevel::Critical);
        let guard = agent(PersonalityWeights::new(0.1, 0.9, 0.2, 0.2, 0.8));

        let action = FallbackPolicy::default().decide(&guard, &world, &actions());
        assert_eq!(action.action_type(), "defend");
        assert_eq!(action.priority(), ActionPriority::Critical);
    }

    #[test]
    fn curious_agent_investigates_when_calm() {
        let world = WorldStateSnapshot::new(1, "a quiet morning").with_opportunity("strange footprints");
        let scholar = agent(PersonalityWeights::new(0.1, 0.2, 0.9, 0.3, 0.3));

        let action = FallbackPolicy::default().decide(&scholar, &world, &actions());
        assert_eq!(action.action_type(), "investigate");
        assert_eq!(action.target(), Some("strange footprints"));
        assert_eq!(action.priority(), ActionPriority::Low);
    }

    #[test]
    fn empty_action_set_waits() {
        let world = WorldStateSnapshot::new(1, "nothing");
        let action = FallbackPolicy::default().decide(&agent(PersonalityWeights::default()), &world, &ActionSet::new());
        assert_eq!(action.action_type(), WAIT_ACTION);
        assert_eq!(action.target(), None);
    }

    #[test]
    fn equal_scores_prefer_category_order_then_declaration_order() {
        let world = WorldStateSnapshot::new(1, "nothing");
        let flat = agent(PersonalityWeights::default());
        let policy = FallbackPolicy::with_rules(Vec::new());

        let set = ActionSet::from_names(["wait", "negotiate", "guard", "defend"]);
        let action = policy.decide(&flat, &world, &set);
        assert_eq!(action.action_type(), "guard");
    }

    #[test]
    fn same_inputs_same_action() {
        let world = WorldStateSnapshot::new(3, "smoke on the ridge")
            .with_threat(ThreatLevel::Moderate)
            .with_opportunity("abandoned cart")
            .with_hostile("bandit");
        let npc = agent(PersonalityWeights::new(0.4, 0.6, 0.5, 0.3, 0.7));
        let policy = FallbackPolicy::default();
        let at = Utc::now();

        let first = policy.decide_at(&npc, &world, &actions(), at);
        for _ in 0..10 {
            assert_eq!(policy.decide_at(&npc, &world, &actions(), at), first);
        }
    }

    #[test]
    fn chosen_action_is_always_legal() {
        let world = WorldStateSnapshot::new(1, "x").with_threat(ThreatLevel::High);
        let set = ActionSet::from_names(["trade", "travel"]);
        let action = FallbackPolicy::default().decide(&agent(PersonalityWeights::new(1.0, 1.0, 0.0, 0.0, 0.0)), &world, &set);
        assert!(set.contains(action.action_type()));
    }
}

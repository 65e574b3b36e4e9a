//! Decision prompt for one agent on one turn.
//!
//! The prompt is a versioned, testable artifact: the same agent, snapshot,
//! memories and actions always render to the same bytes. Nothing here reads
//! the clock, and every float is printed with fixed precision.

use ensemble_core::agent::AgentState;
use ensemble_core::memory::MemoryItem;
use ensemble_core::types::Trait;
use ensemble_core::world::{ActionSet, WorldStateSnapshot};

/// Built-in decision template.
pub const DECISION_TEMPLATE: &str = r#"You are {name}, a member of {factions}, currently at {location}.

PERSONALITY:
{personality}
Your strongest trait is {dominant}.

SITUATION (turn {turn}, threat: {threat}):
{situation}

RECENT MEMORIES:
{memories}

AVAILABLE ACTIONS:
{actions}

INSTRUCTIONS:
Choose exactly one action from AVAILABLE ACTIONS. Answer on the first line
with its number and name, for example "1) {first_action}". You may add a line
"target: <name>" and one short sentence explaining why."#;

const UNKNOWN: &str = "unknown";
const NO_MEMORIES: &str = "(no relevant memories)";
const NO_ACTIONS: &str = "(no actions available)";

/// Single-pass template interpolation.
///
/// Replaces each `{key}` with its value. Unknown keys are left untouched and
/// substituted values are never re-scanned.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after
            .find('}')
            .and_then(|close| vars.iter().find(|(k, _)| *k == &after[..close]).map(|(_, v)| (close, *v)));
        match value {
            Some((close, v)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Renders decision prompts.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            template: DECISION_TEMPLATE.to_string(),
        }
    }
}

impl PromptBuilder {
    /// Builder using the built-in template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder using a custom template with the same placeholders.
    #[must_use]
    pub fn with_template(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Render the prompt. Never fails.
    #[must_use]
    pub fn build(
        &self,
        agent: &AgentState,
        snapshot: &WorldStateSnapshot,
        memories: &[MemoryItem],
        actions: &ActionSet,
    ) -> String {
        let factions = if agent.factions.is_empty() {
            UNKNOWN.to_string()
        } else {
            agent.factions.join(", ")
        };
        let location = agent.location.as_deref().filter(|l| !l.trim().is_empty()).unwrap_or(UNKNOWN);
        let turn = snapshot.turn.to_string();
        let threat = snapshot.threat.to_string();
        let first_action = actions.at(0).map_or("wait", |a| a.name.as_str());

        let personality = personality_block(agent);
        let situation = situation_block(snapshot);
        let memories = memory_block(memories);
        let actions = action_block(actions);

        render_template(
            &self.template,
            &[
                ("name", agent.name.as_str()),
                ("factions", factions.as_str()),
                ("location", location),
                ("personality", personality.as_str()),
                ("dominant", agent.personality.dominant().label()),
                ("turn", turn.as_str()),
                ("threat", threat.as_str()),
                ("situation", situation.as_str()),
                ("memories", memories.as_str()),
                ("actions", actions.as_str()),
                ("first_action", first_action),
            ],
        )
    }
}

fn personality_block(agent: &AgentState) -> String {
    Trait::ALL
        .iter()
        .map(|t| format!("- {}: {:.2}", t.label(), agent.personality.get(*t)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn situation_block(snapshot: &WorldStateSnapshot) -> String {
    let mut lines = Vec::new();
    let summary = snapshot.summary.trim();
    lines.push(if summary.is_empty() { "(nothing notable)" } else { summary }.to_string());
    for (label, items) in [
        ("Hostiles", &snapshot.hostiles),
        ("Opportunities", &snapshot.opportunities),
        ("Nearby", &snapshot.entities),
        ("Tags", &snapshot.tags),
    ] {
        if !items.is_empty() {
            lines.push(format!("{label}: {}", items.join(", ")));
        }
    }
    lines.join("\n")
}

fn memory_block(memories: &[MemoryItem]) -> String {
    if memories.is_empty() {
        return NO_MEMORIES.to_string();
    }
    memories
        .iter()
        .map(|m| {
            let content = m.content.split_whitespace().collect::<Vec<_>>().join(" ");
            format!("- [{}] {} (feeling {:+.1})", m.kind, content, m.emotional_weight)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn action_block(actions: &ActionSet) -> String {
    if actions.is_empty() {
        return NO_ACTIONS.to_string();
    }
    actions
        .iter()
        .enumerate()
        .map(|(i, a)| {
            if a.description.trim().is_empty() {
                format!("{}) {}", i + 1, a.name)
            } else {
                format!("{}) {} - {}", i + 1, a.name, a.description.trim())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

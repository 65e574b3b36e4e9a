//! Turning a model reply into a legal [`CharacterAction`].
//!
//! Strategies, first match wins:
//!
//! 1. a JSON object with an `action` field (bare, fenced, or embedded)
//! 2. the first meaningful line: `2) ...`, `2.`, `option 2`, or a bare action name
//! 3. the earliest whole-word mention of an action anywhere in the reply
//!
//! Whatever matched, the chosen name must belong to the turn's action set;
//! nothing outside the vocabulary is ever returned.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use ensemble_core::action::{ActionPriority, ActionSource, CharacterAction};
use ensemble_core::world::{ActionSet, ActionSpec, normalize_action_name};

use crate::error::Unparseable;

static FENCED: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("static regex"));
static OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").expect("static regex"));
static NUMBERED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:option|choice|action)\s*#?\s*)?(\d{1,3})(?:\s*[).:\-]|\s*$|\s+)\s*(.*)$").expect("static regex")
});
static TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btarget\s*[:=]\s*([^\n,.;]+)").expect("static regex"));
static AGAINST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bagainst\s+(?:the\s+)?([^\n,.;!?]+)").expect("static regex"));
static REASON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:reason(?:ing)?\s*[:=]|because)\s*([^\n]+)").expect("static regex"));

const MAX_TARGET_WORDS: usize = 4;
const MAX_REASONING_CHARS: usize = 280;

/// How the action name was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// JSON `action` field.
    Json,
    /// Numeric choice on the first line.
    Numbered,
    /// Bare action name on the first line.
    Name,
    /// Mention elsewhere in the text.
    Fuzzy,
}

impl MatchKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Numbered => "numbered",
            Self::Name => "name",
            Self::Fuzzy => "fuzzy",
        }
    }
}

/// Strict parser over a fixed per-turn vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    /// Create a parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse `raw` into an action drawn from `actions`.
    ///
    /// # Errors
    /// [`Unparseable`] when the reply is empty, there is nothing to choose
    /// from, or no legal action can be found.
    pub fn parse(&self, raw: &str, actions: &ActionSet) -> Result<CharacterAction, Unparseable> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(Unparseable::Empty);
        }
        if actions.is_empty() {
            return Err(Unparseable::NoActions);
        }

        if let Some(json) = extract_json(text) {
            return from_json(&json, text, actions);
        }

        let first = first_meaningful_line(text);
        let (spec, kind, first_line_rest) = match match_first_line(first, actions) {
            Some((spec, kind, rest)) => (spec, kind, Some(rest)),
            None => match fuzzy_match(text, actions) {
                Some(spec) => (spec, MatchKind::Fuzzy, None),
                None => {
                    return Err(Unparseable::NoMatch {
                        excerpt: text.chars().take(80).collect(),
                    });
                }
            },
        };

        let reasoning = extract_reasoning(text, first_line_rest);
        debug!(action = %spec.name, matched_by = kind.as_str(), "parsed model reply");

        Ok(CharacterAction::builder(&spec.name, ActionSource::Inference)
            .maybe_target(extract_target(text))
            .priority(infer_priority(text))
            .parameter("matched_by", kind.as_str())
            .reasoning(reasoning)
            .build())
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

fn extract_json(text: &str) -> Option<Value> {
    let candidates = [
        Some(text),
        FENCED.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str()),
        OBJECT.find(text).map(|m| m.as_str()),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(|candidate| serde_json::from_str::<Value>(candidate.trim()).ok())
        .find(|value| value.get("action").is_some_and(Value::is_string))
}

fn from_json(json: &Value, text: &str, actions: &ActionSet) -> Result<CharacterAction, Unparseable> {
    let name = json["action"].as_str().unwrap_or_default();
    let Some(spec) = actions.get(name) else {
        return Err(Unparseable::NoMatch {
            excerpt: text.chars().take(80).collect(),
        });
    };

    let target = json["target"]
        .as_str()
        .map(str::trim)
        .filter(|t| !t.is_empty() && !is_no_target(t))
        .map(str::to_string);
    let priority = json["priority"]
        .as_str()
        .and_then(parse_priority)
        .unwrap_or_else(|| infer_priority(text));
    let reasoning = json["reasoning"]
        .as_str()
        .or_else(|| json["reason"].as_str())
        .map(truncate_reasoning)
        .unwrap_or_default();

    debug!(action = %spec.name, matched_by = MatchKind::Json.as_str(), "parsed model reply");
    Ok(CharacterAction::builder(&spec.name, ActionSource::Inference)
        .maybe_target(target)
        .priority(priority)
        .parameter("matched_by", MatchKind::Json.as_str())
        .reasoning(reasoning)
        .build())
}

// ---------------------------------------------------------------------------
// First line
// ---------------------------------------------------------------------------

fn first_meaningful_line(text: &str) -> &str {
    text.lines()
        .map(|line| line.trim().trim_start_matches(['*', '-', '>', '#', '`']).trim())
        .find(|line| !line.is_empty())
        .unwrap_or_default()
}

/// Strip a leading `answer:` / `action:` / `choice:` label.
fn strip_label(line: &str) -> &str {
    for label in ["answer", "action", "choice", "decision"] {
        if let Some(head) = line.get(..label.len())
            && head.eq_ignore_ascii_case(label)
            && let Some(rest) = line[label.len()..].trim_start().strip_prefix(':')
        {
            return rest.trim();
        }
    }
    line
}

fn match_first_line<'a>(line: &str, actions: &'a ActionSet) -> Option<(&'a ActionSpec, MatchKind, String)> {
    let line = strip_label(line);

    if let Some(caps) = NUMBERED.captures(line) {
        let rest = caps.get(2).map_or("", |m| m.as_str()).trim();
        // A legal name right after the number beats the number itself.
        if let Some(spec) = leading_action(rest, actions) {
            return Some((spec, MatchKind::Name, after_action(rest, &spec.name)));
        }
        if let Some(spec) = caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| actions.at(i))
        {
            return Some((spec, MatchKind::Numbered, after_action(rest, &spec.name)));
        }
    }

    leading_action(line, actions).map(|spec| (spec, MatchKind::Name, after_action(line, &spec.name)))
}

/// The longest action whose name is the line's leading word sequence.
fn leading_action<'a>(line: &str, actions: &'a ActionSet) -> Option<&'a ActionSpec> {
    let words = words(line);
    actions
        .iter()
        .filter(|spec| {
            let name: Vec<&str> = spec.name.split('_').collect();
            words.len() >= name.len() && words[..name.len()].iter().zip(&name).all(|(w, n)| w == n)
        })
        .max_by_key(|spec| spec.name.split('_').count())
}

/// Whatever follows the action name on the line, minus separators.
fn after_action(line: &str, name: &str) -> String {
    let mut remaining = line;
    for part in name.split('_') {
        let trimmed = remaining.trim_start_matches(|c: char| !c.is_alphanumeric());
        remaining = trimmed.get(part.len()..).unwrap_or_default();
    }
    remaining
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | ')' | '.' | '*' | '\u{2013}' | '\u{2014}'))
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Fuzzy
// ---------------------------------------------------------------------------

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Earliest whole-word mention; longer names win ties.
fn fuzzy_match<'a>(text: &str, actions: &'a ActionSet) -> Option<&'a ActionSpec> {
    let words = words(text);
    let mut best: Option<(usize, usize, &ActionSpec)> = None;
    for spec in actions.iter() {
        let name: Vec<&str> = spec.name.split('_').collect();
        if name.is_empty() || words.len() < name.len() {
            continue;
        }
        let found = (0..=words.len() - name.len())
            .find(|&start| words[start..start + name.len()].iter().zip(&name).all(|(w, n)| w == n));
        if let Some(start) = found {
            let better = match best {
                None => true,
                Some((best_start, best_len, _)) => start < best_start || (start == best_start && name.len() > best_len),
            };
            if better {
                best = Some((start, name.len(), spec));
            }
        }
    }
    best.map(|(_, _, spec)| spec)
}

// ---------------------------------------------------------------------------
// Target, reasoning, priority
// ---------------------------------------------------------------------------

fn is_no_target(target: &str) -> bool {
    matches!(
        target.to_ascii_lowercase().as_str(),
        "none" | "nobody" | "no one" | "n/a" | "na" | "null" | "-"
    )
}

fn extract_target(text: &str) -> Option<String> {
    let raw = TARGET
        .captures(text)
        .or_else(|| AGAINST.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())?;
    let target = raw
        .split_whitespace()
        .take(MAX_TARGET_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .to_string();
    (!target.is_empty() && !is_no_target(&target)).then_some(target)
}

fn extract_reasoning(text: &str, first_line_rest: Option<String>) -> String {
    if let Some(caps) = REASON.captures(text)
        && let Some(m) = caps.get(1)
    {
        return truncate_reasoning(m.as_str());
    }
    if let Some(rest) = first_line_rest.filter(|r| !r.is_empty()) {
        return truncate_reasoning(&rest);
    }
    let tail: Vec<&str> = text
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.to_ascii_lowercase().starts_with("target"))
        .collect();
    truncate_reasoning(&tail.join(" "))
}

fn truncate_reasoning(text: &str) -> String {
    text.trim().chars().take(MAX_REASONING_CHARS).collect()
}

fn parse_priority(value: &str) -> Option<ActionPriority> {
    match normalize_action_name(value).as_str() {
        "low" => Some(ActionPriority::Low),
        "normal" | "medium" => Some(ActionPriority::Normal),
        "high" => Some(ActionPriority::High),
        "critical" | "urgent" => Some(ActionPriority::Critical),
        _ => None,
    }
}

/// Best-effort urgency from wording.
#[must_use]
pub fn infer_priority(text: &str) -> ActionPriority {
    const CRITICAL: &[&str] = &["immediately", "urgent", "urgently", "critical", "emergency", "now"];
    const HIGH: &[&str] = &["quickly", "important", "danger", "dangerous", "soon", "hurry"];
    const LOW: &[&str] = &["eventually", "later", "leisurely", "whenever", "idle"];

    let words = words(text);
    let has = |list: &[&str]| words.iter().any(|w| list.contains(&w.as_str()));
    if has(CRITICAL) {
        ActionPriority::Critical
    } else if has(HIGH) {
        ActionPriority::High
    } else if has(LOW) {
        ActionPriority::Low
    } else {
        ActionPriority::Normal
    }
}

//! Property-Based Tests for the response parser.
//!
//! Whatever the model says, a parsed action is always one of the actions
//! that were offered.

use proptest::prelude::*;

use ensemble_core::world::ActionSet;
use ensemble_llm::ResponseParser;

const VOCABULARY: &[&str] = &[
    "wait", "attack", "defend", "flee", "investigate", "negotiate", "trade", "move to", "rest", "hide",
];

fn arb_actions() -> impl Strategy<Value = ActionSet> {
    prop::sample::subsequence(VOCABULARY.to_vec(), 0..=VOCABULARY.len()).prop_map(ActionSet::from_names)
}

/// Replies mixing numbers, vocabulary words, JSON fragments and noise.
fn arb_reply() -> impl Strategy<Value = String> {
    let fragment = prop_oneof![
        prop::sample::select(VOCABULARY.to_vec()).prop_map(str::to_string),
        (0u32..15).prop_map(|n| format!("{n})")),
        Just("option".to_string()),
        Just("target:".to_string()),
        Just("{\"action\": \"dance\"}".to_string()),
        Just("{\"action\": \"attack\"}".to_string()),
        Just("\n".to_string()),
        "[a-zA-Z ]{0,12}",
    ];
    prop::collection::vec(fragment, 0..8).prop_map(|parts| parts.join(" "))
}

proptest! {
    #[test]
    fn parsed_actions_are_always_legal(reply in arb_reply(), actions in arb_actions()) {
        if let Ok(action) = ResponseParser::new().parse(&reply, &actions) {
            prop_assert!(actions.contains(action.action_type()), "{} not in {:?}", action.action_type(), actions);
        }
    }

    #[test]
    fn arbitrary_text_never_panics(reply in ".{0,200}", actions in arb_actions()) {
        let _ = ResponseParser::new().parse(&reply, &actions);
    }

    #[test]
    fn numbered_choice_picks_that_position(actions in arb_actions(), pick in 0usize..10) {
        prop_assume!(!actions.is_empty());
        let index = pick % actions.len();
        let reply = format!("{})", index + 1);
        let action = ResponseParser::new().parse(&reply, &actions).expect("numbered reply");
        prop_assert_eq!(action.action_type(), actions.at(index).expect("in range").name.as_str());
    }
}

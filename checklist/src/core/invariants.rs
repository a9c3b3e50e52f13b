//! Semantic invariants of a single state version.

use std::collections::HashSet;

use crate::checklist::MAX_SUB_ITEMS;
use crate::core::state::{MAX_REFINEMENT_ROUNDS, Phase, ResearchState};

/// Check data-model invariants:
/// - At most 3 refinement exchanges, numbered 1..=n in order
/// - Only the newest exchange may be unanswered, and only while refining
/// - At most 5 sub-items per item
/// - No duplicate item or sub-item ids
/// - Phase data consistent with the rest of the state
pub fn validate_state(state: &ResearchState) -> Vec<String> {
    let mut errors = Vec::new();
    validate_refinements(state, &mut errors);
    validate_items(state, &mut errors);
    validate_phase(state, &mut errors);
    errors
}

fn validate_refinements(state: &ResearchState, errors: &mut Vec<String>) {
    let rounds = state.refinements.len();
    if rounds > MAX_REFINEMENT_ROUNDS as usize {
        errors.push(format!(
            "{} refinement exchanges exceed the limit of {}",
            rounds, MAX_REFINEMENT_ROUNDS
        ));
    }

    for (index, exchange) in state.refinements.iter().enumerate() {
        let expected_round = index as u32 + 1;
        if exchange.round != expected_round {
            errors.push(format!(
                "refinement exchange {} has round {} (expected {})",
                index, exchange.round, expected_round
            ));
        }
        if exchange.question.trim().is_empty() {
            errors.push(format!("refinement round {} has an empty question", exchange.round));
        }
        let is_last = index + 1 == rounds;
        if !is_last && !exchange.is_answered() {
            errors.push(format!(
                "refinement round {} is unanswered but a later round exists",
                exchange.round
            ));
        }
    }

    if state.has_pending_question() && !matches!(state.phase, Phase::Refining { .. }) {
        errors.push(format!(
            "unanswered refinement question outside refining (phase {})",
            state.phase.label()
        ));
    }
}

fn validate_items(state: &ResearchState, errors: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for item in state.items.as_ref() {
        if !seen.insert(item.id.as_str()) {
            errors.push(format!("duplicate id '{}'", item.id));
        }
        if item.sub_items.len() > MAX_SUB_ITEMS {
            errors.push(format!(
                "{}: {} sub-items exceed the limit of {}",
                item.id,
                item.sub_items.len(),
                MAX_SUB_ITEMS
            ));
        }
        for sub in &item.sub_items {
            if !seen.insert(sub.id.as_str()) {
                errors.push(format!("duplicate id '{}' at {}/{}", sub.id, item.id, sub.id));
            }
        }
    }
}

fn validate_phase(state: &ResearchState, errors: &mut Vec<String>) {
    let phase = state.phase.label();
    let needs_description = state.phase != Phase::AwaitingDescription;
    if needs_description && state.task_description.is_none() {
        errors.push(format!("{}: missing task description", phase));
    }

    let needs_checklist = !matches!(
        state.phase,
        Phase::AwaitingDescription | Phase::GeneratingInitial
    );
    if needs_checklist && !state.has_checklist() {
        errors.push(format!("{}: checklist is empty", phase));
    }

    if state.phase
        == (Phase::Refining {
            ambiguity_open: false,
        })
        && state.refinements.is_empty()
    {
        errors.push("refining with closed ambiguity requires at least one exchange".to_string());
    }

    if state.phase == Phase::Completing && !state.all_items_done() {
        errors.push("completing: not every item is done".to_string());
    }

    match (&state.phase, state.summary.is_some()) {
        (Phase::Done, false) => errors.push("done: missing summary".to_string()),
        (Phase::Done, true) => {}
        (_, true) => errors.push(format!("{}: summary present before completion", phase)),
        (_, false) => {}
    }

    if state.completion_notes.is_some() && state.summary.is_none() {
        errors.push("completion notes without summary".to_string());
    }

    if state.is_persisted() && !state.approved() {
        errors.push(format!("{}: artifact saved before approval", phase));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{answered, item, item_with_sub_items, state_in, sub_item, unanswered};
    use std::sync::Arc;

    fn refining() -> Phase {
        Phase::Refining {
            ambiguity_open: true,
        }
    }

    #[test]
    fn valid_refining_state_passes() {
        let mut state = state_in(refining(), vec![item("item-1")]);
        state.refinements = Arc::new(vec![answered(1, "Q1", "A1"), unanswered(2, "Q2")]);
        assert!(validate_state(&state).is_empty());
    }

    #[test]
    fn fourth_round_is_rejected() {
        let mut state = state_in(refining(), vec![item("item-1")]);
        state.refinements = Arc::new(vec![
            answered(1, "Q1", "A1"),
            answered(2, "Q2", "A2"),
            answered(3, "Q3", "A3"),
            unanswered(4, "Q4"),
        ]);
        let errors = validate_state(&state);
        assert!(errors.iter().any(|err| err.contains("exceed the limit of 3")));
    }

    #[test]
    fn round_after_unanswered_round_is_rejected() {
        let mut state = state_in(refining(), vec![item("item-1")]);
        state.refinements = Arc::new(vec![unanswered(1, "Q1"), unanswered(2, "Q2")]);
        let errors = validate_state(&state);
        assert!(errors.iter().any(|err| err.contains("round 1 is unanswered")));
    }

    #[test]
    fn sixth_sub_item_is_rejected() {
        let subs = (1..=6).map(|n| sub_item(&format!("item-1-{n}"))).collect();
        let state = state_in(
            Phase::AwaitingApproval { approved: false },
            vec![item_with_sub_items("item-1", subs)],
        );
        let errors = validate_state(&state);
        assert_eq!(errors, vec!["item-1: 6 sub-items exceed the limit of 5".to_string()]);
    }

    #[test]
    fn duplicate_ids_across_levels_are_rejected() {
        let state = state_in(
            Phase::AwaitingApproval { approved: false },
            vec![
                item_with_sub_items("item-1", vec![sub_item("item-2")]),
                item("item-2"),
            ],
        );
        let errors = validate_state(&state);
        assert!(errors.iter().any(|err| err.contains("duplicate id 'item-2'")));
    }

    #[test]
    fn summary_only_allowed_when_done() {
        let mut state = state_in(Phase::tracking(), vec![item("item-1")]);
        state.summary = Some("early".to_string());
        state.artifacts = Arc::new(vec!["a.json".to_string()]);
        let errors = validate_state(&state);
        assert_eq!(
            errors,
            vec!["active_tracking: summary present before completion".to_string()]
        );
    }

    #[test]
    fn saved_artifact_requires_approval() {
        let mut state = state_in(Phase::AwaitingApproval { approved: false }, vec![item("item-1")]);
        state.artifacts = Arc::new(vec!["a.json".to_string()]);
        let errors = validate_state(&state);
        assert!(errors.iter().any(|err| err.contains("saved before approval")));
    }
}

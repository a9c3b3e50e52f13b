//! Deterministic selection of the next workflow action.
//!
//! [`decide`] evaluates an ordered rule table over predicates derived from the
//! state. The first matching rule wins, so the same state always yields the
//! same [`Decision`] and a workflow can resume from any stored version.

use crate::core::state::{MAX_REFINEMENT_ROUNDS, Phase, ResearchState};
use crate::core::types::{Decision, NoopReason, SkillInput};

/// Select the single next action for `state`.
pub fn decide(state: &ResearchState) -> Decision {
    // 1. Nothing to work on yet.
    if state.phase == Phase::AwaitingDescription {
        return Decision::noop(NoopReason::AwaitingDescription);
    }

    let task_description = state.task_description.clone().unwrap_or_default();

    // 2. Description present, no checklist yet.
    if state.phase == Phase::GeneratingInitial {
        return Decision::skill(SkillInput::GenerateInitialChecklist { task_description });
    }

    if let Phase::Refining { ambiguity_open } = state.phase {
        let rounds_left = state.refinement_rounds() < MAX_REFINEMENT_ROUNDS;

        // 3. Open ambiguity and room for another round.
        if ambiguity_open && rounds_left && !state.has_pending_question() {
            return Decision::skill(SkillInput::AskClarifyingQuestion {
                task_description,
                items: state.items.clone(),
                refinements: state.refinements.clone(),
                round: state.refinement_rounds() + 1,
            });
        }

        // 4. Waiting on the user's answer.
        if state.has_pending_question() {
            return Decision::noop(NoopReason::AwaitingUserAnswer);
        }

        // 5. Answers collected, merge them into the checklist.
        return Decision::skill(SkillInput::IncorporateRefinements {
            task_description,
            items: state.items.clone(),
            refinements: state.refinements.clone(),
        });
    }

    // 6. Merged, waiting for approval.
    if state.ready_for_approval() {
        return Decision::noop(NoopReason::AwaitingApproval);
    }

    // 7. Approved but never saved; the caller persists.
    if state.approved() && !state.is_persisted() {
        return Decision::noop(NoopReason::ReadyToPersist);
    }

    // 8. Tracking with queued progress text.
    if let Some(update) = state.next_queued_update() {
        return Decision::skill(SkillInput::InterpretProgressUpdate {
            items: state.items.clone(),
            update: update.to_string(),
        });
    }

    // 9. Nothing queued and work remains.
    if !state.all_items_done() {
        if state.clarification().is_some() {
            return Decision::noop(NoopReason::AwaitingProgressClarification);
        }
        return Decision::noop(NoopReason::AwaitingProgressInput);
    }

    // 10. Everything done, summarize once.
    if !state.has_summary() {
        return Decision::skill(SkillInput::GenerateSummary {
            task_description,
            items: state.items.clone(),
            refinements: state.refinements.clone(),
            progress_log: state.progress_log.clone(),
        });
    }

    // 11. Terminal.
    Decision::noop(NoopReason::WorkflowComplete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::ItemStatus;
    use crate::core::state::RefinementExchange;
    use crate::core::types::SkillId;
    use crate::test_support::{
        answered, fixed_time, item, item_with_sub_items, state_in, sub_item, unanswered,
    };
    use std::sync::Arc;

    fn skill_of(state: &ResearchState) -> Option<SkillId> {
        decide(state).skill_id()
    }

    fn reason_of(state: &ResearchState) -> Option<NoopReason> {
        decide(state).noop_reason()
    }

    #[test]
    fn initial_state_waits_for_description() {
        let state = ResearchState::new(fixed_time());
        assert_eq!(reason_of(&state), Some(NoopReason::AwaitingDescription));
    }

    #[test]
    fn description_without_checklist_generates() {
        let mut state = state_in(Phase::GeneratingInitial, Vec::new());
        state.task_description = Some("Plan a conference".to_string());
        assert_eq!(
            decide(&state),
            Decision::skill(SkillInput::GenerateInitialChecklist {
                task_description: "Plan a conference".to_string()
            })
        );
    }

    #[test]
    fn open_ambiguity_asks_next_round() {
        let mut state = state_in(
            Phase::Refining {
                ambiguity_open: true,
            },
            vec![item("item-1")],
        );
        state.refinements = Arc::new(vec![answered(1, "Budget?", "10k")]);

        match decide(&state) {
            Decision::LlmSkill {
                input: SkillInput::AskClarifyingQuestion { round, .. },
                ..
            } => assert_eq!(round, 2),
            other => panic!("unexpected decision {other:?}"),
        }
    }

    #[test]
    fn pending_question_waits_for_answer() {
        let mut state = state_in(
            Phase::Refining {
                ambiguity_open: true,
            },
            vec![item("item-1")],
        );
        state.refinements = Arc::new(vec![unanswered(1, "Budget?")]);
        assert_eq!(reason_of(&state), Some(NoopReason::AwaitingUserAnswer));
    }

    #[test]
    fn exhausted_rounds_merge_even_with_open_ambiguity() {
        let mut state = state_in(
            Phase::Refining {
                ambiguity_open: true,
            },
            vec![item("item-1")],
        );
        state.refinements = Arc::new(vec![
            answered(1, "Q1", "A1"),
            answered(2, "Q2", "A2"),
            answered(3, "Q3", "A3"),
        ]);
        assert_eq!(skill_of(&state), Some(SkillId::IncorporateRefinements));
    }

    #[test]
    fn closed_ambiguity_merges_answers() {
        let mut state = state_in(
            Phase::Refining {
                ambiguity_open: false,
            },
            vec![item("item-1")],
        );
        state.refinements = Arc::new(vec![answered(1, "Q1", "A1")]);
        assert_eq!(skill_of(&state), Some(SkillId::IncorporateRefinements));
    }

    #[test]
    fn approval_then_persist_gates() {
        let state = state_in(
            Phase::AwaitingApproval { approved: false },
            vec![item("item-1")],
        );
        assert_eq!(reason_of(&state), Some(NoopReason::AwaitingApproval));

        let state = state_in(
            Phase::AwaitingApproval { approved: true },
            vec![item("item-1")],
        );
        assert_eq!(reason_of(&state), Some(NoopReason::ReadyToPersist));
    }

    #[test]
    fn queued_update_is_interpreted_oldest_first() {
        let mut state = state_in(
            Phase::ActiveTracking {
                queued_updates: vec!["first".to_string(), "second".to_string()],
                clarification: None,
            },
            vec![item("item-1")],
        );
        state.artifacts = Arc::new(vec!["checklist.json".to_string()]);

        match decide(&state) {
            Decision::LlmSkill {
                input: SkillInput::InterpretProgressUpdate { update, .. },
                ..
            } => assert_eq!(update, "first"),
            other => panic!("unexpected decision {other:?}"),
        }
    }

    #[test]
    fn tracking_without_updates_waits_for_progress() {
        let mut state = state_in(Phase::tracking(), vec![item("item-1")]);
        state.artifacts = Arc::new(vec!["checklist.json".to_string()]);
        assert_eq!(reason_of(&state), Some(NoopReason::AwaitingProgressInput));

        state.phase = Phase::ActiveTracking {
            queued_updates: Vec::new(),
            clarification: Some("Which venue?".to_string()),
        };
        assert_eq!(
            reason_of(&state),
            Some(NoopReason::AwaitingProgressClarification)
        );
    }

    #[test]
    fn summary_requires_every_sub_item_done() {
        let mut parent = item_with_sub_items("item-1", vec![sub_item("item-1-1")]);
        parent.status = ItemStatus::Done;
        let mut state = state_in(Phase::Completing, vec![parent]);
        state.artifacts = Arc::new(vec!["checklist.json".to_string()]);
        assert_eq!(reason_of(&state), Some(NoopReason::AwaitingProgressInput));

        Arc::make_mut(&mut state.items)[0].sub_items[0].status = ItemStatus::Done;
        assert_eq!(skill_of(&state), Some(SkillId::GenerateSummary));

        state.summary = Some("All done".to_string());
        state.phase = Phase::Done;
        assert_eq!(reason_of(&state), Some(NoopReason::WorkflowComplete));
    }

    /// Repeated calls on the same state yield identical decisions.
    #[test]
    fn decide_is_referentially_transparent() {
        let mut state = state_in(
            Phase::Refining {
                ambiguity_open: true,
            },
            vec![item("item-1")],
        );
        state.refinements = Arc::new(vec![RefinementExchange {
            round: 1,
            question: "Q".to_string(),
            intent: None,
            answer: Some("A".to_string()),
        }]);
        let snapshot = state.clone();
        let first = decide(&state);
        for _ in 0..5 {
            assert_eq!(decide(&state), first);
        }
        assert_eq!(state, snapshot);
    }
}

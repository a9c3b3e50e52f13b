//! Append-only history checks between consecutive state versions.

use crate::core::state::ResearchState;

/// Validate that `next` only extends what `prev` recorded.
///
/// For each consecutive pair this check enforces:
/// - `version` advances by exactly one.
/// - Progress log, conversation log and saved artifacts keep `prev` as a prefix.
/// - Answered refinement exchanges are unchanged; an open exchange may only
///   receive its answer.
/// - A generated summary never changes.
///
/// Returns a list of stable error messages.
pub fn check_append_only(prev: &ResearchState, next: &ResearchState) -> Vec<String> {
    let mut errors = Vec::new();

    if next.version != prev.version + 1 {
        errors.push(format!(
            "version moved from {} to {} (expected {})",
            prev.version,
            next.version,
            prev.version + 1
        ));
    }

    check_prefix(
        "progress log",
        prev.progress_log.as_slice(),
        next.progress_log.as_slice(),
        &mut errors,
    );
    check_prefix(
        "conversation log",
        prev.conversation_log.as_slice(),
        next.conversation_log.as_slice(),
        &mut errors,
    );
    check_prefix(
        "artifact list",
        prev.artifacts.as_slice(),
        next.artifacts.as_slice(),
        &mut errors,
    );

    for (index, exchange) in prev.refinements.iter().enumerate() {
        match next.refinements.get(index) {
            None => errors.push(format!("refinement round {} removed", exchange.round)),
            Some(after) if exchange.is_answered() => {
                if after != exchange {
                    errors.push(format!("answered refinement round {} changed", exchange.round));
                }
            }
            Some(after) => {
                if after.round != exchange.round
                    || after.question != exchange.question
                    || after.intent != exchange.intent
                {
                    errors.push(format!("open refinement round {} rewritten", exchange.round));
                }
            }
        }
    }

    if let Some(summary) = &prev.summary
        && next.summary.as_ref() != Some(summary)
    {
        errors.push("summary changed after generation".to_string());
    }

    errors
}

fn check_prefix<T: PartialEq>(label: &str, prev: &[T], next: &[T], errors: &mut Vec<String>) {
    if next.len() < prev.len() {
        errors.push(format!(
            "{} shrank from {} to {} entries",
            label,
            prev.len(),
            next.len()
        ));
        return;
    }
    if let Some(index) = prev.iter().zip(next).position(|(before, after)| before != after) {
        errors.push(format!("{} entry {} was edited", label, index));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{Actor, ConversationLogEntry, Phase};
    use crate::test_support::{answered, fixed_time, item, state_in, unanswered};
    use std::sync::Arc;

    fn entry(content: &str) -> ConversationLogEntry {
        ConversationLogEntry {
            timestamp: fixed_time(),
            actor: Actor::User,
            content: content.to_string(),
        }
    }

    fn successor(prev: &ResearchState) -> ResearchState {
        let mut next = prev.clone();
        next.version += 1;
        next
    }

    /// Appending entries and answering the open round is allowed.
    #[test]
    fn allows_appends_and_answering_open_round() {
        let mut prev = state_in(
            Phase::Refining {
                ambiguity_open: true,
            },
            vec![item("item-1")],
        );
        prev.conversation_log = Arc::new(vec![entry("hello")]);
        prev.refinements = Arc::new(vec![unanswered(1, "Budget?")]);

        let mut next = successor(&prev);
        Arc::make_mut(&mut next.conversation_log).push(entry("10k"));
        next.refinements = Arc::new(vec![answered(1, "Budget?", "10k")]);

        assert!(check_append_only(&prev, &next).is_empty());
    }

    #[test]
    fn reports_edited_log_entry() {
        let mut prev = state_in(Phase::tracking(), vec![item("item-1")]);
        prev.conversation_log = Arc::new(vec![entry("hello")]);
        let mut next = successor(&prev);
        next.conversation_log = Arc::new(vec![entry("rewritten")]);

        let errors = check_append_only(&prev, &next);
        assert_eq!(errors, vec!["conversation log entry 0 was edited".to_string()]);
    }

    #[test]
    fn reports_removed_and_changed_refinements() {
        let mut prev = state_in(
            Phase::Refining {
                ambiguity_open: true,
            },
            vec![item("item-1")],
        );
        prev.refinements = Arc::new(vec![answered(1, "Q1", "A1"), answered(2, "Q2", "A2")]);
        let mut next = successor(&prev);
        next.refinements = Arc::new(vec![answered(1, "Q1", "changed")]);

        let errors = check_append_only(&prev, &next);
        assert!(errors.iter().any(|err| err.contains("round 1 changed")));
        assert!(errors.iter().any(|err| err.contains("round 2 removed")));
    }

    #[test]
    fn reports_version_skip() {
        let prev = state_in(Phase::tracking(), vec![item("item-1")]);
        let mut next = prev.clone();
        next.version += 2;
        let errors = check_append_only(&prev, &next);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("version moved"));
    }
}

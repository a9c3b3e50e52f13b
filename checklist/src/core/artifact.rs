//! Saved checklist snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checklist::ChecklistItem;
use crate::core::error::WorkflowError;
use crate::core::state::{ProgressLogEntry, RefinementExchange, ResearchState};

/// Everything needed to reconstruct a checklist as it stood when saved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ChecklistArtifact {
    pub task_description: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ChecklistItem>,
    pub refinements: Vec<RefinementExchange>,
    pub progress_log: Vec<ProgressLogEntry>,
    pub completion_notes: Option<String>,
    pub summary: Option<String>,
}

impl ChecklistArtifact {
    /// Snapshot an approved state.
    pub fn from_state(
        state: &ResearchState,
        created_at: DateTime<Utc>,
    ) -> Result<Self, WorkflowError> {
        if !state.approved() {
            return Err(WorkflowError::invariant(format!(
                "checklist cannot be saved before approval (phase {})",
                state.phase.label()
            )));
        }
        let task_description = state
            .task_description
            .clone()
            .ok_or_else(|| WorkflowError::invariant("checklist has no task description"))?;
        Ok(Self {
            task_description,
            created_at,
            items: state.items.to_vec(),
            refinements: state.refinements.to_vec(),
            progress_log: state.progress_log.to_vec(),
            completion_notes: state.completion_notes.clone(),
            summary: state.summary.clone(),
        })
    }

    /// File name used by file-backed repositories, e.g. `checklist_20250101T120000.123456Z.json`.
    pub fn file_name(&self) -> String {
        format!(
            "checklist_{}.json",
            self.created_at.format("%Y%m%dT%H%M%S%.6fZ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::Phase;
    use crate::test_support::{fixed_time, item, state_in};

    #[test]
    fn snapshot_requires_approval() {
        let state = state_in(Phase::AwaitingApproval { approved: false }, vec![item("item-1")]);
        assert!(ChecklistArtifact::from_state(&state, fixed_time()).is_err());

        let state = state_in(Phase::AwaitingApproval { approved: true }, vec![item("item-1")]);
        let artifact = ChecklistArtifact::from_state(&state, fixed_time()).expect("snapshot");
        assert_eq!(artifact.items.len(), 1);
        assert_eq!(artifact.summary, None);
    }

    #[test]
    fn file_name_embeds_utc_timestamp() {
        let state = state_in(Phase::AwaitingApproval { approved: true }, vec![item("item-1")]);
        let artifact = ChecklistArtifact::from_state(&state, fixed_time()).expect("snapshot");
        assert_eq!(artifact.file_name(), "checklist_20250101T120000.000000Z.json");
    }
}

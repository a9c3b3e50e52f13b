//! Canonical per-workflow state record.
//!
//! A [`ResearchState`] is one immutable version in a workflow's history. The
//! collections are reference counted so a new version shares every collection
//! it does not touch with its predecessor; only changed substructures are
//! rebuilt by the memory manager.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checklist::{ChecklistItem, ItemStatus};

/// Maximum number of clarification rounds per workflow.
pub const MAX_REFINEMENT_ROUNDS: u32 = 3;

/// Workflow phase with the minimal data each phase needs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Phase {
    AwaitingDescription,
    GeneratingInitial,
    Refining {
        /// Open while the checklist still has unresolved ambiguity.
        ambiguity_open: bool,
    },
    AwaitingApproval {
        approved: bool,
    },
    ActiveTracking {
        /// Progress texts recorded but not yet interpreted, oldest first.
        queued_updates: Vec<String>,
        /// Prompt from the last interpretation when it could not map the update.
        clarification: Option<String>,
    },
    Completing,
    Done,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::AwaitingDescription => "awaiting_description",
            Phase::GeneratingInitial => "generating_initial",
            Phase::Refining { .. } => "refining",
            Phase::AwaitingApproval { .. } => "awaiting_approval",
            Phase::ActiveTracking { .. } => "active_tracking",
            Phase::Completing => "completing",
            Phase::Done => "done",
        }
    }

    pub(crate) fn tracking() -> Self {
        Phase::ActiveTracking {
            queued_updates: Vec::new(),
            clarification: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RefinementExchange {
    pub round: u32,
    pub question: String,
    pub intent: Option<String>,
    /// Absent while awaiting the user's response.
    pub answer: Option<String>,
}

impl RefinementExchange {
    pub fn is_answered(&self) -> bool {
        self.answer
            .as_deref()
            .is_some_and(|answer| !answer.trim().is_empty())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StatusChange {
    pub id: String,
    pub status: ItemStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProgressLogEntry {
    pub timestamp: DateTime<Utc>,
    pub raw_update: String,
    pub affected_item_ids: BTreeSet<String>,
    pub interpretation_summary: String,
    pub status_changes: Vec<StatusChange>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    User,
    Agent,
    System,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConversationLogEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub content: String,
}

/// One version of a checklist workflow.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ResearchState {
    /// 0 for the initial state, incremented by every applied event.
    pub version: u64,
    pub phase: Phase,
    pub task_description: Option<String>,
    pub items: Arc<Vec<ChecklistItem>>,
    pub refinements: Arc<Vec<RefinementExchange>>,
    pub progress_log: Arc<Vec<ProgressLogEntry>>,
    pub conversation_log: Arc<Vec<ConversationLogEntry>>,
    pub summary: Option<String>,
    pub completion_notes: Option<String>,
    /// Locations of every artifact saved for this workflow, oldest first.
    pub artifacts: Arc<Vec<String>>,
    pub updated_at: DateTime<Utc>,
}

impl ResearchState {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            version: 0,
            phase: Phase::AwaitingDescription,
            task_description: None,
            items: Arc::default(),
            refinements: Arc::default(),
            progress_log: Arc::default(),
            conversation_log: Arc::default(),
            summary: None,
            completion_notes: None,
            artifacts: Arc::default(),
            updated_at: created_at,
        }
    }

    pub fn has_checklist(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn refinement_rounds(&self) -> u32 {
        self.refinements.len() as u32
    }

    /// The most recent clarification question is still unanswered.
    pub fn has_pending_question(&self) -> bool {
        self.refinements
            .last()
            .is_some_and(|exchange| !exchange.is_answered())
    }

    pub fn has_unanswered_progress_update(&self) -> bool {
        matches!(
            &self.phase,
            Phase::ActiveTracking { queued_updates, .. } if !queued_updates.is_empty()
        )
    }

    /// Refinement answers are merged and the checklist waits for the user's approval.
    pub fn ready_for_approval(&self) -> bool {
        matches!(self.phase, Phase::AwaitingApproval { approved: false })
    }

    /// Every item and every sub-item is done. An empty checklist is never done.
    pub fn all_items_done(&self) -> bool {
        self.has_checklist() && self.items.iter().all(ChecklistItem::is_done)
    }

    pub fn approved(&self) -> bool {
        matches!(
            self.phase,
            Phase::AwaitingApproval { approved: true }
                | Phase::ActiveTracking { .. }
                | Phase::Completing
                | Phase::Done
        )
    }

    pub fn is_persisted(&self) -> bool {
        !self.artifacts.is_empty()
    }

    pub fn has_summary(&self) -> bool {
        self.summary.is_some()
    }

    pub fn item(&self, id: &str) -> Option<&ChecklistItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Oldest progress text waiting for interpretation.
    pub fn next_queued_update(&self) -> Option<&str> {
        match &self.phase {
            Phase::ActiveTracking { queued_updates, .. } => {
                queued_updates.first().map(String::as_str)
            }
            _ => None,
        }
    }

    pub fn clarification(&self) -> Option<&str> {
        match &self.phase {
            Phase::ActiveTracking { clarification, .. } => clarification.as_deref(),
            _ => None,
        }
    }

    /// Count of items and sub-items, and how many of them are done.
    pub fn completion_counts(&self) -> (usize, usize) {
        let mut total = 0;
        let mut done = 0;
        for item in self.items.as_ref() {
            total += 1;
            if item.status == ItemStatus::Done {
                done += 1;
            }
            for sub in &item.sub_items {
                total += 1;
                if sub.status == ItemStatus::Done {
                    done += 1;
                }
            }
        }
        (total, done)
    }
}

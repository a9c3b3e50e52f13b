//! Shared deterministic types for the decision engine.
//!
//! These types define the contract between the coordinator, the executor and
//! callers. They carry no behavior beyond small accessors and must serialize
//! identically across runs.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::checklist::ChecklistItem;
use crate::core::state::{ProgressLogEntry, RefinementExchange};

/// Registered skill identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillId {
    GenerateInitialChecklist,
    AskClarifyingQuestion,
    IncorporateRefinements,
    InterpretProgressUpdate,
    GenerateSummary,
}

impl SkillId {
    pub const ALL: [SkillId; 5] = [
        SkillId::GenerateInitialChecklist,
        SkillId::AskClarifyingQuestion,
        SkillId::IncorporateRefinements,
        SkillId::InterpretProgressUpdate,
        SkillId::GenerateSummary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SkillId::GenerateInitialChecklist => "generate_initial_checklist",
            SkillId::AskClarifyingQuestion => "ask_clarifying_question",
            SkillId::IncorporateRefinements => "incorporate_refinements",
            SkillId::InterpretProgressUpdate => "interpret_progress_update",
            SkillId::GenerateSummary => "generate_summary",
        }
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the coordinator chose not to run a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoopReason {
    AwaitingDescription,
    AwaitingUserAnswer,
    AwaitingApproval,
    ReadyToPersist,
    AwaitingProgressInput,
    AwaitingProgressClarification,
    WorkflowComplete,
}

impl NoopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            NoopReason::AwaitingDescription => "awaiting_description",
            NoopReason::AwaitingUserAnswer => "awaiting_user_answer",
            NoopReason::AwaitingApproval => "awaiting_approval",
            NoopReason::ReadyToPersist => "ready_to_persist",
            NoopReason::AwaitingProgressInput => "awaiting_progress_input",
            NoopReason::AwaitingProgressClarification => "awaiting_progress_clarification",
            NoopReason::WorkflowComplete => "workflow_complete",
        }
    }
}

/// Minimal payload a skill needs, drawn from the current state.
///
/// Serializes to a flat JSON object whose keys are the skill's declared input
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SkillInput {
    GenerateInitialChecklist {
        task_description: String,
    },
    AskClarifyingQuestion {
        task_description: String,
        items: Arc<Vec<ChecklistItem>>,
        refinements: Arc<Vec<RefinementExchange>>,
        round: u32,
    },
    IncorporateRefinements {
        task_description: String,
        items: Arc<Vec<ChecklistItem>>,
        refinements: Arc<Vec<RefinementExchange>>,
    },
    InterpretProgressUpdate {
        items: Arc<Vec<ChecklistItem>>,
        update: String,
    },
    GenerateSummary {
        task_description: String,
        items: Arc<Vec<ChecklistItem>>,
        refinements: Arc<Vec<RefinementExchange>>,
        progress_log: Arc<Vec<ProgressLogEntry>>,
    },
}

impl SkillInput {
    pub fn skill(&self) -> SkillId {
        match self {
            SkillInput::GenerateInitialChecklist { .. } => SkillId::GenerateInitialChecklist,
            SkillInput::AskClarifyingQuestion { .. } => SkillId::AskClarifyingQuestion,
            SkillInput::IncorporateRefinements { .. } => SkillId::IncorporateRefinements,
            SkillInput::InterpretProgressUpdate { .. } => SkillId::InterpretProgressUpdate,
            SkillInput::GenerateSummary { .. } => SkillId::GenerateSummary,
        }
    }
}

/// The single next action for a given state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    LlmSkill { skill: SkillId, input: SkillInput },
    Noop { reason: NoopReason },
}

impl Decision {
    pub fn skill(input: SkillInput) -> Self {
        Decision::LlmSkill {
            skill: input.skill(),
            input,
        }
    }

    pub fn noop(reason: NoopReason) -> Self {
        Decision::Noop { reason }
    }

    pub fn skill_id(&self) -> Option<SkillId> {
        match self {
            Decision::LlmSkill { skill, .. } => Some(*skill),
            Decision::Noop { .. } => None,
        }
    }

    pub fn noop_reason(&self) -> Option<NoopReason> {
        match self {
            Decision::Noop { reason } => Some(*reason),
            Decision::LlmSkill { .. } => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Decision::Noop { .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::LlmSkill { skill, .. } => write!(f, "llm_skill({skill})"),
            Decision::Noop { reason } => write!(f, "noop({})", reason.as_str()),
        }
    }
}

//! Typed skill results.
//!
//! Each struct mirrors one output schema under `schemas/`. Results only reach
//! these types after passing schema validation, and unknown fields are
//! rejected so loosely shaped results never get merged.

use serde::{Deserialize, Serialize};

use crate::checklist::ItemStatus;
use crate::core::types::SkillId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProposedSubItem {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProposedItem {
    pub description: String,
    pub success_criteria: Option<String>,
    /// Present only for items judged broad enough to decompose (0-5 entries).
    pub sub_items: Vec<ProposedSubItem>,
}

/// Output of `generate_initial_checklist`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratedChecklist {
    pub ai_response: String,
    pub items: Vec<ProposedItem>,
    /// The description leaves open questions worth a clarification round.
    pub ambiguous: bool,
    pub risks: Vec<String>,
}

/// Output of `ask_clarifying_question`. `question: None` closes refinement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClarifyingQuestion {
    pub ai_response: String,
    pub question: Option<String>,
    pub intent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateAction {
    Add,
    Update,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubItemUpdate {
    pub action: UpdateAction,
    pub sub_item_id: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemUpdate {
    pub action: UpdateAction,
    pub item_id: Option<String>,
    pub description: Option<String>,
    pub success_criteria: Option<String>,
    /// Replaces the item's sub-items wholesale when present.
    pub sub_items: Option<Vec<ProposedSubItem>>,
    pub sub_item_updates: Vec<SubItemUpdate>,
}

/// Output of `incorporate_refinements`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefinementMerge {
    pub ai_response: String,
    pub updates: Vec<ItemUpdate>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressSignal {
    pub item_ids: Vec<String>,
    pub sub_item_ids: Vec<String>,
    pub new_status: Option<ItemStatus>,
    pub note: Option<String>,
}

/// Output of `interpret_progress_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressInterpretation {
    pub ai_response: String,
    pub summary: String,
    pub signals: Vec<ProgressSignal>,
    pub needs_clarification: bool,
    pub clarification_prompt: Option<String>,
}

/// Output of `generate_summary`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompletionSummary {
    pub ai_response: String,
    pub summary: String,
    pub completion_notes: Option<String>,
    pub highlights: Vec<String>,
}

/// A validated result tagged with the skill that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillOutput {
    GenerateInitialChecklist(GeneratedChecklist),
    AskClarifyingQuestion(ClarifyingQuestion),
    IncorporateRefinements(RefinementMerge),
    InterpretProgressUpdate(ProgressInterpretation),
    GenerateSummary(CompletionSummary),
}

impl SkillOutput {
    pub fn skill(&self) -> SkillId {
        match self {
            SkillOutput::GenerateInitialChecklist(_) => SkillId::GenerateInitialChecklist,
            SkillOutput::AskClarifyingQuestion(_) => SkillId::AskClarifyingQuestion,
            SkillOutput::IncorporateRefinements(_) => SkillId::IncorporateRefinements,
            SkillOutput::InterpretProgressUpdate(_) => SkillId::InterpretProgressUpdate,
            SkillOutput::GenerateSummary(_) => SkillId::GenerateSummary,
        }
    }

    /// JSON form of the wrapped output, as a skill backend would produce it.
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            SkillOutput::GenerateInitialChecklist(out) => serde_json::to_value(out),
            SkillOutput::AskClarifyingQuestion(out) => serde_json::to_value(out),
            SkillOutput::IncorporateRefinements(out) => serde_json::to_value(out),
            SkillOutput::InterpretProgressUpdate(out) => serde_json::to_value(out),
            SkillOutput::GenerateSummary(out) => serde_json::to_value(out),
        }
    }

    pub fn ai_response(&self) -> &str {
        match self {
            SkillOutput::GenerateInitialChecklist(out) => &out.ai_response,
            SkillOutput::AskClarifyingQuestion(out) => &out.ai_response,
            SkillOutput::IncorporateRefinements(out) => &out.ai_response,
            SkillOutput::InterpretProgressUpdate(out) => &out.ai_response,
            SkillOutput::GenerateSummary(out) => &out.ai_response,
        }
    }
}

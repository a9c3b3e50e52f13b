//! Test-only helpers for building checklist states and scripted collaborators.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::checklist::{ChecklistItem, ItemStatus, SubItem};
use crate::core::artifact::ChecklistArtifact;
use crate::core::error::InvocationError;
use crate::core::outputs::{
    ClarifyingQuestion, GeneratedChecklist, ProposedItem, ProposedSubItem, SkillOutput,
};
use crate::core::state::{Phase, RefinementExchange, ResearchState};
use crate::core::types::SkillId;
use crate::io::artifact_store::{ArtifactLocation, ChecklistRepository};
use crate::io::invoker::{SkillInvoker, SkillRequest};

/// Fixed timestamp (2025-01-01T12:00:00Z) for deterministic states.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0)
        .single()
        .expect("valid fixed time")
}

/// Pending item with a derived description and no sub-items.
pub fn item(id: &str) -> ChecklistItem {
    ChecklistItem {
        id: id.to_string(),
        description: format!("{} description", id),
        success_criteria: None,
        status: ItemStatus::Pending,
        notes: None,
        sub_items: Vec::new(),
    }
}

pub fn sub_item(id: &str) -> SubItem {
    SubItem {
        id: id.to_string(),
        description: format!("{} description", id),
        status: ItemStatus::Pending,
        notes: None,
    }
}

pub fn item_with_sub_items(id: &str, sub_items: Vec<SubItem>) -> ChecklistItem {
    ChecklistItem {
        sub_items,
        ..item(id)
    }
}

/// State in `phase` with a task description and the given items.
///
/// Other fields stay at their initial values; tests set what they need.
pub fn state_in(phase: Phase, items: Vec<ChecklistItem>) -> ResearchState {
    let mut state = ResearchState::new(fixed_time());
    state.phase = phase;
    state.task_description = Some("Plan a conference".to_string());
    state.items = Arc::new(items);
    state
}

pub fn answered(round: u32, question: &str, answer: &str) -> RefinementExchange {
    RefinementExchange {
        round,
        question: question.to_string(),
        intent: None,
        answer: Some(answer.to_string()),
    }
}

pub fn unanswered(round: u32, question: &str) -> RefinementExchange {
    RefinementExchange {
        round,
        question: question.to_string(),
        intent: None,
        answer: None,
    }
}

/// Generation result with one flat item per description.
pub fn generated(descriptions: &[&str], ambiguous: bool) -> SkillOutput {
    SkillOutput::GenerateInitialChecklist(GeneratedChecklist {
        ai_response: "Here is a first checklist.".to_string(),
        items: descriptions
            .iter()
            .map(|description| ProposedItem {
                description: description.to_string(),
                success_criteria: None,
                sub_items: Vec::new(),
            })
            .collect(),
        ambiguous,
        risks: Vec::new(),
    })
}

/// Generation result where each item carries the listed sub-items.
pub fn generated_with_sub_items(items: &[(&str, &[&str])], ambiguous: bool) -> SkillOutput {
    SkillOutput::GenerateInitialChecklist(GeneratedChecklist {
        ai_response: "Here is a first checklist.".to_string(),
        items: items
            .iter()
            .map(|(description, subs)| ProposedItem {
                description: description.to_string(),
                success_criteria: Some(format!("{} is finished", description)),
                sub_items: subs
                    .iter()
                    .map(|sub| ProposedSubItem {
                        description: sub.to_string(),
                    })
                    .collect(),
            })
            .collect(),
        ambiguous,
        risks: Vec::new(),
    })
}

pub fn question(text: Option<&str>) -> SkillOutput {
    SkillOutput::AskClarifyingQuestion(ClarifyingQuestion {
        ai_response: "One more thing.".to_string(),
        question: text.map(str::to_string),
        intent: text.map(|_| "scope".to_string()),
    })
}

/// Invoker that replays canned raw responses in order and records requests.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    responses: RefCell<VecDeque<std::result::Result<String, InvocationError>>>,
    calls: RefCell<Vec<SkillId>>,
    inputs: RefCell<Vec<Value>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a typed output, serialized the way a backend would return it.
    pub fn push_output(&self, output: &SkillOutput) -> &Self {
        let value = output.to_value().expect("serialize scripted output");
        self.push_raw(&value.to_string())
    }

    pub fn push_raw(&self, raw: &str) -> &Self {
        self.responses.borrow_mut().push_back(Ok(raw.to_string()));
        self
    }

    pub fn push_error(&self, err: InvocationError) -> &Self {
        self.responses.borrow_mut().push_back(Err(err));
        self
    }

    /// Skills invoked so far, in order.
    pub fn calls(&self) -> Vec<SkillId> {
        self.calls.borrow().clone()
    }

    /// Input payloads of the requests so far, in order.
    pub fn inputs(&self) -> Vec<Value> {
        self.inputs.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl SkillInvoker for ScriptedInvoker {
    fn invoke(&self, request: &SkillRequest) -> std::result::Result<String, InvocationError> {
        self.calls.borrow_mut().push(request.skill);
        self.inputs.borrow_mut().push(request.input.clone());
        self.responses.borrow_mut().pop_front().unwrap_or_else(|| {
            Err(InvocationError::MissingOutput(format!(
                "no scripted response for {}",
                request.skill
            )))
        })
    }
}

/// In-memory repository keyed by artifact file name.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    saved: RefCell<Vec<(ArtifactLocation, ChecklistArtifact)>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<ChecklistArtifact> {
        self.saved
            .borrow()
            .iter()
            .map(|(_, artifact)| artifact.clone())
            .collect()
    }
}

impl ChecklistRepository for MemoryRepository {
    fn save(&self, artifact: &ChecklistArtifact) -> Result<ArtifactLocation> {
        let location = ArtifactLocation::new(format!(
            "memory/{}-{}",
            self.saved.borrow().len() + 1,
            artifact.file_name()
        ));
        self.saved
            .borrow_mut()
            .push((location.clone(), artifact.clone()));
        Ok(location)
    }

    fn load(&self, location: &ArtifactLocation) -> Result<ChecklistArtifact> {
        self.saved
            .borrow()
            .iter()
            .find(|(saved, _)| saved == location)
            .map(|(_, artifact)| artifact.clone())
            .ok_or_else(|| anyhow!("no artifact at {}", location))
    }
}

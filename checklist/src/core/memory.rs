//! Event-driven state transitions.
//!
//! [`apply`] turns a prior [`ResearchState`] and one [`Event`] into the next
//! version. The prior value is never touched; collections the event does not
//! change stay shared with it. A transition either produces a state that
//! passes every invariant or fails with a [`WorkflowError`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::checklist_update::{apply_progress_signals, apply_refinement_updates, build_items};
use crate::core::coordinator::decide;
use crate::core::error::WorkflowError;
use crate::core::immutability::check_append_only;
use crate::core::invariants::validate_state;
use crate::core::outputs::{
    ClarifyingQuestion, CompletionSummary, GeneratedChecklist, ProgressInterpretation,
    RefinementMerge, SkillOutput,
};
use crate::core::state::{
    Actor, ConversationLogEntry, MAX_REFINEMENT_ROUNDS, Phase, ProgressLogEntry,
    RefinementExchange, ResearchState,
};

/// Question recorded for a change request made at the approval gate.
pub const REVISION_QUESTION: &str = "What should change in the checklist?";
const REVISION_INTENT: &str = "revision";

/// Something that happened to a workflow, stamped with when it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub at: DateTime<Utc>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// The user's free-text task description.
    InitialDescription(String),
    /// The user's answer to the open clarification question.
    RefinementAnswer(String),
    /// A validated result from the skill the coordinator selected.
    SkillResult(SkillOutput),
    ApprovalGranted,
    /// The user asked for another revision instead of approving.
    ChangesRequested(String),
    /// The approved checklist was written to durable storage.
    ChecklistPersisted { location: String },
    /// Free-text progress report from the user.
    ProgressUpdateText(String),
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::InitialDescription(_) => "initial_description",
            EventKind::RefinementAnswer(_) => "refinement_answer",
            EventKind::SkillResult(_) => "skill_result",
            EventKind::ApprovalGranted => "approval_granted",
            EventKind::ChangesRequested(_) => "changes_requested",
            EventKind::ChecklistPersisted { .. } => "checklist_persisted",
            EventKind::ProgressUpdateText(_) => "progress_update_text",
        }
    }
}

impl Event {
    pub fn new(at: DateTime<Utc>, kind: EventKind) -> Self {
        Self { at, kind }
    }

    pub fn now(kind: EventKind) -> Self {
        Self::new(Utc::now(), kind)
    }
}

/// Produce the state that follows `prior` once `event` is applied.
pub fn apply(prior: &ResearchState, event: &Event) -> Result<ResearchState, WorkflowError> {
    let mut next = prior.clone();
    next.version = prior.version + 1;
    next.updated_at = event.at;

    match &event.kind {
        EventKind::InitialDescription(text) => record_description(&mut next, text, event.at)?,
        EventKind::RefinementAnswer(text) => record_answer(&mut next, text, event.at)?,
        EventKind::SkillResult(output) => {
            let expected = decide(prior).skill_id();
            if expected != Some(output.skill()) {
                return Err(WorkflowError::StateMismatch {
                    expected,
                    received: output.skill(),
                });
            }
            apply_skill_result(&mut next, output, event.at)?;
        }
        EventKind::ApprovalGranted => grant_approval(&mut next, event.at)?,
        EventKind::ChangesRequested(text) => request_changes(&mut next, text, event.at)?,
        EventKind::ChecklistPersisted { location } => {
            record_persisted(&mut next, location, event.at)?;
        }
        EventKind::ProgressUpdateText(text) => queue_progress_update(&mut next, text, event.at)?,
    }

    let mut errors = validate_state(&next);
    errors.extend(check_append_only(prior, &next));
    if !errors.is_empty() {
        return Err(WorkflowError::InvariantViolation(errors.join("; ")));
    }

    debug!(
        event = event.kind.label(),
        version = next.version,
        phase = next.phase.label(),
        "applied event"
    );
    Ok(next)
}

fn record_description(
    next: &mut ResearchState,
    text: &str,
    at: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    if next.phase != Phase::AwaitingDescription {
        return Err(WorkflowError::invariant(format!(
            "task description already recorded (phase {})",
            next.phase.label()
        )));
    }
    let text = non_blank(text, "task description")?;
    next.task_description = Some(text.to_string());
    next.phase = Phase::GeneratingInitial;
    log(next, Actor::User, text, at);
    Ok(())
}

fn record_answer(
    next: &mut ResearchState,
    text: &str,
    at: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    if !next.has_pending_question() {
        return Err(WorkflowError::invariant(format!(
            "no clarification question is awaiting an answer (phase {})",
            next.phase.label()
        )));
    }
    let text = non_blank(text, "refinement answer")?;
    if let Some(open) = Arc::make_mut(&mut next.refinements).last_mut() {
        open.answer = Some(text.to_string());
    }
    log(next, Actor::User, text, at);
    Ok(())
}

fn grant_approval(next: &mut ResearchState, at: DateTime<Utc>) -> Result<(), WorkflowError> {
    if !next.ready_for_approval() {
        return Err(WorkflowError::invariant(format!(
            "checklist cannot be approved in phase {}",
            next.phase.label()
        )));
    }
    next.phase = Phase::AwaitingApproval { approved: true };
    log(next, Actor::User, "Approved the checklist.", at);
    Ok(())
}

fn request_changes(
    next: &mut ResearchState,
    text: &str,
    at: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    if !next.ready_for_approval() {
        return Err(WorkflowError::invariant(format!(
            "changes can only be requested before approval (phase {})",
            next.phase.label()
        )));
    }
    if next.refinement_rounds() >= MAX_REFINEMENT_ROUNDS {
        return Err(WorkflowError::invariant(format!(
            "refinement limit of {} rounds reached",
            MAX_REFINEMENT_ROUNDS
        )));
    }
    let text = non_blank(text, "change request")?;
    let round = next.refinement_rounds() + 1;
    Arc::make_mut(&mut next.refinements).push(RefinementExchange {
        round,
        question: REVISION_QUESTION.to_string(),
        intent: Some(REVISION_INTENT.to_string()),
        answer: Some(text.to_string()),
    });
    next.phase = Phase::Refining {
        ambiguity_open: false,
    };
    log(next, Actor::User, text, at);
    Ok(())
}

fn record_persisted(
    next: &mut ResearchState,
    location: &str,
    at: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    if !next.approved() {
        return Err(WorkflowError::invariant(format!(
            "checklist cannot be saved before approval (phase {})",
            next.phase.label()
        )));
    }
    let location = non_blank(location, "artifact location")?;
    Arc::make_mut(&mut next.artifacts).push(location.to_string());
    if next.phase == (Phase::AwaitingApproval { approved: true }) {
        next.phase = if next.all_items_done() {
            Phase::Completing
        } else {
            Phase::tracking()
        };
    }
    log(next, Actor::System, &format!("Checklist saved to {}", location), at);
    Ok(())
}

fn queue_progress_update(
    next: &mut ResearchState,
    text: &str,
    at: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    let label = next.phase.label();
    let Phase::ActiveTracking { queued_updates, .. } = &mut next.phase else {
        return Err(WorkflowError::invariant(format!(
            "progress updates are only accepted while tracking (phase {})",
            label
        )));
    };
    let text = non_blank(text, "progress update")?;
    queued_updates.push(text.to_string());
    log(next, Actor::User, text, at);
    Ok(())
}

fn apply_skill_result(
    next: &mut ResearchState,
    output: &SkillOutput,
    at: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    match output {
        SkillOutput::GenerateInitialChecklist(out) => apply_generated(next, out)?,
        SkillOutput::AskClarifyingQuestion(out) => apply_question(next, out, at),
        SkillOutput::IncorporateRefinements(out) => apply_merge(next, out, at)?,
        SkillOutput::InterpretProgressUpdate(out) => apply_interpretation(next, out, at)?,
        SkillOutput::GenerateSummary(out) => apply_summary(next, out),
    }
    log(next, Actor::Agent, output.ai_response(), at);
    Ok(())
}

fn apply_generated(
    next: &mut ResearchState,
    out: &GeneratedChecklist,
) -> Result<(), WorkflowError> {
    if out.items.is_empty() {
        return Err(WorkflowError::invariant("generated checklist has no items"));
    }
    next.items = Arc::new(build_items(&out.items).map_err(WorkflowError::InvariantViolation)?);
    next.phase = if out.ambiguous {
        Phase::Refining {
            ambiguity_open: true,
        }
    } else {
        Phase::AwaitingApproval { approved: false }
    };
    Ok(())
}

fn apply_question(next: &mut ResearchState, out: &ClarifyingQuestion, at: DateTime<Utc>) {
    let question = out
        .question
        .as_deref()
        .map(str::trim)
        .filter(|question| !question.is_empty());

    match question {
        Some(question) => {
            let round = next.refinement_rounds() + 1;
            Arc::make_mut(&mut next.refinements).push(RefinementExchange {
                round,
                question: question.to_string(),
                intent: out.intent.clone(),
                answer: None,
            });
            log(next, Actor::Agent, question, at);
        }
        // No further question: merge what was answered, or go straight to
        // approval when nothing was ever asked.
        None if next.refinements.is_empty() => {
            next.phase = Phase::AwaitingApproval { approved: false };
        }
        None => {
            next.phase = Phase::Refining {
                ambiguity_open: false,
            };
        }
    }
}

fn apply_merge(
    next: &mut ResearchState,
    out: &RefinementMerge,
    at: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    let mut items = next.items.as_ref().clone();
    apply_refinement_updates(&mut items, &out.updates).map_err(WorkflowError::InvariantViolation)?;
    next.items = Arc::new(items);
    next.phase = Phase::AwaitingApproval { approved: false };
    for note in &out.notes {
        log(next, Actor::Agent, note, at);
    }
    Ok(())
}

fn apply_interpretation(
    next: &mut ResearchState,
    out: &ProgressInterpretation,
    at: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    let Phase::ActiveTracking {
        queued_updates,
        clarification,
    } = &mut next.phase
    else {
        return Err(WorkflowError::invariant(
            "progress interpretation outside active tracking",
        ));
    };
    if queued_updates.is_empty() {
        return Err(WorkflowError::invariant(
            "progress interpretation without a queued update",
        ));
    }
    let raw_update = queued_updates.remove(0);
    *clarification = if out.needs_clarification {
        Some(
            out.clarification_prompt
                .clone()
                .filter(|prompt| !prompt.trim().is_empty())
                .unwrap_or_else(|| out.ai_response.clone()),
        )
    } else {
        None
    };
    let queue_drained = queued_updates.is_empty();

    let mut items = next.items.as_ref().clone();
    let applied = apply_progress_signals(&mut items, &out.signals)
        .map_err(WorkflowError::InvariantViolation)?;
    next.items = Arc::new(items);

    Arc::make_mut(&mut next.progress_log).push(ProgressLogEntry {
        timestamp: at,
        raw_update,
        affected_item_ids: applied.affected_ids,
        interpretation_summary: out.summary.clone(),
        status_changes: applied.status_changes,
    });

    if let Some(prompt) = next.clarification().map(str::to_string) {
        log(next, Actor::Agent, &prompt, at);
    }
    if queue_drained && next.all_items_done() {
        next.phase = Phase::Completing;
    }
    Ok(())
}

fn apply_summary(next: &mut ResearchState, out: &CompletionSummary) {
    next.summary = Some(out.summary.clone());
    next.completion_notes = out
        .completion_notes
        .clone()
        .filter(|notes| !notes.trim().is_empty());
    next.phase = Phase::Done;
}

fn log(next: &mut ResearchState, actor: Actor, content: &str, at: DateTime<Utc>) {
    Arc::make_mut(&mut next.conversation_log).push(ConversationLogEntry {
        timestamp: at,
        actor,
        content: content.to_string(),
    });
}

fn non_blank<'a>(text: &'a str, label: &str) -> Result<&'a str, WorkflowError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::invariant(format!("{} is empty", label)));
    }
    Ok(trimmed)
}

/// Ordered chain of every state version of one workflow.
#[derive(Debug, Clone)]
pub struct StateHistory {
    versions: Vec<ResearchState>,
}

impl StateHistory {
    pub fn new(initial: ResearchState) -> Self {
        Self {
            versions: vec![initial],
        }
    }

    pub fn latest(&self) -> &ResearchState {
        // `versions` is never empty: `new` seeds it and nothing removes entries.
        &self.versions[self.versions.len() - 1]
    }

    pub fn versions(&self) -> &[ResearchState] {
        &self.versions
    }

    pub fn version(&self, version: u64) -> Option<&ResearchState> {
        self.versions.iter().find(|state| state.version == version)
    }

    /// Apply `event` to the latest version and record the result.
    pub fn apply(&mut self, event: &Event) -> Result<&ResearchState, WorkflowError> {
        let next = apply(self.latest(), event)?;
        self.versions.push(next);
        Ok(self.latest())
    }

    /// Record a version produced elsewhere, such as an executor step.
    pub fn commit(&mut self, next: ResearchState) -> Result<&ResearchState, WorkflowError> {
        let errors = check_append_only(self.latest(), &next);
        if !errors.is_empty() {
            return Err(WorkflowError::InvariantViolation(errors.join("; ")));
        }
        self.versions.push(next);
        Ok(self.latest())
    }
}

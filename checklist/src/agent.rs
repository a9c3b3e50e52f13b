//! Conversational façade over the workflow engine.
//!
//! [`ChecklistAgent`] owns the state history and wires user actions, executor
//! steps and persistence together. A user action or executor step either
//! records exactly one new version or leaves the history untouched.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::core::artifact::ChecklistArtifact;
use crate::core::coordinator::decide;
use crate::core::error::WorkflowError;
use crate::core::invariants::validate_state;
use crate::core::memory::{Event, EventKind, StateHistory};
use crate::core::state::ResearchState;
use crate::core::types::Decision;
use crate::executor::StepExecutor;
use crate::io::artifact_store::{ArtifactLocation, ChecklistRepository};
use crate::io::invoker::SkillInvoker;

pub type Clock = fn() -> DateTime<Utc>;

pub struct ChecklistAgent<I, R> {
    history: StateHistory,
    executor: StepExecutor<I>,
    repository: R,
    clock: Clock,
}

impl<I: SkillInvoker, R: ChecklistRepository> ChecklistAgent<I, R> {
    /// Start a new workflow awaiting its task description.
    pub fn new(
        invoker: I,
        repository: R,
        prompt_budget_bytes: usize,
    ) -> Result<Self, WorkflowError> {
        Self::resume(
            ResearchState::new(Utc::now()),
            invoker,
            repository,
            prompt_budget_bytes,
        )
    }

    /// Continue from a stored state version.
    pub fn resume(
        state: ResearchState,
        invoker: I,
        repository: R,
        prompt_budget_bytes: usize,
    ) -> Result<Self, WorkflowError> {
        let errors = validate_state(&state);
        if !errors.is_empty() {
            return Err(WorkflowError::InvariantViolation(errors.join("; ")));
        }
        Ok(Self {
            history: StateHistory::new(state),
            executor: StepExecutor::new(invoker, prompt_budget_bytes)?,
            repository,
            clock: Utc::now,
        })
    }

    /// Replace the timestamp source used for events and artifacts.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn ingest_description(&mut self, text: &str) -> Result<Decision, WorkflowError> {
        self.record(EventKind::InitialDescription(text.to_string()))
    }

    /// Execute the coordinator's current decision; returns the decision run.
    #[instrument(skip_all, fields(version = self.state().version))]
    pub fn run_planned_action(&mut self) -> Result<Decision, WorkflowError> {
        let (next, decision) = self.executor.step(self.history.latest(), (self.clock)())?;
        if !decision.is_noop() {
            self.history.commit(next)?;
        }
        Ok(decision)
    }

    /// Run steps until the coordinator waits on the caller, at most `max_steps`.
    ///
    /// Returns the decision that stopped the loop.
    pub fn run_until_blocked(&mut self, max_steps: usize) -> Result<Decision, WorkflowError> {
        for _ in 0..max_steps {
            let decision = self.run_planned_action()?;
            if decision.is_noop() {
                return Ok(decision);
            }
        }
        Ok(self.next_decision())
    }

    pub fn record_refinement_answer(&mut self, text: &str) -> Result<Decision, WorkflowError> {
        self.record(EventKind::RefinementAnswer(text.to_string()))
    }

    pub fn approve_checklist(&mut self) -> Result<Decision, WorkflowError> {
        self.record(EventKind::ApprovalGranted)
    }

    /// Reject the draft and reopen one refinement round with `text` as the answer.
    pub fn request_changes(&mut self, text: &str) -> Result<Decision, WorkflowError> {
        self.record(EventKind::ChangesRequested(text.to_string()))
    }

    /// Persist the approved checklist as a new artifact.
    #[instrument(skip_all, fields(version = self.state().version))]
    pub fn save_checklist(&mut self) -> Result<ArtifactLocation, WorkflowError> {
        let at = (self.clock)();
        let artifact = ChecklistArtifact::from_state(self.history.latest(), at)?;
        let location = self
            .repository
            .save(&artifact)
            .map_err(WorkflowError::Persistence)?;
        self.history.apply(&Event::new(
            at,
            EventKind::ChecklistPersisted {
                location: location.to_string(),
            },
        ))?;
        info!(location = %location, "checklist saved");
        Ok(location)
    }

    pub fn record_progress_update(&mut self, text: &str) -> Result<Decision, WorkflowError> {
        self.record(EventKind::ProgressUpdateText(text.to_string()))
    }

    pub fn next_decision(&self) -> Decision {
        decide(self.history.latest())
    }

    pub fn state(&self) -> &ResearchState {
        self.history.latest()
    }

    pub fn history(&self) -> &StateHistory {
        &self.history
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn invoker(&self) -> &I {
        self.executor.invoker()
    }

    fn record(&mut self, kind: EventKind) -> Result<Decision, WorkflowError> {
        let event = Event::new((self.clock)(), kind);
        self.history.apply(&event)?;
        let decision = self.next_decision();
        debug!(event = event.kind.label(), decision = %decision, "recorded user event");
        Ok(decision)
    }
}

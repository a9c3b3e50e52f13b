//! Orchestration for a single deterministic workflow step.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::core::coordinator::decide;
use crate::core::error::WorkflowError;
use crate::core::memory::{Event, EventKind, apply};
use crate::core::state::ResearchState;
use crate::core::types::Decision;
use crate::io::invoker::{SkillInvoker, SkillRequest};
use crate::skills::prompt::PromptRenderer;
use crate::skills::registry::{check_input_contract, definition, parse_output};

/// Default prompt budget when none is configured.
pub const DEFAULT_PROMPT_BUDGET_BYTES: usize = 40_000;

/// Runs the coordinator's decision for a state, invoking at most one skill.
#[derive(Debug)]
pub struct StepExecutor<I> {
    invoker: I,
    renderer: PromptRenderer,
}

impl<I: SkillInvoker> StepExecutor<I> {
    pub fn new(invoker: I, prompt_budget_bytes: usize) -> Result<Self, WorkflowError> {
        Ok(Self {
            invoker,
            renderer: PromptRenderer::new(prompt_budget_bytes)?,
        })
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Execute one step from `state`.
    ///
    /// A NOOP decision returns `state` unchanged. A skill decision checks the
    /// input contract, renders the prompt, invokes the backend once, validates
    /// the response and applies it as a `SkillResult` stamped `at`. Any error
    /// leaves `state` as the caller's current version.
    #[instrument(skip_all, fields(version = state.version, phase = state.phase.label()))]
    pub fn step(
        &self,
        state: &ResearchState,
        at: DateTime<Utc>,
    ) -> Result<(ResearchState, Decision), WorkflowError> {
        let decision = decide(state);
        let Decision::LlmSkill { skill, input } = &decision else {
            debug!(decision = %decision, "nothing to execute");
            return Ok((state.clone(), decision));
        };

        let payload = check_input_contract(input)?;
        let prompt = self.renderer.render(input)?;
        let request = SkillRequest {
            skill: *skill,
            prompt,
            input: payload,
            output_schema: definition(*skill).output_schema,
        };
        debug!(skill = %skill, prompt_bytes = request.prompt.len(), "invoking skill");

        let raw = self.invoker.invoke(&request)?;
        let output = parse_output(*skill, &raw)?;
        let next = apply(state, &Event::new(at, EventKind::SkillResult(output)))?;

        info!(
            skill = %skill,
            version = next.version,
            phase = next.phase.label(),
            "skill result applied"
        );
        Ok((next, decision))
    }
}

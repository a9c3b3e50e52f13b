//! Workflow error types.

use std::time::Duration;

use thiserror::Error;

use crate::core::types::SkillId;

/// Errors surfaced by state transitions and executor steps.
///
/// Every variant leaves the caller's current state untouched: transitions
/// either complete fully or not at all.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("skill '{skill}' result failed schema validation: {}", .errors.join("; "))]
    SchemaValidation { skill: SkillId, errors: Vec<String> },

    #[error("state mismatch: received result for '{received}' but {}", expected_label(.expected))]
    StateMismatch {
        expected: Option<SkillId>,
        received: SkillId,
    },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("persistence failed: {0:#}")]
    Persistence(anyhow::Error),

    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

impl WorkflowError {
    pub fn invariant(message: impl Into<String>) -> Self {
        WorkflowError::InvariantViolation(message.into())
    }

    /// Check if repeating the same step may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkflowError::Invocation(err) => err.is_retryable(),
            WorkflowError::SchemaValidation { .. }
            | WorkflowError::StateMismatch { .. }
            | WorkflowError::InvariantViolation(_)
            | WorkflowError::Persistence(_) => false,
        }
    }
}

fn expected_label(expected: &Option<SkillId>) -> String {
    match expected {
        Some(skill) => format!("the coordinator selected '{skill}'"),
        None => "the coordinator selected no skill".to_string(),
    }
}

/// Failures of the external skill backend.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("skill invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to start skill backend: {0}")]
    Spawn(String),

    #[error("skill backend failed: {0}")]
    Failed(String),

    #[error("skill backend produced no output: {0}")]
    MissingOutput(String),

    #[error("failed to render prompt: {0}")]
    Prompt(String),
}

impl InvocationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            InvocationError::Timeout(_) => true,
            InvocationError::Failed(_) => true,
            InvocationError::MissingOutput(_) => true,
            InvocationError::Spawn(_) | InvocationError::Prompt(_) => false,
        }
    }
}

//! Skill registry and prompt rendering.
//!
//! Skills are declarative: the registry describes them, the prompt renderer
//! turns a typed input into text, and an [`crate::io::invoker::SkillInvoker`]
//! runs them.

pub mod prompt;
pub mod registry;

//! Conversational checklist workflow engine.
//!
//! A user describes a task, the agent drafts a checklist, refines it over at
//! most three clarification rounds, persists it once approved, tracks free-text
//! progress reports against it and closes with a summary. The architecture
//! keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (coordinator, transitions,
//!   invariants). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting adapters (config, skill backend process,
//!   artifact and session storage).
//! - **[`skills`]**: Skill catalog with input contracts, output schemas and
//!   prompt templates.
//!
//! [`executor`] runs one coordinator decision against a skill backend and
//! [`agent`] wraps the whole workflow behind user-facing actions.

pub mod agent;
pub mod checklist;
pub mod core;
pub mod executor;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod skills;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

//! Stable exit codes for checklist CLI commands.

/// Command succeeded and the workflow can continue without user input.
pub const OK: i32 = 0;
/// Invalid config or session, failed skill invocation or rejected action.
pub const INVALID: i32 = 1;
/// The workflow is done: summary generated.
pub const COMPLETE: i32 = 2;
/// The workflow waits on the user (description, answer, approval or progress).
pub const AWAITING_INPUT: i32 = 3;

//! Resumable session snapshot (the latest workflow state) for the CLI.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::immutability::check_append_only;
use crate::core::invariants::validate_state;
use crate::core::state::ResearchState;
use crate::io::config::write_atomic;

/// Load the session at `path`, or `None` when no session was started.
pub fn load_session(path: &Path) -> Result<Option<ResearchState>> {
    if !path.exists() {
        return Ok(None);
    }
    debug!(path = %path.display(), "loading session");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read session {}", path.display()))?;
    let state: ResearchState = serde_json::from_str(&contents)
        .with_context(|| format!("parse session {}", path.display()))?;
    let errors = validate_state(&state);
    if !errors.is_empty() {
        return Err(anyhow!(
            "session {} violates invariants: {}",
            path.display(),
            errors.join("; ")
        ));
    }
    debug!(version = state.version, phase = state.phase.label(), "session loaded");
    Ok(Some(state))
}

/// Atomically write the session snapshot (temp file + rename).
pub fn write_session(path: &Path, state: &ResearchState) -> Result<()> {
    debug!(path = %path.display(), version = state.version, "writing session");
    let mut buf = serde_json::to_string_pretty(state).context("serialize session")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write `next` only if it extends the stored session.
///
/// Guards against two CLI invocations racing on the same session file: the
/// stored version must be the one `next` was derived from.
pub fn advance_session(path: &Path, base_version: u64, next: &ResearchState) -> Result<()> {
    if let Some(stored) = load_session(path)? {
        if stored.version != base_version {
            return Err(anyhow!(
                "session {} moved to version {} (expected {})",
                path.display(),
                stored.version,
                base_version
            ));
        }
        if next.version > stored.version {
            let errors = check_append_only(&stored, next);
            // Multi-step advances skip the single-step version check.
            let errors: Vec<_> = errors
                .into_iter()
                .filter(|err| !err.starts_with("version moved"))
                .collect();
            if !errors.is_empty() {
                return Err(anyhow!("session rewrite rejected: {}", errors.join("; ")));
            }
        }
    }
    write_session(path, next)
}

//! Skill invocation backends.
//!
//! The [`SkillInvoker`] trait decouples the executor from the model backend.
//! [`ProcessInvoker`] runs an external command (by default `codex exec`) with
//! the skill's output schema; tests use scripted invokers that replay canned
//! responses without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::error::InvocationError;
use crate::core::types::SkillId;
use crate::io::config::{AgentConfig, LlmConfig};
use crate::io::process::{RunError, run_command_with_timeout};

/// One rendered skill call.
#[derive(Debug, Clone)]
pub struct SkillRequest {
    pub skill: SkillId,
    /// Rendered prompt text.
    pub prompt: String,
    /// Validated input payload the prompt was rendered from.
    pub input: Value,
    /// JSON Schema the response must satisfy.
    pub output_schema: &'static str,
}

/// Abstraction over skill backends. Returns the raw response text.
pub trait SkillInvoker {
    fn invoke(&self, request: &SkillRequest) -> Result<String, InvocationError>;
}

impl<T: SkillInvoker + ?Sized> SkillInvoker for &T {
    fn invoke(&self, request: &SkillRequest) -> Result<String, InvocationError> {
        (**self).invoke(request)
    }
}

/// Invoker that spawns the configured backend command.
///
/// The prompt is written to stdin. The command receives
/// `--output-schema <file> --output-last-message <file> -` and model settings
/// as `CHECKLIST_*` environment variables.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    llm: LlmConfig,
    work_dir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ProcessInvoker {
    /// `work_dir` holds schema and output files for each invocation.
    pub fn new(config: &AgentConfig, work_dir: PathBuf) -> Self {
        Self {
            llm: config.llm.clone(),
            work_dir,
            timeout: config.skill_timeout(),
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    fn command(&self, schema_path: &Path, output_path: &Path) -> Result<Command, InvocationError> {
        let (program, args) = self
            .llm
            .command
            .split_first()
            .ok_or_else(|| InvocationError::Spawn("llm.command is empty".to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg("--output-schema")
            .arg(schema_path)
            .arg("--output-last-message")
            .arg(output_path)
            .arg("-")
            .current_dir(&self.work_dir)
            .env("CHECKLIST_MODEL", &self.llm.model)
            .env("CHECKLIST_TEMPERATURE", self.llm.temperature.to_string())
            .env("CHECKLIST_BASE_URL", &self.llm.base_url)
            .env("CHECKLIST_API_KEY_ENV", &self.llm.api_key_env);
        Ok(cmd)
    }
}

impl SkillInvoker for ProcessInvoker {
    #[instrument(skip_all, fields(skill = %request.skill, timeout_secs = self.timeout.as_secs()))]
    fn invoke(&self, request: &SkillRequest) -> Result<String, InvocationError> {
        info!(work_dir = %self.work_dir.display(), "invoking skill backend");

        fs::create_dir_all(&self.work_dir).map_err(|err| {
            InvocationError::Failed(format!("create {}: {}", self.work_dir.display(), err))
        })?;
        let schema_path = self
            .work_dir
            .join(format!("{}.schema.json", request.skill));
        let output_path = self
            .work_dir
            .join(format!("{}.output.json", request.skill));
        fs::write(&schema_path, request.output_schema).map_err(|err| {
            InvocationError::Failed(format!("write {}: {}", schema_path.display(), err))
        })?;
        if output_path.exists() {
            fs::remove_file(&output_path).map_err(|err| {
                InvocationError::Failed(format!("remove stale {}: {}", output_path.display(), err))
            })?;
        }

        let cmd = self.command(&schema_path, &output_path)?;
        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .map_err(|err| match err {
            RunError::Spawn(err) => InvocationError::Spawn(err.to_string()),
            RunError::Io(err) => InvocationError::Failed(format!("{:#}", err)),
        })?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "skill backend timed out");
            return Err(InvocationError::Timeout(self.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "skill backend failed");
            return Err(InvocationError::Failed(format!(
                "exit status {:?}: {}",
                output.status.code(),
                output.stderr_text()
            )));
        }

        read_response(&output_path, &output.stdout)
    }
}

/// Prefer the last-message file; fall back to stdout for backends that print.
fn read_response(output_path: &Path, stdout: &[u8]) -> Result<String, InvocationError> {
    if output_path.exists() {
        let contents = fs::read_to_string(output_path).map_err(|err| {
            InvocationError::Failed(format!("read {}: {}", output_path.display(), err))
        })?;
        if !contents.trim().is_empty() {
            debug!(bytes = contents.len(), "read skill output file");
            return Ok(contents);
        }
    }
    let stdout = String::from_utf8_lossy(stdout).trim().to_string();
    if stdout.is_empty() {
        return Err(InvocationError::MissingOutput(format!(
            "no output at {} and empty stdout",
            output_path.display()
        )));
    }
    debug!(bytes = stdout.len(), "using skill stdout as output");
    Ok(stdout)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Instant;

    /// Shell backend: positional args are `$0=--output-schema $1=schema
    /// $2=--output-last-message $3=output $4=-`.
    fn invoker(script: &str, work_dir: &Path, timeout_secs: u64) -> ProcessInvoker {
        let mut config = AgentConfig::default();
        config.skill_timeout_secs = timeout_secs;
        config.llm.command = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        ProcessInvoker::new(&config, work_dir.to_path_buf())
    }

    fn request() -> SkillRequest {
        SkillRequest {
            skill: SkillId::GenerateSummary,
            prompt: "Summarize".to_string(),
            input: json!({}),
            output_schema: "{}",
        }
    }

    #[test]
    fn reads_last_message_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let invoker = invoker(
            r#"cat > /dev/null; test -f "$1" && printf '{"ok":"%s"}' "$CHECKLIST_MODEL" > "$3""#,
            temp.path(),
            10,
        );
        let raw = invoker.invoke(&request()).expect("invoke");
        assert_eq!(raw, r#"{"ok":"openai/gpt-4o-mini"}"#);
    }

    #[test]
    fn falls_back_to_stdout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let invoker = invoker(r#"cat > /dev/null; echo '{"ok":true}'"#, temp.path(), 10);
        assert_eq!(invoker.invoke(&request()).expect("invoke"), r#"{"ok":true}"#);
    }

    #[test]
    fn classifies_failures() {
        let temp = tempfile::tempdir().expect("tempdir");

        let err = invoker("cat > /dev/null; echo boom >&2; exit 3", temp.path(), 10)
            .invoke(&request())
            .expect_err("failure");
        assert!(matches!(&err, InvocationError::Failed(msg) if msg.contains("boom")));

        let err = invoker("cat > /dev/null", temp.path(), 10)
            .invoke(&request())
            .expect_err("missing");
        assert!(matches!(err, InvocationError::MissingOutput(_)));

        let err = invoker("cat > /dev/null; exec sleep 5", temp.path(), 1)
            .invoke(&request())
            .expect_err("timeout");
        assert!(matches!(err, InvocationError::Timeout(_)));
        assert!(err.is_retryable());
    }

    /// The deadline holds when the backend forks a worker that keeps the pipes
    /// open, and when it never reads a prompt larger than the pipe buffer.
    #[test]
    fn timeout_bounds_slow_backends() {
        let temp = tempfile::tempdir().expect("tempdir");

        let started = Instant::now();
        let err = invoker("cat > /dev/null; sleep 6; echo '{}'", temp.path(), 1)
            .invoke(&request())
            .expect_err("timeout");
        assert!(matches!(err, InvocationError::Timeout(_)), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(4), "{:?}", started.elapsed());

        let mut large = request();
        large.prompt = "x".repeat(200_000);
        let started = Instant::now();
        let err = invoker("exec sleep 6", temp.path(), 1)
            .invoke(&large)
            .expect_err("timeout");
        assert!(matches!(err, InvocationError::Timeout(_)), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(4), "{:?}", started.elapsed());
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = AgentConfig::default();
        config.llm.command = vec!["definitely-not-a-real-binary-xyz".to_string()];
        let err = ProcessInvoker::new(&config, temp.path().to_path_buf())
            .invoke(&request())
            .expect_err("spawn");
        assert!(matches!(err, InvocationError::Spawn(_)));
        assert!(!err.is_retryable());
    }
}

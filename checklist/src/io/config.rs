//! Agent configuration stored in `checklist.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "checklist.toml";

/// Agent configuration (TOML).
///
/// Only the adapters read this: the core receives what it needs at
/// construction. Missing fields fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Directory where checklist artifacts are written.
    pub storage_dir: PathBuf,

    /// Resumable session snapshot used by the CLI.
    pub session_path: PathBuf,

    /// Wall-clock limit for a single skill invocation.
    pub skill_timeout_secs: u64,

    /// Truncate skill backend stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Prompt size budget before optional sections are dropped.
    pub prompt_budget_bytes: usize,

    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend command; the prompt is written to its stdin.
    pub command: Vec<String>,
    pub model: String,
    pub temperature: f64,
    pub base_url: String,
    /// Name of the environment variable holding the API key. The key itself
    /// never appears in config files.
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "codex".to_string(),
                "exec".to_string(),
                "--skip-git-repo-check".to_string(),
            ],
            model: "openai/gpt-4o-mini".to_string(),
            temperature: 0.2,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("storage/checklists"),
            session_path: PathBuf::from(".checklist/session.json"),
            skill_timeout_secs: 300,
            output_limit_bytes: 100_000,
            prompt_budget_bytes: 40_000,
            llm: LlmConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.skill_timeout_secs == 0 {
            return Err(anyhow!("skill_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        if self.storage_dir.as_os_str().is_empty() {
            return Err(anyhow!("storage_dir must not be empty"));
        }
        if self.session_path.as_os_str().is_empty() {
            return Err(anyhow!("session_path must not be empty"));
        }
        if self.llm.command.is_empty() || self.llm.command[0].trim().is_empty() {
            return Err(anyhow!("llm.command must be a non-empty array"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("llm.temperature must be within 0.0..=2.0"));
        }
        Ok(())
    }

    pub fn skill_timeout(&self) -> Duration {
        Duration::from_secs(self.skill_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

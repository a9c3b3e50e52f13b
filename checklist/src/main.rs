//! Conversational checklist agent CLI.
//!
//! Each command resumes the session snapshot (`.checklist/session.json` by
//! default), applies one user action or runs the coordinator, and writes the
//! new version back. The exit code tells scripts whether the agent waits on
//! the user ([`exit_codes::AWAITING_INPUT`]) or the workflow is done.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::debug;

use checklist::agent::ChecklistAgent;
use checklist::core::state::ResearchState;
use checklist::core::types::{Decision, NoopReason};
use checklist::exit_codes;
use checklist::io::artifact_store::FileRepository;
use checklist::io::config::{AgentConfig, CONFIG_FILE, load_config, write_config};
use checklist::io::invoker::ProcessInvoker;
use checklist::io::session_store::{advance_session, load_session};
use checklist::logging;
use checklist::skills::prompt::outline;

type CliAgent = ChecklistAgent<ProcessInvoker, FileRepository>;

#[derive(Parser)]
#[command(
    name = "checklist",
    version,
    about = "Conversational agent that plans, refines and tracks task checklists"
)]
struct Cli {
    /// Config file (TOML).
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default `checklist.toml` if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Start the workflow with a free-text task description.
    Describe { text: String },
    /// Run skills until the agent waits on the user.
    Run {
        #[arg(long, default_value_t = 10)]
        max_steps: usize,
    },
    /// Answer the open clarification question.
    Answer { text: String },
    /// Approve the drafted checklist.
    Approve,
    /// Ask for another revision of the drafted checklist.
    Revise { text: String },
    /// Save the approved checklist as a new artifact.
    Save,
    /// Report progress in free text.
    Progress { text: String },
    /// Print the current phase, checklist and next decision.
    Status,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    if let Command::Init { force } = cli.command {
        return cmd_init(&cli.config, force);
    }

    let cfg = load_config(&cli.config)?;
    let mut session = Session::open(&cfg)?;
    let outcome = match cli.command {
        // Handled before the session is opened.
        Command::Init { .. } => Ok(None),
        Command::Describe { text } => session.agent.ingest_description(&text).map(Some),
        Command::Run { max_steps } => session.agent.run_until_blocked(max_steps).map(Some),
        Command::Answer { text } => session.agent.record_refinement_answer(&text).map(Some),
        Command::Approve => session.agent.approve_checklist().map(Some),
        Command::Revise { text } => session.agent.request_changes(&text).map(Some),
        Command::Save => session.agent.save_checklist().map(|location| {
            println!("saved {}", location);
            None
        }),
        Command::Progress { text } => session.agent.record_progress_update(&text).map(Some),
        Command::Status => {
            print_status(session.agent.state());
            Ok(None)
        }
    };
    // Versions committed before a failing step are kept.
    session.persist()?;
    outcome?;

    let decision = session.agent.next_decision();
    print_next(session.agent.state(), &decision);
    Ok(exit_code(&decision))
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &AgentConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

/// Session snapshot plus the agent resumed from it.
struct Session {
    path: PathBuf,
    base_version: u64,
    agent: CliAgent,
}

impl Session {
    fn open(cfg: &AgentConfig) -> Result<Self> {
        let state = load_session(&cfg.session_path)?
            .unwrap_or_else(|| ResearchState::new(Utc::now()));
        let base_version = state.version;
        debug!(version = base_version, phase = state.phase.label(), "session opened");

        let invoker = ProcessInvoker::new(cfg, skill_work_dir(&cfg.session_path));
        let repository = FileRepository::new(&cfg.storage_dir);
        let agent = ChecklistAgent::resume(state, invoker, repository, cfg.prompt_budget_bytes)?;
        Ok(Self {
            path: cfg.session_path.clone(),
            base_version,
            agent,
        })
    }

    fn persist(&self) -> Result<()> {
        let state = self.agent.state();
        if state.version == self.base_version {
            return Ok(());
        }
        advance_session(&self.path, self.base_version, state)
            .with_context(|| format!("write session {}", self.path.display()))
    }
}

fn skill_work_dir(session_path: &Path) -> PathBuf {
    session_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join("skills")
}

fn exit_code(decision: &Decision) -> i32 {
    match decision.noop_reason() {
        None => exit_codes::OK,
        Some(NoopReason::WorkflowComplete) => exit_codes::COMPLETE,
        Some(_) => exit_codes::AWAITING_INPUT,
    }
}

fn print_status(state: &ResearchState) {
    println!("version: {}", state.version);
    println!("phase: {}", state.phase.label());
    if let Some(task) = &state.task_description {
        println!("task: {}", task);
    }
    if state.has_checklist() {
        let (total, done) = state.completion_counts();
        println!("checklist ({}/{} done):", done, total);
        println!("{}", outline(&state.items));
    }
    for location in state.artifacts.as_ref() {
        println!("artifact: {}", location);
    }
}

/// Tell the user what the agent needs next.
fn print_next(state: &ResearchState, decision: &Decision) {
    match decision.noop_reason() {
        Some(NoopReason::AwaitingDescription) => {
            println!("Describe the task: checklist describe <text>");
        }
        Some(NoopReason::AwaitingUserAnswer) => {
            if let Some(exchange) = state.refinements.last() {
                println!("Question {}: {}", exchange.round, exchange.question);
            }
            println!("Answer with: checklist answer <text>");
        }
        Some(NoopReason::AwaitingApproval) => {
            println!("{}", outline(&state.items));
            println!(
                "Approve with `checklist approve` or ask for changes with `checklist revise <text>`"
            );
        }
        Some(NoopReason::ReadyToPersist) => {
            println!("Approved. Save with: checklist save");
        }
        Some(NoopReason::AwaitingProgressInput) => {
            let (total, done) = state.completion_counts();
            println!("{}/{} done. Report progress with: checklist progress <text>", done, total);
        }
        Some(NoopReason::AwaitingProgressClarification) => {
            if let Some(clarification) = state.clarification() {
                println!("{}", clarification);
            }
            println!("Clarify with: checklist progress <text>");
        }
        Some(NoopReason::WorkflowComplete) => {
            if let Some(summary) = &state.summary {
                println!("{}", summary);
            }
            if let Some(notes) = &state.completion_notes {
                println!("notes: {}", notes);
            }
        }
        None => println!("Next: {} (run with `checklist run`)", decision),
    }
}

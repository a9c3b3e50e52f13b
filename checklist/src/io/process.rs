//! Child process execution with a deadline and bounded output capture.

use std::io::{ErrorKind, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Stderr as text with a trailing note when bytes were discarded.
    pub fn stderr_text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stderr).trim().to_string();
        if self.stderr_truncated > 0 {
            text.push_str(&format!(" [stderr truncated {} bytes]", self.stderr_truncated));
        }
        text
    }
}

/// Distinguishes a command that never started from one that failed while running.
#[derive(Debug)]
pub enum RunError {
    Spawn(std::io::Error),
    Io(anyhow::Error),
}

/// Run `cmd` with `stdin` piped in, killing it once `timeout` elapses.
///
/// The deadline starts at spawn. Stdin is written and stdout/stderr are
/// drained on their own threads so neither a large prompt nor a chatty child
/// can block past it; bytes beyond `output_limit_bytes` are counted and
/// discarded. On Unix the child leads its own process group and the whole
/// group is killed on timeout, so forked descendants cannot hold the pipes open.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput, RunError> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!("spawning child process");
    let mut child = cmd.spawn().map_err(|err| {
        warn!(err = %err, "failed to spawn command");
        RunError::Spawn(err)
    })?;

    collect_output(&mut child, stdin, timeout, output_limit_bytes).map_err(RunError::Io)
}

fn collect_output(
    child: &mut Child,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let stdin_handle = match stdin {
        Some(input) => {
            let child_stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("stdin was not piped"))?;
            let input = input.to_vec();
            Some(thread::spawn(move || write_stdin(child_stdin, &input)))
        }
        None => None,
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            kill_child(child)?;
            child.wait().context("wait command after kill")?
        }
    };

    if let Some(handle) = stdin_handle {
        let written = match handle.join() {
            Ok(result) => result,
            Err(_) => Err(anyhow!("stdin writer thread panicked")),
        };
        // A killed child leaves the writer with a closed or broken pipe.
        if !timed_out {
            written?;
        }
    }
    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;
    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// A child that exits without reading all of stdin is not an error here;
/// its exit status and output decide the outcome.
fn write_stdin(mut child_stdin: ChildStdin, input: &[u8]) -> Result<()> {
    match child_stdin.write_all(input) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::BrokenPipe => {
            debug!("child closed stdin early");
            Ok(())
        }
        Err(err) => Err(err).context("write stdin"),
    }
}

#[cfg(unix)]
fn kill_child(child: &mut Child) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    // The child was spawned with `process_group(0)`, so its pid is the group id.
    match killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(err) => {
            warn!(err = %err, "failed to kill process group, killing child only");
            child.kill().context("kill command")
        }
    }
}

#[cfg(not(unix))]
fn kill_child(child: &mut Child) -> Result<()> {
    child.kill().context("kill command")
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_stdout_from_stdin() {
        let output = run_command_with_timeout(
            sh("cat"),
            Some(b"hello"),
            Duration::from_secs(10),
            1_000,
        )
        .expect("run");
        assert!(output.status.success());
        assert_eq!(output.stdout, b"hello");
        assert!(!output.timed_out);
    }

    #[test]
    fn bounds_captured_output() {
        let output = run_command_with_timeout(
            sh("printf '0123456789'"),
            None,
            Duration::from_secs(10),
            4,
        )
        .expect("run");
        assert_eq!(output.stdout, b"0123");
        assert_eq!(output.stdout_truncated, 6);
    }

    #[test]
    fn kills_child_after_timeout() {
        let output =
            run_command_with_timeout(sh("exec sleep 5"), None, Duration::from_millis(100), 100)
                .expect("run");
        assert!(output.timed_out);
    }

    /// `sh` without `exec` forks `sleep`; the group kill must reach it too.
    #[test]
    fn timeout_kills_forked_descendants() {
        let started = Instant::now();
        let output = run_command_with_timeout(
            sh("sleep 5; echo late"),
            None,
            Duration::from_millis(200),
            100,
        )
        .expect("run");
        assert!(output.timed_out);
        assert!(output.stdout.is_empty());
        assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
    }

    /// A prompt larger than the pipe buffer that the child never reads still
    /// times out on schedule.
    #[test]
    fn undrained_stdin_still_times_out() {
        let prompt = vec![b'x'; 1_000_000];
        let started = Instant::now();
        let output = run_command_with_timeout(
            sh("exec sleep 5"),
            Some(&prompt),
            Duration::from_millis(200),
            100,
        )
        .expect("run");
        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
    }

    #[test]
    fn child_ignoring_stdin_succeeds() {
        let prompt = vec![b'x'; 1_000_000];
        let output = run_command_with_timeout(
            sh("echo done"),
            Some(&prompt),
            Duration::from_secs(10),
            100,
        )
        .expect("run");
        assert!(output.status.success());
        assert_eq!(output.stdout, b"done\n");
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let result = run_command_with_timeout(
            Command::new("definitely-not-a-real-binary-xyz"),
            None,
            Duration::from_secs(1),
            100,
        );
        assert!(matches!(result, Err(RunError::Spawn(_))));
    }
}

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{IntegrityError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn first_line(&self) -> Option<&str> {
        first_non_empty(&self.stdout)
    }

    /// First non-empty line on either stream, stdout first.
    pub fn first_output_line(&self) -> Option<&str> {
        first_non_empty(&self.stdout).or_else(|| first_non_empty(&self.stderr))
    }
}

fn first_non_empty(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| !line.is_empty())
}

/// `name` inside `command_dir` when one is configured, otherwise a bare name
/// left to `PATH` lookup.
pub fn program_path(command_dir: Option<&Path>, name: &str) -> PathBuf {
    match command_dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// Runs `program` with a wall-clock bound; a child still running at the
/// deadline is killed and reaped. Returns `Ok(None)` when the program does not
/// exist on this host.
pub fn run_bounded(
    program: impl AsRef<Path>,
    args: &[&str],
    timeout: Duration,
) -> Result<Option<CommandOutput>> {
    let program = program.as_ref();
    let label = program.display().to_string();
    let spawned = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(IntegrityError::command(&label, format!("spawn: {err}"))),
    };

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                reap(&mut child);
                return Err(IntegrityError::command(
                    &label,
                    format!("timed out after {} ms", timeout.as_millis()),
                ));
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(err) => {
                reap(&mut child);
                return Err(IntegrityError::command(&label, format!("wait: {err}")));
            }
        }
    };

    let stdout = drain(&label, "stdout", child.stdout.take())?;
    let stderr = drain(&label, "stderr", child.stderr.take())?;

    Ok(Some(CommandOutput {
        exit_code: status.code(),
        success: status.success(),
        stdout,
        stderr,
    }))
}

fn drain(label: &str, stream: &str, pipe: Option<impl Read>) -> Result<String> {
    let Some(mut pipe) = pipe else {
        return Ok(String::new());
    };
    let mut bytes = Vec::new();
    pipe.read_to_end(&mut bytes)
        .map_err(|err| IntegrityError::command(label, format!("read {stream}: {err}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// True when the program exists and prints anything on stdout or stderr,
/// whatever its exit status. A denied `su` still proves the binary is there.
pub fn produces_output(
    program: impl AsRef<Path>,
    args: &[&str],
    timeout: Duration,
) -> Result<bool> {
    Ok(run_bounded(program, args, timeout)?
        .map(|output| output.first_output_line().is_some())
        .unwrap_or(false))
}

/// First non-empty stdout line of a successful run.
pub fn first_line(
    program: impl AsRef<Path>,
    args: &[&str],
    timeout: Duration,
) -> Result<Option<String>> {
    Ok(run_bounded(program, args, timeout)?
        .filter(|output| output.success)
        .and_then(|output| output.first_line().map(str::to_string)))
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

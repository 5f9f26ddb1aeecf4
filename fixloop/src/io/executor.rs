//! Executor abstraction for invoking the external command.
//!
//! The [`Executor`] trait decouples stage orchestration from the actual
//! command backend (by default the `claude` CLI). Tests use scripted
//! executors that return predetermined outputs without spawning processes.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::anyhow;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::sentinel::sentinel_in_output;
use crate::io::process::run_command_with_timeout;

/// Parameters for one executor invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Working directory for the external command.
    pub workdir: PathBuf,
    /// Instruction text fed to the command on stdin.
    pub instruction: String,
    /// Maximum time to wait for the command to complete.
    pub timeout: Duration,
    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Error surfaced by an executor invocation.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command ran and exited non-zero.
    #[error("external command failed with exit code {code}: {stderr}",
        code = exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string()))]
    Failed {
        exit_code: Option<i32>,
        /// Captured error stream of the failed command.
        stderr: String,
    },

    /// The command exceeded its allotted time and was killed.
    #[error("external command timed out after {} seconds", timeout.as_secs())]
    TimedOut { timeout: Duration },

    /// The command could not be spawned or its output could not be captured.
    #[error("failed to run external command: {0}")]
    Spawn(anyhow::Error),
}

/// Abstraction over external command backends.
pub trait Executor {
    /// Run the external command in `request.workdir`, feeding
    /// `request.instruction` on stdin, and return its captured stdout.
    fn execute(&self, request: &ExecRequest) -> Result<String, ExecError>;
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    fn execute(&self, request: &ExecRequest) -> Result<String, ExecError> {
        (**self).execute(request)
    }
}

/// Executor that spawns the configured argv as a child process.
pub struct CommandExecutor {
    command: Vec<String>,
}

impl CommandExecutor {
    /// `command` is the argv to spawn; the instruction text is never part of
    /// it, it arrives on the child's stdin.
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Executor for CommandExecutor {
    fn execute(&self, request: &ExecRequest) -> Result<String, ExecError> {
        let program = self
            .command
            .first()
            .ok_or_else(|| ExecError::Spawn(anyhow!("executor command is empty")))?;
        info!(program = %program, workdir = %request.workdir.display(), "starting external command");

        let mut cmd = Command::new(program);
        cmd.args(&self.command[1..]).current_dir(&request.workdir);

        let output = run_command_with_timeout(
            cmd,
            request.instruction.as_bytes(),
            request.timeout,
            request.output_limit_bytes,
        )
        .map_err(ExecError::Spawn)?;

        if output.timed_out {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                "external command timed out"
            );
            return Err(ExecError::TimedOut {
                timeout: request.timeout,
            });
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "external command failed");
            return Err(ExecError::Failed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        debug!("external command completed");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Execute and scan the captured output for `sentinel`.
///
/// Sentinel absence is a normal negative result, never a failure; only the
/// invocation itself can error.
pub fn execute_and_check<E: Executor>(
    executor: &E,
    request: &ExecRequest,
    sentinel: &str,
) -> Result<(String, bool), ExecError> {
    let output = executor.execute(request)?;
    let found = sentinel_in_output(&output, sentinel);
    debug!(sentinel, found, "checked output for sentinel");
    Ok((output, found))
}

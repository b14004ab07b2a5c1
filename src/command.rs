//! Shell command execution shared by every command-based probe.

use crate::error::{Result, SystemError};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Appended to failures caused by a missing executable.
pub const MISSING_BINARY_HINT: &str =
    ". Declare command paths in the environment and check the .env file.";

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// The command line that was executed
    pub command: String,
    /// Non-empty stdout lines, in order
    pub stdout: Vec<String>,
}

impl CommandOutput {
    /// Build an output from raw stdout text.
    pub fn from_stdout(command: impl Into<String>, stdout: &str) -> Self {
        Self {
            command: command.into(),
            stdout: split_lines(stdout),
        }
    }

    /// Whether the command printed nothing.
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty()
    }
}

/// Executes command lines on behalf of probes.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command line, returning its stdout lines or an execution error.
    async fn run(&self, command: &str) -> Result<CommandOutput>;
}

/// Runs command lines through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl ShellRunner {
    /// Create a runner using the default `sh` shell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different POSIX shell.
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        tracing::trace!("Running command: {}", command);

        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SystemError::execution(format!("Failed to spawn {}: {}", self.shell, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let status = output
                .status
                .code()
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(SystemError::execution(failure_message(&stderr, &status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(CommandOutput::from_stdout(command, &stdout))
    }
}

/// Split trimmed stdout into its non-empty lines.
pub fn split_lines(stdout: &str) -> Vec<String> {
    stdout
        .trim()
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pick the most relevant stderr line for a failed command.
///
/// Shell diagnostics (`sh: ...`) win over anything else; otherwise the last
/// non-empty line is used.
pub fn select_error_line(stderr: &str) -> Option<String> {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    lines
        .iter()
        .rev()
        .find(|line| line.contains("sh:"))
        .or_else(|| lines.last())
        .map(|line| line.to_string())
}

/// Build the error message for a non-zero exit.
pub fn failure_message(stderr: &str, status: &str) -> String {
    let mut message =
        select_error_line(stderr).unwrap_or_else(|| format!("exited with status {}", status));
    if message.contains("not found") {
        message.push_str(MISSING_BINARY_HINT);
    }
    message
}

//! Captured command output and the fail-fast `must` check

use std::process::Output;

/// Everything a single command invocation produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Whether the command exited with status 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl From<Output> for CommandResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            // Processes killed by a signal have no exit code
            exit_code: output.status.code().unwrap_or(-1),
        }
    }
}

/// A command exited with a non-zero status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Command failed with status {}: {}", .exit_code, .stderr.trim())]
pub struct CommandFailed {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Pass `(stdout, stderr)` through untouched if the command succeeded, otherwise fail with everything it produced
pub fn must(result: CommandResult) -> Result<(String, String), CommandFailed> {
    match result.exit_code {
        0 => Ok((result.stdout, result.stderr)),
        exit_code => Err(CommandFailed {
            stdout: result.stdout,
            stderr: result.stderr,
            exit_code,
        }),
    }
}

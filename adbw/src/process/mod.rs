//! External process execution
//!
//! - [`CommandSpec`] - what to run (program, args, timeout, working dir)
//! - [`CommandResult`] - what happened (exit code, output, timing, attempts)
//! - [`ProcessRunner`] - the seam between the core and the OS
//! - [`SystemRunner`] - the tokio-backed runner used outside of tests
//! - [`LineStream`] - incremental output of long-running commands

mod stream;
mod system;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{AdbwError, Result};

pub use stream::LineStream;
pub use system::SystemRunner;

// ============================================================================
// CommandSpec
// ============================================================================

/// An external command to run. Built once, never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn timeout_value(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Render as a single command line for logs and dry runs
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote_arg)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(char::is_whitespace) && !arg.contains('\'') {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

// ============================================================================
// CommandResult
// ============================================================================

/// Why an invocation produced no usable exit status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunFailure {
    /// The executable could not be found or spawned
    LaunchFailure { reason: String },
    /// The process exceeded its time budget and was killed
    Timeout { after_ms: u64 },
}

/// Outcome of one command execution (possibly several attempts)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    command: String,
    program: String,
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
    elapsed_ms: u64,
    attempts: u32,
    failure: Option<RunFailure>,
}

impl CommandResult {
    /// The process ran to completion. `exit_code` is `None` when it was
    /// terminated by a signal.
    pub fn completed(
        spec: &CommandSpec,
        exit_code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: spec.display(),
            program: spec.program().to_string(),
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            elapsed_ms: elapsed.as_millis() as u64,
            attempts: 1,
            failure: None,
        }
    }

    pub fn launch_failure(
        spec: &CommandSpec,
        reason: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: spec.display(),
            program: spec.program().to_string(),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            elapsed_ms: elapsed.as_millis() as u64,
            attempts: 1,
            failure: Some(RunFailure::LaunchFailure {
                reason: reason.into(),
            }),
        }
    }

    /// Timed out; carries whatever output was captured before the kill
    pub fn timed_out(
        spec: &CommandSpec,
        after: Duration,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: spec.display(),
            program: spec.program().to_string(),
            exit_code: None,
            stdout: stdout.into(),
            stderr: stderr.into(),
            elapsed_ms: elapsed.as_millis() as u64,
            attempts: 1,
            failure: Some(RunFailure::Timeout {
                after_ms: after.as_millis() as u64,
            }),
        }
    }

    /// Record how many attempts produced this result
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        self.failure.as_ref()
    }

    /// Launched, finished, and exited with status 0
    pub fn success(&self) -> bool {
        self.failure.is_none() && self.exit_code == Some(0)
    }

    /// Only launch failures and timeouts are worth another attempt; a
    /// non-zero exit is the tool's final answer.
    pub fn is_retryable(&self) -> bool {
        self.failure.is_some()
    }

    /// Classify a failed result; `None` on success
    pub fn error(&self) -> Option<AdbwError> {
        match &self.failure {
            Some(RunFailure::LaunchFailure { reason }) => Some(AdbwError::LaunchFailure {
                program: self.program.clone(),
                reason: reason.clone(),
            }),
            Some(RunFailure::Timeout { after_ms }) => {
                Some(AdbwError::Timeout(Duration::from_millis(*after_ms)))
            }
            None if self.exit_code == Some(0) => None,
            None => Some(AdbwError::NonZeroExit {
                code: self.exit_code.unwrap_or(-1),
                stderr: self.stderr.trim().to_string(),
            }),
        }
    }

    /// Turn a failed result into its error, keeping successful ones
    pub fn into_result(self) -> Result<Self> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

// ============================================================================
// ProcessRunner
// ============================================================================

/// Executes external commands
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion (or timeout) and capture both output streams
    async fn run(&self, spec: &CommandSpec) -> CommandResult;

    /// Start a long-running command and expose stdout line by line until
    /// `cancel` fires or the process exits
    async fn stream(&self, spec: &CommandSpec, cancel: CancellationToken) -> Result<LineStream>;

    /// True when commands are echoed instead of spawned
    fn is_dry_run(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_whitespace() {
        let spec = CommandSpec::new("adb").args(["-s", "emulator-5554", "shell", "ls -la"]);
        assert_eq!(spec.display(), "adb -s emulator-5554 shell 'ls -la'");
    }

    #[test]
    fn test_non_zero_exit_is_final() {
        let spec = CommandSpec::new("adb").args(["shell", "pm", "clear", "x"]);
        let result = CommandResult::completed(
            &spec,
            Some(1),
            "",
            "Failed\n",
            Duration::ZERO,
        );
        assert!(!result.success());
        assert!(!result.is_retryable());
        match result.error() {
            Some(AdbwError::NonZeroExit { code, stderr }) => {
                assert_eq!(code, 1);
                assert_eq!(stderr, "Failed");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_timeout_keeps_partial_output() {
        let spec = CommandSpec::new("adb").args(["logcat", "-d"]);
        let result = CommandResult::timed_out(
            &spec,
            Duration::from_secs(1),
            "partial",
            "",
            Duration::from_secs(1),
        );
        assert!(result.is_retryable());
        assert_eq!(result.stdout(), "partial");
        assert!(matches!(result.error(), Some(AdbwError::Timeout(_))));
    }

    #[test]
    fn test_launch_failure_names_program() {
        let spec = CommandSpec::new("/opt/android sdk/platform-tools/adb").arg("devices");
        let result = CommandResult::launch_failure(&spec, "not found", Duration::ZERO);
        assert_eq!(result.command(), "'/opt/android sdk/platform-tools/adb' devices");
        match result.into_result() {
            Err(AdbwError::LaunchFailure { program, .. }) => {
                assert_eq!(program, "/opt/android sdk/platform-tools/adb")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}

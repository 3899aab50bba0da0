//! Tokio-backed process runner
//!
//! Each child gets its own process group so a timeout or cancellation can
//! take down anything it forked. `kill_on_drop` covers the paths where the
//! handle is dropped without an explicit kill.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{CommandResult, CommandSpec, LineStream, ProcessRunner};
use crate::config::Settings;
use crate::error::{AdbwError, Result};

/// How long to wait for output pipes to drain once the process is gone
const OUTPUT_GRACE: Duration = Duration::from_secs(2);

/// Runs commands as real OS processes
#[derive(Debug, Clone)]
pub struct SystemRunner {
    default_timeout: Duration,
    dry_run: bool,
}

impl SystemRunner {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            dry_run: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.command_timeout()).with_dry_run(settings.adb.dry_run)
    }

    /// In dry-run mode nothing is spawned; every command "succeeds" and
    /// echoes itself on stdout.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn command(spec: &CommandSpec, capture_stderr: bool) -> Command {
        let mut cmd = Command::new(spec.program());
        cmd.args(spec.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(if capture_stderr {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        if let Some(dir) = spec.working_dir() {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        cmd
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn run(&self, spec: &CommandSpec) -> CommandResult {
        let line = spec.display();
        let started = Instant::now();

        if self.dry_run {
            tracing::info!(command = %line, "dry run");
            return CommandResult::completed(
                spec,
                Some(0),
                format!("[dry-run] {line}\n"),
                "",
                Duration::ZERO,
            );
        }

        let timeout = spec.timeout_value().unwrap_or(self.default_timeout);
        tracing::debug!(command = %line, ?timeout, "spawning");

        let mut child = match Self::command(spec, true).spawn() {
            Ok(child) => child,
            Err(e) => {
                return CommandResult::launch_failure(spec, e.to_string(), started.elapsed());
            }
        };

        let stdout = child.stdout.take().map(|pipe| tokio::spawn(read_all(pipe)));
        let stderr = child.stderr.take().map(|pipe| tokio::spawn(read_all(pipe)));

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => CommandResult::completed(
                spec,
                status.code(),
                collect(stdout).await,
                collect(stderr).await,
                started.elapsed(),
            ),
            Ok(Err(e)) => {
                terminate(&mut child).await;
                CommandResult::launch_failure(spec, e.to_string(), started.elapsed())
            }
            Err(_elapsed) => {
                tracing::warn!(command = %line, ?timeout, "timed out, killing process group");
                terminate(&mut child).await;
                CommandResult::timed_out(
                    spec,
                    timeout,
                    collect(stdout).await,
                    collect(stderr).await,
                    started.elapsed(),
                )
            }
        }
    }

    async fn stream(&self, spec: &CommandSpec, cancel: CancellationToken) -> Result<LineStream> {
        let line = spec.display();

        if self.dry_run {
            tracing::info!(command = %line, "dry run (stream)");
            return Ok(LineStream::from_lines([format!("[dry-run] {line}")]));
        }

        tracing::debug!(command = %line, "spawning stream");
        let child = Self::command(spec, false)
            .spawn()
            .map_err(|e| AdbwError::LaunchFailure {
                program: spec.program().to_string(),
                reason: e.to_string(),
            })?;

        LineStream::spawn(child, cancel)
    }
}

/// Kill the child's whole process group and reap it
pub(super) async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: killpg has no memory-safety preconditions; the group id
            // is the child's pid because it was spawned with process_group(0).
            unsafe {
                libc::killpg(pid as libc::pid_t, libc::SIGKILL);
            }
        }
    }
    if let Err(e) = child.kill().await {
        tracing::debug!("kill after exit: {}", e);
    }
}

async fn read_all<R: AsyncRead + Unpin>(mut pipe: R) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    buf
}

async fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(mut handle) = reader else {
        return String::new();
    };
    match tokio::time::timeout(OUTPUT_GRACE, &mut handle).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).to_string(),
        Ok(Err(e)) => {
            tracing::debug!("output reader failed: {}", e);
            String::new()
        }
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}

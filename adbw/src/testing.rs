//! Scripted process runner for tests
//!
//! [`ScriptedRunner`] answers commands from canned replies keyed by the
//! rendered command line, and records every invocation. It lets retry,
//! workflow and broadcast behavior be exercised without a real `adb`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{AdbwError, Result};
use crate::process::{CommandResult, CommandSpec, LineStream, ProcessRunner};

#[derive(Debug, Clone)]
enum ReplyKind {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    LaunchFailure(String),
    Timeout,
}

/// A canned answer to one invocation
#[derive(Debug, Clone)]
pub struct Reply {
    kind: ReplyKind,
    delay: Duration,
}

impl Reply {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::exit(0, stdout, "")
    }

    pub fn exit(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Exit {
                code,
                stdout: stdout.into(),
                stderr: stderr.into(),
            },
            delay: Duration::ZERO,
        }
    }

    pub fn launch_failure(reason: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::LaunchFailure(reason.into()),
            delay: Duration::ZERO,
        }
    }

    pub fn timeout() -> Self {
        Self {
            kind: ReplyKind::Timeout,
            delay: Duration::ZERO,
        }
    }

    /// Sleep this long before answering
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn into_result(self, spec: &CommandSpec) -> CommandResult {
        match self.kind {
            ReplyKind::Exit {
                code,
                stdout,
                stderr,
            } => CommandResult::completed(spec, Some(code), stdout, stderr, self.delay),
            ReplyKind::LaunchFailure(reason) => {
                CommandResult::launch_failure(spec, reason, self.delay)
            }
            ReplyKind::Timeout => CommandResult::timed_out(spec, self.delay, "", "", self.delay),
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    replies: HashMap<String, VecDeque<Reply>>,
    streams: HashMap<String, std::result::Result<Vec<String>, String>>,
    calls: Vec<String>,
    finished: Vec<String>,
}

/// Process runner that replays scripted replies
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: Mutex<Script>,
    fallback: Option<Reply>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the exact command line `command`. Replies for the
    /// same command are consumed in order; the last one repeats.
    pub fn reply(self, command: &str, reply: Reply) -> Self {
        self.lock()
            .replies
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Reply used for commands with nothing scripted
    pub fn fallback(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Lines produced when `command` is streamed
    pub fn stream_lines<I, S>(self, command: &str, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines = lines.into_iter().map(Into::into).collect();
        self.lock().streams.insert(command.to_string(), Ok(lines));
        self
    }

    /// Make streaming `command` fail to launch
    pub fn stream_failure(self, command: &str, reason: impl Into<String>) -> Self {
        self.lock()
            .streams
            .insert(command.to_string(), Err(reason.into()));
        self
    }

    /// Every command line run or streamed so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Command lines in the order their replies were delivered
    pub fn finished(&self) -> Vec<String> {
        self.lock().finished.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_reply(&self, command: &str) -> Reply {
        let mut script = self.lock();
        script.calls.push(command.to_string());

        let scripted = script.replies.get_mut(command).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        });

        scripted
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Reply::launch_failure(format!("no scripted reply for `{command}`")))
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> CommandResult {
        let command = spec.display();
        let reply = self.next_reply(&command);
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        self.lock().finished.push(command);
        reply.into_result(spec)
    }

    async fn stream(&self, spec: &CommandSpec, _cancel: CancellationToken) -> Result<LineStream> {
        let command = spec.display();
        let mut script = self.lock();
        script.calls.push(command.clone());

        match script.streams.get(&command).cloned() {
            Some(Ok(lines)) => Ok(LineStream::from_lines(lines)),
            Some(Err(reason)) => Err(AdbwError::LaunchFailure {
                program: spec.program().to_string(),
                reason,
            }),
            None => Ok(LineStream::from_lines(Vec::<String>::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_consumed_in_order_and_last_repeats() {
        let runner = ScriptedRunner::new()
            .reply("adb version", Reply::timeout())
            .reply("adb version", Reply::ok("1.0.41"));
        let spec = CommandSpec::new("adb").arg("version");

        assert!(runner.run(&spec).await.is_retryable());
        assert!(runner.run(&spec).await.success());
        assert!(runner.run(&spec).await.success());
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_unscripted_command_fails_to_launch() {
        let runner = ScriptedRunner::new();
        let result = runner.run(&CommandSpec::new("adb").arg("devices")).await;
        assert!(result.error().is_some());
        assert!(result.is_retryable());
    }
}

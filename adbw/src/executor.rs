//! Bounded retry around a [`ProcessRunner`]
//!
//! Only launch failures and timeouts are retried. A process that ran and
//! exited non-zero has given its answer, and that answer is returned as-is.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::process::{CommandResult, CommandSpec, LineStream, ProcessRunner};

/// Runs commands with a bounded retry policy
#[derive(Clone)]
pub struct CommandExecutor {
    runner: Arc<dyn ProcessRunner>,
    retry_delay: Duration,
}

impl CommandExecutor {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            retry_delay: Duration::ZERO,
        }
    }

    /// Pause between attempts (immediate retries when zero)
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.runner.is_dry_run()
    }

    /// Run `spec` up to `max_attempts` times (at least once). Returns the
    /// first non-retryable result, or the last failure when every attempt
    /// was used up. The result records how many attempts were consumed.
    pub async fn execute(&self, spec: &CommandSpec, max_attempts: u32) -> CommandResult {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = self.runner.run(spec).await;

            if !result.is_retryable() || attempt >= max_attempts {
                if result.is_retryable() {
                    tracing::warn!(
                        command = %result.command(),
                        attempts = attempt,
                        "giving up: {:?}",
                        result.failure()
                    );
                }
                return result.with_attempts(attempt);
            }

            tracing::warn!(
                command = %result.command(),
                attempt,
                max_attempts,
                "retrying after {:?}",
                result.failure()
            );

            if !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }
            attempt += 1;
        }
    }

    /// Streams are not retried; a launch failure is reported immediately
    pub async fn stream(&self, spec: &CommandSpec, cancel: CancellationToken) -> Result<LineStream> {
        self.runner.stream(spec, cancel).await
    }
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

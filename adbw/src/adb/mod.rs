//! Typed wrappers over `adb` subcommands
//!
//! [`Adb`] binds a resolved executable path to the retrying executor and the
//! loaded settings. The submodules build on it:
//! - `device` - discovery, target selection, property summary
//! - `package` - install, launch, clear, permissions, package queries
//! - `files` - push, pull, screenshots
//! - `logcat` - snapshots and filtered live streams
//! - `session` - reboot, wireless connect/pair, port forwarding
//! - `intent` - deep links, explicit components, broadcasts, raw `am`
//! - `inspect` - processes, pids and running services
//! - `state` - settings/property snapshots and settings restore
//! - `apk` - local APK metadata via `aapt` and install checks

mod apk;
mod device;
mod files;
mod inspect;
mod intent;
pub mod logcat;
mod package;
mod session;
mod state;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::Result;
use crate::executor::CommandExecutor;
use crate::process::{CommandResult, CommandSpec, LineStream, ProcessRunner};

pub use apk::*;
pub use device::*;
pub use files::*;
pub use inspect::*;
pub use intent::*;
pub use package::*;
pub use session::*;
pub use state::*;

/// Handle for invoking one adb executable
#[derive(Debug, Clone)]
pub struct Adb {
    path: String,
    executor: CommandExecutor,
    settings: Arc<Settings>,
}

impl Adb {
    pub fn new(path: impl Into<String>, executor: CommandExecutor, settings: Arc<Settings>) -> Self {
        Self {
            path: path.into(),
            executor,
            settings,
        }
    }

    /// Wire an executor around `runner` using the configured retry delay
    pub fn with_runner(
        path: impl Into<String>,
        runner: Arc<dyn ProcessRunner>,
        settings: Arc<Settings>,
    ) -> Self {
        let executor = CommandExecutor::new(runner).with_retry_delay(settings.retry_delay());
        Self::new(path, executor, settings)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Commands are printed rather than run
    pub fn is_dry_run(&self) -> bool {
        self.executor.is_dry_run()
    }

    /// `adb [-s serial] args...` with the configured timeout
    pub fn command<I, S>(&self, serial: Option<&str>, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = CommandSpec::new(&self.path);
        if let Some(serial) = serial {
            spec = spec.args(["-s", serial]);
        }
        spec.args(args).timeout(self.settings.command_timeout())
    }

    /// Run with the configured attempt bound
    pub async fn run<I, S>(&self, serial: Option<&str>, args: I) -> CommandResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = self.command(serial, args);
        self.executor
            .execute(&spec, self.settings.max_attempts())
            .await
    }

    /// Run any command (adb with a custom timeout, or a host tool) with the
    /// configured attempt bound
    pub async fn execute(&self, spec: &CommandSpec) -> CommandResult {
        self.executor
            .execute(spec, self.settings.max_attempts())
            .await
    }

    /// `adb -s serial shell <command>`
    pub async fn shell(&self, serial: &str, command: &str) -> CommandResult {
        self.run(Some(serial), ["shell", command]).await
    }

    /// Start a long-running adb command
    pub async fn stream<I, S>(
        &self,
        serial: Option<&str>,
        args: I,
        cancel: CancellationToken,
    ) -> Result<LineStream>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = self.command(serial, args);
        self.executor.stream(&spec, cancel).await
    }
}

/// Quote one word for the device shell, which re-splits `adb shell` input
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

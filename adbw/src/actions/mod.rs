//! Named device actions
//!
//! An [`Action`] is one thing a workflow step (or a broadcast) can do to a
//! device. Built-in actions live in `builtin`, manifest-declared ones in
//! `plugin`; both are looked up by name through the [`ActionRegistry`].

mod builtin;
mod plugin;
mod registry;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::adb::{Adb, Device};
use crate::error::{AdbwError, Result};
use crate::process::{CommandResult, LineStream};

pub use builtin::{
    builtin_actions, ClearData, InstallApk, LaunchApp, RunShell, TailFilteredLogcat,
};
pub use plugin::{load_plugins, PluginActionDef, PluginLoad, PluginManifest, TemplateAction};
pub use registry::{ActionInfo, ActionRegistry, RegistrationEvent, RegistrationStatus};

/// Step parameters: name to value, as written in the workflow
pub type StepParams = BTreeMap<String, String>;

/// Canonical spelling of a parameter name (`package` is `package_name`,
/// `tag` is `log_tag`, `apk` is `apk_path`)
pub fn canonical_param(name: &str) -> &str {
    match name {
        "package" => "package_name",
        "tag" => "log_tag",
        "apk" => "apk_path",
        other => other,
    }
}

/// `defaults` overlaid with `params`, all under canonical names. Explicit
/// values win over defaults, whichever spelling either side used.
pub fn merge_params(defaults: &StepParams, params: &StepParams) -> StepParams {
    let mut merged = StepParams::new();
    for layer in [defaults, params] {
        for (name, value) in layer {
            if !value.trim().is_empty() {
                merged.insert(canonical_param(name).to_string(), value.clone());
            }
        }
    }
    merged
}

/// First non-empty value among `names` (a canonical name and its aliases)
pub fn param<'a>(params: &'a StepParams, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| params.get(*name))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

/// Like [`param`], but absence is a `MissingParameter` for `action`
pub fn require<'a>(action: &str, params: &'a StepParams, names: &[&str]) -> Result<&'a str> {
    param(params, names).ok_or_else(|| AdbwError::missing(action, names[0]))
}

// ============================================================================
// Action
// ============================================================================

/// What an action produced
#[derive(Debug, Clone)]
pub enum ActionOutput {
    /// A command ran to completion (successfully or not)
    Command(CommandResult),
    /// A live stream was established and keeps running in the background
    Streaming { command: String },
}

/// One line from a background log stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamLine {
    pub serial: String,
    pub line: String,
}

/// Everything an action needs besides the device and its parameters
#[derive(Debug, Clone)]
pub struct ActionContext {
    adb: Adb,
    cancel: CancellationToken,
    tracker: TaskTracker,
    sink: Option<mpsc::UnboundedSender<StreamLine>>,
}

impl ActionContext {
    pub fn new(adb: Adb) -> Self {
        Self {
            adb,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            sink: None,
        }
    }

    /// Tie background streams to an outer cancellation (e.g. Ctrl+C)
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Deliver background stream lines here instead of the log
    pub fn with_sink(mut self, sink: mpsc::UnboundedSender<StreamLine>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn adb(&self) -> &Adb {
        &self.adb
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Pump `stream` in a tracked task until it ends or is cancelled
    pub fn spawn_stream(&self, serial: &str, mut stream: LineStream) {
        let serial = serial.to_string();
        let sink = self.sink.clone();
        self.tracker.spawn(async move {
            while let Some(line) = stream.next_line().await {
                match &sink {
                    Some(sink) => {
                        let line = StreamLine {
                            serial: serial.clone(),
                            line,
                        };
                        if sink.send(line).is_err() {
                            break;
                        }
                    }
                    None => tracing::info!(serial = %serial, "{}", line),
                }
            }
            stream.finish().await;
            tracing::debug!(serial = %serial, "stream closed");
        });
    }

    /// Number of background streams still running
    pub fn active_streams(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every background stream to end on its own or via the token
    pub async fn wait_streams(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Cancel background streams and wait until their processes are reaped
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.wait_streams().await;
    }
}

/// A named operation against one device
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Run against `device`. Parameter and launch problems are errors; a
    /// command that ran but failed is an `Ok` output the caller classifies.
    async fn execute(
        &self,
        ctx: &ActionContext,
        device: &Device,
        params: &StepParams,
    ) -> Result<ActionOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> StepParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_param_prefers_first_non_empty_alias() {
        let p = params(&[("package_name", " "), ("package", "com.example")]);
        assert_eq!(param(&p, &["package_name", "package"]), Some("com.example"));
        assert_eq!(param(&p, &["activity"]), None);
    }

    #[test]
    fn test_merge_params_step_alias_beats_default() {
        let defaults = params(&[("package_name", "com.default"), ("log_tag", "Default")]);
        let step = params(&[("package", "com.step"), ("activity", "")]);
        let merged = merge_params(&defaults, &step);
        assert_eq!(merged["package_name"], "com.step");
        assert_eq!(merged["log_tag"], "Default");
        assert!(!merged.contains_key("package"));
        assert!(!merged.contains_key("activity"));
    }

    #[test]
    fn test_require_names_canonical_parameter() {
        let err = require("clear_data", &StepParams::new(), &["package_name", "package"])
            .unwrap_err();
        match err {
            AdbwError::MissingParameter { action, param } => {
                assert_eq!(action, "clear_data");
                assert_eq!(param, "package_name");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}

//! Command handlers module
//!
//! This module contains handler functions for CLI commands, organized by feature.
//! CommandContext holds the resources shared across handlers; the action
//! registry (built-ins plus plugin manifests) is loaded on first use.

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use adbw::actions::{load_plugins, ActionContext, ActionRegistry};
use adbw::adb::{Adb, Device};
use adbw::api::select_device;
use adbw::config::Settings;
use adbw::process::{CommandResult, SystemRunner};
use adbw::store::Stores;

// =============================================================================
// Handlers by feature
// =============================================================================
pub mod apps;
pub mod automation;
pub mod device;
pub mod files;
pub mod inspect;
pub mod tooling;

pub use apps::{
    run_clear, run_install, run_launch, run_package, run_packages, run_permission_command,
    run_stop, run_uninstall,
};
pub use automation::{
    run_alias_command, run_broadcast_command, run_plugins, run_profile_command, run_workflow_command,
};
pub use device::{
    run_connect, run_devices, run_disconnect, run_forward_command, run_pair, run_reboot,
    run_shell, run_summary,
};
pub use files::{run_logcat, run_pull, run_push, run_screenrecord, run_screenshot, LogcatOptions};
pub use inspect::{run_apk_info, run_intent_command, run_processes, run_state_command};
pub use tooling::{run_api, run_doctor, run_report_command};

// =============================================================================
// CommandContext - shared state with lazy-loading
// =============================================================================

/// Shared context for command handlers
pub struct CommandContext {
    pub settings: Arc<Settings>,
    pub adb: Adb,
    pub stores: Stores,
    /// Requested device (serial or alias), if any
    pub device: Option<String>,
    pub json: bool,
    /// Fired on Ctrl+C
    pub cancel: CancellationToken,

    registry: OnceLock<Arc<ActionRegistry>>,
}

impl CommandContext {
    pub fn new(settings: Settings, adb_path: String, device: Option<String>, json: bool) -> Self {
        let settings = Arc::new(settings);
        let runner = Arc::new(SystemRunner::from_settings(&settings));
        let adb = Adb::with_runner(adb_path, runner, settings.clone());
        let stores = Stores::from_settings(&settings);

        Self {
            settings,
            adb,
            stores,
            device,
            json,
            cancel: CancellationToken::new(),
            registry: OnceLock::new(),
        }
    }

    /// Built-in actions plus every plugin manifest in the plugins directory
    pub fn registry(&self) -> Arc<ActionRegistry> {
        self.registry
            .get_or_init(|| {
                let mut registry = ActionRegistry::with_builtins();
                // conflicts and load failures are logged by the registry
                load_plugins(&self.settings.paths.plugins_dir).register_into(&mut registry);
                Arc::new(registry)
            })
            .clone()
    }

    /// The device this invocation operates on
    pub async fn target(&self) -> Result<Device> {
        Ok(select_device(&self.adb, &self.stores, self.device.as_deref()).await?)
    }

    /// Action context whose background streams stop on Ctrl+C
    pub fn action_context(&self) -> ActionContext {
        ActionContext::new(self.adb.clone()).with_cancel(self.cancel.child_token())
    }

    /// Print `value` as JSON with `--json`, otherwise run `human`
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human();
        }
        Ok(())
    }

    /// Print a command's output and turn a failed run into an error
    pub fn finish_command(&self, result: CommandResult) -> Result<()> {
        self.emit(&result, || {
            print!("{}", result.stdout());
            eprint!("{}", result.stderr());
        })?;
        result.into_result()?;
        Ok(())
    }
}

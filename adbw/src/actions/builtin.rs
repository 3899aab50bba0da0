//! Built-in actions

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::{param, require, Action, ActionContext, ActionOutput, StepParams};
use crate::adb::{self, logcat, Device};
use crate::error::Result;

const APK_PATH: &[&str] = &["apk_path", "apk"];
const PACKAGE: &[&str] = &["package_name", "package"];
const LOG_TAG: &[&str] = &["log_tag", "tag"];

/// Every built-in action, in menu order
pub fn builtin_actions() -> Vec<Arc<dyn Action>> {
    vec![
        Arc::new(InstallApk),
        Arc::new(ClearData),
        Arc::new(LaunchApp),
        Arc::new(TailFilteredLogcat),
        Arc::new(RunShell),
    ]
}

/// `install_apk`: install (or replace) an APK from `apk_path`
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallApk;

#[async_trait]
impl Action for InstallApk {
    fn name(&self) -> &str {
        "install_apk"
    }

    fn description(&self) -> &str {
        "Install an APK, replacing any existing install (apk_path)"
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        device: &Device,
        params: &StepParams,
    ) -> Result<ActionOutput> {
        let apk = require(self.name(), params, APK_PATH)?;
        let result = adb::install_apk(ctx.adb(), &device.serial, Path::new(apk)).await;
        Ok(ActionOutput::Command(result))
    }
}

/// `clear_data`: wipe an app's data
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearData;

#[async_trait]
impl Action for ClearData {
    fn name(&self) -> &str {
        "clear_data"
    }

    fn description(&self) -> &str {
        "Clear app data (package_name)"
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        device: &Device,
        params: &StepParams,
    ) -> Result<ActionOutput> {
        let package = require(self.name(), params, PACKAGE)?;
        let result = adb::clear_data(ctx.adb(), &device.serial, package).await;
        Ok(ActionOutput::Command(result))
    }
}

/// `launch_app`: start an explicit activity, or the launcher entry
#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchApp;

#[async_trait]
impl Action for LaunchApp {
    fn name(&self) -> &str {
        "launch_app"
    }

    fn description(&self) -> &str {
        "Launch an app (package_name, optional activity)"
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        device: &Device,
        params: &StepParams,
    ) -> Result<ActionOutput> {
        let package = require(self.name(), params, PACKAGE)?;
        let activity = param(params, &["activity"]);
        let result = adb::launch_app(ctx.adb(), &device.serial, package, activity).await;
        Ok(ActionOutput::Command(result))
    }
}

/// `tail_filtered_logcat`: start a live logcat filtered to one tag.
///
/// Succeeds as soon as the stream is up; lines are pumped in the background
/// until the context is cancelled, so later steps are not blocked.
#[derive(Debug, Clone, Copy, Default)]
pub struct TailFilteredLogcat;

#[async_trait]
impl Action for TailFilteredLogcat {
    fn name(&self) -> &str {
        "tail_filtered_logcat"
    }

    fn description(&self) -> &str {
        "Stream logcat for one tag in the background (log_tag, optional priority)"
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        device: &Device,
        params: &StepParams,
    ) -> Result<ActionOutput> {
        let tag = require(self.name(), params, LOG_TAG)?;
        let priority = logcat::parse_priority(param(params, &["priority"]))?;

        let command = ctx
            .adb()
            .command(Some(&device.serial), logcat::filter_args(tag, priority))
            .display();
        let stream = logcat::tail_filtered(
            ctx.adb(),
            &device.serial,
            tag,
            priority,
            ctx.cancel_token().clone(),
        )
        .await?;
        ctx.spawn_stream(&device.serial, stream);

        Ok(ActionOutput::Streaming { command })
    }
}

/// `run_shell`: one shell command on the device
#[derive(Debug, Clone, Copy, Default)]
pub struct RunShell;

#[async_trait]
impl Action for RunShell {
    fn name(&self) -> &str {
        "run_shell"
    }

    fn description(&self) -> &str {
        "Run a shell command on the device (command)"
    }

    async fn execute(
        &self,
        ctx: &ActionContext,
        device: &Device,
        params: &StepParams,
    ) -> Result<ActionOutput> {
        let command = require(self.name(), params, &["command"])?;
        let result = ctx.adb().shell(&device.serial, command).await;
        Ok(ActionOutput::Command(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::test_support::scripted;
    use crate::adb::DeviceState;
    use crate::error::AdbwError;
    use crate::testing::{Reply, ScriptedRunner};

    fn device() -> Device {
        Device::new("S", DeviceState::Device)
    }

    fn params(pairs: &[(&str, &str)]) -> StepParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_install_without_apk_path_is_missing_parameter() {
        let (adb, runner) = scripted(ScriptedRunner::new());
        let ctx = ActionContext::new(adb);

        let err = InstallApk
            .execute(&ctx, &device(), &StepParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AdbwError::MissingParameter { ref param, .. } if param == "apk_path"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_clear_data_accepts_package_alias() {
        let (adb, runner) = scripted(
            ScriptedRunner::new().reply("adb -s S shell pm clear com.example", Reply::ok("Success\n")),
        );
        let ctx = ActionContext::new(adb);

        let output = ClearData
            .execute(&ctx, &device(), &params(&[("package", "com.example")]))
            .await
            .unwrap();
        match output {
            ActionOutput::Command(result) => assert!(result.success()),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(runner.calls(), ["adb -s S shell pm clear com.example"]);
    }

    #[tokio::test]
    async fn test_tail_logcat_succeeds_once_stream_is_up() {
        let (adb, _) = scripted(ScriptedRunner::new().stream_lines(
            "adb -s S logcat MyApp:D *:S",
            ["D MyApp: hello", "D MyApp: world"],
        ));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let ctx = ActionContext::new(adb).with_sink(tx);

        let output = TailFilteredLogcat
            .execute(
                &ctx,
                &device(),
                &params(&[("log_tag", "MyApp"), ("priority", "d")]),
            )
            .await
            .unwrap();
        assert!(matches!(output, ActionOutput::Streaming { ref command } if command.contains("MyApp:D")));

        ctx.wait_streams().await;
        assert_eq!(rx.recv().await.unwrap().line, "D MyApp: hello");
        assert_eq!(rx.recv().await.unwrap().line, "D MyApp: world");
    }

    #[tokio::test]
    async fn test_tail_logcat_rejects_bad_priority() {
        let (adb, runner) = scripted(ScriptedRunner::new());
        let ctx = ActionContext::new(adb);
        let err = TailFilteredLogcat
            .execute(&ctx, &device(), &params(&[("tag", "MyApp"), ("priority", "Q")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AdbwError::InvalidParameter { .. }));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tail_logcat_launch_failure_is_error() {
        let (adb, _) = scripted(
            ScriptedRunner::new().stream_failure("adb -s S logcat MyApp:I *:S", "no adb"),
        );
        let ctx = ActionContext::new(adb);
        let err = TailFilteredLogcat
            .execute(&ctx, &device(), &params(&[("log_tag", "MyApp")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AdbwError::LaunchFailure { .. }));
    }

    #[tokio::test]
    async fn test_run_shell_returns_non_zero_exit_as_output() {
        let (adb, _) = scripted(
            ScriptedRunner::new().reply("adb -s S shell 'ls /nope'", Reply::exit(1, "", "No such file")),
        );
        let ctx = ActionContext::new(adb);
        let output = RunShell
            .execute(&ctx, &device(), &params(&[("command", "ls /nope")]))
            .await
            .unwrap();
        match output {
            ActionOutput::Command(result) => assert_eq!(result.exit_code(), Some(1)),
            other => panic!("unexpected: {other:?}"),
        }
    }
}

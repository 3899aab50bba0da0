//! One action across many devices
//!
//! Each device gets its own task; a semaphore caps how many run at once.
//! Devices never wait on each other beyond that cap, and every device ends
//! up with exactly one outcome, even if its task panics.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::actions::{ActionContext, ActionRegistry, StepParams};
use crate::adb::Device;
use crate::error::AdbwError;
use crate::workflow::{execute_step, StepOutcome};

#[derive(Debug, Clone)]
pub struct BroadcastRunner {
    registry: Arc<ActionRegistry>,
    max_parallel: usize,
}

impl BroadcastRunner {
    pub fn new(registry: Arc<ActionRegistry>, max_parallel: usize) -> Self {
        Self {
            registry,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Run `action` with `params` on every device. The map has one entry per
    /// distinct serial in `devices`.
    pub async fn broadcast(
        &self,
        ctx: &ActionContext,
        action: &str,
        params: &StepParams,
        devices: &[Device],
    ) -> BTreeMap<String, StepOutcome> {
        let permits = Arc::new(Semaphore::new(self.max_parallel));
        tracing::info!(action, devices = devices.len(), max_parallel = self.max_parallel, "broadcasting");

        let handles: Vec<(String, JoinHandle<StepOutcome>)> = devices
            .iter()
            .map(|device| {
                let registry = self.registry.clone();
                let ctx = ctx.clone();
                let permits = permits.clone();
                let action = action.to_string();
                let params = params.clone();
                let device = device.clone();
                let serial = device.serial.clone();

                let handle = tokio::spawn(async move {
                    // the semaphore is never closed
                    let _permit = permits.acquire_owned().await.ok();
                    execute_step(&registry, &ctx, 0, &action, &params, &device).await
                });
                (serial, handle)
            })
            .collect();

        // every task is already running; awaiting in order only orders collection
        let mut outcomes = BTreeMap::new();
        for (serial, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(serial = %serial, "broadcast task failed: {}", e);
                    let err = AdbwError::Io(format!("task failed: {e}"));
                    StepOutcome::from_execution(0, action, Err(err))
                }
            };
            tracing::info!(serial = %serial, success = outcome.success, "device finished");
            outcomes.insert(serial, outcome);
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::test_support::scripted;
    use crate::adb::DeviceState;
    use crate::error::ErrorKind;
    use crate::testing::{Reply, ScriptedRunner};
    use std::time::Duration;
    use tokio::time::Instant;

    fn devices(serials: &[&str]) -> Vec<Device> {
        serials
            .iter()
            .map(|s| Device::new(*s, DeviceState::Device))
            .collect()
    }

    fn shell(command: &str) -> StepParams {
        [("command".to_string(), command.to_string())].into()
    }

    #[tokio::test]
    async fn test_one_outcome_per_device() {
        let (adb, _) = scripted(
            ScriptedRunner::new()
                .reply("adb -s b shell id", Reply::exit(1, "", "denied"))
                .fallback(Reply::ok("uid=2000(shell)\n")),
        );
        let ctx = ActionContext::new(adb);
        let runner = BroadcastRunner::new(Arc::new(ActionRegistry::with_builtins()), 2);

        let outcomes = runner
            .broadcast(&ctx, "run_shell", &shell("id"), &devices(&["a", "b", "c"]))
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes["a"].success);
        assert!(!outcomes["b"].success);
        assert!(outcomes["c"].success);
    }

    fn slow_d2() -> ScriptedRunner {
        ScriptedRunner::new()
            .reply("adb -s d2 shell id", Reply::timeout().after(Duration::from_millis(400)))
            .fallback(Reply::ok("ok\n").after(Duration::from_millis(100)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_device_does_not_delay_others() {
        let (adb, runner) = scripted(slow_d2());
        let ctx = ActionContext::new(adb);
        let broadcast = BroadcastRunner::new(Arc::new(ActionRegistry::with_builtins()), 3);

        let started = Instant::now();
        let outcomes = broadcast
            .broadcast(&ctx, "run_shell", &shell("id"), &devices(&["d1", "d2", "d3"]))
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes["d1"].success);
        assert!(outcomes["d3"].success);
        assert_eq!(outcomes["d2"].error.as_ref().unwrap().kind, ErrorKind::Timeout);
        assert_eq!(runner.finished().last().map(String::as_str), Some("adb -s d2 shell id"));
        // bounded by the slowest device, not the sum
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_parallel_bounds_concurrency() {
        let (adb, runner) = scripted(slow_d2());
        let ctx = ActionContext::new(adb);
        let broadcast = BroadcastRunner::new(Arc::new(ActionRegistry::with_builtins()), 1);

        let started = Instant::now();
        let outcomes = broadcast
            .broadcast(&ctx, "run_shell", &shell("id"), &devices(&["d1", "d2", "d3"]))
            .await;

        assert_eq!(outcomes.len(), 3);
        // one at a time: 100 + 400 + 100
        assert!(started.elapsed() >= Duration::from_millis(600));
        assert_eq!(runner.finished().len(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_device_is_killed_without_blocking_others() {
        use crate::adb::Adb;
        use crate::config::Settings;
        use crate::process::SystemRunner;
        use std::os::unix::fs::PermissionsExt;

        // stand-in adb: `-s <serial> shell <cmd>`; d2 never answers
        let dir = tempfile::tempdir().unwrap();
        let fake_adb = dir.path().join("adb");
        std::fs::write(
            &fake_adb,
            "#!/bin/sh\nif [ \"$2\" = d2 ]; then sleep 10; fi\necho \"ok $2\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake_adb, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut settings = Settings::default();
        settings.adb.retry_count = 0;
        settings.adb.command_timeout_sec = 0.5;
        let settings = Arc::new(settings);
        let runner = Arc::new(SystemRunner::from_settings(&settings));
        let adb = Adb::with_runner(fake_adb.to_string_lossy(), runner, settings);
        let ctx = ActionContext::new(adb);
        let broadcast = BroadcastRunner::new(Arc::new(ActionRegistry::with_builtins()), 3);

        let started = std::time::Instant::now();
        let outcomes = broadcast
            .broadcast(&ctx, "run_shell", &shell("id"), &devices(&["d1", "d2", "d3"]))
            .await;

        assert!(outcomes["d1"].success, "{:?}", outcomes["d1"].error);
        assert_eq!(outcomes["d1"].result.as_ref().unwrap().stdout(), "ok d1\n");
        assert!(outcomes["d3"].success);
        assert_eq!(outcomes["d2"].error.as_ref().unwrap().kind, ErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unknown_action_fails_every_device() {
        let (adb, runner) = scripted(ScriptedRunner::new());
        let ctx = ActionContext::new(adb);
        let broadcast = BroadcastRunner::new(Arc::new(ActionRegistry::with_builtins()), 4);

        let outcomes = broadcast
            .broadcast(&ctx, "teleport", &StepParams::new(), &devices(&["a", "b"]))
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .values()
            .all(|o| o.error.as_ref().unwrap().kind == ErrorKind::UnknownAction));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_devices_yields_empty_map() {
        let (adb, _) = scripted(ScriptedRunner::new());
        let ctx = ActionContext::new(adb);
        let broadcast = BroadcastRunner::new(Arc::new(ActionRegistry::with_builtins()), 4);
        let outcomes = broadcast
            .broadcast(&ctx, "run_shell", &shell("id"), &[])
            .await;
        assert!(outcomes.is_empty());
    }
}

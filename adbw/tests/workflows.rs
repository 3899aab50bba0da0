//! Integration tests for adbw
//!
//! These drive the public API end to end over `adbw::testing::ScriptedRunner`,
//! so no real `adb` or device is needed.
//!
//! ```bash
//! cargo test -p adbw --test workflows
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use adbw::actions::{load_plugins, ActionContext, ActionRegistry, RegistrationStatus, StepParams};
use adbw::adb::{self, resolve_target, Adb, Device, DeviceState};
use adbw::api::{ApiParams, CommandApi};
use adbw::broadcast::BroadcastRunner;
use adbw::config::Settings;
use adbw::executor::CommandExecutor;
use adbw::process::CommandSpec;
use adbw::store::Stores;
use adbw::testing::{Reply, ScriptedRunner};
use adbw::workflow::{dev_loop, Profile, StepDefinition, Workflow, WorkflowEngine};
use adbw::ErrorKind;

fn adb_with(runner: ScriptedRunner, retry_count: u32) -> (Adb, Arc<ScriptedRunner>) {
    let runner = Arc::new(runner);
    let mut settings = Settings::default();
    settings.adb.retry_count = retry_count;
    let adb = Adb::with_runner("adb", runner.clone(), Arc::new(settings));
    (adb, runner)
}

fn ready(serial: &str) -> Device {
    Device::new(serial, DeviceState::Device)
}

fn engine() -> WorkflowEngine {
    WorkflowEngine::new(Arc::new(ActionRegistry::with_builtins()))
}

// ============================================================================
// Retry policy
// ============================================================================

#[tokio::test]
async fn retries_launch_failures_up_to_the_configured_bound() {
    for retry_count in 0..4 {
        let (adb, runner) = adb_with(
            ScriptedRunner::new().reply("adb devices -l", Reply::launch_failure("adb not found")),
            retry_count,
        );

        let err = adb::list_devices(&adb).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LaunchFailure);
        assert_eq!(runner.calls().len() as u32, retry_count + 1);
    }
}

#[tokio::test]
async fn non_zero_exit_is_final() {
    let runner = Arc::new(ScriptedRunner::new().reply(
        "adb -s S shell pm clear com.missing",
        Reply::exit(1, "Failed", "Unknown package"),
    ));
    let executor = CommandExecutor::new(runner.clone());
    let spec = CommandSpec::new("adb").args(["-s", "S", "shell", "pm", "clear", "com.missing"]);

    let result = executor.execute(&spec, 5).await;

    assert_eq!(result.attempts(), 1);
    assert_eq!(result.exit_code(), Some(1));
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn timeout_then_success_records_attempts() {
    let (adb, _) = adb_with(
        ScriptedRunner::new()
            .reply("adb -s S shell getprop", Reply::timeout())
            .reply("adb -s S shell getprop", Reply::ok("[ro.product.brand]: [google]\n")),
        2,
    );

    let result = adb.shell("S", "getprop").await;

    assert!(result.success());
    assert_eq!(result.attempts(), 2);
}

// ============================================================================
// Workflows
// ============================================================================

#[tokio::test]
async fn dev_loop_runs_profile_steps_in_order() {
    let (adb, runner) = adb_with(
        ScriptedRunner::new()
            .fallback(Reply::ok("Success"))
            .stream_lines("adb -s S logcat Example:I *:S", ["I Example: started"]),
        0,
    );
    let profile = Profile {
        package_name: "com.example".into(),
        activity: ".MainActivity".into(),
        log_tag: "Example".into(),
        apk_path: "app-debug.apk".into(),
    };
    let ctx = ActionContext::new(adb);

    let report = engine()
        .run_with_defaults(&ctx, &dev_loop(&profile), &ready("S"), &profile.defaults())
        .await;
    ctx.shutdown().await;

    assert!(report.success);
    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(
        report.outcomes[3].stream.as_deref(),
        Some("adb -s S logcat Example:I *:S")
    );
    assert_eq!(
        runner.calls(),
        [
            "adb -s S install -r app-debug.apk",
            "adb -s S shell pm clear com.example",
            "adb -s S shell am start -n com.example/.MainActivity",
            "adb -s S logcat Example:I *:S",
        ]
    );
}

#[tokio::test]
async fn halting_failure_leaves_later_steps_out_of_the_report() {
    let (adb, runner) = adb_with(
        ScriptedRunner::new()
            .reply("adb -s S install -r broken.apk", Reply::exit(1, "", "INSTALL_FAILED_INVALID_APK"))
            .fallback(Reply::ok("")),
        0,
    );
    let workflow = Workflow::new("ship")
        .with_step(StepDefinition::new("install_apk").param("apk_path", "broken.apk"))
        .with_step(StepDefinition::new("launch_app").param("package", "com.example"));

    let report = engine()
        .run(&ActionContext::new(adb), &workflow, &ready("S"))
        .await;

    assert!(!report.success);
    assert_eq!(report.outcomes.len(), 1);
    assert!(report.outcomes[0].halted);
    assert_eq!(
        report.outcomes[0].error.as_ref().map(|e| e.kind),
        Some(ErrorKind::NonZeroExit)
    );
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn unknown_action_with_continue_on_error_keeps_going() {
    let (adb, _) = adb_with(ScriptedRunner::new().fallback(Reply::ok("")), 0);
    let workflow = Workflow::new("typo")
        .with_step(StepDefinition::new("instal_apk").continue_on_error())
        .with_step(StepDefinition::new("clear_data").param("package_name", "com.example"));

    let report = engine()
        .run(&ActionContext::new(adb), &workflow, &ready("S"))
        .await;

    assert!(!report.success);
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(
        report.outcomes[0].error.as_ref().map(|e| e.kind),
        Some(ErrorKind::UnknownAction)
    );
    assert!(report.outcomes[1].success);
}

#[tokio::test]
async fn empty_workflow_succeeds() {
    let (adb, runner) = adb_with(ScriptedRunner::new(), 0);

    let report = engine()
        .run(&ActionContext::new(adb), &Workflow::new("noop"), &ready("S"))
        .await;

    assert!(report.success);
    assert!(report.outcomes.is_empty());
    assert!(runner.calls().is_empty());
}

// ============================================================================
// Device selection
// ============================================================================

#[test]
fn resolve_target_selection_rules() {
    let one = [ready("A")];
    let two = [ready("A"), ready("B")];

    assert_eq!(resolve_target(&[], None, None).unwrap_err().kind(), ErrorKind::NoDevice);
    assert_eq!(resolve_target(&[], Some("A"), None).unwrap_err().kind(), ErrorKind::NoDevice);
    assert_eq!(resolve_target(&one, None, None).unwrap().serial, "A");
    assert_eq!(
        resolve_target(&two, None, None).unwrap_err().kind(),
        ErrorKind::AmbiguousDevice
    );
    assert_eq!(resolve_target(&two, None, Some("B")).unwrap().serial, "B");
    assert_eq!(
        resolve_target(&two, Some("A1"), None).unwrap_err().kind(),
        ErrorKind::DeviceNotFound
    );
}

// ============================================================================
// Broadcast
// ============================================================================

#[tokio::test]
async fn broadcast_isolates_a_hanging_device() {
    let (adb, _) = adb_with(
        ScriptedRunner::new()
            .reply("adb -s d1 shell uptime", Reply::ok("up 1 day"))
            .reply(
                "adb -s d2 shell uptime",
                Reply::timeout().after(Duration::from_millis(300)),
            )
            .reply("adb -s d3 shell uptime", Reply::ok("up 3 days")),
        0,
    );
    let runner = BroadcastRunner::new(Arc::new(ActionRegistry::with_builtins()), 3);
    let params: StepParams = [("command".to_string(), "uptime".to_string())].into();
    let devices = [ready("d1"), ready("d2"), ready("d3")];

    let started = Instant::now();
    let outcomes: BTreeMap<_, _> = runner
        .broadcast(&ActionContext::new(adb), "run_shell", &params, &devices)
        .await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes["d1"].success);
    assert!(outcomes["d3"].success);
    assert_eq!(
        outcomes["d2"].error.as_ref().map(|e| e.kind),
        Some(ErrorKind::Timeout)
    );
    // the devices ran side by side, not one after another
    assert!(started.elapsed() < Duration::from_millis(900));
}

// ============================================================================
// Plugins
// ============================================================================

#[tokio::test]
async fn plugin_actions_register_and_never_shadow_builtins() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("tools.toml"),
        r#"
[[actions]]
name = "install_apk"
description = "shadow attempt"
args = ["shell", "echo", "hijacked"]

[[actions]]
name = "grant_camera"
description = "Grant the camera permission"
args = ["shell", "pm", "grant", "{package_name}", "android.permission.CAMERA"]
"#,
    )
    .unwrap();
    std::fs::write(dir.path().join("broken.toml"), "[[actions]]\nname = \n").unwrap();

    let mut registry = ActionRegistry::with_builtins();
    load_plugins(dir.path()).register_into(&mut registry);

    let statuses: Vec<_> = registry
        .events()
        .iter()
        .filter(|e| e.source != "builtin")
        .map(|e| (e.name.as_str(), e.status))
        .collect();
    assert!(statuses.contains(&("install_apk", RegistrationStatus::Conflict)));
    assert!(statuses.contains(&("grant_camera", RegistrationStatus::Registered)));
    assert!(statuses.iter().any(|(_, s)| *s == RegistrationStatus::Failed));

    let (adb, runner) = adb_with(ScriptedRunner::new().fallback(Reply::ok("")), 0);
    let workflow = Workflow::new("setup")
        .with_step(StepDefinition::new("install_apk").param("apk_path", "app.apk"))
        .with_step(StepDefinition::new("grant_camera").param("package", "com.example"));
    let report = WorkflowEngine::new(Arc::new(registry))
        .run(&ActionContext::new(adb), &workflow, &ready("S"))
        .await;

    assert!(report.success);
    assert_eq!(
        runner.calls(),
        [
            "adb -s S install -r app.apk",
            "adb -s S shell pm grant com.example android.permission.CAMERA",
        ]
    );
}

// ============================================================================
// Command API
// ============================================================================

#[tokio::test]
async fn api_workflow_run_uses_stored_profile() {
    let dir = tempfile::tempdir().unwrap();
    let (adb, runner) = adb_with(
        ScriptedRunner::new()
            .reply("adb devices -l", Reply::ok("List of devices attached\nS\tdevice\n"))
            .fallback(Reply::ok("")),
        0,
    );
    let stores = Stores::under(dir.path(), adb.settings());
    stores
        .profiles
        .save(
            "app",
            Profile {
                package_name: "com.example".into(),
                ..Default::default()
            },
        )
        .unwrap();
    stores
        .workflows
        .save(
            Workflow::new("reset")
                .with_step(StepDefinition::new("clear_data"))
                .with_step(StepDefinition::new("launch_app")),
        )
        .unwrap();

    let api = CommandApi::new(adb, Arc::new(ActionRegistry::with_builtins()), stores.clone())
        .with_workflows_dir(dir.path().join("workflows"));
    let params: ApiParams = serde_json::json!({ "name": "reset", "profile": "app", "serial": "S" })
        .as_object()
        .cloned()
        .unwrap();

    let response = api.call("workflow.run", &params).await;

    assert!(response.ok, "{:?}", response.error);
    assert_eq!(response.data["outcomes"].as_array().unwrap().len(), 2);
    assert!(runner
        .calls()
        .contains(&"adb -s S shell pm clear com.example".to_string()));
    assert_eq!(stores.state.remembered_serial().as_deref(), Some("S"));
}

#[tokio::test]
async fn api_unknown_command_is_an_error_response() {
    let dir = tempfile::tempdir().unwrap();
    let (adb, runner) = adb_with(ScriptedRunner::new(), 0);
    let stores = Stores::under(dir.path(), adb.settings());
    let api = CommandApi::new(adb, Arc::new(ActionRegistry::with_builtins()), stores);

    let response = api.call("device.format", &ApiParams::new()).await;

    assert!(!response.ok);
    assert_eq!(response.error.map(|e| e.kind), Some(ErrorKind::InvalidParameter));
    assert!(runner.calls().is_empty());
}

//! Non-interactive command API
//!
//! Each command takes a flat JSON object of parameters and returns a
//! [`CommandResponse`]: a success flag, a JSON payload, and an error detail
//! when something went wrong. Nothing here prints or returns raw text.
//!
//! Every device command accepts an optional `serial` (or device alias). When
//! it is absent the single connected device, or the remembered one, is used.
//! Parameters are validated before any device is contacted.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::actions::{ActionContext, ActionRegistry, StepParams};
use crate::adb::{self, logcat, resolve_target, Adb, Device, DeviceState};
use crate::error::{AdbwError, ErrorDetail, Result};
use crate::process::CommandResult;
use crate::report::redact_json;
use crate::store::Stores;
use crate::workflow::{load_workflows, Profile, Workflow, WorkflowEngine};

/// Commands understood by [`CommandApi::call`]
pub const COMMANDS: &[&str] = &[
    "devices.list",
    "device.summary",
    "shell.run",
    "package.list",
    "package.info",
    "apk.install",
    "file.push",
    "file.pull",
    "logcat.snapshot",
    "workflow.run",
];

pub type ApiParams = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub ok: bool,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl CommandResponse {
    pub fn success(data: Value) -> Self {
        Self {
            ok: true,
            data,
            error: None,
        }
    }

    pub fn failure(err: &AdbwError) -> Self {
        Self {
            ok: false,
            data: Value::Null,
            error: Some(ErrorDetail::from(err)),
        }
    }

    /// A command result as payload; failed runs carry their classification
    pub fn from_command(result: &CommandResult) -> Self {
        Self {
            ok: result.success(),
            data: serde_json::to_value(result).unwrap_or(Value::Null),
            error: result.error().map(ErrorDetail::from),
        }
    }
}

// ============================================================================
// Parameter helpers
// ============================================================================

/// First non-empty parameter among `names`; numbers and booleans are
/// accepted in their text form
pub fn str_param(params: &ApiParams, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match params.get(*name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn require_str(command: &str, params: &ApiParams, names: &[&str]) -> Result<String> {
    str_param(params, names).ok_or_else(|| AdbwError::missing(command, names[0]))
}

fn bool_param(params: &ApiParams, name: &str) -> Result<bool> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "0" | "no" => Ok(false),
            "true" | "1" | "yes" => Ok(true),
            other => Err(AdbwError::invalid(name, format!("expected a boolean, got '{other}'"))),
        },
        Some(other) => Err(AdbwError::invalid(name, format!("expected a boolean, got {other}"))),
    }
}

fn usize_param(params: &ApiParams, name: &str) -> Result<Option<usize>> {
    match str_param(params, &[name]) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AdbwError::invalid(name, format!("expected a count, got '{raw}'"))),
    }
}

fn existing_file(param: &str, path: &str) -> Result<PathBuf> {
    let path = PathBuf::from(path);
    if !path.exists() {
        return Err(AdbwError::invalid(
            param,
            format!("{} does not exist", path.display()),
        ));
    }
    Ok(path)
}

fn to_data<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| AdbwError::Io(e.to_string()))
}

// ============================================================================
// Device selection
// ============================================================================

/// Serial used under dry run when no device was named
pub const DRY_RUN_SERIAL: &str = "<serial>";

/// Resolve `requested` (a serial or an alias) against the connected devices,
/// falling back to the remembered device. Only an explicitly requested
/// device is remembered for the next run.
///
/// Under dry run the device list is not consulted: the requested serial (or
/// the remembered one, or [`DRY_RUN_SERIAL`]) is taken as-is.
pub async fn select_device(adb: &Adb, stores: &Stores, requested: Option<&str>) -> Result<Device> {
    let requested = match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => Some(stores.aliases.resolve(name)?),
        None => None,
    };
    let remembered = stores.state.remembered_serial();

    if adb.is_dry_run() {
        let serial = requested
            .or(remembered)
            .unwrap_or_else(|| DRY_RUN_SERIAL.to_string());
        tracing::info!(serial = %serial, "dry run, skipping device discovery");
        return Ok(Device::new(serial, DeviceState::Device));
    }

    let devices = adb::list_devices(adb).await?;
    let device = resolve_target(&devices, requested.as_deref(), remembered.as_deref())?;

    if !device.is_ready() {
        tracing::warn!(serial = %device.serial, state = ?device.state, "selected device is not ready");
    }
    if requested.is_some() {
        if let Err(e) = stores.state.remember(&device.serial) {
            tracing::warn!("could not remember selected device: {}", e);
        }
    }
    Ok(device)
}

// ============================================================================
// Requests
// ============================================================================

/// A device command with its parameters checked
enum Request {
    Summary,
    Shell { command: String },
    PackageList { third_party: bool, filter: Option<String> },
    PackageInfo { package: String },
    ApkInstall { apk: PathBuf },
    FilePush { local: PathBuf, remote: String },
    FilePull { remote: String, local: PathBuf },
    LogcatSnapshot { lines: Option<usize> },
    WorkflowRun { workflow: Workflow, profile: Profile },
}

// ============================================================================
// CommandApi
// ============================================================================

#[derive(Debug, Clone)]
pub struct CommandApi {
    adb: Adb,
    registry: Arc<ActionRegistry>,
    stores: Stores,
    workflows_dir: PathBuf,
    redact: bool,
}

impl CommandApi {
    pub fn new(adb: Adb, registry: Arc<ActionRegistry>, stores: Stores) -> Self {
        let settings = adb.settings();
        let workflows_dir = settings.paths.workflows_dir.clone();
        let redact = settings.output.redact;
        Self {
            adb,
            registry,
            stores,
            workflows_dir,
            redact,
        }
    }

    pub fn with_workflows_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workflows_dir = dir.into();
        self
    }

    pub fn adb(&self) -> &Adb {
        &self.adb
    }

    /// Run one command. Never fails: errors come back inside the response.
    pub async fn call(&self, command: &str, params: &ApiParams) -> CommandResponse {
        tracing::debug!(command, "api call");
        match self.dispatch(command, params).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(command, "api call failed: {}", e);
                CommandResponse::failure(&e)
            }
        }
    }

    async fn dispatch(&self, command: &str, params: &ApiParams) -> Result<CommandResponse> {
        if command == "devices.list" {
            let devices = adb::list_devices(&self.adb).await?;
            return Ok(CommandResponse::success(to_data(&devices)?));
        }

        // parameters are checked before any adb round trip
        let request = self.parse_request(command, params)?;
        let device = self.device(params).await?;
        let serial = device.serial.as_str();

        let response = match request {
            Request::Summary => {
                CommandResponse::success(to_data(&adb::device_summary(&self.adb, serial).await?)?)
            }
            Request::Shell { command } => {
                let result = self.adb.shell(serial, &command).await;
                self.redacted(CommandResponse::from_command(&result))
            }
            Request::PackageList {
                third_party,
                filter,
            } => {
                let packages: Vec<String> = adb::list_packages(&self.adb, serial, third_party)
                    .await?
                    .into_iter()
                    .filter(|p| filter.as_ref().map_or(true, |f| p.to_lowercase().contains(f)))
                    .collect();
                CommandResponse::success(json!({ "serial": serial, "packages": packages }))
            }
            Request::PackageInfo { package } => {
                let info = adb::package_info(&self.adb, serial, &package).await?;
                CommandResponse::success(to_data(&info)?)
            }
            Request::ApkInstall { apk } => {
                CommandResponse::from_command(&adb::install_apk(&self.adb, serial, &apk).await)
            }
            Request::FilePush { local, remote } => {
                CommandResponse::from_command(&adb::push(&self.adb, serial, &local, &remote).await)
            }
            Request::FilePull { remote, local } => {
                CommandResponse::from_command(&adb::pull(&self.adb, serial, &remote, &local).await)
            }
            Request::LogcatSnapshot { lines } => {
                let text = logcat::snapshot(&self.adb, serial).await?;
                let text = match lines {
                    Some(n) => tail_lines(&text, n),
                    None => text,
                };
                self.redacted(CommandResponse::success(
                    json!({ "serial": serial, "text": text }),
                ))
            }
            Request::WorkflowRun { workflow, profile } => {
                self.run_workflow(&workflow, &profile, &device).await?
            }
        };
        Ok(response)
    }

    fn parse_request(&self, command: &str, params: &ApiParams) -> Result<Request> {
        let request = match command {
            "device.summary" => Request::Summary,
            "shell.run" => Request::Shell {
                command: require_str(command, params, &["command", "cmd"])?,
            },
            "package.list" => Request::PackageList {
                third_party: bool_param(params, "third_party")?,
                filter: str_param(params, &["filter"]).map(|f| f.to_lowercase()),
            },
            "package.info" => Request::PackageInfo {
                package: require_str(command, params, &["package_name", "package"])?,
            },
            "apk.install" => {
                let apk = require_str(command, params, &["apk_path", "apk"])?;
                Request::ApkInstall {
                    apk: existing_file("apk_path", &apk)?,
                }
            }
            "file.push" => {
                let local = require_str(command, params, &["local"])?;
                let remote = require_str(command, params, &["remote"])?;
                Request::FilePush {
                    local: existing_file("local", &local)?,
                    remote,
                }
            }
            "file.pull" => Request::FilePull {
                remote: require_str(command, params, &["remote"])?,
                local: PathBuf::from(require_str(command, params, &["local"])?),
            },
            "logcat.snapshot" => Request::LogcatSnapshot {
                lines: usize_param(params, "lines")?,
            },
            "workflow.run" => self.workflow_request(params)?,
            other => {
                return Err(AdbwError::invalid(
                    "command",
                    format!("unknown command '{other}', expected one of: {}", COMMANDS.join(", ")),
                ))
            }
        };
        Ok(request)
    }

    fn workflow_request(&self, params: &ApiParams) -> Result<Request> {
        let name = require_str("workflow.run", params, &["name", "workflow"])?;
        let profile = match str_param(params, &["profile"]) {
            Some(profile) => self
                .stores
                .profiles
                .get(&profile)?
                .ok_or_else(|| AdbwError::invalid("profile", format!("no profile named '{profile}'")))?,
            None => Profile::default(),
        };

        let mut workflows = load_workflows(&self.stores.workflows, &self.workflows_dir, &profile)?;
        let workflow = workflows
            .remove(&name)
            .ok_or_else(|| AdbwError::invalid("name", format!("no workflow named '{name}'")))?;
        Ok(Request::WorkflowRun { workflow, profile })
    }

    async fn device(&self, params: &ApiParams) -> Result<Device> {
        let requested = str_param(params, &["serial", "device"]);
        select_device(&self.adb, &self.stores, requested.as_deref()).await
    }

    async fn run_workflow(
        &self,
        workflow: &Workflow,
        profile: &Profile,
        device: &Device,
    ) -> Result<CommandResponse> {
        let ctx = ActionContext::new(self.adb.clone());
        let engine = WorkflowEngine::new(self.registry.clone());
        let report = engine
            .run_with_defaults(&ctx, workflow, device, &profile.defaults())
            .await;
        // background streams do not outlive a non-interactive call
        ctx.shutdown().await;

        Ok(CommandResponse {
            ok: report.success,
            data: to_data(&report)?,
            error: None,
        })
    }

    fn redacted(&self, mut response: CommandResponse) -> CommandResponse {
        if self.redact {
            redact_json(&mut response.data);
        }
        response
    }
}

/// Convert a flat string map (CLI `key=value` pairs) into API params
pub fn params_from_pairs(pairs: &StepParams) -> ApiParams {
    pairs
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    let mut tail = lines[start..].join("\n");
    if !tail.is_empty() {
        tail.push('\n');
    }
    tail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::test_support::scripted;
    use crate::config::Settings;
    use crate::error::ErrorKind;
    use crate::testing::{Reply, ScriptedRunner};

    const ONE_DEVICE: &str = "List of devices attached\nS\tdevice model:Pixel_8\n";

    fn api(runner: ScriptedRunner) -> (CommandApi, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let (adb, _) = scripted(runner.reply("adb devices -l", Reply::ok(ONE_DEVICE)));
        let stores = Stores::under(dir.path(), &Settings::default());
        let api = CommandApi::new(adb, Arc::new(ActionRegistry::with_builtins()), stores)
            .with_workflows_dir(dir.path().join("workflows"));
        (api, dir)
    }

    fn params(value: Value) -> ApiParams {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_devices_list() {
        let (api, _dir) = api(ScriptedRunner::new());
        let response = api.call("devices.list", &ApiParams::new()).await;
        assert!(response.ok);
        assert_eq!(response.data[0]["serial"], "S");
        assert_eq!(response.data[0]["state"], "device");
    }

    #[tokio::test]
    async fn test_shell_run_reports_exit_code() {
        let (api, _dir) = api(
            ScriptedRunner::new().reply("adb -s S shell 'ls /x'", Reply::exit(2, "", "No such file")),
        );
        let response = api
            .call("shell.run", &params(json!({"command": "ls /x"})))
            .await;
        assert!(!response.ok);
        assert_eq!(response.data["exit_code"], 2);
        assert_eq!(response.error.unwrap().kind, ErrorKind::NonZeroExit);
    }

    #[tokio::test]
    async fn test_missing_parameter() {
        let (api, _dir) = api(ScriptedRunner::new());
        let response = api.call("package.info", &ApiParams::new()).await;
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().kind, ErrorKind::MissingParameter);
    }

    #[tokio::test]
    async fn test_unknown_serial() {
        let (api, _dir) = api(ScriptedRunner::new());
        let response = api
            .call("device.summary", &params(json!({"serial": "nope"})))
            .await;
        assert_eq!(response.error.unwrap().kind, ErrorKind::DeviceNotFound);
    }

    #[tokio::test]
    async fn test_package_list_filters() {
        let (api, _dir) = api(ScriptedRunner::new().reply(
            "adb -s S shell pm list packages -3",
            Reply::ok("package:com.example.app\npackage:org.other\n"),
        ));
        let response = api
            .call(
                "package.list",
                &params(json!({"third_party": "true", "filter": "EXAMPLE"})),
            )
            .await;
        assert!(response.ok);
        assert_eq!(response.data["packages"], json!(["com.example.app"]));
    }

    #[tokio::test]
    async fn test_apk_install_checks_local_file() {
        let (api, _dir) = api(ScriptedRunner::new());
        let response = api
            .call("apk.install", &params(json!({"apk_path": "/no/such.apk"})))
            .await;
        assert_eq!(response.error.unwrap().kind, ErrorKind::InvalidParameter);
    }

    #[tokio::test]
    async fn test_logcat_snapshot_tail() {
        let (api, _dir) = api(
            ScriptedRunner::new().reply("adb -s S logcat -d", Reply::ok("one\ntwo\nthree\n")),
        );
        let response = api
            .call("logcat.snapshot", &params(json!({"lines": 2})))
            .await;
        assert_eq!(response.data["text"], "two\nthree\n");
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (api, _dir) = api(ScriptedRunner::new());
        let response = api.call("reboot.now", &ApiParams::new()).await;
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().kind, ErrorKind::InvalidParameter);
    }

    #[tokio::test]
    async fn test_workflow_run_from_store() {
        let (api, _dir) = api(ScriptedRunner::new().fallback(Reply::ok("Success\n")));
        api.stores
            .workflows
            .save(
                crate::workflow::Workflow::new("reset").with_step(
                    crate::workflow::StepDefinition::new("clear_data").param("package", "com.a"),
                ),
            )
            .unwrap();

        let response = api
            .call("workflow.run", &params(json!({"name": "reset"})))
            .await;
        assert!(response.ok);
        assert_eq!(response.data["outcomes"][0]["action"], "clear_data");
        assert_eq!(response.data["serial"], "S");
    }

    #[tokio::test]
    async fn test_missing_parameter_skips_device_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let (adb, runner) = scripted(ScriptedRunner::new().fallback(Reply::ok(ONE_DEVICE)));
        let api = CommandApi::new(
            adb,
            Arc::new(ActionRegistry::with_builtins()),
            Stores::under(dir.path(), &Settings::default()),
        )
        .with_workflows_dir(dir.path().join("workflows"));

        for command in ["shell.run", "package.info", "file.push", "workflow.run"] {
            let response = api.call(command, &ApiParams::new()).await;
            assert_eq!(response.error.unwrap().kind, ErrorKind::MissingParameter);
        }
        let response = api
            .call("workflow.run", &params(json!({"name": "no-such-flow"})))
            .await;
        assert_eq!(response.error.unwrap().kind, ErrorKind::InvalidParameter);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_implicit_pick_is_not_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let (adb, _) = scripted(
            ScriptedRunner::new()
                .reply("adb devices -l", Reply::ok(ONE_DEVICE))
                .reply(
                    "adb devices -l",
                    Reply::ok("List of devices attached
S	device
T	device
"),
                )
                .fallback(Reply::ok("uid=2000(shell)\n")),
        );
        let stores = Stores::under(dir.path(), &Settings::default());
        let api = CommandApi::new(adb, Arc::new(ActionRegistry::with_builtins()), stores.clone());
        let shell = params(json!({"command": "id"}));

        assert!(api.call("shell.run", &shell).await.ok);
        assert_eq!(stores.state.remembered_serial(), None);

        let response = api.call("shell.run", &shell).await;
        assert_eq!(response.error.unwrap().kind, ErrorKind::AmbiguousDevice);

        // naming a device pins it for later serial-less calls
        let explicit = params(json!({"serial": "T", "command": "id"}));
        assert!(api.call("shell.run", &explicit).await.ok);
        assert_eq!(stores.state.remembered_serial().as_deref(), Some("T"));
        let response = api.call("shell.run", &shell).await;
        assert_eq!(response.data["command"], "adb -s T shell id");
    }

    #[tokio::test]
    async fn test_dry_run_echoes_device_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.adb.dry_run = true;
        let settings = Arc::new(settings);
        let runner = Arc::new(crate::process::SystemRunner::from_settings(&settings));
        let adb = Adb::with_runner("adb", runner, settings.clone());
        let stores = Stores::under(dir.path(), &settings);
        let api = CommandApi::new(adb, Arc::new(ActionRegistry::with_builtins()), stores.clone());

        let response = api
            .call(
                "shell.run",
                &params(json!({"serial": "emulator-5554", "command": "id"})),
            )
            .await;
        assert!(response.ok, "{:?}", response.error);
        assert_eq!(response.data["stdout"], "[dry-run] adb -s emulator-5554 shell id\n");

        let response = api.call("shell.run", &params(json!({"command": "id"}))).await;
        assert!(response.ok);
        assert_eq!(
            response.data["stdout"],
            format!("[dry-run] adb -s {DRY_RUN_SERIAL} shell id\n")
        );
        // a dry run leaves no state behind
        assert_eq!(stores.state.remembered_serial(), None);
    }
}

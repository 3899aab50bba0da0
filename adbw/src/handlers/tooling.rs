//! Reports, environment checks and the JSON command API

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;

use super::CommandContext;
use crate::cli::ReportCommands;
use adbw::adb;
use adbw::api::{ApiParams, CommandApi};
use adbw::config::find_config_file;
use adbw::report::{
    capture_scheduled_logs, collect_health, collect_network, write_bugreport_bundle,
    write_health_report, write_network_diagnostics, LogCapturePlan,
};

/// Handle the `report` command
pub async fn run_report_command(ctx: &CommandContext, command: ReportCommands) -> Result<()> {
    let dir = command.dir().clone();
    let redact = ctx.settings.output.redact;
    let device = ctx.target().await?;
    let serial = device.serial.as_str();
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let path = match command {
        ReportCommands::Health { .. } => {
            let report = collect_health(&ctx.adb, serial).await?;
            write_health_report(&report, &dir, redact)?
        }
        ReportCommands::Network { .. } => {
            let diag = collect_network(&ctx.adb, serial).await?;
            write_network_diagnostics(&diag, &dir, redact)?
        }
        ReportCommands::Logs {
            minutes, interval, ..
        } => {
            let total = Duration::try_from_secs_f64(minutes * 60.0)
                .map_err(|_| anyhow!("--minutes must be a non-negative number"))?;
            let plan = LogCapturePlan::new(total, Duration::from_secs(interval));
            tracing::info!(
                serial,
                total_sec = plan.total().as_secs(),
                interval_sec = plan.interval().as_secs(),
                "capturing logs"
            );
            let capture = capture_scheduled_logs(
                &ctx.adb,
                serial,
                plan,
                &dir,
                redact,
                ctx.cancel.child_token(),
            )
            .await?;
            return ctx.emit(&capture, || {
                println!(
                    "Saved {} chunk(s) in {}",
                    capture.chunks.len(),
                    capture.dir.display()
                )
            });
        }
        ReportCommands::Bundle { .. } => {
            let bundle = write_bugreport_bundle(&ctx.adb, serial, &dir, redact).await?;
            ctx.emit(&bundle, || {
                println!("Saved {}", bundle.dir.display());
                for error in &bundle.errors {
                    println!("  incomplete: {}", error);
                }
            })?;
            if bundle.logcat.is_none() && bundle.bugreport.is_none() {
                bail!("bundle is empty: {}", bundle.errors.join("; "));
            }
            return Ok(());
        }
    };

    ctx.emit(&serde_json::json!({ "serial": serial, "path": path }), || {
        println!("Saved {}", path.display())
    })
}

// =============================================================================
// Doctor
// =============================================================================

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    ok: bool,
    detail: String,
}

impl Check {
    fn new(name: &'static str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok,
            detail: detail.into(),
        }
    }
}

fn check_writable(dir: &Path) -> Check {
    let marker = dir.join(".adbw_doctor_check");
    let result = std::fs::write(&marker, b"ok").and_then(|_| std::fs::remove_file(&marker));
    match result {
        Ok(()) => Check::new("working directory", true, dir.display().to_string()),
        Err(e) => Check::new("working directory", false, format!("{}: {}", dir.display(), e)),
    }
}

/// Handle the `doctor` command
pub async fn run_doctor(ctx: &CommandContext, config_path: Option<&Path>) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let mut checks = vec![check_writable(&cwd)];

    let config = config_path
        .map(Path::to_path_buf)
        .or_else(find_config_file)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "none (defaults)".to_string());
    checks.push(Check::new("config file", true, config));

    let version = adb::version(&ctx.adb).await;
    let adb_ok = version.success();
    let detail = match version.stdout().lines().next() {
        Some(first) if adb_ok => format!("{} ({})", ctx.adb.path(), first.trim()),
        _ => format!(
            "{}: {}",
            ctx.adb.path(),
            version.error().map(|e| e.to_string()).unwrap_or_default()
        ),
    };
    checks.push(Check::new("adb", adb_ok, detail));

    if adb_ok {
        match adb::list_devices(&ctx.adb).await {
            Ok(devices) => {
                let ready = devices.iter().filter(|d| d.is_ready()).count();
                checks.push(Check::new(
                    "devices",
                    true,
                    format!("{} connected, {} ready", devices.len(), ready),
                ));
            }
            Err(e) => checks.push(Check::new("devices", false, e.to_string())),
        }
    }

    ctx.emit(&checks, || {
        for check in &checks {
            let mark = if check.ok { "ok  " } else { "FAIL" };
            println!("[{}] {:<18} {}", mark, check.name, check.detail);
        }
    })?;

    if checks.iter().any(|c| !c.ok) {
        bail!("environment check failed");
    }
    Ok(())
}

// =============================================================================
// API
// =============================================================================

/// Handle the `api` command: the response JSON always goes to stdout
pub async fn run_api(ctx: &CommandContext, command: &str, params: Option<&str>) -> Result<()> {
    let params: ApiParams = match params.map(str::trim).filter(|p| !p.is_empty()) {
        Some(raw) => serde_json::from_str::<serde_json::Value>(raw)
            .context("--params must be JSON")?
            .as_object()
            .cloned()
            .ok_or_else(|| anyhow!("--params must be a JSON object"))?,
        None => ApiParams::new(),
    };

    let api = CommandApi::new(ctx.adb.clone(), ctx.registry(), ctx.stores.clone());
    let response = api.call(command, &params).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.ok {
        bail!("{} failed", command);
    }
    Ok(())
}

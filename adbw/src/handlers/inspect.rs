//! Intent, process, device state and APK handlers

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::json;

use super::CommandContext;
use crate::cli::{IntentCommands, StateCommands};
use adbw::adb;
use adbw::report::{read_device_snapshot, write_device_snapshot};

/// Handle the `intent` command
pub async fn run_intent_command(ctx: &CommandContext, command: IntentCommands) -> Result<()> {
    let device = ctx.target().await?;
    let serial = device.serial.as_str();

    let result = match command {
        IntentCommands::Url { url } => adb::open_url(&ctx.adb, serial, &url).await,
        IntentCommands::Start { component } => {
            adb::start_component(&ctx.adb, serial, &component).await
        }
        IntentCommands::Broadcast { action, package } => {
            adb::send_broadcast(&ctx.adb, serial, &action, package.as_deref()).await
        }
        IntentCommands::Am { args } => adb::am(&ctx.adb, serial, &args).await?,
    };
    ctx.finish_command(result)
}

/// Handle the `processes` command
pub async fn run_processes(ctx: &CommandContext, filter: Option<&str>) -> Result<()> {
    let device = ctx.target().await?;
    let report = adb::inspect_processes(&ctx.adb, &device.serial, filter).await?;

    ctx.emit(&report, || {
        for line in &report.processes {
            println!("{}", line);
        }
        if report.filter.is_some() {
            let pids = if report.pids.is_empty() {
                "(not running)".to_string()
            } else {
                report.pids.join(" ")
            };
            println!("\npid: {}", pids);
        }
        if let Some(services) = &report.services {
            println!("\n{}", services.trim_end());
        }
    })
}

/// Handle the `state` command
pub async fn run_state_command(ctx: &CommandContext, command: StateCommands) -> Result<()> {
    match command {
        StateCommands::Snapshot { dir } => {
            let device = ctx.target().await?;
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            let snapshot = adb::capture_state(&ctx.adb, &device.serial).await?;
            let path = write_device_snapshot(&snapshot, &dir, ctx.settings.output.redact)?;
            ctx.emit(&json!({ "serial": device.serial, "path": path }), || {
                println!("Saved {}", path.display())
            })
        }
        StateCommands::Restore { file, namespaces } => {
            let snapshot = read_device_snapshot(&file)?;
            let device = ctx.target().await?;
            if snapshot.serial != device.serial {
                tracing::warn!(
                    from = %snapshot.serial,
                    to = %device.serial,
                    "restoring a snapshot taken on another device"
                );
            }

            let report = adb::restore_settings(&ctx.adb, &device.serial, &snapshot, &namespaces).await;
            ctx.emit(&report, || {
                println!("Applied {} setting(s)", report.applied);
                for key in &report.failed {
                    println!("  failed: {}", key);
                }
            })?;
            if !report.failed.is_empty() {
                bail!("{} setting(s) could not be restored", report.failed.len());
            }
            Ok(())
        }
    }
}

/// Handle the `apk-info` command
pub async fn run_apk_info(ctx: &CommandContext, apk: &Path) -> Result<()> {
    if !apk.is_file() {
        bail!("APK not found: {}", apk.display());
    }
    let device = ctx.target().await?;
    let config = &ctx.settings.apk;
    let insight =
        adb::apk_insight(&ctx.adb, &device.serial, apk, &config.aapt, config.signature_check)
            .await?;

    ctx.emit(&insight, || {
        if let Some(badging) = &insight.badging {
            let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
            println!("Package:     {}", field(&badging.package));
            println!(
                "Version:     {} ({})",
                field(&badging.version_name),
                field(&badging.version_code)
            );
            println!(
                "SDK:         min {} / target {}",
                field(&badging.min_sdk),
                field(&badging.target_sdk)
            );
        }
        println!(
            "Installed:   {}",
            insight.installed_version_code.as_deref().unwrap_or("-")
        );
        for warning in &insight.warnings {
            println!("warning: {}", warning);
        }
    })
}

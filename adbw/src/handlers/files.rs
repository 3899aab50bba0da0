//! File transfer, screen capture and logcat handlers

use std::path::Path;

use anyhow::{bail, Result};
use serde_json::json;

use super::CommandContext;
use adbw::adb::{self, logcat};
use adbw::report::write_logcat_snapshot;

pub async fn run_push(ctx: &CommandContext, local: &Path, remote: &str) -> Result<()> {
    if !local.exists() {
        bail!("local file not found: {}", local.display());
    }
    let device = ctx.target().await?;
    let result = adb::push(&ctx.adb, &device.serial, local, remote).await;
    ctx.finish_command(result)
}

pub async fn run_pull(ctx: &CommandContext, remote: &str, local: &Path) -> Result<()> {
    let device = ctx.target().await?;
    let result = adb::pull(&ctx.adb, &device.serial, remote, local).await;
    ctx.finish_command(result)
}

/// Handle the `screenshot` command
pub async fn run_screenshot(ctx: &CommandContext, dir: &Path) -> Result<()> {
    let device = ctx.target().await?;
    std::fs::create_dir_all(dir)?;
    let path = adb::screenshot(&ctx.adb, &device.serial, dir).await?;

    ctx.emit(&json!({ "serial": device.serial, "path": path }), || {
        println!("Saved {}", path.display());
    })
}

/// Handle the `screenrecord` command
pub async fn run_screenrecord(ctx: &CommandContext, seconds: u32, dir: &Path) -> Result<()> {
    let device = ctx.target().await?;
    std::fs::create_dir_all(dir)?;
    let path = adb::screenrecord(&ctx.adb, &device.serial, seconds, dir).await?;

    ctx.emit(&json!({ "serial": device.serial, "path": path }), || {
        println!("Saved {}", path.display());
    })
}

/// Options of the `logcat` command
pub struct LogcatOptions {
    /// `Some("")` means an auto-named snapshot file
    pub snapshot: Option<String>,
    pub tag: String,
    pub priority: Option<String>,
    pub clear: bool,
}

/// Handle the `logcat` command: write a snapshot, or follow the filtered
/// stream until Ctrl+C
pub async fn run_logcat(ctx: &CommandContext, options: LogcatOptions) -> Result<()> {
    let priority = logcat::parse_priority(options.priority.as_deref())?;
    let device = ctx.target().await?;
    let serial = device.serial.as_str();

    if options.clear {
        logcat::clear(&ctx.adb, serial).await.into_result()?;
    }

    if let Some(file) = options.snapshot {
        let file = Some(file).filter(|f| !f.trim().is_empty());
        let path = write_logcat_snapshot(
            &ctx.adb,
            serial,
            file.as_deref().map(Path::new),
            Path::new("."),
            ctx.settings.output.redact,
        )
        .await?;
        return ctx.emit(&json!({ "serial": serial, "path": path }), || {
            println!("Saved {}", path.display());
        });
    }

    tracing::info!(serial, tag = %options.tag, %priority, "following logcat");
    let mut stream =
        logcat::tail_filtered(&ctx.adb, serial, &options.tag, priority, ctx.cancel.child_token())
            .await?;
    while let Some(line) = stream.next_line().await {
        if ctx.json {
            println!("{}", json!({ "serial": serial, "line": line }));
        } else {
            println!("{}", line);
        }
    }
    stream.finish().await;
    Ok(())
}

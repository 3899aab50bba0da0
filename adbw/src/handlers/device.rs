//! Device command handlers
//!
//! Listing, identity, shell, reboot, wireless connections and port forwarding.

use anyhow::Result;
use serde_json::json;

use super::CommandContext;
use crate::cli::ForwardCommands;
use adbw::adb;

/// Handle the `devices` command
pub async fn run_devices(ctx: &CommandContext) -> Result<()> {
    let devices = adb::list_devices(&ctx.adb).await?;

    ctx.emit(&devices, || {
        if devices.is_empty() {
            println!("No devices connected.");
            return;
        }
        for device in &devices {
            let state = format!("{:?}", device.state).to_lowercase();
            let model = device.model.as_deref().unwrap_or("-");
            println!("{:<24} {:<13} {}", device.serial, state, model);
        }
    })
}

/// Handle the `summary` command
pub async fn run_summary(ctx: &CommandContext) -> Result<()> {
    let device = ctx.target().await?;
    let summary = adb::device_summary(&ctx.adb, &device.serial).await?;

    ctx.emit(&summary, || {
        let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".to_string());
        println!("Serial:  {}", summary.serial);
        println!("Brand:   {}", field(&summary.brand));
        println!("Model:   {}", field(&summary.model));
        println!(
            "Android: {} (API {})",
            field(&summary.android_version),
            field(&summary.api_level)
        );
    })
}

/// Handle the `shell` command
pub async fn run_shell(ctx: &CommandContext, command: &[String]) -> Result<()> {
    let device = ctx.target().await?;
    let result = ctx.adb.shell(&device.serial, &command.join(" ")).await;
    ctx.finish_command(result)
}

pub async fn run_reboot(ctx: &CommandContext) -> Result<()> {
    let device = ctx.target().await?;
    let result = adb::reboot(&ctx.adb, &device.serial).await;
    ctx.finish_command(result)
}

/// Handle the `connect` command: tcpip on the selected USB device, then connect
pub async fn run_connect(ctx: &CommandContext, host: &str, port: u16) -> Result<()> {
    let device = ctx.target().await?;
    let result = adb::connect_wireless(&ctx.adb, &device.serial, host, port).await?;
    ctx.finish_command(result)
}

pub async fn run_disconnect(ctx: &CommandContext, target: &str) -> Result<()> {
    let result = adb::disconnect(&ctx.adb, target).await;
    ctx.finish_command(result)
}

pub async fn run_pair(ctx: &CommandContext, host: &str, code: &str) -> Result<()> {
    let result = adb::pair(&ctx.adb, host, code).await;
    ctx.finish_command(result)
}

/// Handle the `forward` command
pub async fn run_forward_command(ctx: &CommandContext, command: ForwardCommands) -> Result<()> {
    let device = ctx.target().await?;
    let serial = device.serial.as_str();

    let result = match command {
        ForwardCommands::List => {
            let forwards = adb::list_forwards(&ctx.adb, serial).await?;
            return ctx.emit(&json!({ "serial": serial, "forwards": forwards }), || {
                if forwards.is_empty() {
                    println!("No forwards for {}.", serial);
                }
                for forward in &forwards {
                    println!("{} -> {}", forward.local, forward.remote);
                }
            });
        }
        ForwardCommands::Add { local, remote } => {
            adb::add_forward(&ctx.adb, serial, &local, &remote).await
        }
        ForwardCommands::Remove { local } => adb::remove_forward(&ctx.adb, serial, &local).await,
        ForwardCommands::Reverse { remote, local } => {
            adb::add_reverse(&ctx.adb, serial, &remote, &local).await
        }
        ForwardCommands::Unreverse { remote } => {
            adb::remove_reverse(&ctx.adb, serial, &remote).await
        }
    };

    ctx.finish_command(result)
}

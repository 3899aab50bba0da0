//! App command handlers
//!
//! Install, uninstall, package queries, launch/stop/clear and runtime
//! permissions.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde_json::json;

use super::CommandContext;
use crate::cli::PermissionCommands;
use adbw::adb;

/// Handle the `install` command
pub async fn run_install(ctx: &CommandContext, apk: &Path, splits: &[PathBuf]) -> Result<()> {
    for path in std::iter::once(apk).chain(splits.iter().map(PathBuf::as_path)) {
        if !path.is_file() {
            bail!("APK not found: {}", path.display());
        }
    }

    let device = ctx.target().await?;
    let result = if splits.is_empty() {
        adb::install_apk(&ctx.adb, &device.serial, apk).await
    } else {
        let apks: Vec<&Path> = std::iter::once(apk)
            .chain(splits.iter().map(PathBuf::as_path))
            .collect();
        adb::install_split_apks(&ctx.adb, &device.serial, &apks).await
    };
    ctx.finish_command(result)
}

pub async fn run_uninstall(ctx: &CommandContext, package: &str) -> Result<()> {
    let device = ctx.target().await?;
    let result = adb::uninstall(&ctx.adb, &device.serial, package).await;
    ctx.finish_command(result)
}

/// Handle the `packages` command
pub async fn run_packages(
    ctx: &CommandContext,
    third_party: bool,
    filter: Option<&str>,
) -> Result<()> {
    let device = ctx.target().await?;
    let filter = filter.map(str::to_lowercase);
    let packages: Vec<String> = adb::list_packages(&ctx.adb, &device.serial, third_party)
        .await?
        .into_iter()
        .filter(|p| filter.as_ref().map_or(true, |f| p.to_lowercase().contains(f)))
        .collect();

    ctx.emit(&json!({ "serial": device.serial, "packages": packages }), || {
        for package in &packages {
            println!("{}", package);
        }
        eprintln!("{} package(s)", packages.len());
    })
}

/// Handle the `package` command
pub async fn run_package(ctx: &CommandContext, name: &str) -> Result<()> {
    let device = ctx.target().await?;
    let info = adb::package_info(&ctx.adb, &device.serial, name).await?;

    ctx.emit(&info, || {
        println!("Package:   {}", info.package);
        println!("Installed: {}", if info.installed { "yes" } else { "no" });
        if let Some(version) = &info.version_name {
            println!(
                "Version:   {} ({})",
                version,
                info.version_code.as_deref().unwrap_or("?")
            );
        }
        if !info.granted_permissions.is_empty() {
            println!("Granted permissions:");
            for permission in &info.granted_permissions {
                println!("  {}", permission);
            }
        }
    })?;

    if !info.installed {
        bail!("package '{}' is not installed on {}", name, device.serial);
    }
    Ok(())
}

pub async fn run_launch(ctx: &CommandContext, package: &str, activity: Option<&str>) -> Result<()> {
    let device = ctx.target().await?;
    let result = adb::launch_app(&ctx.adb, &device.serial, package, activity).await;
    ctx.finish_command(result)
}

pub async fn run_stop(ctx: &CommandContext, package: &str) -> Result<()> {
    let device = ctx.target().await?;
    let result = adb::force_stop(&ctx.adb, &device.serial, package).await;
    ctx.finish_command(result)
}

pub async fn run_clear(ctx: &CommandContext, package: &str) -> Result<()> {
    let device = ctx.target().await?;
    let result = adb::clear_data(&ctx.adb, &device.serial, package).await;
    ctx.finish_command(result)
}

/// Handle the `permission` command
pub async fn run_permission_command(ctx: &CommandContext, command: PermissionCommands) -> Result<()> {
    let device = ctx.target().await?;
    let serial = device.serial.as_str();

    match command {
        PermissionCommands::List { package } => {
            let info = adb::package_info(&ctx.adb, serial, &package).await?;
            ctx.emit(
                &json!({ "package": info.package, "granted_permissions": info.granted_permissions }),
                || {
                    for permission in &info.granted_permissions {
                        println!("{}", permission);
                    }
                },
            )
        }
        PermissionCommands::Grant {
            package,
            permission,
        } => {
            let result = adb::grant_permission(&ctx.adb, serial, &package, &permission).await;
            ctx.finish_command(result)
        }
        PermissionCommands::Revoke {
            package,
            permission,
        } => {
            let result = adb::revoke_permission(&ctx.adb, serial, &package, &permission).await;
            ctx.finish_command(result)
        }
    }
}

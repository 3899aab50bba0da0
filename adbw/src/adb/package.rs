//! App and package management

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::Adb;
use crate::error::{AdbwError, Result};
use crate::process::CommandResult;

const LAUNCHER_CATEGORY: &str = "android.intent.category.LAUNCHER";

/// Install (replacing an existing install)
pub async fn install_apk(adb: &Adb, serial: &str, apk: &Path) -> CommandResult {
    let apk = apk.to_string_lossy();
    adb.run(Some(serial), ["install", "-r", apk.as_ref()]).await
}

/// Install a base APK plus its splits in one session
pub async fn install_split_apks(adb: &Adb, serial: &str, apks: &[&Path]) -> CommandResult {
    let mut args = vec!["install-multiple".to_string(), "-r".to_string()];
    args.extend(apks.iter().map(|p| p.to_string_lossy().to_string()));
    adb.run(Some(serial), args).await
}

pub async fn uninstall(adb: &Adb, serial: &str, package: &str) -> CommandResult {
    adb.run(Some(serial), ["uninstall", package]).await
}

pub async fn force_stop(adb: &Adb, serial: &str, package: &str) -> CommandResult {
    adb.run(Some(serial), ["shell", "am", "force-stop", package])
        .await
}

pub async fn clear_data(adb: &Adb, serial: &str, package: &str) -> CommandResult {
    adb.run(Some(serial), ["shell", "pm", "clear", package])
        .await
}

/// Start an explicit activity, or the launcher entry when none is given
pub async fn launch_app(
    adb: &Adb,
    serial: &str,
    package: &str,
    activity: Option<&str>,
) -> CommandResult {
    match activity.filter(|a| !a.is_empty()) {
        Some(activity) => {
            let component = format!("{package}/{activity}");
            adb.run(Some(serial), ["shell", "am", "start", "-n", component.as_str()])
                .await
        }
        None => {
            adb.run(
                Some(serial),
                ["shell", "monkey", "-p", package, "-c", LAUNCHER_CATEGORY, "1"],
            )
            .await
        }
    }
}

pub async fn grant_permission(
    adb: &Adb,
    serial: &str,
    package: &str,
    permission: &str,
) -> CommandResult {
    adb.run(Some(serial), ["shell", "pm", "grant", package, permission])
        .await
}

pub async fn revoke_permission(
    adb: &Adb,
    serial: &str,
    package: &str,
    permission: &str,
) -> CommandResult {
    adb.run(Some(serial), ["shell", "pm", "revoke", package, permission])
        .await
}

// ============================================================================
// Queries
// ============================================================================

/// Parse `pm list packages` output into bare package names
pub fn parse_package_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Installed packages, optionally only third-party ones
pub async fn list_packages(adb: &Adb, serial: &str, third_party: bool) -> Result<Vec<String>> {
    let mut args = vec!["shell", "pm", "list", "packages"];
    if third_party {
        args.push("-3");
    }
    let result = adb.run(Some(serial), args).await.into_result()?;
    let mut packages = parse_package_list(result.stdout());
    packages.sort();
    Ok(packages)
}

/// What `dumpsys package` reveals about one package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub package: String,
    pub installed: bool,
    pub version_name: Option<String>,
    pub version_code: Option<String>,
    pub granted_permissions: Vec<String>,
}

pub fn parse_package_info(package: &str, dumpsys: &str) -> PackageInfo {
    let header = format!("Package [{package}]");
    let mut info = PackageInfo {
        package: package.to_string(),
        installed: dumpsys.contains(&header),
        ..Default::default()
    };

    for line in dumpsys.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("versionName=") {
            info.version_name.get_or_insert_with(|| rest.to_string());
        } else if let Some(rest) = line.strip_prefix("versionCode=") {
            let code = rest.split_whitespace().next().unwrap_or_default();
            info.version_code.get_or_insert_with(|| code.to_string());
        } else if line.starts_with("android.permission.") && line.contains("granted=true") {
            if let Some((name, _)) = line.split_once(':') {
                if !info.granted_permissions.iter().any(|p| p == name) {
                    info.granted_permissions.push(name.to_string());
                }
            }
        }
    }

    info
}

pub async fn package_info(adb: &Adb, serial: &str, package: &str) -> Result<PackageInfo> {
    if package.trim().is_empty() {
        return Err(AdbwError::invalid("package_name", "must not be empty"));
    }
    let result = adb
        .run(Some(serial), ["shell", "dumpsys", "package", package])
        .await
        .into_result()?;
    Ok(parse_package_info(package, result.stdout()))
}

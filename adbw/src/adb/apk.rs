//! Local APK metadata and pre-install checks
//!
//! Metadata comes from `aapt dump badging`. When the package is already on
//! the device, its installed `versionCode` is compared to catch downgrades.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{parse_package_info, Adb};
use crate::error::{AdbwError, Result};
use crate::process::CommandSpec;

static QUOTED_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)='([^']*)'").expect("Invalid badging field regex"));

const MISMATCH_SIGNALS: &[&str] = &[
    "signature mismatch",
    "inconsistent certificates",
    "does not match",
];

/// How signature information in `dumpsys package` is treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureCheck {
    /// Warn only on explicit mismatch wording
    #[default]
    Conservative,
    /// Warn whenever signing details exist, since they cannot be compared
    Strict,
    Off,
}

/// Fields of `aapt dump badging`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApkBadging {
    pub package: Option<String>,
    pub version_code: Option<String>,
    pub version_name: Option<String>,
    pub min_sdk: Option<String>,
    pub target_sdk: Option<String>,
}

pub fn parse_badging(output: &str) -> ApkBadging {
    let mut badging = ApkBadging::default();
    let unquote = |s: &str| s.trim().trim_matches('\'').to_string();

    for line in output.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("package:") {
            for caps in QUOTED_FIELD_RE.captures_iter(rest) {
                let value = caps[2].to_string();
                match &caps[1] {
                    "name" => badging.package = Some(value),
                    "versionCode" => badging.version_code = Some(value),
                    "versionName" => badging.version_name = Some(value),
                    _ => {}
                }
            }
        } else if let Some(rest) = line.strip_prefix("sdkVersion:") {
            badging.min_sdk = Some(unquote(rest));
        } else if let Some(rest) = line.strip_prefix("targetSdkVersion:") {
            badging.target_sdk = Some(unquote(rest));
        }
    }

    badging
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApkInsight {
    pub apk: PathBuf,
    /// `None` when aapt is missing or could not read the file
    pub badging: Option<ApkBadging>,
    pub installed_version_code: Option<String>,
    pub warnings: Vec<String>,
}

/// Warnings from comparing the APK with the installed package's dumpsys
pub fn install_warnings(badging: &ApkBadging, dumpsys: &str, check: SignatureCheck) -> Vec<String> {
    let mut warnings = Vec::new();
    let Some(package) = badging.package.as_deref() else {
        return warnings;
    };
    let info = parse_package_info(package, dumpsys);

    let apk_code = badging.version_code.as_deref().and_then(|c| c.parse::<u64>().ok());
    let installed_code = info.version_code.as_deref().and_then(|c| c.parse::<u64>().ok());
    if let (Some(apk), Some(installed)) = (apk_code, installed_code) {
        if apk < installed {
            warnings.push(format!(
                "APK versionCode {apk} is lower than installed {installed} (downgrade)"
            ));
        }
    }

    let text = dumpsys.to_lowercase();
    let has_signing = text.contains("signatures:") || text.contains("signing");
    match check {
        SignatureCheck::Strict if has_signing => warnings.push(
            "signature match cannot be verified from dumpsys output".to_string(),
        ),
        SignatureCheck::Conservative
            if has_signing && MISMATCH_SIGNALS.iter().any(|s| text.contains(s)) =>
        {
            warnings.push("installed package signature may differ; install may fail".to_string())
        }
        _ => {}
    }

    warnings
}

/// Read `apk` with `aapt` and, when its package and version are known,
/// compare it with what is installed on `serial`.
pub async fn apk_insight(
    adb: &Adb,
    serial: &str,
    apk: &Path,
    aapt: &str,
    check: SignatureCheck,
) -> Result<ApkInsight> {
    if !apk.is_file() {
        return Err(AdbwError::invalid(
            "apk_path",
            format!("{} does not exist", apk.display()),
        ));
    }

    let mut insight = ApkInsight {
        apk: apk.to_path_buf(),
        ..Default::default()
    };

    let spec = CommandSpec::new(aapt)
        .args(["dump", "badging"])
        .arg(apk.to_string_lossy())
        .timeout(adb.settings().command_timeout());
    let dumped = adb.execute(&spec).await;
    if !dumped.success() {
        tracing::info!(aapt, "aapt unavailable: {:?}", dumped.error());
        insight
            .warnings
            .push("aapt not found or metadata unavailable; install Android build-tools".to_string());
        return Ok(insight);
    }
    let badging = parse_badging(dumped.stdout());

    let versioned = badging.version_code.as_deref().is_some_and(|c| c.parse::<u64>().is_ok());
    if let (Some(package), true) = (badging.package.as_deref(), versioned) {
        let dumpsys = adb
            .run(Some(serial), ["shell", "dumpsys", "package", package])
            .await
            .into_result()?;
        let info = parse_package_info(package, dumpsys.stdout());
        insight.installed_version_code = info.version_code.filter(|_| info.installed);
        insight.warnings = install_warnings(&badging, dumpsys.stdout(), check);
    }

    insight.badging = Some(badging);
    Ok(insight)
}

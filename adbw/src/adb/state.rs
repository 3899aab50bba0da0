//! Device state snapshots
//!
//! A snapshot records installed packages, system properties and the three
//! `settings` namespaces. Restoring replays `settings put` for the chosen
//! namespaces; packages and properties are informational only.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{shell_quote, Adb};
use crate::error::{AdbwError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsNamespace {
    Global,
    System,
    Secure,
}

impl SettingsNamespace {
    pub const ALL: [SettingsNamespace; 3] = [Self::Global, Self::System, Self::Secure];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::System => "system",
            Self::Secure => "secure",
        }
    }
}

impl fmt::Display for SettingsNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingsNamespace {
    type Err = AdbwError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ns| ns.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                AdbwError::invalid("namespace", format!("expected global, system or secure, got '{s}'"))
            })
    }
}

/// Raw command output captured from one device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub serial: String,
    pub timestamp: String,
    #[serde(default)]
    pub packages_all: String,
    #[serde(default)]
    pub packages_user: String,
    #[serde(default)]
    pub getprop: String,
    #[serde(default)]
    pub settings_global: String,
    #[serde(default)]
    pub settings_system: String,
    #[serde(default)]
    pub settings_secure: String,
}

impl DeviceSnapshot {
    pub fn settings(&self, namespace: SettingsNamespace) -> &str {
        match namespace {
            SettingsNamespace::Global => &self.settings_global,
            SettingsNamespace::System => &self.settings_system,
            SettingsNamespace::Secure => &self.settings_secure,
        }
    }
}

/// Parse `settings list` output (`key=value` per line; values may contain '=')
pub fn parse_settings_map(raw: &str) -> BTreeMap<String, String> {
    raw.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Capture a snapshot. The package listing must succeed; the other queries
/// record whatever they print.
pub async fn capture_state(adb: &Adb, serial: &str) -> Result<DeviceSnapshot> {
    let packages_all = adb.shell(serial, "pm list packages").await.into_result()?;
    let stdout = |result: crate::process::CommandResult| result.stdout().to_string();

    let mut snapshot = DeviceSnapshot {
        serial: serial.to_string(),
        timestamp: chrono::Local::now().format("%Y%m%d_%H%M%S").to_string(),
        packages_all: packages_all.stdout().to_string(),
        packages_user: stdout(adb.shell(serial, "pm list packages -3").await),
        getprop: stdout(adb.run(Some(serial), ["shell", "getprop"]).await),
        ..Default::default()
    };
    for namespace in SettingsNamespace::ALL {
        let raw = stdout(
            adb.run(Some(serial), ["shell", "settings", "list", namespace.as_str()])
                .await,
        );
        match namespace {
            SettingsNamespace::Global => snapshot.settings_global = raw,
            SettingsNamespace::System => snapshot.settings_system = raw,
            SettingsNamespace::Secure => snapshot.settings_secure = raw,
        }
    }
    Ok(snapshot)
}

/// Outcome of replaying one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub applied: usize,
    /// `namespace/key` of every `settings put` that failed
    pub failed: Vec<String>,
}

/// `settings put` every entry of `namespaces` from `snapshot`. A failing
/// key is recorded and the rest continue.
pub async fn restore_settings(
    adb: &Adb,
    serial: &str,
    snapshot: &DeviceSnapshot,
    namespaces: &[SettingsNamespace],
) -> RestoreReport {
    let mut report = RestoreReport::default();

    for &namespace in namespaces {
        let entries = parse_settings_map(snapshot.settings(namespace));
        tracing::info!(serial, %namespace, entries = entries.len(), "restoring settings");
        for (key, value) in entries {
            let command = format!(
                "settings put {namespace} {} {}",
                shell_quote(&key),
                shell_quote(&value)
            );
            if adb.shell(serial, &command).await.success() {
                report.applied += 1;
            } else {
                tracing::warn!(serial, %namespace, key = %key, "settings put failed");
                report.failed.push(format!("{namespace}/{key}"));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::test_support::scripted;
    use crate::testing::{Reply, ScriptedRunner};

    #[test]
    fn test_parse_settings_map() {
        let map = parse_settings_map("adb_enabled=1\nwifi_on=1\nnoise\ndevice_name=Jane's Pixel\nurl=a=b\n=x\n");
        assert_eq!(map.len(), 4);
        assert_eq!(map["device_name"], "Jane's Pixel");
        assert_eq!(map["url"], "a=b");
    }

    #[test]
    fn test_namespace_from_str() {
        assert_eq!("Secure".parse::<SettingsNamespace>().unwrap(), SettingsNamespace::Secure);
        assert!("vendor".parse::<SettingsNamespace>().is_err());
    }

    #[tokio::test]
    async fn test_capture_records_settings_namespaces() {
        let (adb, _) = scripted(
            ScriptedRunner::new()
                .reply("adb -s S shell 'pm list packages'", Reply::ok("package:android\n"))
                .reply("adb -s S shell settings list global", Reply::ok("adb_enabled=1\n"))
                .reply("adb -s S shell settings list secure", Reply::exit(1, "", "denied"))
                .fallback(Reply::ok("")),
        );

        let snapshot = capture_state(&adb, "S").await.unwrap();

        assert_eq!(snapshot.packages_all, "package:android\n");
        assert_eq!(snapshot.settings(SettingsNamespace::Global), "adb_enabled=1\n");
        assert_eq!(snapshot.settings_secure, "");
    }

    #[tokio::test]
    async fn test_capture_requires_package_listing() {
        let (adb, runner) = scripted(ScriptedRunner::new().fallback(Reply::exit(1, "", "offline")));
        assert!(capture_state(&adb, "S").await.is_err());
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_restore_only_chosen_namespaces() {
        let (adb, runner) = scripted(
            ScriptedRunner::new()
                .reply(
                    "adb -s S shell 'settings put system screen_brightness 80'",
                    Reply::exit(1, "", "denied"),
                )
                .fallback(Reply::ok("")),
        );
        let snapshot = DeviceSnapshot {
            serial: "S".into(),
            settings_global: "device_name=Jane's Pixel\n".into(),
            settings_system: "screen_brightness=80\nfont_scale=1.0\n".into(),
            settings_secure: "android_id=abc\n".into(),
            ..Default::default()
        };

        let report = restore_settings(
            &adb,
            "S",
            &snapshot,
            &[SettingsNamespace::Global, SettingsNamespace::System],
        )
        .await;

        assert_eq!(report.applied, 2);
        assert_eq!(report.failed, ["system/screen_brightness"]);
        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| !c.contains("secure")));
        assert!(calls[0].contains("device_name"));
    }
}

//! Device discovery and target selection

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::Adb;
use crate::error::{AdbwError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Device,
    Unauthorized,
    Offline,
    Unknown,
}

impl DeviceState {
    /// Map an adb state token; `None` for tokens that are not a state at all
    fn parse(token: &str) -> Option<Self> {
        match token {
            "device" => Some(Self::Device),
            "unauthorized" => Some(Self::Unauthorized),
            "offline" => Some(Self::Offline),
            "unknown" | "bootloader" | "recovery" | "sideload" | "rescue" | "authorizing"
            | "connecting" | "host" | "no" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// A connected device as seen by one `adb devices` poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub serial: String,
    pub state: DeviceState,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub transport_id: Option<String>,
}

impl Device {
    pub fn new(serial: impl Into<String>, state: DeviceState) -> Self {
        Self {
            serial: serial.into(),
            state,
            model: None,
            product: None,
            transport_id: None,
        }
    }

    /// Authorized and online
    pub fn is_ready(&self) -> bool {
        self.state == DeviceState::Device
    }
}

/// Parse `adb devices -l` output. Lines that are not `serial <state> ...`
/// (headers, daemon notices, garbage) are skipped; a repeated serial keeps
/// its first entry.
pub fn parse_devices(output: &str) -> Vec<Device> {
    let mut seen = HashSet::new();
    let mut devices = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('*') || line.starts_with("List of devices") {
            continue;
        }

        let mut parts = line.split_whitespace();
        let (Some(serial), Some(state_token)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Some(state) = DeviceState::parse(state_token) else {
            tracing::debug!("skipping unrecognized devices line: {}", line);
            continue;
        };
        if !seen.insert(serial.to_string()) {
            continue;
        }

        let mut device = Device::new(serial, state);
        for part in parts {
            if let Some(val) = part.strip_prefix("model:") {
                device.model = Some(val.replace('_', " "));
            } else if let Some(val) = part.strip_prefix("product:") {
                device.product = Some(val.to_string());
            } else if let Some(val) = part.strip_prefix("transport_id:") {
                device.transport_id = Some(val.to_string());
            }
        }
        devices.push(device);
    }

    devices
}

/// List all connected devices
pub async fn list_devices(adb: &Adb) -> Result<Vec<Device>> {
    let result = adb.run(None, ["devices", "-l"]).await.into_result()?;
    Ok(parse_devices(result.stdout()))
}

/// Pick the device to operate on.
///
/// An explicit serial must match a connected device exactly. Without one, a
/// single connected device is chosen; with several, the remembered serial is
/// used when it is still connected, otherwise the choice is ambiguous.
pub fn resolve_target(
    devices: &[Device],
    explicit: Option<&str>,
    remembered: Option<&str>,
) -> Result<Device> {
    if devices.is_empty() {
        return Err(AdbwError::NoDevice);
    }

    if let Some(serial) = explicit {
        return devices
            .iter()
            .find(|d| d.serial == serial)
            .cloned()
            .ok_or_else(|| AdbwError::DeviceNotFound(serial.to_string()));
    }

    if let [only] = devices {
        return Ok(only.clone());
    }

    if let Some(serial) = remembered {
        if let Some(device) = devices.iter().find(|d| d.serial == serial) {
            return Ok(device.clone());
        }
    }

    Err(AdbwError::AmbiguousDevice(
        devices.iter().map(|d| d.serial.clone()).collect(),
    ))
}

// ============================================================================
// Properties
// ============================================================================

/// Identity of a device, read from its system properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub serial: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub android_version: Option<String>,
    pub api_level: Option<String>,
}

/// Parse `getprop` output (`[key]: [value]` per line)
pub fn parse_getprop(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(|line| {
            let (key, value) = line.trim().split_once("]: [")?;
            let key = key.strip_prefix('[')?;
            let value = value.strip_suffix(']')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

pub async fn device_summary(adb: &Adb, serial: &str) -> Result<DeviceSummary> {
    let result = adb.shell(serial, "getprop").await.into_result()?;
    let props = parse_getprop(result.stdout());
    let prop = |key: &str| props.get(key).filter(|v| !v.is_empty()).cloned();

    Ok(DeviceSummary {
        serial: serial.to_string(),
        brand: prop("ro.product.brand"),
        model: prop("ro.product.model"),
        android_version: prop("ro.build.version.release"),
        api_level: prop("ro.build.version.sdk"),
    })
}

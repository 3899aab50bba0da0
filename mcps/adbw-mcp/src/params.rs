//! Parameter types for adbw MCP tools
//!
//! Field names match the command API parameters, so each struct serializes
//! straight into the flat parameter map.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct DevicesListParams {}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct DeviceParams {
    #[schemars(description = "Device serial or alias (optional, auto-selects if only one device)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ShellRunParams {
    #[schemars(description = "Device serial or alias (optional)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,

    #[schemars(description = "Shell command to run on the device")]
    pub command: String,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct PackageListParams {
    #[schemars(description = "Device serial or alias (optional)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,

    #[schemars(description = "Only third-party packages (default: false)")]
    #[serde(default)]
    pub third_party: bool,

    #[schemars(description = "Case-insensitive substring filter on package names")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PackageInfoParams {
    #[schemars(description = "Device serial or alias (optional)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,

    #[schemars(description = "Package name (e.g. com.example.app)")]
    pub package_name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ApkInstallParams {
    #[schemars(description = "Device serial or alias (optional)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,

    #[schemars(description = "Path to the APK on the host")]
    pub apk_path: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FileTransferParams {
    #[schemars(description = "Device serial or alias (optional)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,

    #[schemars(description = "Path on the host")]
    pub local: String,

    #[schemars(description = "Path on the device (e.g. /sdcard/file.txt)")]
    pub remote: String,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct LogcatSnapshotParams {
    #[schemars(description = "Device serial or alias (optional)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,

    #[schemars(description = "Only return the last N lines of the buffer")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowRunParams {
    #[schemars(description = "Device serial or alias (optional)")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,

    #[schemars(description = "Workflow name (e.g. dev-loop)")]
    pub name: String,

    #[schemars(description = "Profile supplying default step parameters")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

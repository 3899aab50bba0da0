//! File transfer and screen capture (screenshots and recordings)

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::Adb;
use crate::error::Result;
use crate::process::CommandResult;

pub async fn push(adb: &Adb, serial: &str, local: &Path, remote: &str) -> CommandResult {
    let local = local.to_string_lossy();
    adb.run(Some(serial), ["push", local.as_ref(), remote]).await
}

pub async fn pull(adb: &Adb, serial: &str, remote: &str, local: &Path) -> CommandResult {
    let local = local.to_string_lossy();
    adb.run(Some(serial), ["pull", remote, local.as_ref()]).await
}

/// Capture a PNG on the device, pull it into `dir`, then remove the device
/// copy. Returns the local path.
pub async fn screenshot(adb: &Adb, serial: &str, dir: &Path) -> Result<PathBuf> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let name = format!("screenshot_{}_{}.png", file_safe(serial), timestamp);
    let remote = format!("/sdcard/{name}");
    let local = dir.join(&name);

    adb.run(Some(serial), ["shell", "screencap", "-p", remote.as_str()])
        .await
        .into_result()?;
    let pulled = pull(adb, serial, &remote, &local).await;

    let cleanup = adb.run(Some(serial), ["shell", "rm", remote.as_str()]).await;
    if !cleanup.success() {
        tracing::warn!(serial, remote = %remote, "could not remove device-side screenshot");
    }

    pulled.into_result()?;
    Ok(local)
}

/// Device-side limit of `screenrecord --time-limit`
pub const MAX_RECORD_SECONDS: u32 = 180;
pub const DEFAULT_RECORD_SECONDS: u32 = 15;

/// Record the screen for `seconds` (clamped to 1..=180), pull the MP4 into
/// `dir`, then remove the device copy. Returns the local path.
pub async fn screenrecord(adb: &Adb, serial: &str, seconds: u32, dir: &Path) -> Result<PathBuf> {
    let seconds = seconds.clamp(1, MAX_RECORD_SECONDS);
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let name = format!("screenrecord_{}_{}.mp4", file_safe(serial), timestamp);
    let remote = format!("/sdcard/{name}");
    let local = dir.join(&name);

    // the recording itself takes `seconds`; the usual budget is on top
    let limit = seconds.to_string();
    let spec = adb
        .command(
            Some(serial),
            ["shell", "screenrecord", "--time-limit", limit.as_str(), remote.as_str()],
        )
        .timeout(
            adb.settings()
                .command_timeout()
                .saturating_add(Duration::from_secs(seconds.into())),
        );
    tracing::info!(serial, seconds, "recording screen");
    adb.execute(&spec).await.into_result()?;

    let pulled = pull(adb, serial, &remote, &local).await;
    let cleanup = adb.run(Some(serial), ["shell", "rm", remote.as_str()]).await;
    if !cleanup.success() {
        tracing::warn!(serial, remote = %remote, "could not remove device-side recording");
    }

    pulled.into_result()?;
    Ok(local)
}

/// Serials of network devices contain ':' which is awkward in file names
pub(crate) fn file_safe(serial: &str) -> String {
    serial
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

//! Device reports written to disk, with optional redaction
//!
//! With `[output] redact = true`, email addresses, IPv4 addresses and MAC
//! addresses are masked in everything written here and in text returned
//! by the command API. Scheduled log chunks are gzip-compressed.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use chrono::Local;
use flate2::write::GzEncoder;
use flate2::Compression;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::adb::{self, file_safe, logcat, Adb, DeviceSnapshot, DeviceSummary};
use crate::error::{AdbwError, Result};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("Invalid email regex")
});
static MAC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}\b").expect("Invalid MAC regex")
});
static IPV4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("Invalid IPv4 regex"));

/// Mask emails, MAC addresses and IPv4 addresses
pub fn redact(text: &str) -> String {
    let text = EMAIL_RE.replace_all(text, "[REDACTED_EMAIL]");
    let text = MAC_RE.replace_all(&text, "[REDACTED_MAC]");
    IPV4_RE.replace_all(&text, "[REDACTED_IP]").into_owned()
}

pub fn redact_if(enabled: bool, text: &str) -> String {
    if enabled {
        redact(text)
    } else {
        text.to_string()
    }
}

/// Redact every string inside a JSON value
pub fn redact_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => *s = redact(s),
        serde_json::Value::Array(items) => items.iter_mut().for_each(redact_json),
        serde_json::Value::Object(map) => map.values_mut().for_each(redact_json),
        _ => {}
    }
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn to_json<T: Serialize>(value: &T, redact: bool) -> Result<String> {
    let mut value =
        serde_json::to_value(value).map_err(|e| AdbwError::Store(e.to_string()))?;
    if redact {
        redact_json(&mut value);
    }
    let mut json =
        serde_json::to_string_pretty(&value).map_err(|e| AdbwError::Store(e.to_string()))?;
    json.push('\n');
    Ok(json)
}

fn sections(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("## {key}\n{value}\n\n"))
        .collect()
}

// ============================================================================
// Health report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub serial: String,
    pub timestamp: String,
    pub summary: DeviceSummary,
    pub storage_df: String,
    pub battery: String,
    pub thermal: String,
    pub ip_route: String,
}

impl HealthReport {
    /// `## section` blocks, one per field
    pub fn to_text(&self) -> String {
        let summary = &self.summary;
        sections(&[
            ("serial", self.serial.as_str()),
            ("timestamp", self.timestamp.as_str()),
            ("brand", summary.brand.as_deref().unwrap_or_default()),
            ("model", summary.model.as_deref().unwrap_or_default()),
            ("android_version", summary.android_version.as_deref().unwrap_or_default()),
            ("api_level", summary.api_level.as_deref().unwrap_or_default()),
            ("storage_df", self.storage_df.as_str()),
            ("battery", self.battery.as_str()),
            ("thermal", self.thermal.as_str()),
            ("ip_route", self.ip_route.as_str()),
        ])
    }
}

/// Gather device identity plus storage, battery, thermal and routing state.
/// Only the identity query must succeed; the rest record whatever they print.
pub async fn collect_health(adb: &Adb, serial: &str) -> Result<HealthReport> {
    let summary = adb::device_summary(adb, serial).await?;
    let stdout = |result: crate::process::CommandResult| result.stdout().to_string();

    Ok(HealthReport {
        serial: serial.to_string(),
        timestamp: timestamp(),
        summary,
        storage_df: stdout(adb.shell(serial, "df -h").await),
        battery: stdout(adb.shell(serial, "dumpsys battery").await),
        thermal: stdout(adb.shell(serial, "dumpsys thermalservice").await),
        ip_route: stdout(adb.shell(serial, "ip route").await),
    })
}

/// Write `health_report_<serial>_<ts>.json` and `.txt` into `dir`. Returns
/// the JSON path.
pub fn write_health_report(report: &HealthReport, dir: &Path, redact: bool) -> Result<PathBuf> {
    let base = format!(
        "health_report_{}_{}",
        file_safe(&report.serial),
        report.timestamp
    );
    let json_path = dir.join(format!("{base}.json"));
    let text_path = dir.join(format!("{base}.txt"));

    std::fs::write(&json_path, to_json(report, redact)?)?;
    std::fs::write(&text_path, redact_if(redact, &report.to_text()))?;
    tracing::info!(path = %json_path.display(), "wrote health report");
    Ok(json_path)
}

/// Dump the log buffer to `path`, or `logcat_<serial>_<ts>.txt` in `dir`
pub async fn write_logcat_snapshot(
    adb: &Adb,
    serial: &str,
    path: Option<&Path>,
    dir: &Path,
    redact: bool,
) -> Result<PathBuf> {
    let text = logcat::snapshot(adb, serial).await?;
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => dir.join(format!("logcat_{}_{}.txt", file_safe(serial), timestamp())),
    };
    std::fs::write(&path, redact_if(redact, &text))?;
    Ok(path)
}

// ============================================================================
// Device state snapshots
// ============================================================================

/// Write `device_snapshot_<serial>_<ts>.json` into `dir`
pub fn write_device_snapshot(snapshot: &DeviceSnapshot, dir: &Path, redact: bool) -> Result<PathBuf> {
    let path = dir.join(format!(
        "device_snapshot_{}_{}.json",
        file_safe(&snapshot.serial),
        snapshot.timestamp
    ));
    std::fs::write(&path, to_json(snapshot, redact)?)?;
    tracing::info!(path = %path.display(), "wrote device snapshot");
    Ok(path)
}

pub fn read_device_snapshot(path: &Path) -> Result<DeviceSnapshot> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| AdbwError::Store(format!("{}: {e}", path.display())))
}

// ============================================================================
// Network diagnostics
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDiagnostics {
    pub serial: String,
    pub timestamp: String,
    pub ip_addr: String,
    pub ip_route: String,
    /// `getprop` lines mentioning dns
    pub dns: String,
    pub ping: String,
    pub connectivity: String,
}

impl NetworkDiagnostics {
    pub fn to_text(&self) -> String {
        sections(&[
            ("serial", self.serial.as_str()),
            ("timestamp", self.timestamp.as_str()),
            ("ip_addr", self.ip_addr.as_str()),
            ("ip_route", self.ip_route.as_str()),
            ("dns", self.dns.as_str()),
            ("ping", self.ping.as_str()),
            ("connectivity", self.connectivity.as_str()),
        ])
    }
}

/// Interfaces, routes, resolvers, reachability and the connectivity
/// service dump. Only `ip addr` must succeed; an unreachable ping is a
/// finding, not an error.
pub async fn collect_network(adb: &Adb, serial: &str) -> Result<NetworkDiagnostics> {
    let ip_addr = adb.shell(serial, "ip addr").await.into_result()?;
    let stdout = |result: crate::process::CommandResult| result.stdout().to_string();

    let props = adb.run(Some(serial), ["shell", "getprop"]).await;
    let dns = props
        .stdout()
        .lines()
        .filter(|line| line.to_lowercase().contains("dns"))
        .map(|line| format!("{line}\n"))
        .collect();

    Ok(NetworkDiagnostics {
        serial: serial.to_string(),
        timestamp: timestamp(),
        ip_addr: ip_addr.stdout().to_string(),
        ip_route: stdout(adb.shell(serial, "ip route").await),
        dns,
        ping: stdout(adb.shell(serial, "ping -c 2 8.8.8.8").await),
        connectivity: stdout(adb.shell(serial, "dumpsys connectivity").await),
    })
}

/// Write `network_diag_<serial>_<ts>.txt` into `dir`
pub fn write_network_diagnostics(diag: &NetworkDiagnostics, dir: &Path, redact: bool) -> Result<PathBuf> {
    let path = dir.join(format!(
        "network_diag_{}_{}.txt",
        file_safe(&diag.serial),
        diag.timestamp
    ));
    std::fs::write(&path, redact_if(redact, &diag.to_text()))?;
    tracing::info!(path = %path.display(), "wrote network diagnostics");
    Ok(path)
}

// ============================================================================
// Scheduled log capture
// ============================================================================

pub const MIN_CAPTURE_TOTAL: Duration = Duration::from_secs(30);
pub const MIN_CAPTURE_INTERVAL: Duration = Duration::from_secs(5);

/// How long to capture and how often to cut a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogCapturePlan {
    total: Duration,
    interval: Duration,
}

impl LogCapturePlan {
    /// Clamped to at least 30s total and a 5s interval
    pub fn new(total: Duration, interval: Duration) -> Self {
        Self {
            total: total.max(MIN_CAPTURE_TOTAL),
            interval: interval.max(MIN_CAPTURE_INTERVAL),
        }
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledCapture {
    pub dir: PathBuf,
    pub chunks: Vec<PathBuf>,
    /// Set when the capture stopped before the plan ran out
    pub cancelled: bool,
}

fn write_gzip(path: &Path, text: &str) -> Result<()> {
    let mut encoder = GzEncoder::new(std::fs::File::create(path)?, Compression::default());
    encoder.write_all(text.as_bytes())?;
    encoder.finish()?;
    Ok(())
}

/// Every `interval` until `total` elapses, dump the log buffer into
/// `scheduled_logs_<serial>_<ts>/logcat_chunk_NNN.txt.gz` and clear it, so
/// chunks do not overlap. A failed dump skips that chunk.
pub async fn capture_scheduled_logs(
    adb: &Adb,
    serial: &str,
    plan: LogCapturePlan,
    dir: &Path,
    redact: bool,
    cancel: CancellationToken,
) -> Result<ScheduledCapture> {
    let out = dir.join(format!("scheduled_logs_{}_{}", file_safe(serial), timestamp()));
    std::fs::create_dir_all(&out)?;
    let mut capture = ScheduledCapture {
        dir: out,
        ..Default::default()
    };

    let end = Instant::now() + plan.total;
    let mut index = 0;
    while Instant::now() < end {
        let wait = plan.interval.min(end - Instant::now());
        tokio::select! {
            _ = cancel.cancelled() => {
                capture.cancelled = true;
                break;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        index += 1;
        let text = match logcat::snapshot(adb, serial).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(serial, chunk = index, "log chunk skipped: {e}");
                continue;
            }
        };
        let path = capture.dir.join(format!("logcat_chunk_{index:03}.txt.gz"));
        write_gzip(&path, &redact_if(redact, &text))?;
        capture.chunks.push(path);
        logcat::clear(adb, serial).await;
    }

    tracing::info!(
        serial,
        chunks = capture.chunks.len(),
        dir = %capture.dir.display(),
        "scheduled log capture finished"
    );
    Ok(capture)
}

// ============================================================================
// Bugreport bundle
// ============================================================================

const BUGREPORT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugreportBundle {
    pub dir: PathBuf,
    pub logcat: Option<PathBuf>,
    pub bugreport: Option<PathBuf>,
    /// One entry per part that could not be collected
    pub errors: Vec<String>,
}

/// Collect a logcat dump and `adb bugreport` into
/// `bundle_<serial>_<ts>/`. Parts that fail are recorded, not fatal.
pub async fn write_bugreport_bundle(
    adb: &Adb,
    serial: &str,
    dir: &Path,
    redact: bool,
) -> Result<BugreportBundle> {
    let out = dir.join(format!("bundle_{}_{}", file_safe(serial), timestamp()));
    std::fs::create_dir_all(&out)?;
    let mut bundle = BugreportBundle {
        dir: out.clone(),
        ..Default::default()
    };

    let logcat_path = out.join("logcat.txt");
    match write_logcat_snapshot(adb, serial, Some(logcat_path.as_path()), &out, redact).await {
        Ok(path) => bundle.logcat = Some(path),
        Err(e) => bundle.errors.push(format!("logcat: {e}")),
    }

    // bugreport runs for minutes on most devices
    let zip = out.join("bugreport.zip");
    let spec = adb
        .command(Some(serial), ["bugreport".to_string(), zip.to_string_lossy().into_owned()])
        .timeout(adb.settings().command_timeout().max(BUGREPORT_TIMEOUT));
    match adb.execute(&spec).await.into_result() {
        Ok(_) => bundle.bugreport = Some(zip),
        Err(e) => bundle.errors.push(format!("bugreport: {e}")),
    }

    tracing::info!(serial, dir = %out.display(), errors = bundle.errors.len(), "wrote bugreport bundle");
    Ok(bundle)
}

//! Configuration loading
//!
//! Settings come from `.adbw.toml`, found by walking up from the current
//! directory, with `~/.config/adbw/config.toml` as the global fallback.
//! Every field has a default, so a missing file is not an error. Once loaded,
//! [`Settings`] is read-only and passed explicitly into every component.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::adb::SignatureCheck;
use crate::error::{AdbwError, Result};

const CONFIG_FILE: &str = ".adbw.toml";

/// Find the config file by walking up the directory tree, then checking the
/// global config directory.
pub fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    let global_path = dirs::config_dir()?.join("adbw").join("config.toml");
    global_path.exists().then_some(global_path)
}

// ============================================================================
// Settings
// ============================================================================

/// Top-level settings (from .adbw.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub adb: AdbSection,
    #[serde(default)]
    pub broadcast: BroadcastSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub apk: ApkSection,
}

/// `[adb]` section: how the adb executable is invoked
#[derive(Debug, Clone, Deserialize)]
pub struct AdbSection {
    /// Explicit adb executable; resolved from the project or PATH when unset
    #[serde(default)]
    pub path: Option<String>,

    /// Re-invocations after the first attempt on launch failure or timeout
    #[serde(default = "default_retry_count", alias = "adb_retry_count")]
    pub retry_count: u32,

    /// Pause between attempts
    #[serde(default)]
    pub retry_delay_ms: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_sec: f64,

    /// Echo commands instead of spawning them
    #[serde(default)]
    pub dry_run: bool,
}

/// `[broadcast]` section
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastSection {
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

/// `[output]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputSection {
    /// Mask emails, IP and MAC addresses in written reports and snapshots
    #[serde(default)]
    pub redact: bool,
}

/// `[apk]` section: local APK inspection
#[derive(Debug, Clone, Deserialize)]
pub struct ApkSection {
    #[serde(default = "default_aapt")]
    pub aapt: String,

    #[serde(default)]
    pub signature_check: SignatureCheck,
}

/// `[paths]` section: where the JSON stores, workflow files and plugin
/// manifests live
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    #[serde(default = "default_workflows_file")]
    pub workflows: PathBuf,
    #[serde(default = "default_profiles_file")]
    pub profiles: PathBuf,
    #[serde(default = "default_aliases_file")]
    pub aliases: PathBuf,
    #[serde(default = "default_state_file")]
    pub state: PathBuf,
    #[serde(default = "default_workflows_dir")]
    pub workflows_dir: PathBuf,
    #[serde(default = "default_plugins_dir")]
    pub plugins_dir: PathBuf,
}

fn default_retry_count() -> u32 {
    2
}

fn default_command_timeout() -> f64 {
    30.0
}

fn default_max_parallel() -> usize {
    4
}

fn default_aapt() -> String {
    "aapt".to_string()
}

fn default_workflows_file() -> PathBuf {
    PathBuf::from(".adbw_workflows.json")
}

fn default_profiles_file() -> PathBuf {
    PathBuf::from(".adbw_profiles.json")
}

fn default_aliases_file() -> PathBuf {
    PathBuf::from(".adbw_aliases.json")
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".adbw_state.json")
}

fn default_workflows_dir() -> PathBuf {
    PathBuf::from(".adbw").join("workflows")
}

fn default_plugins_dir() -> PathBuf {
    PathBuf::from(".adbw").join("plugins")
}

impl Default for AdbSection {
    fn default() -> Self {
        Self {
            path: None,
            retry_count: default_retry_count(),
            retry_delay_ms: 0,
            command_timeout_sec: default_command_timeout(),
            dry_run: false,
        }
    }
}

impl Default for BroadcastSection {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
        }
    }
}

impl Default for ApkSection {
    fn default() -> Self {
        Self {
            aapt: default_aapt(),
            signature_check: SignatureCheck::default(),
        }
    }
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            workflows: default_workflows_file(),
            profiles: default_profiles_file(),
            aliases: default_aliases_file(),
            state: default_state_file(),
            workflows_dir: default_workflows_dir(),
            plugins_dir: default_plugins_dir(),
        }
    }
}

impl Settings {
    /// Load settings from the discovered config file, or defaults if none
    pub fn load() -> Result<Self> {
        match find_config_file() {
            Some(path) => {
                tracing::debug!("Loading config from: {}", path.display());
                Self::load_from_path(&path)
            }
            None => {
                tracing::debug!("No {} found, using defaults", CONFIG_FILE);
                Ok(Self::default())
            }
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AdbwError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| AdbwError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let timeout = self.adb.command_timeout_sec;
        if !timeout.is_finite() || timeout <= 0.0 {
            return Err(AdbwError::Config(format!(
                "command_timeout_sec must be positive, got {timeout}"
            )));
        }
        if self.broadcast.max_parallel == 0 {
            return Err(AdbwError::Config(
                "broadcast.max_parallel must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Upper bound on attempts per command: the first try plus the retries
    pub fn max_attempts(&self) -> u32 {
        self.adb.retry_count.saturating_add(1)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.adb.command_timeout_sec).unwrap_or(Duration::MAX)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.adb.retry_delay_ms)
    }
}

// ============================================================================
// adb executable
// ============================================================================

#[cfg(windows)]
const ADB_BINARY: &str = "adb.exe";
#[cfg(not(windows))]
const ADB_BINARY: &str = "adb";

/// Resolve the adb executable with priority: explicit (CLI/env) > `[adb] path`
/// > `platform-tools/` under `project_dir` > PATH
pub fn resolve_adb_path(explicit: Option<&str>, settings: &Settings, project_dir: &Path) -> String {
    let non_empty = |s: &&str| !s.trim().is_empty();

    if let Some(path) = explicit.filter(non_empty) {
        return path.to_string();
    }
    if let Some(path) = settings.adb.path.as_deref().filter(non_empty) {
        return path.to_string();
    }

    let bundled = project_dir.join("platform-tools").join(ADB_BINARY);
    if bundled.is_file() {
        return bundled.to_string_lossy().into_owned();
    }
    ADB_BINARY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.adb.retry_count, 2);
        assert_eq!(settings.max_attempts(), 3);
        assert_eq!(settings.command_timeout(), Duration::from_secs(30));
        assert!(!settings.adb.dry_run);
        assert_eq!(settings.broadcast.max_parallel, 4);
    }

    #[test]
    fn test_sections_override_defaults() {
        let settings = Settings::from_toml(
            r#"
            [adb]
            path = "/opt/platform-tools/adb"
            adb_retry_count = 0
            command_timeout_sec = 2.5
            dry_run = true

            [output]
            redact = true

            [paths]
            plugins_dir = "plugins"
            "#,
        )
        .unwrap();

        assert_eq!(settings.adb.path.as_deref(), Some("/opt/platform-tools/adb"));
        assert_eq!(settings.max_attempts(), 1);
        assert_eq!(settings.command_timeout(), Duration::from_millis(2500));
        assert!(settings.adb.dry_run);
        assert!(settings.output.redact);
        assert_eq!(settings.paths.plugins_dir, PathBuf::from("plugins"));
    }

    #[test]
    fn test_rejects_non_positive_timeout() {
        let err = Settings::from_toml("[adb]\ncommand_timeout_sec = 0").unwrap_err();
        assert!(err.to_string().contains("command_timeout_sec"));
    }

    #[test]
    fn test_rejects_zero_parallelism() {
        assert!(Settings::from_toml("[broadcast]\nmax_parallel = 0").is_err());
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".adbw.toml");
        std::fs::write(&path, "[adb]\nretry_count = 5\n").unwrap();

        let settings = Settings::load_from_path(&path).unwrap();
        assert_eq!(settings.max_attempts(), 6);
    }

    #[test]
    fn test_apk_section() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.apk.aapt, "aapt");
        assert_eq!(settings.apk.signature_check, SignatureCheck::Conservative);

        let settings = Settings::from_toml(
            "[apk]\naapt = \"/sdk/build-tools/34.0.0/aapt\"\nsignature_check = \"strict\"\n",
        )
        .unwrap();
        assert_eq!(settings.apk.signature_check, SignatureCheck::Strict);
        assert!(Settings::from_toml("[apk]\nsignature_check = \"loose\"\n").is_err());
    }

    #[test]
    fn test_resolve_adb_path_explicit_wins() {
        let mut settings = Settings::default();
        settings.adb.path = Some("/opt/sdk/adb".to_string());
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(resolve_adb_path(Some("/usr/bin/adb"), &settings, dir.path()), "/usr/bin/adb");
        assert_eq!(resolve_adb_path(Some("  "), &settings, dir.path()), "/opt/sdk/adb");
    }

    #[test]
    fn test_resolve_adb_path_bundled_then_path() {
        let settings = Settings::default();
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_adb_path(None, &settings, dir.path()), ADB_BINARY);

        let tools = dir.path().join("platform-tools");
        std::fs::create_dir_all(&tools).unwrap();
        std::fs::write(tools.join(ADB_BINARY), "").unwrap();
        let resolved = resolve_adb_path(None, &settings, dir.path());
        assert!(resolved.ends_with(ADB_BINARY));
        assert!(resolved.contains("platform-tools"));
    }
}

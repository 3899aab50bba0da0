//! Device-level subcommands: forwarding, permissions, intents, state
//! snapshots, broadcast and reports

use std::path::PathBuf;

use clap::Subcommand;

use adbw::adb::SettingsNamespace;

#[derive(Subcommand)]
pub enum ForwardCommands {
    /// List forwards for the target device
    List,
    /// Forward a host port to the device (e.g. tcp:8081 tcp:8081)
    Add { local: String, remote: String },
    /// Remove a forward
    Remove { local: String },
    /// Expose a host port to the device
    Reverse { remote: String, local: String },
    /// Remove a reverse forward
    Unreverse { remote: String },
}

#[derive(Subcommand)]
pub enum PermissionCommands {
    /// Permissions currently granted to a package
    List { package: String },
    /// Grant a runtime permission
    Grant { package: String, permission: String },
    /// Revoke a runtime permission
    Revoke { package: String, permission: String },
}

#[derive(Subcommand)]
pub enum IntentCommands {
    /// Open a URL or deep link with the VIEW action
    Url { url: String },
    /// Start an explicit component (e.g. com.example/.MainActivity)
    Start { component: String },
    /// Send a broadcast intent
    Broadcast {
        action: String,
        /// Deliver only to this package
        #[arg(long)]
        package: Option<String>,
    },
    /// Run the activity manager with raw arguments
    Am {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum StateCommands {
    /// Save packages, properties and settings to a JSON snapshot
    Snapshot {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Replay settings from a snapshot
    Restore {
        file: PathBuf,
        /// Settings namespace to restore: global, system or secure (repeatable)
        #[arg(long = "namespace", short = 'n', required = true)]
        namespaces: Vec<SettingsNamespace>,
    },
}

#[derive(Subcommand)]
pub enum BroadcastCommands {
    /// Install an APK on every ready device
    Install { apk: PathBuf },
    /// Run a shell command on every ready device
    Shell {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Run any registered action on every ready device
    Action {
        name: String,
        /// Action parameter as key=value (repeatable)
        #[arg(long = "param", short = 'p', value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Device health report (identity, storage, battery, thermal, routes)
    Health {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Interfaces, routes, DNS, reachability and connectivity state
    Network {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Capture logcat in gzip chunks for a while (Ctrl+C stops early)
    Logs {
        /// Total capture time (at least 30 seconds)
        #[arg(long, default_value_t = 1.0)]
        minutes: f64,
        /// Seconds between chunks (at least 5)
        #[arg(long, default_value_t = 10)]
        interval: u64,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Logcat dump plus `adb bugreport` in one directory
    Bundle {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

impl ReportCommands {
    pub fn dir(&self) -> &PathBuf {
        match self {
            Self::Health { dir }
            | Self::Network { dir }
            | Self::Logs { dir, .. }
            | Self::Bundle { dir } => dir,
        }
    }
}

/// `key=value` pair
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("package=com.example").unwrap(),
            ("package".to_string(), "com.example".to_string())
        );
        assert_eq!(parse_key_value("cmd=a=b").unwrap().1, "a=b");
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }
}

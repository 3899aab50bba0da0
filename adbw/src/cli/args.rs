//! CLI argument definitions
//!
//! Contains the main CLI struct and Commands enum for clap parsing.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use super::device_args::{
    BroadcastCommands, ForwardCommands, IntentCommands, PermissionCommands, ReportCommands,
    StateCommands,
};
use super::workflow_args::{AliasCommands, ProfileCommands, WorkflowCommands};

#[derive(Parser)]
#[command(name = "adbw", version)]
#[command(about = "Workflow-driven wrapper around the Android Debug Bridge")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// adb executable (default: [adb] path, ./platform-tools/adb, then PATH)
    #[arg(long, env = "ADBW_ADB", global = true)]
    pub adb: Option<String>,

    /// Target device serial or alias
    #[arg(short = 's', long, env = "ANDROID_SERIAL", global = true)]
    pub device: Option<String>,

    /// Print adb commands instead of running them
    #[arg(long, env = "ADBW_DRY_RUN", global = true)]
    pub dry_run: bool,

    /// Re-invocations after a launch failure or timeout (overrides [adb] retry_count)
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    /// Per-command timeout in seconds (overrides [adb] command_timeout_sec)
    #[arg(long, global = true)]
    pub timeout: Option<f64>,

    /// Config file (default: nearest .adbw.toml, then ~/.config/adbw/config.toml)
    #[arg(long, env = "ADBW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    // =========================================================================
    // Devices
    // =========================================================================
    /// List connected devices
    Devices,
    /// Brand, model and Android version of the target device
    Summary,
    /// Run a shell command on the target device
    Shell {
        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Reboot the target device
    Reboot,
    /// Switch the target device to TCP/IP and connect to it over the network
    Connect {
        /// Device IP address
        host: String,
        #[arg(long, default_value_t = adbw::adb::DEFAULT_TCPIP_PORT)]
        port: u16,
    },
    /// Disconnect a network device
    Disconnect {
        /// host:port
        target: String,
    },
    /// Pair with a device using wireless debugging
    Pair {
        /// host:port shown in the pairing dialog
        host: String,
        /// Pairing code
        code: String,
    },
    /// Port forwarding
    Forward {
        #[command(subcommand)]
        command: ForwardCommands,
    },
    /// Deep links, explicit activities, broadcasts and raw `am`
    Intent {
        #[command(subcommand)]
        command: IntentCommands,
    },
    /// Running processes, and pids and services of one package
    Processes {
        /// Package or process name substring
        #[arg(long)]
        filter: Option<String>,
    },
    /// Snapshot and restore device settings
    State {
        #[command(subcommand)]
        command: StateCommands,
    },

    // =========================================================================
    // Apps
    // =========================================================================
    /// Install an APK (optionally with split APKs)
    Install {
        apk: PathBuf,
        /// Additional split APKs installed in the same session
        #[arg(long)]
        split: Vec<PathBuf>,
    },
    /// Uninstall a package
    Uninstall { package: String },
    /// List installed packages
    Packages {
        /// Only third-party packages
        #[arg(long)]
        third_party: bool,
        /// Case-insensitive substring filter
        #[arg(long)]
        filter: Option<String>,
    },
    /// Version and granted permissions of a package
    Package { name: String },
    /// Read an APK's metadata with aapt and check it against the installed version
    ApkInfo { apk: PathBuf },
    /// Launch an app
    Launch {
        package: String,
        /// Explicit activity (default: launcher entry)
        #[arg(long)]
        activity: Option<String>,
    },
    /// Force-stop an app
    Stop { package: String },
    /// Clear an app's data
    Clear { package: String },
    /// Runtime permissions
    Permission {
        #[command(subcommand)]
        command: PermissionCommands,
    },

    // =========================================================================
    // Files and logs
    // =========================================================================
    /// Copy a file to the device
    Push { local: PathBuf, remote: String },
    /// Copy a file from the device
    Pull { remote: String, local: PathBuf },
    /// Capture a screenshot into a local directory
    Screenshot {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Record the screen into a local directory
    Screenrecord {
        /// Recording length, 1 to 180 seconds
        #[arg(long, default_value_t = adbw::adb::DEFAULT_RECORD_SECONDS)]
        seconds: u32,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Live filtered logcat, or a snapshot of the current buffer
    Logcat {
        /// Write the current buffer to FILE (or an auto-named file) and exit
        #[arg(long, value_name = "FILE", num_args = 0..=1, default_missing_value = "")]
        snapshot: Option<String>,
        /// Tag to show; everything else is silenced
        #[arg(long, default_value = "*")]
        tag: String,
        /// Minimum priority (V, D, I, W, E, F, S)
        #[arg(long, short)]
        priority: Option<String>,
        /// Clear the log buffer first
        #[arg(long)]
        clear: bool,
    },

    // =========================================================================
    // Automation
    // =========================================================================
    /// Workflows
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommands,
    },
    /// Per-app profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Device aliases
    Alias {
        #[command(subcommand)]
        command: AliasCommands,
    },
    /// Apply one action to every ready device
    Broadcast {
        #[command(subcommand)]
        command: BroadcastCommands,
    },
    /// List actions, including plugin actions, and plugin load results
    Plugins,
    /// Write device reports
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },

    // =========================================================================
    // Tooling
    // =========================================================================
    /// Check the environment (adb, config, working directory)
    Doctor,
    /// Run a non-interactive API command and print its JSON response
    Api {
        /// Command name (e.g. devices.list, shell.run)
        command: String,
        /// Parameters as a JSON object
        #[arg(long, short)]
        params: Option<String>,
    },
}

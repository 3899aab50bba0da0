//! Workflow, profile and alias subcommands

use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum WorkflowCommands {
    /// List available workflows
    List,
    /// Show workflow details
    Show {
        /// Name of the workflow to show
        name: String,
    },
    /// Run a workflow against the target device
    Run {
        /// Name of the workflow to run
        name: String,
        /// Profile supplying default step parameters
        #[arg(long, short)]
        profile: Option<String>,
    },
    /// Save a workflow from a TOML or JSON file into the workflow store
    Import { file: PathBuf },
    /// Remove a workflow from the workflow store
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// List profiles
    List,
    /// Create or update a profile (unset fields keep their current value)
    Set {
        name: String,
        #[arg(long)]
        package: Option<String>,
        #[arg(long)]
        activity: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        apk: Option<String>,
    },
    /// Delete a profile
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum AliasCommands {
    /// List aliases
    List,
    /// Point an alias at a serial
    Set { alias: String, serial: String },
    /// Remove an alias
    Remove { alias: String },
}

//! CLI module
//!
//! - `args` - the top-level `Cli` and `Commands`
//! - `workflow_args` - workflow, profile and alias subcommands
//! - `device_args` - forwarding, permission, intent, state, broadcast and
//!   report subcommands

pub mod args;
pub mod device_args;
pub mod workflow_args;

pub use args::{Cli, Commands};
pub use device_args::{
    BroadcastCommands, ForwardCommands, IntentCommands, PermissionCommands, ReportCommands,
    StateCommands,
};
pub use workflow_args::{AliasCommands, ProfileCommands, WorkflowCommands};

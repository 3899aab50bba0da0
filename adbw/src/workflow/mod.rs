//! Workflows: ordered steps run against one device
//!
//! - `types` - workflow, step, profile and report definitions
//! - `engine` - sequential execution with per-step failure policy
//! - `loader` - built-in `dev-loop` and TOML workflow directories

mod engine;
mod loader;
mod types;

pub use engine::{execute_step, WorkflowEngine};
pub use loader::{dev_loop, load_workflow_dir, load_workflows, DEV_LOOP};
pub use types::{Profile, StepDefinition, StepOutcome, Workflow, WorkflowRunReport};

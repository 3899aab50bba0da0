//! Workflow sources
//!
//! Workflows come from three places, later ones overriding earlier ones by
//! name: the built-in `dev-loop`, the JSON workflow store, and `*.toml` files
//! in the workflows directory.

use std::collections::BTreeMap;
use std::path::Path;

use super::types::{Profile, StepDefinition, Workflow};
use crate::error::Result;
use crate::store::WorkflowStore;

pub const DEV_LOOP: &str = "dev-loop";

/// Install, clear, launch, then tail the app's log.
///
/// Install only happens when the profile names an APK; clear and launch only
/// when it names a package, and both are allowed to fail. The log tag
/// defaults to `*`.
pub fn dev_loop(profile: &Profile) -> Workflow {
    let mut workflow = Workflow::new(DEV_LOOP)
        .with_description("Install, clear data, launch, then tail the app log");

    if !profile.apk_path.trim().is_empty() {
        workflow = workflow
            .with_step(StepDefinition::new("install_apk").param("apk_path", &profile.apk_path));
    }

    if !profile.package_name.trim().is_empty() {
        workflow = workflow.with_step(
            StepDefinition::new("clear_data")
                .param("package_name", &profile.package_name)
                .continue_on_error(),
        );
        let mut launch = StepDefinition::new("launch_app")
            .param("package_name", &profile.package_name)
            .continue_on_error();
        if !profile.activity.trim().is_empty() {
            launch = launch.param("activity", &profile.activity);
        }
        workflow = workflow.with_step(launch);
    }

    let tag = match profile.log_tag.trim() {
        "" => "*",
        tag => tag,
    };
    workflow.with_step(
        StepDefinition::new("tail_filtered_logcat")
            .param("log_tag", tag)
            .param("priority", "I"),
    )
}

/// Load `*.toml` workflows from `dir`. Files that fail to parse are logged
/// and skipped; a missing directory yields nothing.
pub fn load_workflow_dir(dir: &Path) -> Result<BTreeMap<String, Workflow>> {
    let mut workflows = BTreeMap::new();

    if !dir.exists() {
        return Ok(workflows);
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    for path in paths {
        match Workflow::from_toml_file(&path) {
            Ok(workflow) => {
                workflows.insert(workflow.name.clone(), workflow);
            }
            Err(e) => {
                tracing::warn!("Failed to load workflow from {:?}: {}", path, e);
            }
        }
    }

    Ok(workflows)
}

/// Every available workflow by name. `profile` shapes the built-in
/// `dev-loop`.
pub fn load_workflows(
    store: &WorkflowStore,
    dir: &Path,
    profile: &Profile,
) -> Result<BTreeMap<String, Workflow>> {
    let mut workflows = BTreeMap::new();
    workflows.insert(DEV_LOOP.to_string(), dev_loop(profile));
    for workflow in store.list()? {
        workflows.insert(workflow.name.clone(), workflow);
    }
    workflows.extend(load_workflow_dir(dir)?);
    Ok(workflows)
}

//! Workflow, profile and run report types

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actions::{ActionOutput, StepParams};
use crate::error::{AdbwError, ErrorDetail, Result};
use crate::process::CommandResult;

fn is_false(value: &bool) -> bool {
    !*value
}

/// One step: an action name plus its parameters. Parameters sit next to
/// `action` in the stored form (`{"action": "launch_app", "package": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub action: String,

    /// Keep going when this step fails
    #[serde(default, skip_serializing_if = "is_false")]
    pub continue_on_error: bool,

    #[serde(flatten)]
    pub params: StepParams,
}

impl StepDefinition {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            continue_on_error: false,
            params: StepParams::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }
}

/// A named, ordered list of steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let workflow: Self =
            toml::from_str(toml_str).map_err(|e| AdbwError::Store(e.to_string()))?;
        if workflow.name.trim().is_empty() {
            return Err(AdbwError::Store("workflow name must not be empty".to_string()));
        }
        Ok(workflow)
    }

    /// Comma-separated action names, for listings
    pub fn summary(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.action.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Per-app defaults applied to workflow steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub activity: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log_tag: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub apk_path: String,
}

impl Profile {
    /// Non-empty fields as step parameters
    pub fn defaults(&self) -> StepParams {
        [
            ("package_name", &self.package_name),
            ("activity", &self.activity),
            ("log_tag", &self.log_tag),
            ("apk_path", &self.apk_path),
        ]
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
    }
}

// ============================================================================
// Run results
// ============================================================================

/// Result of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub action: String,
    pub success: bool,

    /// Present when the action ran a command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CommandResult>,

    /// Command line of a live stream left running in the background
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,

    /// This failure stopped the remaining steps
    #[serde(default)]
    pub halted: bool,
}

impl StepOutcome {
    /// Classify what an action returned
    pub fn from_execution(index: usize, action: &str, output: Result<ActionOutput>) -> Self {
        let mut outcome = Self {
            index,
            action: action.to_string(),
            success: false,
            result: None,
            stream: None,
            error: None,
            halted: false,
        };

        match output {
            Ok(ActionOutput::Command(result)) => {
                outcome.success = result.success();
                outcome.error = result.error().map(ErrorDetail::from);
                outcome.result = Some(result);
            }
            Ok(ActionOutput::Streaming { command }) => {
                outcome.success = true;
                outcome.stream = Some(command);
            }
            Err(err) => outcome.error = Some(ErrorDetail::from(err)),
        }

        outcome
    }
}

/// Everything that happened during one workflow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRunReport {
    pub run_id: Uuid,
    pub workflow: String,
    pub serial: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Executed steps in order; steps after a halting failure are absent
    pub outcomes: Vec<StepOutcome>,
    /// No step failed, or every failing step allowed continuing
    pub success: bool,
}

impl WorkflowRunReport {
    /// Outcomes that failed, whether or not they halted the run
    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_step_params_are_flattened() {
        let json = r#"{"action": "launch_app", "package": "com.example", "activity": ".Main", "continue_on_error": true}"#;
        let step: StepDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(step.action, "launch_app");
        assert!(step.continue_on_error);
        assert_eq!(step.params["package"], "com.example");
        assert_eq!(step.params.len(), 2);

        let back = serde_json::to_value(StepDefinition::new("clear_data").param("package", "x")).unwrap();
        assert_eq!(back, serde_json::json!({"action": "clear_data", "package": "x"}));
    }

    #[test]
    fn test_workflow_from_toml() {
        let workflow = Workflow::from_toml(
            r#"
name = "smoke"
description = "Install and launch"

[[steps]]
action = "install_apk"
apk_path = "app/build/app-debug.apk"

[[steps]]
action = "launch_app"
package_name = "com.example"
continue_on_error = true
"#,
        )
        .unwrap();
        assert_eq!(workflow.steps.len(), 2);
        assert!(workflow.steps[1].continue_on_error);
        assert_eq!(workflow.summary(), "install_apk, launch_app");
    }

    #[test]
    fn test_workflow_without_name_rejected() {
        assert!(Workflow::from_toml("name = \"\"\n").is_err());
    }

    #[test]
    fn test_profile_defaults_skip_empty_fields() {
        let profile = Profile {
            package_name: "com.example".into(),
            log_tag: "Example".into(),
            ..Default::default()
        };
        let defaults = profile.defaults();
        assert_eq!(defaults.len(), 2);
        assert_eq!(defaults["log_tag"], "Example");
    }

    #[test]
    fn test_outcome_from_non_zero_exit() {
        let spec = crate::process::CommandSpec::new("adb").args(["-s", "S", "shell", "pm", "clear", "x"]);
        let result = CommandResult::completed(
            &spec,
            Some(1),
            "",
            "Failed",
            std::time::Duration::ZERO,
        );
        let outcome = StepOutcome::from_execution(0, "clear_data", Ok(ActionOutput::Command(result)));
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::NonZeroExit);
        assert!(outcome.result.is_some());
    }
}

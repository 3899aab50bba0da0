//! Sequential workflow execution
//!
//! Steps run strictly in declared order against one device. A failing step
//! stops the run unless it sets `continue_on_error`; steps after the stop
//! are left out of the report entirely.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use super::types::{StepDefinition, StepOutcome, Workflow, WorkflowRunReport};
use crate::actions::{merge_params, ActionContext, ActionRegistry, StepParams};
use crate::adb::Device;

/// Resolve `action` and run it once. Resolution and parameter errors become
/// failed outcomes like any other failure.
pub async fn execute_step(
    registry: &ActionRegistry,
    ctx: &ActionContext,
    index: usize,
    action: &str,
    params: &StepParams,
    device: &Device,
) -> StepOutcome {
    let output = match registry.resolve(action) {
        Ok(resolved) => resolved.execute(ctx, device, params).await,
        Err(e) => Err(e),
    };
    StepOutcome::from_execution(index, action, output)
}

#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    registry: Arc<ActionRegistry>,
}

impl WorkflowEngine {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub async fn run(
        &self,
        ctx: &ActionContext,
        workflow: &Workflow,
        device: &Device,
    ) -> WorkflowRunReport {
        self.run_with_defaults(ctx, workflow, device, &StepParams::new())
            .await
    }

    /// Run with `defaults` (typically a profile) filling parameters the
    /// steps leave out
    pub async fn run_with_defaults(
        &self,
        ctx: &ActionContext,
        workflow: &Workflow,
        device: &Device,
        defaults: &StepParams,
    ) -> WorkflowRunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        tracing::info!(
            %run_id,
            workflow = %workflow.name,
            serial = %device.serial,
            steps = workflow.steps.len(),
            "starting workflow"
        );

        let mut outcomes = Vec::with_capacity(workflow.steps.len());
        let mut success = true;

        for (index, step) in workflow.steps.iter().enumerate() {
            let mut outcome = self.run_step(ctx, index, step, device, defaults).await;

            if !outcome.success {
                success = false;
                if !step.continue_on_error {
                    outcome.halted = true;
                    tracing::warn!(
                        %run_id,
                        step = index,
                        action = %step.action,
                        "step failed, stopping: {}",
                        describe(&outcome)
                    );
                    outcomes.push(outcome);
                    break;
                }
                tracing::warn!(
                    %run_id,
                    step = index,
                    action = %step.action,
                    "step failed, continuing: {}",
                    describe(&outcome)
                );
            }
            outcomes.push(outcome);
        }

        tracing::info!(%run_id, success, executed = outcomes.len(), "workflow finished");

        WorkflowRunReport {
            run_id,
            workflow: workflow.name.clone(),
            serial: device.serial.clone(),
            started_at,
            elapsed_ms: started.elapsed().as_millis() as u64,
            outcomes,
            success,
        }
    }

    async fn run_step(
        &self,
        ctx: &ActionContext,
        index: usize,
        step: &StepDefinition,
        device: &Device,
        defaults: &StepParams,
    ) -> StepOutcome {
        tracing::info!(step = index, action = %step.action, serial = %device.serial, "running step");
        let params = merge_params(defaults, &step.params);
        execute_step(&self.registry, ctx, index, &step.action, &params, device).await
    }
}

fn describe(outcome: &StepOutcome) -> String {
    outcome
        .error
        .as_ref()
        .map(|e| e.message.clone())
        .unwrap_or_else(|| "failed".to_string())
}

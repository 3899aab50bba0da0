//! Workflow, profile, alias, broadcast and plugin handlers

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;
use tokio::sync::mpsc;

use super::CommandContext;
use crate::cli::{AliasCommands, BroadcastCommands, ProfileCommands, WorkflowCommands};
use adbw::actions::StepParams;
use adbw::adb;
use adbw::broadcast::BroadcastRunner;
use adbw::workflow::{load_workflows, Profile, StepOutcome, Workflow, WorkflowEngine, WorkflowRunReport};

// =============================================================================
// Workflows
// =============================================================================

/// Handle the `workflow` command
pub async fn run_workflow_command(ctx: &CommandContext, command: WorkflowCommands) -> Result<()> {
    match command {
        WorkflowCommands::List => run_list(ctx),
        WorkflowCommands::Show { name } => run_show(ctx, &name),
        WorkflowCommands::Run { name, profile } => run_workflow(ctx, &name, profile.as_deref()).await,
        WorkflowCommands::Import { file } => run_import(ctx, &file),
        WorkflowCommands::Delete { name } => {
            if !ctx.stores.workflows.delete(&name)? {
                bail!("no stored workflow named '{}'", name);
            }
            ctx.emit(&json!({ "deleted": name }), || println!("Deleted workflow '{}'", name))
        }
    }
}

fn profile(ctx: &CommandContext, name: Option<&str>) -> Result<Profile> {
    match name {
        Some(name) => ctx
            .stores
            .profiles
            .get(name)?
            .ok_or_else(|| anyhow!("no profile named '{}'", name)),
        None => Ok(Profile::default()),
    }
}

fn run_list(ctx: &CommandContext) -> Result<()> {
    let workflows = load_workflows(
        &ctx.stores.workflows,
        &ctx.settings.paths.workflows_dir,
        &Profile::default(),
    )?;
    let listing: Vec<_> = workflows
        .values()
        .map(|w| json!({ "name": w.name, "description": w.description, "steps": w.steps.len() }))
        .collect();

    ctx.emit(&listing, || {
        println!("Available workflows:\n");
        for workflow in workflows.values() {
            println!("  {} - {}", workflow.name, workflow.description);
            println!("      {}", workflow.summary());
        }
    })
}

fn run_show(ctx: &CommandContext, name: &str) -> Result<()> {
    let workflows = load_workflows(
        &ctx.stores.workflows,
        &ctx.settings.paths.workflows_dir,
        &Profile::default(),
    )?;
    let Some(workflow) = workflows.get(name) else {
        eprintln!("Available workflows:");
        for name in workflows.keys() {
            eprintln!("  {}", name);
        }
        bail!("workflow '{}' not found", name);
    };

    ctx.emit(workflow, || {
        println!("Workflow: {}\n", workflow.name);
        if !workflow.description.is_empty() {
            println!("Description: {}\n", workflow.description);
        }
        println!("Steps:");
        for (i, step) in workflow.steps.iter().enumerate() {
            let marker = if step.continue_on_error { " [continue on error]" } else { "" };
            println!("  {}. {}{}", i + 1, step.action, marker);
            for (key, value) in &step.params {
                println!("     {} = {}", key, value);
            }
        }
    })
}

async fn run_workflow(ctx: &CommandContext, name: &str, profile_name: Option<&str>) -> Result<()> {
    let profile = profile(ctx, profile_name)?;
    let workflows = load_workflows(
        &ctx.stores.workflows,
        &ctx.settings.paths.workflows_dir,
        &profile,
    )?;
    let workflow = workflows
        .get(name)
        .ok_or_else(|| anyhow!("workflow '{}' not found", name))?;
    let device = ctx.target().await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let actx = ctx.action_context().with_sink(tx);
    let engine = WorkflowEngine::new(ctx.registry());
    let report = engine
        .run_with_defaults(&actx, workflow, &device, &profile.defaults())
        .await;

    ctx.emit(&report, || print_report(&report))?;

    if report.success && actx.active_streams() > 0 {
        if !ctx.json {
            eprintln!("\nStreaming logs from {} (Ctrl+C to stop)...", device.serial);
        }
        let wait = actx.wait_streams();
        tokio::pin!(wait);
        loop {
            tokio::select! {
                Some(line) = rx.recv() => println!("{}", line.line),
                _ = &mut wait => break,
            }
        }
        while let Ok(line) = rx.try_recv() {
            println!("{}", line.line);
        }
    }
    actx.shutdown().await;

    if !report.success {
        bail!("workflow '{}' failed on {}", report.workflow, report.serial);
    }
    Ok(())
}

fn print_report(report: &WorkflowRunReport) {
    println!(
        "Workflow '{}' on {} (run {})",
        report.workflow, report.serial, report.run_id
    );
    for outcome in &report.outcomes {
        println!("  {}. {:<22} {}", outcome.index + 1, outcome.action, outcome_label(outcome));
    }
    let status = if report.success { "succeeded" } else { "FAILED" };
    println!("{} in {} ms", status, report.elapsed_ms);
}

fn outcome_label(outcome: &StepOutcome) -> String {
    if let Some(stream) = &outcome.stream {
        return format!("streaming ({})", stream);
    }
    if outcome.success {
        return "ok".to_string();
    }
    let message = outcome
        .error
        .as_ref()
        .map(|e| e.message.clone())
        .unwrap_or_else(|| "failed".to_string());
    if outcome.halted {
        format!("FAILED: {} (stopped)", message)
    } else {
        format!("failed: {} (continuing)", message)
    }
}

fn run_import(ctx: &CommandContext, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let workflow: Workflow = if file.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&content).with_context(|| format!("parsing {}", file.display()))?
    } else {
        Workflow::from_toml(&content)?
    };
    if workflow.name.trim().is_empty() {
        bail!("workflow name must not be empty");
    }

    let registry = ctx.registry();
    for step in &workflow.steps {
        if !registry.contains(&step.action) {
            tracing::warn!(action = %step.action, "workflow step uses an unregistered action");
        }
    }

    let name = workflow.name.clone();
    let steps = workflow.steps.len();
    ctx.stores.workflows.save(workflow)?;
    ctx.emit(&json!({ "saved": name, "steps": steps }), || {
        println!("Saved workflow '{}' ({} steps)", name, steps)
    })
}

// =============================================================================
// Profiles and aliases
// =============================================================================

/// Handle the `profile` command
pub async fn run_profile_command(ctx: &CommandContext, command: ProfileCommands) -> Result<()> {
    match command {
        ProfileCommands::List => {
            let profiles = ctx.stores.profiles.list()?;
            ctx.emit(&profiles, || {
                if profiles.is_empty() {
                    println!("No profiles.");
                }
                for (name, p) in &profiles {
                    println!(
                        "{}: package={} activity={} tag={} apk={}",
                        name, p.package_name, p.activity, p.log_tag, p.apk_path
                    );
                }
            })
        }
        ProfileCommands::Set {
            name,
            package,
            activity,
            tag,
            apk,
        } => {
            let mut profile = ctx.stores.profiles.get(&name)?.unwrap_or_default();
            if let Some(package) = package {
                profile.package_name = package;
            }
            if let Some(activity) = activity {
                profile.activity = activity;
            }
            if let Some(tag) = tag {
                profile.log_tag = tag;
            }
            if let Some(apk) = apk {
                profile.apk_path = apk;
            }
            ctx.stores.profiles.save(&name, profile.clone())?;
            ctx.emit(&json!({ "name": name, "profile": profile }), || {
                println!("Saved profile '{}'", name)
            })
        }
        ProfileCommands::Delete { name } => {
            if !ctx.stores.profiles.delete(&name)? {
                bail!("no profile named '{}'", name);
            }
            ctx.emit(&json!({ "deleted": name }), || println!("Deleted profile '{}'", name))
        }
    }
}

/// Handle the `alias` command
pub async fn run_alias_command(ctx: &CommandContext, command: AliasCommands) -> Result<()> {
    match command {
        AliasCommands::List => {
            let aliases = ctx.stores.aliases.list()?;
            ctx.emit(&aliases, || {
                for (alias, serial) in &aliases {
                    println!("{} -> {}", alias, serial);
                }
            })
        }
        AliasCommands::Set { alias, serial } => {
            ctx.stores.aliases.set(&alias, &serial)?;
            ctx.emit(&json!({ "alias": alias, "serial": serial }), || {
                println!("{} -> {}", alias, serial)
            })
        }
        AliasCommands::Remove { alias } => {
            if !ctx.stores.aliases.remove(&alias)? {
                bail!("no alias named '{}'", alias);
            }
            ctx.emit(&json!({ "removed": alias }), || println!("Removed alias '{}'", alias))
        }
    }
}

// =============================================================================
// Broadcast and plugins
// =============================================================================

/// Handle the `broadcast` command
pub async fn run_broadcast_command(ctx: &CommandContext, command: BroadcastCommands) -> Result<()> {
    let (action, params): (String, StepParams) = match command {
        BroadcastCommands::Install { apk } => {
            if !apk.is_file() {
                bail!("APK not found: {}", apk.display());
            }
            let params = [("apk_path".to_string(), apk.to_string_lossy().into_owned())];
            ("install_apk".to_string(), params.into_iter().collect())
        }
        BroadcastCommands::Shell { command } => {
            let params = [("command".to_string(), command.join(" "))];
            ("run_shell".to_string(), params.into_iter().collect())
        }
        BroadcastCommands::Action { name, params } => (name, params.into_iter().collect()),
    };

    let registry = ctx.registry();
    // fail before touching any device
    registry.resolve(&action)?;

    let devices: Vec<_> = if ctx.adb.is_dry_run() {
        vec![ctx.target().await?]
    } else {
        adb::list_devices(&ctx.adb)
            .await?
            .into_iter()
            .filter(|d| d.is_ready())
            .collect()
    };
    if devices.is_empty() {
        bail!("no ready devices");
    }

    let actx = ctx.action_context();
    let runner = BroadcastRunner::new(registry, ctx.settings.broadcast.max_parallel);
    let outcomes = runner.broadcast(&actx, &action, &params, &devices).await;
    actx.shutdown().await;

    ctx.emit(&outcomes, || {
        for (serial, outcome) in &outcomes {
            println!("{:<24} {}", serial, outcome_label(outcome));
            if let Some(result) = &outcome.result {
                for line in result.stdout().lines() {
                    println!("    {}", line);
                }
            }
        }
    })?;

    let failed = outcomes.values().filter(|o| !o.success).count();
    if failed > 0 {
        bail!("{} of {} device(s) failed", failed, outcomes.len());
    }
    Ok(())
}

/// Handle the `plugins` command
pub async fn run_plugins(ctx: &CommandContext) -> Result<()> {
    let registry = ctx.registry();
    let actions = registry.list();
    let events = registry.events();

    ctx.emit(&json!({ "actions": actions, "events": events }), || {
        println!("Actions:");
        for info in &actions {
            println!("  {:<22} [{}] {}", info.name, info.source, info.description);
        }
        let problems: Vec<_> = events
            .iter()
            .filter(|e| e.status != adbw::actions::RegistrationStatus::Registered)
            .collect();
        if !problems.is_empty() {
            println!("\nPlugin problems:");
            for event in problems {
                println!(
                    "  {:?} {} ({}): {}",
                    event.status,
                    event.name,
                    event.source,
                    event.message.as_deref().unwrap_or("")
                );
            }
        }
    })
}

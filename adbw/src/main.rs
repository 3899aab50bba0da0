//! adbw command-line entry point

mod cli;
mod handlers;

use anyhow::{Context, Result};
use clap::Parser;

use adbw::config::{resolve_adb_path, Settings};
use adbw::logging::{init_tracing, level_for};
use cli::{Cli, Commands};
use handlers::{CommandContext, LogcatOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&format!("adbw={}", level_for(cli.verbose)))?;

    let settings = load_settings(&cli)?;
    let project_dir = std::env::current_dir().context("reading current directory")?;
    let adb_path = resolve_adb_path(cli.adb.as_deref(), &settings, &project_dir);
    tracing::debug!(adb = %adb_path, dry_run = settings.adb.dry_run, "resolved adb");

    let ctx = CommandContext::new(settings, adb_path, cli.device.clone(), cli.json);
    watch_interrupts(ctx.cancel.clone());

    match cli.command {
        // Devices
        Commands::Devices => handlers::run_devices(&ctx).await,
        Commands::Summary => handlers::run_summary(&ctx).await,
        Commands::Shell { command } => handlers::run_shell(&ctx, &command).await,
        Commands::Reboot => handlers::run_reboot(&ctx).await,
        Commands::Connect { host, port } => handlers::run_connect(&ctx, &host, port).await,
        Commands::Disconnect { target } => handlers::run_disconnect(&ctx, &target).await,
        Commands::Pair { host, code } => handlers::run_pair(&ctx, &host, &code).await,
        Commands::Forward { command } => handlers::run_forward_command(&ctx, command).await,
        Commands::Intent { command } => handlers::run_intent_command(&ctx, command).await,
        Commands::Processes { filter } => handlers::run_processes(&ctx, filter.as_deref()).await,
        Commands::State { command } => handlers::run_state_command(&ctx, command).await,

        // Apps
        Commands::Install { apk, split } => handlers::run_install(&ctx, &apk, &split).await,
        Commands::Uninstall { package } => handlers::run_uninstall(&ctx, &package).await,
        Commands::Packages {
            third_party,
            filter,
        } => handlers::run_packages(&ctx, third_party, filter.as_deref()).await,
        Commands::Package { name } => handlers::run_package(&ctx, &name).await,
        Commands::ApkInfo { apk } => handlers::run_apk_info(&ctx, &apk).await,
        Commands::Launch { package, activity } => {
            handlers::run_launch(&ctx, &package, activity.as_deref()).await
        }
        Commands::Stop { package } => handlers::run_stop(&ctx, &package).await,
        Commands::Clear { package } => handlers::run_clear(&ctx, &package).await,
        Commands::Permission { command } => handlers::run_permission_command(&ctx, command).await,

        // Files and logs
        Commands::Push { local, remote } => handlers::run_push(&ctx, &local, &remote).await,
        Commands::Pull { remote, local } => handlers::run_pull(&ctx, &remote, &local).await,
        Commands::Screenshot { dir } => handlers::run_screenshot(&ctx, &dir).await,
        Commands::Screenrecord { seconds, dir } => {
            handlers::run_screenrecord(&ctx, seconds, &dir).await
        }
        Commands::Logcat {
            snapshot,
            tag,
            priority,
            clear,
        } => {
            let options = LogcatOptions {
                snapshot,
                tag,
                priority,
                clear,
            };
            handlers::run_logcat(&ctx, options).await
        }

        // Automation
        Commands::Workflow { command } => handlers::run_workflow_command(&ctx, command).await,
        Commands::Profile { command } => handlers::run_profile_command(&ctx, command).await,
        Commands::Alias { command } => handlers::run_alias_command(&ctx, command).await,
        Commands::Broadcast { command } => handlers::run_broadcast_command(&ctx, command).await,
        Commands::Plugins => handlers::run_plugins(&ctx).await,
        Commands::Report { command } => handlers::run_report_command(&ctx, command).await,

        // Tooling
        Commands::Doctor => handlers::run_doctor(&ctx, cli.config.as_deref()).await,
        Commands::Api { command, params } => {
            handlers::run_api(&ctx, &command, params.as_deref()).await
        }
    }
}

/// Resolve settings with priority: CLI/env > config file > defaults
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from_path(path)?,
        None => Settings::load()?,
    };

    if let Some(retries) = cli.retries {
        settings.adb.retry_count = retries;
    }
    if let Some(timeout) = cli.timeout {
        settings.adb.command_timeout_sec = timeout;
    }
    settings.adb.dry_run |= cli.dry_run;
    settings.validate()?;
    Ok(settings)
}

/// First Ctrl+C stops live streams; a second one exits immediately
fn watch_interrupts(cancel: tokio_util::sync::CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("interrupted, stopping streams");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

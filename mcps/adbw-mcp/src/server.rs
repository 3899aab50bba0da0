//! MCP Server implementation for adbw
//!
//! Exposes the non-interactive command API as MCP tools. Handler
//! implementations are in the handlers module.

use std::path::Path;
use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError,
};

use adbw::actions::{load_plugins, ActionRegistry};
use adbw::adb::Adb;
use adbw::api::CommandApi;
use adbw::config::{resolve_adb_path, Settings};
use adbw::process::SystemRunner;
use adbw::store::Stores;

use crate::handlers;
use crate::params::*;

/// The adbw MCP Server
#[derive(Clone)]
pub struct AdbwMcpServer {
    api: Arc<CommandApi>,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Tool Router - Each tool delegates to the command API
// ============================================================================

#[tool_router]
impl AdbwMcpServer {
    pub fn new(api: CommandApi) -> Self {
        Self {
            api: Arc::new(api),
            tool_router: Self::tool_router(),
        }
    }

    /// Wire the command API from settings, the same way the CLI does.
    /// `ADBW_ADB` overrides the adb executable.
    pub fn from_settings(settings: Settings, project_dir: &Path) -> Self {
        let explicit = std::env::var("ADBW_ADB").ok();
        let adb_path = resolve_adb_path(explicit.as_deref(), &settings, project_dir);
        tracing::info!(adb = %adb_path, "using adb");

        let settings = Arc::new(settings);
        let runner = Arc::new(SystemRunner::from_settings(&settings));
        let adb = Adb::with_runner(adb_path, runner, settings.clone());

        let mut registry = ActionRegistry::with_builtins();
        load_plugins(&settings.paths.plugins_dir).register_into(&mut registry);

        let stores = Stores::from_settings(&settings);
        Self::new(CommandApi::new(adb, Arc::new(registry), stores))
    }

    #[tool(description = "List connected Android devices with serial, state and model")]
    async fn devices_list(
        &self,
        Parameters(params): Parameters<DevicesListParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::call(&self.api, "devices.list", &params).await
    }

    #[tool(description = "Brand, model, Android version and API level of a device")]
    async fn device_summary(
        &self,
        Parameters(params): Parameters<DeviceParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::call(&self.api, "device.summary", &params).await
    }

    #[tool(description = "Run a shell command on a device and return exit code, stdout and stderr")]
    async fn shell_run(
        &self,
        Parameters(params): Parameters<ShellRunParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::call(&self.api, "shell.run", &params).await
    }

    #[tool(description = "List installed packages, optionally third-party only or filtered by name")]
    async fn package_list(
        &self,
        Parameters(params): Parameters<PackageListParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::call(&self.api, "package.list", &params).await
    }

    #[tool(description = "Version and granted permissions of an installed package")]
    async fn package_info(
        &self,
        Parameters(params): Parameters<PackageInfoParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::call(&self.api, "package.info", &params).await
    }

    #[tool(description = "Install (or replace) an APK from a host path")]
    async fn apk_install(
        &self,
        Parameters(params): Parameters<ApkInstallParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::call(&self.api, "apk.install", &params).await
    }

    #[tool(description = "Copy a host file to the device")]
    async fn file_push(
        &self,
        Parameters(params): Parameters<FileTransferParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::call(&self.api, "file.push", &params).await
    }

    #[tool(description = "Copy a device file to the host")]
    async fn file_pull(
        &self,
        Parameters(params): Parameters<FileTransferParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::call(&self.api, "file.pull", &params).await
    }

    #[tool(description = "Dump the current logcat buffer (optionally only the last N lines)")]
    async fn logcat_snapshot(
        &self,
        Parameters(params): Parameters<LogcatSnapshotParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::call(&self.api, "logcat.snapshot", &params).await
    }

    #[tool(description = "Run a named workflow (e.g. dev-loop) on a device and return the step report")]
    async fn workflow_run(
        &self,
        Parameters(params): Parameters<WorkflowRunParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::call(&self.api, "workflow.run", &params).await
    }
}

// ============================================================================
// Server Handler Implementation
// ============================================================================

#[tool_handler]
impl rmcp::ServerHandler for AdbwMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Android Debug Bridge automation. Every tool returns a JSON object \
                 {ok, data, error}; device tools accept an optional serial or alias \
                 and auto-select when a single device is connected."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

use anyhow::Context;
use rmcp::ServiceExt;

use adbw::config::Settings;
use adbw_mcp::AdbwMcpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the MCP protocol; logs go to stderr
    adbw::logging::init_tracing("adbw_mcp=info,adbw=info")?;

    tracing::info!("Starting adbw MCP Server");

    let settings = Settings::load()?;
    let project_dir = std::env::current_dir().context("reading current directory")?;
    let server = AdbwMcpServer::from_settings(settings, &project_dir);
    let service = server.serve(rmcp::transport::stdio()).await?;

    tracing::info!("Server running, waiting for requests...");

    service.waiting().await?;

    tracing::info!("Server shutting down");
    Ok(())
}

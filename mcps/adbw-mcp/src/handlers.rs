//! Tool handler implementations
//!
//! Every tool forwards to [`CommandApi::call`] and returns the
//! `CommandResponse` as pretty JSON. A failed command is a tool-level error
//! result carrying the same JSON, so the caller still sees the error kind.

use rmcp::model::{CallToolResult, Content};
use rmcp::ErrorData as McpError;
use serde::Serialize;

use adbw::api::{ApiParams, CommandApi, CommandResponse};

/// Flatten a parameter struct into the API's parameter map
pub fn to_api_params<T: Serialize>(params: &T) -> Result<ApiParams, McpError> {
    match serde_json::to_value(params) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Ok(ApiParams::new()),
        Err(e) => Err(McpError::invalid_params(e.to_string(), None)),
    }
}

pub fn to_tool_result(response: &CommandResponse) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    let content = vec![Content::text(json)];
    Ok(if response.ok {
        CallToolResult::success(content)
    } else {
        CallToolResult::error(content)
    })
}

pub async fn call<T: Serialize>(
    api: &CommandApi,
    command: &str,
    params: &T,
) -> Result<CallToolResult, McpError> {
    let params = to_api_params(params)?;
    let response = api.call(command, &params).await;
    if !response.ok {
        tracing::info!(command, error = ?response.error, "command failed");
    }
    to_tool_result(&response)
}

//! Protocol Dispatcher: resolves MCP methods and tool invocations.
//!
//! Every handler fault, including a panic, is converted into an
//! error-flagged `CallToolResult` here, so a failing tool never reaches the
//! session or the process.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, JsonObject, ListToolsResult,
    ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::McpGithubError;
use crate::protocol::{methods, JsonRpcRequest, JsonRpcResponse};
use crate::tools::ToolRegistry;

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "GitHub server. Use search_repositories/get_repository for repositories, \
                 get_file_contents/create_or_update_file/delete_file for files, \
                 list_issues/get_issue/create_issue/update_issue for issues, \
                 list_pull_requests/get_pull_request/create_pull_request/merge_pull_request \
                 for PRs, list_commits/get_commit for history, and \
                 list_workflows/list_workflow_runs/trigger_workflow for GitHub Actions."
                    .to_string(),
            ),
        }
    }

    /// Tool descriptors in registration order.
    pub fn handle_list(&self) -> Vec<Tool> {
        self.registry.descriptors()
    }

    /// Invoke a tool by exact name. Always produces a result; failures are
    /// error-flagged.
    pub async fn handle_invoke(&self, name: &str, arguments: JsonObject) -> CallToolResult {
        let Some(handler) = self.registry.get(name) else {
            warn!(tool = name, "Unknown tool requested");
            return error_result(&McpGithubError::UnknownTool(name.to_string()));
        };

        debug!(tool = name, "Invoking tool");
        match AssertUnwindSafe(handler.invoke(arguments)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = name, error = %e, "Tool invocation failed");
                error_result(&e)
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(tool = name, panic = %message, "Tool handler panicked");
                error_result(&McpGithubError::Other(format!(
                    "Tool {} failed unexpectedly: {}",
                    name, message
                )))
            }
        }
    }

    /// Handle one JSON-RPC message. Returns `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, "Handling request");
        if request.is_notification() {
            if request.method == methods::CANCELLED {
                debug!("Client cancelled a request; its result will still be delivered");
            }
            return None;
        }
        let id = request.id.unwrap_or(Value::Null);
        if id.is_null() {
            return Some(JsonRpcResponse::invalid_request(
                id,
                "Request id must be a string or number",
            ));
        }

        let response = match request.method.as_str() {
            methods::INITIALIZE => to_response(id, &self.server_info()),
            methods::PING => JsonRpcResponse::success(id, json!({})),
            methods::TOOLS_LIST => {
                let listed = ListToolsResult::with_all_items(self.handle_list());
                to_response(id, &listed)
            }
            methods::TOOLS_CALL => {
                let params: CallToolRequestParams =
                    match serde_json::from_value(request.params.unwrap_or(Value::Null)) {
                        Ok(params) => params,
                        Err(e) => {
                            let err = McpGithubError::InvalidParams(e.to_string());
                            return Some(JsonRpcResponse::error(id, err.to_mcp_error()));
                        }
                    };
                let result = self
                    .handle_invoke(&params.name, params.arguments.unwrap_or_default())
                    .await;
                to_response(id, &result)
            }
            other => JsonRpcResponse::method_not_found(id, other),
        };
        Some(response)
    }
}

fn to_response<T: Serialize>(id: Value, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(e) => JsonRpcResponse::error(id, McpGithubError::Other(e.to_string()).to_mcp_error()),
    }
}

fn error_result(err: &McpGithubError) -> CallToolResult {
    CallToolResult::error(vec![Content::text(err.to_string())])
}

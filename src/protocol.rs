//! JSON-RPC 2.0 framing for MCP messages.

use rmcp::model::{ErrorCode, ErrorData};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const CANCELLED: &str = "notifications/cancelled";
    pub const PING: &str = "ping";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
}

/// A request or notification. Notifications carry no `id`; an explicit
/// `"id": null` is kept as `Some(Value::Null)` so it can be rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorData>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: ErrorData) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn invalid_request(id: Value, message: &str) -> Self {
        Self::error(id, ErrorData::invalid_request(message.to_string(), None))
    }

    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self::error(
            id,
            ErrorData::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
                None,
            ),
        )
    }
}

/// Parse one POSTed message body.
pub fn parse_request(body: &[u8]) -> Result<JsonRpcRequest, serde_json::Error> {
    serde_json::from_slice(body)
}

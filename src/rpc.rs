//! JSON-RPC 2.0 envelope types and parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

// Standard JSON-RPC error codes.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// A decoded request. `id` is `None` for notifications.
#[derive(Debug, Clone)]
pub struct RpcRequest {
    pub id: Option<Value>,
    pub method: String,
    pub params: Value,
}

/// Response envelope. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        RpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        RpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        RpcError {
            code,
            message: message.into(),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        RpcError::new(PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        RpcError::new(INVALID_REQUEST, message)
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        RpcError::new(METHOD_NOT_FOUND, message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        RpcError::new(INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        RpcError::new(INTERNAL_ERROR, message)
    }
}

impl From<ToolError> for RpcError {
    fn from(err: ToolError) -> Self {
        match &err {
            ToolError::NotFound(_) => RpcError::method_not_found(err.to_string()),
            ToolError::InvalidParams(_) => RpcError::invalid_params(err.to_string()),
            ToolError::Execution(_) => RpcError::internal(err.to_string()),
        }
    }
}

/// Decode one request from a raw message body.
///
/// Failures produce a ready-to-send error response. The request id is echoed
/// back when it can be recovered from the malformed body, otherwise null.
pub fn parse_request(raw: &str) -> Result<RpcRequest, RpcResponse> {
    let value: Value = serde_json::from_str(raw).map_err(|err| {
        RpcResponse::error(Value::Null, RpcError::parse_error(format!("invalid JSON: {err}")))
    })?;

    // Recover the id before further checks so error responses can carry it.
    let id = value.get("id").cloned().filter(|id| !id.is_null());
    let echo_id = id.clone().unwrap_or(Value::Null);

    if let Some(version) = value.get("jsonrpc") {
        if version != "2.0" {
            return Err(RpcResponse::error(
                echo_id,
                RpcError::invalid_request(format!("unsupported jsonrpc version: {version}")),
            ));
        }
    }

    let method = match value.get("method").and_then(Value::as_str) {
        Some(method) if !method.is_empty() => method.to_string(),
        _ => {
            return Err(RpcResponse::error(
                echo_id,
                RpcError::invalid_request("missing method"),
            ))
        }
    };

    let params = value.get("params").cloned().unwrap_or(Value::Null);

    Ok(RpcRequest { id, method, params })
}

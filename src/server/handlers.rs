//! MCP method dispatch.
//!
//! Maps `initialize`, `ping`, `tools/list`, and `tools/call` onto the
//! bridge. Tool failures come back as `isError` results, not JSON-RPC
//! errors, except for unknown tool names.

use serde_json::{json, Value};

use super::jsonrpc::{error_codes, JsonRpcRequest, JsonRpcResponse};
use crate::bridge::Bridge;
use crate::tools::ToolCallError;

/// Protocol revision reported when the client does not name one.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_NAME: &str = "toolbridge";

/// Handle one request. Notifications produce no response.
pub async fn handle_rpc(bridge: &Bridge, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    let JsonRpcRequest {
        id, method, params, ..
    } = request;

    let Some(id) = id else {
        tracing::debug!(method = %method, "notification received");
        return None;
    };
    let params = params.unwrap_or(Value::Null);

    let response = match method.as_str() {
        "initialize" => JsonRpcResponse::success(id, initialize_result(&params)),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => JsonRpcResponse::success(id, list_tools_result(bridge)),
        "tools/call" => call_tool(bridge, id, params).await,
        other => JsonRpcResponse::failure(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("method not found: {other}"),
        ),
    };
    Some(response)
}

fn initialize_result(params: &Value) -> Value {
    let version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);

    json!({
        "protocolVersion": version,
        "capabilities": {"tools": {"listChanged": false}},
        "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")},
    })
}

fn list_tools_result(bridge: &Bridge) -> Value {
    let tools: Vec<Value> = bridge
        .list_registered_tools()
        .iter()
        .map(|d| {
            json!({
                "name": d.name,
                "description": d.description,
                "inputSchema": d.parameter_schema.to_json_schema(),
            })
        })
        .collect();
    json!({ "tools": tools })
}

async fn call_tool(bridge: &Bridge, id: Value, params: Value) -> JsonRpcResponse {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return JsonRpcResponse::failure(
            id,
            error_codes::INVALID_PARAMS,
            "tools/call requires a string 'name'",
        );
    };
    // Only a name missing from the registry is a protocol error; a target
    // answering -32601 is a tool failure like any other.
    if bridge.registry().lookup(name).is_none() {
        let err = ToolCallError::unknown_tool(name);
        return JsonRpcResponse::failure(id, error_codes::INVALID_PARAMS, err.message);
    }
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    let started = std::time::Instant::now();
    let outcome = bridge.invoke(name, arguments).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(value) => {
            tracing::info!(tool = %name, elapsed_ms, "tool call succeeded");
            JsonRpcResponse::success(id, success_content(value))
        }
        Err(e) => {
            tracing::info!(tool = %name, elapsed_ms, code = e.code, "tool call returned an error");
            JsonRpcResponse::success(id, error_content(&e))
        }
    }
}

fn success_content(value: Value) -> Value {
    let text = match &value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    json!({
        "content": [{"type": "text", "text": text}],
        "structuredContent": value,
        "isError": false,
    })
}

fn error_content(err: &ToolCallError) -> Value {
    let mut content = json!({
        "content": [{"type": "text", "text": err.message}],
        "isError": true,
        "errorCode": err.code,
    });
    if let Some(data) = &err.data {
        content["errorData"] = data.clone();
    }
    content
}

// ─── Tests ───────────────────────────────────────────────────────────────────

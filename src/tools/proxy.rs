//! Proxy registrar: turns discovered descriptors into callable tools.
//!
//! A `ProxyTool` knows only its descriptor, the channel client, and the
//! channel name. Each invocation forwards the call across the channel and
//! maps every transport failure into a normal tool-call error.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use super::registry::{RegistryEntry, ToolHandler, ToolOrigin, ToolRegistry};
use super::types::{error_codes, ToolCallError, ToolDescriptor, ToolOutcome};
use crate::channel::{ChannelClient, ChannelError};

/// Default deadline for a proxied call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

// ─── ProxyTool ───────────────────────────────────────────────────────────────

/// Handler that forwards one tool's calls to the target process.
#[derive(Debug, Clone)]
pub struct ProxyTool {
    descriptor: Arc<ToolDescriptor>,
    client: Arc<ChannelClient>,
    channel: Arc<str>,
    timeout: Duration,
}

impl ProxyTool {
    pub fn new(
        descriptor: Arc<ToolDescriptor>,
        client: Arc<ChannelClient>,
        channel: Arc<str>,
        timeout: Duration,
    ) -> Self {
        Self {
            descriptor,
            client,
            channel,
            timeout,
        }
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Check the arguments, then make the round trip.
    pub async fn forward(&self, params: Value) -> ToolOutcome {
        let name = self.descriptor.name.as_str();

        let params = match params {
            Value::Null => Value::Object(Map::new()),
            obj @ Value::Object(_) => obj,
            other => {
                return Err(ToolCallError::invalid_params(
                    name,
                    format!("expected an object, got {}", json_type_name(&other)),
                ))
            }
        };

        let missing = self.descriptor.parameter_schema.missing_required(&params);
        if !missing.is_empty() {
            return Err(ToolCallError::invalid_params(
                name,
                format!("missing required field(s): {}", missing.join(", ")),
            ));
        }

        self.client
            .call(&self.channel, name, params, self.timeout)
            .await
            .map_err(|e| {
                tracing::warn!(tool = %name, kind = %e.kind(), error = %e, "proxied call failed");
                map_channel_error(name, e)
            })
    }
}

impl ToolHandler for ProxyTool {
    fn invoke(&self, params: Value) -> BoxFuture<'static, ToolOutcome> {
        let tool = self.clone();
        Box::pin(async move { tool.forward(params).await })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Translate a transport failure into the error a client sees.
///
/// Remote errors keep their code, message, and data untouched.
pub fn map_channel_error(tool: &str, err: ChannelError) -> ToolCallError {
    match err {
        ChannelError::Unavailable { .. } => ToolCallError::new(
            error_codes::TARGET_UNAVAILABLE,
            format!("tool '{tool}' is currently unavailable: the target application is not running or not listening"),
        ),
        ChannelError::Timeout { timeout_ms, .. } => ToolCallError::new(
            error_codes::TARGET_TIMEOUT,
            format!("tool '{tool}' timed out after {timeout_ms} ms"),
        ),
        ChannelError::Disconnected { reason, .. } => ToolCallError::new(
            error_codes::TARGET_DISCONNECTED,
            format!("tool '{tool}' lost its connection to the target: {reason}"),
        ),
        ChannelError::Protocol { reason, .. } => ToolCallError::new(
            error_codes::TARGET_PROTOCOL,
            format!("tool '{tool}' received a malformed reply: {reason}"),
        ),
        ChannelError::Remote {
            code,
            message,
            data,
        } => ToolCallError {
            code,
            message,
            data,
        },
    }
}

// ─── ProxyRegistrar ──────────────────────────────────────────────────────────

/// Builds `ProxyTool`s and writes them into a registry.
#[derive(Debug, Clone)]
pub struct ProxyRegistrar {
    client: Arc<ChannelClient>,
    channel: Arc<str>,
    call_timeout: Duration,
}

impl ProxyRegistrar {
    pub fn new(client: Arc<ChannelClient>, channel: &str, call_timeout: Duration) -> Self {
        Self {
            client,
            channel: Arc::from(channel),
            call_timeout,
        }
    }

    /// Register one descriptor, replacing any entry of the same name.
    pub fn register(&self, descriptor: ToolDescriptor, registry: &ToolRegistry) -> RegistryEntry {
        let descriptor = Arc::new(descriptor);
        let handler = ProxyTool::new(
            descriptor.clone(),
            self.client.clone(),
            self.channel.clone(),
            self.call_timeout,
        );
        registry.register_tool(descriptor, ToolOrigin::Proxy, Arc::new(handler))
    }

    /// Register every descriptor; returns how many were registered.
    pub fn register_all(
        &self,
        descriptors: impl IntoIterator<Item = ToolDescriptor>,
        registry: &ToolRegistry,
    ) -> usize {
        descriptors
            .into_iter()
            .map(|descriptor| self.register(descriptor, registry))
            .count()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

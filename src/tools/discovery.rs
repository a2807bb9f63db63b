//! Tool discovery: asks the target process which tools it offers.
//!
//! One `list-tools` round trip, then per-entry validation. A target that is
//! not running yields an empty catalog; bad entries are skipped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::errors::DiscoveryError;
use super::types::{ParameterSchema, ToolDescriptor};
use crate::channel::{ChannelClient, ChannelError};

/// Method name the target answers with its tool catalog.
pub const LIST_TOOLS_METHOD: &str = "list-tools";

/// Default deadline for the discovery call.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);

// ─── Wire Format ─────────────────────────────────────────────────────────────

/// A catalog entry as the target sends it. Every field is optional here so
/// that validation can name what is wrong.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDescriptor {
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, alias = "module", alias = "source_module")]
    source_module: Option<String>,
    #[serde(
        default,
        alias = "parameters",
        alias = "inputSchema",
        alias = "schema"
    )]
    parameter_schema: Option<Value>,
}

impl WireDescriptor {
    fn into_descriptor(self) -> Result<ToolDescriptor, String> {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or("descriptor has no name")?
            .to_string();

        let schema = match &self.parameter_schema {
            Some(raw) => ParameterSchema::from_wire(raw)
                .map_err(|e| format!("tool '{name}': {e}"))?,
            None => ParameterSchema::default(),
        };

        Ok(ToolDescriptor {
            name,
            description: self.description.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            source_module: self.source_module.unwrap_or_default(),
            parameter_schema: schema,
        })
    }
}

/// Parse a `list-tools` result into validated descriptors.
///
/// Accepts a bare array or `{"tools": [...]}`. Entries that fail to decode,
/// have a blank name, or repeat an earlier name are skipped with a warning.
pub fn parse_catalog(payload: Value) -> Result<Vec<ToolDescriptor>, DiscoveryError> {
    let entries = match payload {
        Value::Array(entries) => entries,
        Value::Object(mut obj) => match obj.remove("tools") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(DiscoveryError::InvalidCatalog {
                    reason: "expected an array or an object with a 'tools' array".into(),
                })
            }
        },
        other => {
            return Err(DiscoveryError::InvalidCatalog {
                reason: format!("expected an array of descriptors, got {other}"),
            })
        }
    };

    let mut seen = HashSet::new();
    let mut descriptors = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let decoded = serde_json::from_value::<WireDescriptor>(entry)
            .map_err(|e| e.to_string())
            .and_then(WireDescriptor::into_descriptor);

        match decoded {
            Ok(descriptor) if !seen.insert(descriptor.name.clone()) => {
                tracing::warn!(index, tool = %descriptor.name, "duplicate tool name in catalog, skipping");
            }
            Ok(descriptor) => descriptors.push(descriptor),
            Err(reason) => {
                tracing::warn!(index, reason = %reason, "invalid tool descriptor, skipping");
            }
        }
    }

    Ok(descriptors)
}

// ─── DiscoveryService ────────────────────────────────────────────────────────

/// Fetches the target's tool catalog over a channel.
#[derive(Debug, Clone)]
pub struct DiscoveryService {
    client: Arc<ChannelClient>,
    timeout: Duration,
}

impl DiscoveryService {
    pub fn new(client: Arc<ChannelClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Ask `channel` for its tools.
    ///
    /// A target that is not listening is not an error: the catalog is
    /// simply empty.
    pub async fn discover(&self, channel: &str) -> Result<Vec<ToolDescriptor>, DiscoveryError> {
        let payload = match self
            .client
            .call(channel, LIST_TOOLS_METHOD, Value::Null, self.timeout)
            .await
        {
            Ok(payload) => payload,
            Err(ChannelError::Unavailable { reason, .. }) => {
                tracing::info!(
                    channel = %channel,
                    reason = %reason,
                    "target not available, no dynamic tools discovered"
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let descriptors = parse_catalog(payload)?;
        tracing::info!(
            channel = %channel,
            count = descriptors.len(),
            "discovered target tools"
        );
        Ok(descriptors)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

//! Static tools implemented by the bridge itself.

use std::sync::{Arc, Weak};

use serde_json::{json, Value};

use super::Bridge;
use crate::tools::{error_codes, ToolCallError, ToolDescriptor, ToolOutcome, ToolRegistry};

pub const BRIDGE_STATUS_TOOL: &str = "bridge_status";
pub const REDISCOVER_TOOL: &str = "rediscover_tools";

const CATEGORY: &str = "Bridge";

/// Register `bridge_status` and `rediscover_tools`.
///
/// Handlers hold a weak reference so the registry never keeps its own
/// owner alive.
pub(crate) fn register_builtin_tools(registry: &ToolRegistry, bridge: Weak<Bridge>) {
    let status_ref = bridge.clone();
    registry.register_static(
        ToolDescriptor::new(
            BRIDGE_STATUS_TOOL,
            "Report the target channel, registered tool counts, and bridge uptime.",
        )
        .with_category(CATEGORY),
        move |_params: Value| {
            let bridge = status_ref.clone();
            async move {
                let bridge = upgrade(&bridge)?;
                serde_json::to_value(bridge.status()).map_err(|e| {
                    ToolCallError::new(error_codes::INTERNAL_ERROR, format!("failed to encode status: {e}"))
                })
            }
        },
    );

    registry.register_static(
        ToolDescriptor::new(
            REDISCOVER_TOOL,
            "Ask the target application for its current tools and register any new or changed ones.",
        )
        .with_category(CATEGORY),
        move |_params: Value| {
            let bridge = bridge.clone();
            async move { rediscover(upgrade(&bridge)?).await }
        },
    );
}

fn upgrade(bridge: &Weak<Bridge>) -> Result<Arc<Bridge>, ToolCallError> {
    bridge
        .upgrade()
        .ok_or_else(|| ToolCallError::new(error_codes::INTERNAL_ERROR, "bridge is shutting down"))
}

async fn rediscover(bridge: Arc<Bridge>) -> ToolOutcome {
    match bridge.rediscover().await {
        Ok(report) => Ok(json!({
            "discovered": report.discovered,
            "registered": report.registered,
        })),
        Err(e) => Err(ToolCallError::new(
            error_codes::INTERNAL_ERROR,
            format!("re-discovery failed: {e}"),
        )),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

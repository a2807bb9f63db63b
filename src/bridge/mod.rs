//! Bridge: owns the registry and wires discovery into it.
//!
//! This is the high-level API the front-end consumes:
//! `list_registered_tools` for catalogs and `invoke` for calls. Discovery
//! runs once at startup and again on demand (or on a timer).

pub mod builtin;

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::channel::ChannelClient;
use crate::config::BridgeConfig;
use crate::tools::{
    DiscoveryError, DiscoveryService, ProxyRegistrar, ToolDescriptor, ToolOrigin, ToolOutcome,
    ToolRegistry,
};

// ─── Public Types ────────────────────────────────────────────────────────────

/// Outcome of one discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    /// Valid descriptors the target reported.
    pub discovered: usize,
    /// Proxies written into the registry (after the allowlist).
    pub registered: usize,
}

/// Snapshot of the bridge for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeStatus {
    pub channel: String,
    pub proxied_tools: usize,
    pub static_tools: usize,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub version: &'static str,
}

// ─── Bridge ──────────────────────────────────────────────────────────────────

/// The running bridge.
pub struct Bridge {
    channel: String,
    registry: Arc<ToolRegistry>,
    discovery: DiscoveryService,
    registrar: ProxyRegistrar,
    allowlist: Option<HashSet<String>>,
    started_at: DateTime<Utc>,
    /// Serializes discovery passes.
    discovery_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("channel", &self.channel)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Build a bridge from configuration and register the static tools.
    ///
    /// No I/O happens here; call [`Bridge::start`] to discover tools.
    pub fn new(config: &BridgeConfig) -> Arc<Self> {
        let client = Arc::new(ChannelClient::new(config.client_options()));
        let channel = config.canonical_channel();

        Arc::new_cyclic(|weak: &Weak<Bridge>| {
            let registry = Arc::new(ToolRegistry::new());
            builtin::register_builtin_tools(&registry, weak.clone());

            Self {
                discovery: DiscoveryService::new(client.clone(), config.discovery_timeout()),
                registrar: ProxyRegistrar::new(client, &channel, config.call_timeout()),
                channel,
                registry,
                allowlist: config
                    .enabled_tools
                    .as_ref()
                    .map(|names| names.iter().cloned().collect()),
                started_at: Utc::now(),
                discovery_lock: tokio::sync::Mutex::new(()),
            }
        })
    }

    /// Run the startup discovery pass.
    ///
    /// Discovery failures are logged and leave the bridge serving only its
    /// static tools.
    pub async fn start(&self) -> DiscoveryReport {
        match self.rediscover().await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(
                    channel = %self.channel,
                    error = %e,
                    "startup discovery failed, serving static tools only"
                );
                DiscoveryReport::default()
            }
        }
    }

    /// Fetch the catalog again and (re-)register every allowed tool.
    ///
    /// Idempotent: a tool already registered is replaced, never duplicated.
    pub async fn rediscover(&self) -> Result<DiscoveryReport, DiscoveryError> {
        let _guard = self.discovery_lock.lock().await;

        let descriptors = self.discovery.discover(&self.channel).await?;
        let discovered = descriptors.len();

        let allowed: Vec<ToolDescriptor> = descriptors
            .into_iter()
            .filter(|d| self.is_enabled(&d.name))
            .collect();
        if allowed.len() < discovered {
            tracing::debug!(
                skipped = discovered - allowed.len(),
                "tools not in enabled_tools were not registered"
            );
        }

        let registered = self.registrar.register_all(allowed, &self.registry);
        tracing::info!(
            channel = %self.channel,
            discovered,
            registered,
            total = self.registry.len(),
            "tool registry updated"
        );

        Ok(DiscoveryReport {
            discovered,
            registered,
        })
    }

    fn is_enabled(&self, name: &str) -> bool {
        self.allowlist
            .as_ref()
            .map_or(true, |allowed| allowed.contains(name))
    }

    /// Every tool the front-end may call, sorted by name.
    pub fn list_registered_tools(&self) -> Vec<Arc<ToolDescriptor>> {
        self.registry.list_all()
    }

    /// Call a registered tool.
    pub async fn invoke(&self, name: &str, params: Value) -> ToolOutcome {
        self.registry.invoke(name, params).await
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Canonical name of the target channel.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn status(&self) -> BridgeStatus {
        let now = Utc::now();
        BridgeStatus {
            channel: self.channel.clone(),
            proxied_tools: self.registry.count_by_origin(ToolOrigin::Proxy),
            static_tools: self.registry.count_by_origin(ToolOrigin::Static),
            started_at: self.started_at,
            uptime_secs: (now - self.started_at).num_seconds(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Re-run discovery every `every` until the bridge is dropped.
    ///
    /// The task holds only a weak reference, so it never keeps the bridge
    /// alive on its own.
    pub fn spawn_periodic_rediscovery(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(bridge) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = bridge.rediscover().await {
                    tracing::warn!(channel = %bridge.channel, error = %e, "periodic re-discovery failed");
                }
            }
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::channel::mock_target::{MockReply, MockTarget};
    use crate::tools::error_codes;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CHANNEL: &str = r"\\.\pipe\Bridge_MCP_Request";

    fn config_for(socket_dir: &std::path::Path) -> BridgeConfig {
        BridgeConfig {
            channel: CHANNEL.into(),
            socket_dir: socket_dir.to_path_buf(),
            discovery_timeout_ms: 500,
            call_timeout_ms: 2_000,
            ..BridgeConfig::default()
        }
    }

    fn catalog_target() -> MockTarget {
        MockTarget::start(CHANNEL, |req| match req.method.as_str() {
            "list-tools" => MockReply::result(json!([
                {"name": "list_windows", "description": "Enumerate top-level windows"},
                {"name": "snap", "parameters": [{"name": "hwnd", "type": "Int64", "required": true}]}
            ])),
            other => MockReply::result(json!({"called": other})),
        })
    }

    #[tokio::test]
    async fn test_start_registers_discovered_and_static_tools() {
        let target = catalog_target();
        let bridge = Bridge::new(&config_for(target.socket_dir()));

        let report = bridge.start().await;
        assert_eq!(report, DiscoveryReport { discovered: 2, registered: 2 });

        let names: Vec<String> = bridge
            .list_registered_tools()
            .iter()
            .map(|d| d.name.clone())
            .collect();
        assert_eq!(
            names,
            vec!["bridge_status", "list_windows", "rediscover_tools", "snap"]
        );

        let out = bridge.invoke("list_windows", json!({})).await.unwrap();
        assert_eq!(out, json!({"called": "list_windows"}));

        let err = bridge.invoke("snap", json!({})).await.unwrap_err();
        assert_eq!(err.code, error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_rediscovery_is_idempotent() {
        let target = catalog_target();
        let bridge = Bridge::new(&config_for(target.socket_dir()));

        bridge.start().await;
        bridge.rediscover().await.unwrap();

        assert_eq!(bridge.registry().count_by_origin(ToolOrigin::Proxy), 2);
        assert_eq!(bridge.registry().len(), 4);
    }

    #[tokio::test]
    async fn test_absent_target_leaves_static_tools() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = Bridge::new(&config_for(dir.path()));

        let report = bridge.start().await;
        assert_eq!(report, DiscoveryReport::default());
        assert_eq!(bridge.registry().count_by_origin(ToolOrigin::Proxy), 0);
        assert_eq!(bridge.registry().count_by_origin(ToolOrigin::Static), 2);
    }

    #[tokio::test]
    async fn test_allowlist_filters_proxied_tools() {
        let target = catalog_target();
        let config = BridgeConfig {
            enabled_tools: Some(vec!["snap".into()]),
            ..config_for(target.socket_dir())
        };
        let bridge = Bridge::new(&config);

        let report = bridge.start().await;
        assert_eq!(report, DiscoveryReport { discovered: 2, registered: 1 });
        assert!(bridge.registry().lookup("list_windows").is_none());
        assert!(bridge.registry().lookup("snap").is_some());
        assert!(bridge.registry().lookup("bridge_status").is_some());
    }

    #[tokio::test]
    async fn test_failed_discovery_is_not_fatal() {
        let target = MockTarget::start(CHANNEL, |_| MockReply::Raw(b"not json\n".to_vec()));
        let bridge = Bridge::new(&config_for(target.socket_dir()));

        assert_eq!(bridge.start().await, DiscoveryReport::default());
        assert!(bridge.rediscover().await.is_err());
        assert_eq!(bridge.registry().len(), 2);
    }

    #[tokio::test]
    async fn test_periodic_rediscovery_picks_up_new_tools() {
        let passes = Arc::new(AtomicUsize::new(0));
        let target = {
            let passes = passes.clone();
            MockTarget::start(CHANNEL, move |_| {
                let n = passes.fetch_add(1, Ordering::SeqCst);
                let tools: Vec<Value> = (0..=n).map(|i| json!({"name": format!("t{i}")})).collect();
                MockReply::result(Value::Array(tools))
            })
        };
        let bridge = Bridge::new(&config_for(target.socket_dir()));
        bridge.start().await;
        assert_eq!(bridge.registry().count_by_origin(ToolOrigin::Proxy), 1);

        let task = bridge.spawn_periodic_rediscovery(Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(400)).await;
        task.abort();

        assert!(bridge.registry().count_by_origin(ToolOrigin::Proxy) >= 3);
    }

    #[tokio::test]
    async fn test_periodic_task_ends_with_bridge() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = Bridge::new(&config_for(dir.path()));
        let task = bridge.spawn_periodic_rediscovery(Duration::from_millis(20));
        drop(bridge);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}

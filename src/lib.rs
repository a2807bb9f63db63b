//! toolbridge: exposes the tools of a running target application to MCP
//! clients, forwarding each call over a local IPC channel.
//!
//! - `channel`: framed request/reply transport to the target
//! - `tools`: registry, discovery, and proxy handlers
//! - `bridge`: the owner that wires discovery into the registry
//! - `server`: the HTTP JSON-RPC front-end
//! - `config` / `logging`: startup plumbing

pub mod bridge;
pub mod channel;
pub mod config;
pub mod logging;
pub mod server;
pub mod tools;

use anyhow::Context;
use tokio::net::TcpListener;

use bridge::Bridge;
use config::{BridgeConfig, CliOverrides};
use logging::LogOptions;

/// Load configuration, discover tools, and serve until Ctrl-C.
///
/// Only configuration and bind failures are fatal. An absent or broken
/// target leaves the bridge serving its static tools.
pub async fn run(overrides: CliOverrides) -> anyhow::Result<()> {
    let config = BridgeConfig::load(&overrides).context("failed to load configuration")?;

    logging::init_tracing(&LogOptions {
        file: config.log_file.clone(),
        json: config.log_json,
    })?;

    let bridge = Bridge::new(&config);
    let report = bridge.start().await;
    tracing::info!(
        channel = %bridge.channel(),
        discovered = report.discovered,
        registered = report.registered,
        total = bridge.registry().len(),
        "bridge ready"
    );

    let _rediscovery = config
        .rediscover_interval()
        .map(|every| bridge.spawn_periodic_rediscovery(every));

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;
    tracing::info!(addr = %listener.local_addr()?, "listening for MCP clients on /mcp");

    server::serve(bridge, listener, server::shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("toolbridge stopped");
    Ok(())
}

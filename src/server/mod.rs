//! HTTP front-end: MCP over JSON-RPC on `POST /mcp`.
//!
//! The router holds an `Arc<Bridge>` as state. Every request is
//! independent, so calls run concurrently on the tokio runtime.

pub mod handlers;
pub mod jsonrpc;

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use crate::bridge::Bridge;

/// Build the front-end router.
pub fn router(bridge: Arc<Bridge>) -> Router {
    Router::new()
        .route("/mcp", post(rpc_endpoint))
        .route("/health", get(health))
        .with_state(bridge)
}

async fn rpc_endpoint(State(bridge): State<Arc<Bridge>>, body: Bytes) -> Response {
    let request = match jsonrpc::parse_envelope(&body) {
        Ok(request) => request,
        Err(response) => {
            tracing::debug!(error = ?response.error, "rejected malformed request");
            return Json(response).into_response();
        }
    };

    match handlers::handle_rpc(&bridge, request).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn health(State(bridge): State<Arc<Bridge>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "channel": bridge.channel(),
        "tools": bridge.registry().len(),
    }))
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(bridge: Arc<Bridge>, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(bridge))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested, draining connections"),
        Err(e) => {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C, shutting down");
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

//! Channel client: one blocking round trip per call.
//!
//! Every call opens its own connection, so concurrent calls share no
//! transport state. The only shared piece is the optional per-channel
//! semaphore bounding simultaneous connections.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant as StdInstant};

use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use super::codec::DEFAULT_MAX_FRAME_BYTES;
use super::connection::Connection;
use super::errors::ChannelError;
use super::types::ChannelRequest;

// ─── Options ─────────────────────────────────────────────────────────────────

/// Transport settings shared by every call made through one client.
#[derive(Debug, Clone)]
pub struct ChannelClientOptions {
    /// Directory holding Unix-domain sockets (ignored on Windows).
    pub socket_dir: PathBuf,
    /// Largest reply frame accepted.
    pub max_frame_bytes: usize,
    /// Upper bound on simultaneous connections to one channel.
    pub max_connections_per_channel: Option<usize>,
}

impl Default for ChannelClientOptions {
    fn default() -> Self {
        Self {
            socket_dir: std::env::temp_dir(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            max_connections_per_channel: None,
        }
    }
}

// ─── ChannelClient ───────────────────────────────────────────────────────────

/// Performs framed request/reply calls against named channels.
#[derive(Debug)]
pub struct ChannelClient {
    options: ChannelClientOptions,
    /// `channel → semaphore`, populated lazily when a bound is configured.
    limits: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl ChannelClient {
    /// Create a client with the given options.
    pub fn new(options: ChannelClientOptions) -> Self {
        Self {
            options,
            limits: Mutex::new(HashMap::new()),
        }
    }

    /// The options this client was built with.
    pub fn options(&self) -> &ChannelClientOptions {
        &self.options
    }

    /// Call `method` on `channel` and wait for its reply.
    ///
    /// Returns the reply's `result` payload. Fails with `Unavailable`
    /// immediately when nothing listens on the channel, `Timeout` when the
    /// deadline passes, `Disconnected` when the stream drops, `Protocol`
    /// for malformed replies, and `Remote` for structured remote errors.
    pub async fn call(
        &self,
        channel: &str,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, ChannelError> {
        let started = StdInstant::now();
        let deadline = Instant::now() + timeout;
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let timed_out = || ChannelError::Timeout {
            channel: channel.to_string(),
            method: method.to_string(),
            timeout_ms,
        };

        // Waiting for a permit counts against the deadline.
        let _permit = match self.acquire_permit(channel, deadline).await {
            Ok(permit) => permit,
            Err(()) => return Err(timed_out()),
        };

        let request = ChannelRequest::new(method, params);
        let mut conn = Connection::new(channel, self.options.max_frame_bytes);

        if let Err(e) = conn.open(&self.options.socket_dir, deadline).await {
            if matches!(e, ChannelError::Timeout { .. }) {
                return Err(timed_out());
            }
            tracing::debug!(channel = %channel, method = %method, error = %e, "channel connect failed");
            return Err(e);
        }

        let outcome = match tokio::time::timeout_at(deadline, conn.exchange(&request)).await {
            Ok(result) => result,
            Err(_) => {
                // A half-read stream cannot serve anything else.
                conn.fault();
                Err(timed_out())
            }
        };

        match &outcome {
            Ok(_) | Err(ChannelError::Remote { .. }) => conn.close().await,
            Err(_) => conn.fault(),
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => tracing::debug!(
                channel = %channel,
                method = %method,
                request_id = %request.id,
                elapsed_ms,
                "channel call completed"
            ),
            Err(e) => tracing::debug!(
                channel = %channel,
                method = %method,
                request_id = %request.id,
                elapsed_ms,
                kind = %e.kind(),
                error = %e,
                "channel call failed"
            ),
        }

        outcome.and_then(|response| response.into_result())
    }

    /// Take a connection slot for `channel`, if a bound is configured.
    async fn acquire_permit(
        &self,
        channel: &str,
        deadline: Instant,
    ) -> Result<Option<OwnedSemaphorePermit>, ()> {
        let Some(bound) = self.options.max_connections_per_channel else {
            return Ok(None);
        };

        let semaphore = {
            let mut limits = self
                .limits
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            limits
                .entry(channel.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(bound.max(1))))
                .clone()
        };

        match tokio::time::timeout_at(deadline, semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => Ok(Some(permit)),
            _ => Err(()),
        }
    }
}

impl Default for ChannelClient {
    fn default() -> Self {
        Self::new(ChannelClientOptions::default())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

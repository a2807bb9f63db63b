//! One connection, one exchange.
//!
//! A [`Connection`] is created for a single call, walks the state machine
//! below, and is dropped when the call ends. Nothing about it is shared.
//!
//! ```text
//! Disconnected → Connecting → Connected → Disconnected
//!                     │            │
//!                     └──→ Faulted ←┘ ──→ Disconnected
//! ```

use std::path::Path;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::time::Instant;

use super::codec;
use super::endpoint::{self, ChannelStream};
use super::errors::ChannelError;
use super::types::{ChannelRequest, ChannelResponse};

// ─── State ───────────────────────────────────────────────────────────────────

/// Lifecycle of a channel connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Faulted,
}

impl ConnectionState {
    /// Whether `self → next` is a legal transition.
    ///
    /// `Faulted` may only move to `Disconnected`; it is never retried in
    /// place.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Faulted)
                | (Connecting, Disconnected)
                | (Connected, Faulted)
                | (Connected, Disconnected)
                | (Faulted, Disconnected)
        )
    }
}

// ─── Connection ──────────────────────────────────────────────────────────────

/// A single-use connection to a channel.
pub struct Connection {
    channel: String,
    state: ConnectionState,
    stream: Option<BufReader<Box<dyn ChannelStream>>>,
    max_frame_bytes: usize,
}

impl Connection {
    /// A fresh, unopened connection.
    pub fn new(channel: &str, max_frame_bytes: usize) -> Self {
        Self {
            channel: channel.to_string(),
            state: ConnectionState::Disconnected,
            stream: None,
            max_frame_bytes,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal connection transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(
            channel = %self.channel,
            from = ?self.state,
            to = ?next,
            "connection state change"
        );
        self.state = next;
    }

    /// Open the underlying endpoint.
    pub async fn open(&mut self, socket_dir: &Path, deadline: Instant) -> Result<(), ChannelError> {
        self.transition(ConnectionState::Connecting);
        match endpoint::connect(&self.channel, socket_dir, deadline).await {
            Ok(stream) => {
                self.stream = Some(BufReader::new(stream));
                self.transition(ConnectionState::Connected);
                Ok(())
            }
            Err(e) => {
                if e.faults_connection() {
                    self.transition(ConnectionState::Faulted);
                }
                self.transition(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Write one request and read its reply.
    ///
    /// Any failure faults the connection; a remote error does not, since
    /// the reply was read completely.
    pub async fn exchange(&mut self, request: &ChannelRequest) -> Result<ChannelResponse, ChannelError> {
        let result = self.exchange_inner(request).await;
        if let Err(e) = &result {
            if e.faults_connection() && self.state == ConnectionState::Connected {
                self.fault();
            }
        }
        result
    }

    async fn exchange_inner(&mut self, request: &ChannelRequest) -> Result<ChannelResponse, ChannelError> {
        let channel = self.channel.clone();
        let max_frame_bytes = self.max_frame_bytes;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ChannelError::disconnected(&channel, "connection is not open"))?;

        let frame = codec::encode_request(&channel, request)?;
        codec::write_frame(stream.get_mut(), &channel, &frame).await?;

        let raw = codec::read_frame(stream, &channel, max_frame_bytes).await?;
        let response = codec::decode_response(&channel, &raw)?;

        if let Some(id) = &response.id {
            if *id != request.id {
                return Err(ChannelError::protocol(
                    &channel,
                    format!("reply id '{id}' does not match request id '{}'", request.id),
                ));
            }
        }

        Ok(response)
    }

    /// Mark the stream untrustworthy and drop it.
    pub fn fault(&mut self) {
        if self.state == ConnectionState::Faulted || self.state == ConnectionState::Disconnected {
            return;
        }
        self.transition(ConnectionState::Faulted);
        self.stream = None;
        self.transition(ConnectionState::Disconnected);
    }

    /// Close cleanly after a completed exchange.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.get_mut().shutdown().await;
        }
        if self.state == ConnectionState::Connected {
            self.transition(ConnectionState::Disconnected);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

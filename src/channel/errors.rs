//! Channel error types.
//!
//! Every failure the transport can produce is one of five kinds. Callers
//! branch on [`ChannelError::kind`] rather than on message text.

use std::fmt;

use thiserror::Error;

/// Coarse classification of a channel failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelErrorKind {
    /// The channel does not exist or nobody is listening on it.
    Unavailable,
    /// No complete reply arrived before the deadline.
    Timeout,
    /// The channel closed or failed mid-exchange.
    Disconnected,
    /// The reply could not be framed or violated the response shape.
    Protocol,
    /// The target process answered with a structured error object.
    Remote,
}

impl fmt::Display for ChannelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::Disconnected => "disconnected",
            Self::Protocol => "protocol",
            Self::Remote => "remote",
        };
        f.write_str(label)
    }
}

/// Errors that can occur during a single channel round trip.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The target channel is missing or not accepting connections.
    #[error("channel '{channel}' is unavailable: {reason}")]
    Unavailable { channel: String, reason: String },

    /// The call deadline elapsed before a complete reply was read.
    #[error("call to '{method}' on channel '{channel}' timed out after {timeout_ms}ms")]
    Timeout {
        channel: String,
        method: String,
        timeout_ms: u64,
    },

    /// The connection dropped or errored while writing or reading.
    #[error("channel '{channel}' disconnected: {reason}")]
    Disconnected { channel: String, reason: String },

    /// The reply was oversized, not JSON, or not a valid response object.
    #[error("protocol error on channel '{channel}': {reason}")]
    Protocol { channel: String, reason: String },

    /// The target process returned `{ "error": { code, message } }`.
    #[error("remote error [{code}]: {message}")]
    Remote {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },
}

impl ChannelError {
    /// Classify this error.
    pub fn kind(&self) -> ChannelErrorKind {
        match self {
            Self::Unavailable { .. } => ChannelErrorKind::Unavailable,
            Self::Timeout { .. } => ChannelErrorKind::Timeout,
            Self::Disconnected { .. } => ChannelErrorKind::Disconnected,
            Self::Protocol { .. } => ChannelErrorKind::Protocol,
            Self::Remote { .. } => ChannelErrorKind::Remote,
        }
    }

    /// Whether the connection that produced this error must be discarded.
    ///
    /// A remote error arrives on a healthy, fully-read stream; everything
    /// else leaves the stream in an unknown state.
    pub fn faults_connection(&self) -> bool {
        !matches!(self, Self::Remote { .. } | Self::Unavailable { .. })
    }

    pub(crate) fn protocol(channel: &str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            channel: channel.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn disconnected(channel: &str, reason: impl Into<String>) -> Self {
        Self::Disconnected {
            channel: channel.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unavailable(channel: &str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            channel: channel.to_string(),
            reason: reason.into(),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

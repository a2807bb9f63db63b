//! Channel transport: framed request/reply over a local IPC endpoint.
//!
//! This module handles:
//! - Expanding an application identifier into its canonical channel name
//! - Opening a fresh connection per call (named pipe on Windows, Unix
//!   socket elsewhere)
//! - Newline-delimited JSON framing with a size limit
//! - Deadline enforcement and classification of failures into
//!   `Unavailable`, `Timeout`, `Disconnected`, `Protocol`, and `Remote`

pub mod client;
pub mod codec;
pub mod connection;
pub mod endpoint;
pub mod errors;
pub mod naming;
pub mod types;

#[cfg(all(test, unix))]
pub(crate) mod mock_target;

pub use client::{ChannelClient, ChannelClientOptions};
pub use connection::ConnectionState;
pub use errors::{ChannelError, ChannelErrorKind};
pub use naming::{canonical_channel_name, expand_channel_name, DEFAULT_CHANNEL_PREFIX};
pub use types::{ChannelRequest, ChannelResponse, RemoteError};

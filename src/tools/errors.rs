//! Discovery error types.

use thiserror::Error;

use crate::channel::ChannelError;

/// Errors that can occur while fetching the target's tool catalog.
///
/// An absent target is not one of them: that yields an empty catalog.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The `list-tools` round trip failed for a reason other than an
    /// absent target.
    #[error("tool discovery failed: {0}")]
    Channel(#[from] ChannelError),

    /// The catalog payload was not a sequence of descriptors.
    #[error("invalid tool catalog: {reason}")]
    InvalidCatalog { reason: String },
}

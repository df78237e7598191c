//! The point-to-point channel beneath a bridge.

use crate::error::LinkError;
use async_trait::async_trait;
use bytes::Bytes;

/// Transmit side of the link.
///
/// The receive side is push-based: the link calls
/// [`crate::QrtrBridge::on_link_receive`] for every inbound frame, on a context
/// that must not block.
#[async_trait]
pub trait Link: Send + Sync {
    /// Sends one contiguous frame. May block until the link accepts it.
    async fn transmit(&self, frame: Bytes) -> Result<(), LinkError>;
}

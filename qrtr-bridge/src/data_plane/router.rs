//! The service-addressed routing fabric a bridge feeds.

use crate::data_plane::frame::OutboundFrame;
use crate::error::{BridgeError, RouterError};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Identity the router assigned to a registered endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EndpointId(pub u32);

impl Display for EndpointId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ep{}", self.0)
    }
}

/// Calls the router makes into a registered endpoint.
#[async_trait]
pub trait TransportEndpoint: Send + Sync {
    /// Takes ownership of an outbound frame and transmits it over the link.
    async fn send(&self, frame: OutboundFrame) -> Result<(), BridgeError>;

    /// A remote service appeared behind this endpoint.
    fn on_router_announce(
        &self,
        node: u32,
        port: u32,
        service: u16,
        instance: u16,
    ) -> Result<(), BridgeError>;

    /// The remote service on `port` went away.
    fn on_router_withdraw(&self, port: u32) -> Result<(), BridgeError>;
}

/// Router-side entry points used by a bridge.
///
/// All methods are non-blocking: `ingest` is called from the link's receive
/// path.
pub trait Router: Send + Sync {
    /// Registers a new endpoint. `node_id` of `None` lets the router assign one.
    fn register_endpoint(
        &self,
        endpoint: Arc<dyn TransportEndpoint>,
        node_id: Option<u32>,
    ) -> Result<EndpointId, RouterError>;

    fn unregister_endpoint(&self, endpoint: EndpointId);

    /// Hands an inbound frame to the router.
    fn ingest(&self, endpoint: EndpointId, frame: Bytes) -> Result<(), RouterError>;
}

//! In-process link and router that close the loop back onto a single bridge.
//!
//! Frames the router delivers to the bridge are transmitted on the
//! [`LoopbackLink`], which parks them until [`LoopbackLink::pump`] hands them
//! back to the bridge as if they had arrived from the remote side.

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use qrtr_bridge::{
    BridgeError, Delivery, EndpointId, Link, LinkError, OutboundFrame, ProbeError, QrtrBridge,
    QrtrDriver, Router, RouterError, ServiceHandle, TransportEndpoint,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMPONENT: &str = "qrtr_loopback";
const HEADER_VERSION: u8 = 1;
const HEADER_LEN: usize = 4;

#[derive(Default)]
pub struct LoopbackLink {
    in_flight: Mutex<VecDeque<Bytes>>,
}

impl LoopbackLink {
    /// Feeds every transmitted frame back into `bridge`. Returns how many were forwarded.
    pub fn pump(&self, bridge: &QrtrBridge) -> usize {
        let mut forwarded = 0;
        loop {
            let next = self.in_flight.lock().pop_front();
            let Some(frame) = next else {
                break;
            };
            match bridge.on_link_receive(&frame) {
                Ok(Delivery::Forwarded) => forwarded += 1,
                Ok(Delivery::Dropped) => {}
                Err(err) => warn!(component = COMPONENT, err = %err, "loopback frame refused"),
            }
        }
        forwarded
    }
}

#[async_trait]
impl Link for LoopbackLink {
    async fn transmit(&self, frame: Bytes) -> Result<(), LinkError> {
        if frame.is_empty() {
            return Err(LinkError::new("empty frame"));
        }
        self.in_flight.lock().push_back(frame);
        Ok(())
    }
}

/// Router with a 4-byte header: version, reserved, big-endian payload length.
#[derive(Default)]
pub struct LoopbackRouter {
    endpoints: Mutex<HashMap<EndpointId, Arc<dyn TransportEndpoint>>>,
    next_node: AtomicU32,
    ingested: AtomicUsize,
}

impl LoopbackRouter {
    /// Frames `payload` behind the loopback header. Payloads whose length does
    /// not fit the 16-bit length field are refused.
    pub fn encode(payload: &[u8]) -> Result<OutboundFrame, BridgeError> {
        let len = u16::try_from(payload.len()).map_err(|_| BridgeError::MalformedPayload)?;

        let mut header = BytesMut::with_capacity(HEADER_LEN);
        header.put_u8(HEADER_VERSION);
        header.put_u8(0);
        header.put_u16(len);
        Ok(OutboundFrame::from(vec![
            header.freeze(),
            Bytes::copy_from_slice(payload),
        ]))
    }

    pub fn ingested(&self) -> usize {
        self.ingested.load(Ordering::Relaxed)
    }

    fn endpoints(&self) -> Vec<Arc<dyn TransportEndpoint>> {
        self.endpoints.lock().values().cloned().collect()
    }

    pub fn announce(&self, node: u32, port: u32, service: u16, instance: u16) {
        for endpoint in self.endpoints() {
            if let Err(err) = endpoint.on_router_announce(node, port, service, instance) {
                warn!(component = COMPONENT, port, err = %err, "announce not accepted");
            }
        }
    }

    pub fn withdraw(&self, port: u32) {
        for endpoint in self.endpoints() {
            if let Err(err) = endpoint.on_router_withdraw(port) {
                warn!(component = COMPONENT, port, err = %err, "withdraw not accepted");
            }
        }
    }

    pub async fn deliver(&self, payload: &[u8]) -> Result<(), BridgeError> {
        for endpoint in self.endpoints() {
            endpoint.send(Self::encode(payload)?).await?;
        }
        Ok(())
    }
}

impl Router for LoopbackRouter {
    fn register_endpoint(
        &self,
        endpoint: Arc<dyn TransportEndpoint>,
        node_id: Option<u32>,
    ) -> Result<EndpointId, RouterError> {
        let mut endpoints = self.endpoints.lock();
        let id = match node_id {
            Some(node) => EndpointId(node),
            None => EndpointId(self.next_node.fetch_add(1, Ordering::Relaxed) + 1),
        };
        if endpoints.contains_key(&id) {
            return Err(RouterError::Other(format!("node {} already registered", id.0)));
        }
        endpoints.insert(id, endpoint);
        info!(component = COMPONENT, endpoint = %id, "endpoint registered");
        Ok(id)
    }

    fn unregister_endpoint(&self, endpoint: EndpointId) {
        if self.endpoints.lock().remove(&endpoint).is_some() {
            info!(component = COMPONENT, endpoint = %endpoint, "endpoint unregistered");
        }
    }

    fn ingest(&self, endpoint: EndpointId, frame: Bytes) -> Result<(), RouterError> {
        if frame.len() < HEADER_LEN || frame[0] != HEADER_VERSION {
            return Err(RouterError::MalformedHeader);
        }
        let declared = u16::from_be_bytes([frame[2], frame[3]]) as usize;
        let payload = frame.slice(HEADER_LEN..);
        if payload.len() != declared {
            return Err(RouterError::MalformedHeader);
        }

        self.ingested.fetch_add(1, Ordering::Relaxed);
        info!(
            component = COMPONENT,
            endpoint = %endpoint,
            payload = %String::from_utf8_lossy(&payload),
            "router ingested frame"
        );
        Ok(())
    }
}

pub struct LoggingDriver {
    name: String,
    fail_probe: bool,
}

impl LoggingDriver {
    pub fn new(name: &str, fail_probe: bool) -> Self {
        Self {
            name: name.to_string(),
            fail_probe,
        }
    }
}

#[async_trait]
impl QrtrDriver for LoggingDriver {
    async fn probe(&self, handle: Arc<ServiceHandle>) -> Result<(), ProbeError> {
        if self.fail_probe {
            debug!(component = COMPONENT, driver = %self.name, handle = %handle.name(), "refusing handle");
            return Err(ProbeError::new("configured to refuse"));
        }
        info!(
            component = COMPONENT,
            driver = %self.name,
            handle = %handle.name(),
            modalias = %handle.modalias(),
            "driver attached"
        );
        Ok(())
    }

    async fn remove(&self, handle: Arc<ServiceHandle>) {
        info!(component = COMPONENT, driver = %self.name, handle = %handle.name(), "driver detached");
    }
}

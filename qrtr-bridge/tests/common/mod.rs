#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use qrtr_bridge::{
    BridgeConfig, BridgeError, DriverRegistry, EndpointId, Link, LinkError, ProbeError,
    QrtrBridge, QrtrDriver, Router, RouterError, ServiceHandle, TransportEndpoint,
};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, Once};
use tracing_subscriber::EnvFilter;

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

#[derive(Default)]
pub struct RecordingLink {
    sent: Mutex<Vec<Bytes>>,
}

impl RecordingLink {
    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().expect("lock sent").clone()
    }
}

#[async_trait]
impl Link for RecordingLink {
    async fn transmit(&self, frame: Bytes) -> Result<(), LinkError> {
        self.sent.lock().expect("lock sent").push(frame);
        Ok(())
    }
}

/// Router stand-in accepting frames whose first byte is a known header version.
#[derive(Default)]
pub struct TestRouter {
    endpoint: Mutex<Option<Arc<dyn TransportEndpoint>>>,
    ingested: Mutex<Vec<Bytes>>,
}

impl TestRouter {
    pub fn endpoint(&self) -> Arc<dyn TransportEndpoint> {
        self.endpoint
            .lock()
            .expect("lock endpoint")
            .clone()
            .expect("registered endpoint")
    }

    pub fn has_endpoint(&self) -> bool {
        self.endpoint.lock().expect("lock endpoint").is_some()
    }

    pub fn ingested(&self) -> Vec<Bytes> {
        self.ingested.lock().expect("lock ingested").clone()
    }

    pub fn announce(&self, node: u32, port: u32, service: u16, instance: u16) -> Result<(), BridgeError> {
        self.endpoint()
            .on_router_announce(node, port, service, instance)
    }

    pub fn withdraw(&self, port: u32) -> Result<(), BridgeError> {
        self.endpoint().on_router_withdraw(port)
    }
}

impl Router for TestRouter {
    fn register_endpoint(
        &self,
        endpoint: Arc<dyn TransportEndpoint>,
        node_id: Option<u32>,
    ) -> Result<EndpointId, RouterError> {
        *self.endpoint.lock().expect("lock endpoint") = Some(endpoint);
        Ok(EndpointId(node_id.unwrap_or(1)))
    }

    fn unregister_endpoint(&self, _endpoint: EndpointId) {
        self.endpoint.lock().expect("lock endpoint").take();
    }

    fn ingest(&self, _endpoint: EndpointId, frame: Bytes) -> Result<(), RouterError> {
        match frame.first() {
            Some(1) | Some(2) => {
                self.ingested.lock().expect("lock ingested").push(frame);
                Ok(())
            }
            _ => Err(RouterError::MalformedHeader),
        }
    }
}

/// Driver recording every callback as `"probe <name>"` / `"remove <name>"`.
#[derive(Default)]
pub struct RecordingDriver {
    fail_probe: bool,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
    events: Mutex<Vec<String>>,
}

impl RecordingDriver {
    pub fn failing() -> Self {
        Self {
            fail_probe: true,
            ..Default::default()
        }
    }

    /// A driver whose first probe blocks its thread until the returned sender fires.
    pub fn gated() -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let driver = Self {
            gate: Mutex::new(Some(rx)),
            ..Default::default()
        };
        (driver, tx)
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("lock events").clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events()
            .iter()
            .filter(|event| event.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl QrtrDriver for RecordingDriver {
    async fn probe(&self, handle: Arc<ServiceHandle>) -> Result<(), ProbeError> {
        let gate = self.gate.lock().expect("lock gate").take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }

        self.events
            .lock()
            .expect("lock events")
            .push(format!("probe {}", handle.name()));
        if self.fail_probe {
            return Err(ProbeError::new("device not ready"));
        }
        Ok(())
    }

    async fn remove(&self, handle: Arc<ServiceHandle>) {
        self.events
            .lock()
            .expect("lock events")
            .push(format!("remove {}", handle.name()));
    }
}

pub struct Harness {
    pub bridge: Arc<QrtrBridge>,
    pub link: Arc<RecordingLink>,
    pub router: Arc<TestRouter>,
    pub drivers: Arc<DriverRegistry>,
}

pub async fn harness(name: &str, capacity: usize) -> Harness {
    harness_with_drivers(name, capacity, Arc::new(DriverRegistry::new())).await
}

pub async fn harness_with_drivers(
    name: &str,
    capacity: usize,
    drivers: Arc<DriverRegistry>,
) -> Harness {
    init_tracing();
    let link = Arc::new(RecordingLink::default());
    let router = Arc::new(TestRouter::default());
    let config = BridgeConfig {
        name: name.to_string(),
        node_id: None,
        lifecycle_queue_capacity: capacity,
    };

    let bridge = QrtrBridge::probe(&config, link.clone(), router.clone(), drivers.clone())
        .await
        .expect("probe bridge");

    Harness {
        bridge,
        link,
        router,
        drivers,
    }
}

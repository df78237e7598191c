/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use crate::binding::driver_registry::DriverRegistry;
use crate::config::BridgeConfig;
use crate::control_plane::handle_registry::HandleRegistry;
use crate::control_plane::lifecycle_queue::{LifecycleQueue, LifecycleRequest};
use crate::control_plane::service_handle::ServiceHandle;
use crate::data_plane::frame::OutboundFrame;
use crate::data_plane::link::Link;
use crate::data_plane::router::{EndpointId, Router, TransportEndpoint};
use crate::error::BridgeError;
use crate::observability::{events, fields};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "bridge";

/// What happened to an inbound frame the router accepted or refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Forwarded,
    /// The frame carried a malformed header and was dropped on purpose.
    Dropped,
}

/// Moves frames between one link and the router, and keeps the directory of
/// remote services announced through it.
pub struct QrtrBridge {
    name: String,
    link: Arc<dyn Link>,
    router: Arc<dyn Router>,
    registry: Arc<HandleRegistry>,
    queue: LifecycleQueue,
    endpoint: ArcSwapOption<EndpointId>,
}

impl QrtrBridge {
    /// Brings a bridge up on `link` and registers it with `router`.
    pub async fn probe(
        config: &BridgeConfig,
        link: Arc<dyn Link>,
        router: Arc<dyn Router>,
        drivers: Arc<DriverRegistry>,
    ) -> Result<Arc<Self>, BridgeError> {
        let registry = HandleRegistry::new(&config.name, drivers);
        let queue = LifecycleQueue::start(registry.clone(), config.lifecycle_queue_capacity)?;

        let bridge = Arc::new(Self {
            name: config.name.clone(),
            link,
            router,
            registry,
            queue,
            endpoint: ArcSwapOption::empty(),
        });

        let endpoint: Arc<dyn TransportEndpoint> = bridge.clone();
        match bridge.router.register_endpoint(endpoint, config.node_id) {
            Ok(endpoint_id) => {
                bridge.endpoint.store(Some(Arc::new(endpoint_id)));
                info!(
                    event = events::BRIDGE_PROBED,
                    component = COMPONENT,
                    bridge = %bridge.name,
                    endpoint = %endpoint_id,
                    node_id = ?config.node_id,
                    "bridge registered with router"
                );
                Ok(bridge)
            }
            Err(err) => {
                error!(
                    event = events::BRIDGE_REGISTER_FAILED,
                    component = COMPONENT,
                    bridge = %bridge.name,
                    err = %err,
                    "unable to register bridge with router"
                );
                bridge.queue.close();
                bridge.registry.destroy_all().await;
                bridge.queue.join().await;
                Err(BridgeError::Router(err))
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint_id(&self) -> Option<EndpointId> {
        self.endpoint.load().as_deref().copied()
    }

    pub fn is_attached(&self) -> bool {
        self.endpoint.load().is_some()
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    pub fn find_by_port(&self, port: u32) -> Option<Arc<ServiceHandle>> {
        self.registry.find_by_port(port)
    }

    /// Forwards one inbound link frame to the router. Never blocks.
    ///
    /// Frames the router rejects for a malformed header are dropped and
    /// reported as [`Delivery::Dropped`]; the link must not treat them as a
    /// transport fault. Every other router failure is returned.
    pub fn on_link_receive(&self, frame: &[u8]) -> Result<Delivery, BridgeError> {
        let Some(endpoint) = self.endpoint_id() else {
            debug!(
                event = events::LINK_RECEIVE_NOT_READY,
                component = COMPONENT,
                bridge = %self.name,
                len = %fields::format_frame_len(frame.len()),
                "bridge not attached, rejecting frame"
            );
            return Err(BridgeError::NotReady);
        };

        debug!(
            event = events::LINK_RECEIVE,
            component = COMPONENT,
            bridge = %self.name,
            len = %fields::format_frame_len(frame.len()),
            "received link frame"
        );

        let Err(err) = self.router.ingest(endpoint, Bytes::copy_from_slice(frame)) else {
            return Ok(Delivery::Forwarded);
        };

        match BridgeError::from(err) {
            BridgeError::MalformedPayload => {
                error!(
                    event = events::LINK_RECEIVE_MALFORMED,
                    component = COMPONENT,
                    bridge = %self.name,
                    len = %fields::format_frame_len(frame.len()),
                    "invalid ipc router packet, dropping"
                );
                Ok(Delivery::Dropped)
            }
            err => {
                warn!(
                    event = events::LINK_RECEIVE_FAILED,
                    component = COMPONENT,
                    bridge = %self.name,
                    err = %err,
                    "router refused link frame"
                );
                Err(err)
            }
        }
    }

    /// Requests a handle for a newly announced remote service.
    pub fn on_router_announce(
        &self,
        node: u32,
        port: u32,
        service: u16,
        instance: u16,
    ) -> Result<(), BridgeError> {
        self.queue.submit(LifecycleRequest::Create {
            node,
            port,
            service,
            instance,
        })
    }

    /// Requests removal of the handle for `port`.
    pub fn on_router_withdraw(&self, port: u32) -> Result<(), BridgeError> {
        self.queue.submit(LifecycleRequest::Destroy { port })
    }

    /// Transmits `frame` over the link. The frame is consumed either way.
    pub async fn send(&self, frame: OutboundFrame) -> Result<(), BridgeError> {
        let contiguous = frame.is_contiguous();
        let bytes = frame.linearize();

        debug!(
            event = events::LINK_SEND_ATTEMPT,
            component = COMPONENT,
            bridge = %self.name,
            len = %fields::format_frame_len(bytes.len()),
            linearized = !contiguous,
            "transmitting frame on link"
        );

        match self.link.transmit(bytes).await {
            Ok(()) => {
                debug!(
                    event = events::LINK_SEND_OK,
                    component = COMPONENT,
                    bridge = %self.name,
                    "frame transmitted"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    event = events::LINK_SEND_FAILED,
                    component = COMPONENT,
                    bridge = %self.name,
                    err = %err,
                    "link transmit failed, frame dropped"
                );
                Err(err.into())
            }
        }
    }

    /// Waits until every announce/withdraw accepted so far has been applied.
    pub async fn flush(&self) -> Result<(), BridgeError> {
        self.queue.flush().await
    }

    /// Tears the bridge down. Idempotent.
    ///
    /// Unregisters from the router, destroys every handle (running driver
    /// remove callbacks), discards lifecycle requests still queued and waits
    /// for the lifecycle worker to exit. Must not be called from a driver
    /// callback.
    pub async fn remove(&self) {
        let Some(endpoint) = self.endpoint.swap(None) else {
            return;
        };

        self.router.unregister_endpoint(*endpoint);
        self.queue.close();
        let destroyed = self.registry.destroy_all().await;
        self.queue.join().await;

        info!(
            event = events::BRIDGE_REMOVED,
            component = COMPONENT,
            bridge = %self.name,
            endpoint = %endpoint,
            destroyed,
            "bridge removed"
        );
    }
}

#[async_trait]
impl TransportEndpoint for QrtrBridge {
    async fn send(&self, frame: OutboundFrame) -> Result<(), BridgeError> {
        QrtrBridge::send(self, frame).await
    }

    fn on_router_announce(
        &self,
        node: u32,
        port: u32,
        service: u16,
        instance: u16,
    ) -> Result<(), BridgeError> {
        QrtrBridge::on_router_announce(self, node, port, service, instance)
    }

    fn on_router_withdraw(&self, port: u32) -> Result<(), BridgeError> {
        QrtrBridge::on_router_withdraw(self, port)
    }
}

impl Debug for QrtrBridge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrtrBridge")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint_id())
            .field("handles", &self.registry.len())
            .finish_non_exhaustive()
    }
}

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

//! # qrtr-bridge
//!
//! `qrtr-bridge` connects a point-to-point link to a service-addressed IPC
//! router. Each [`QrtrBridge`] forwards raw frames in both directions and keeps
//! a live directory of the remote services announced through it, as
//! [`ServiceHandle`]s that registered drivers are matched and bound against.
//!
//! Handle creation and destruction never run on the link's receive path: the
//! router's announce/withdraw calls are queued and applied, in order, by one
//! lifecycle worker per bridge.
//!
//! ```
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use qrtr_bridge::{
//!     BridgeConfig, DriverRegistration, DriverRegistry, EndpointId, Link, LinkError,
//!     ProbeError, QrtrBridge, QrtrDriver, Router, RouterError, ServiceHandle, ServiceId,
//!     TransportEndpoint,
//! };
//! use std::sync::Arc;
//!
//! struct NullLink;
//!
//! #[async_trait]
//! impl Link for NullLink {
//!     async fn transmit(&self, _frame: Bytes) -> Result<(), LinkError> {
//!         Ok(())
//!     }
//! }
//!
//! struct NullRouter;
//!
//! impl Router for NullRouter {
//!     fn register_endpoint(
//!         &self,
//!         _endpoint: Arc<dyn TransportEndpoint>,
//!         _node_id: Option<u32>,
//!     ) -> Result<EndpointId, RouterError> {
//!         Ok(EndpointId(1))
//!     }
//!
//!     fn unregister_endpoint(&self, _endpoint: EndpointId) {}
//!
//!     fn ingest(&self, _endpoint: EndpointId, _frame: Bytes) -> Result<(), RouterError> {
//!         Ok(())
//!     }
//! }
//!
//! struct Sensor;
//!
//! #[async_trait]
//! impl QrtrDriver for Sensor {
//!     async fn probe(&self, _handle: Arc<ServiceHandle>) -> Result<(), ProbeError> {
//!         Ok(())
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let drivers = Arc::new(DriverRegistry::new());
//! drivers
//!     .register(DriverRegistration::new(
//!         "sensor",
//!         vec![ServiceId::new(7, 3)],
//!         Arc::new(Sensor),
//!     ))
//!     .await;
//!
//! let bridge = QrtrBridge::probe(
//!     &BridgeConfig::named("doc-bridge"),
//!     Arc::new(NullLink),
//!     Arc::new(NullRouter),
//!     drivers,
//! )
//! .await
//! .unwrap();
//!
//! bridge.on_router_announce(3, 17, 7, 3).unwrap();
//! bridge.flush().await.unwrap();
//!
//! let handle = bridge.find_by_port(17).unwrap();
//! assert_eq!(handle.name(), "3-17");
//! assert_eq!(handle.modalias(), "qrtr:7:3");
//! assert_eq!(handle.bound_driver().as_deref(), Some("sensor"));
//!
//! bridge.remove().await;
//! assert!(handle.is_released());
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - Bridge facade: [`QrtrBridge`], the endpoint between link and router
//! - Control plane: service handles, the handle registry and the lifecycle queue
//! - Binding: matcher, driver registrations and probe/remove orchestration
//! - Data plane: link/router collaborator traits and outbound frames
//! - Runtime: lifecycle worker thread boundaries
//!
//! ## Observability model
//!
//! The crate uses `tracing` for logs/events.
//! Library code emits events/spans and does not initialize a global
//! subscriber. Binaries and tests are responsible for one-time
//! `tracing_subscriber` initialization at process boundaries.

mod binding;
mod bridge;
mod config;
mod control_plane;
mod data_plane;
mod error;
#[doc(hidden)]
pub mod observability;
mod runtime;

pub use binding::driver::{DriverId, DriverRegistration, QrtrDriver};
pub use binding::driver_registry::DriverRegistry;
pub use binding::lifecycle_binding::BindReport;
pub use binding::matcher::{matches, table_matches, ServiceId};
pub use bridge::{Delivery, QrtrBridge};
pub use config::{BridgeConfig, DEFAULT_LIFECYCLE_QUEUE_CAPACITY};
pub use control_plane::handle_registry::{CreatedHandle, HandleRegistry, Handles};
pub use control_plane::service_handle::{HandleId, ServiceHandle, MODULE_PREFIX};
pub use data_plane::frame::OutboundFrame;
pub use data_plane::link::Link;
pub use data_plane::router::{EndpointId, Router, TransportEndpoint};
pub use error::{BridgeError, LinkError, ProbeError, RouterError};

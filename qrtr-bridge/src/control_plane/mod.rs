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

//! Control-plane layer.
//!
//! Owns the directory of remote services: the [`service_handle::ServiceHandle`]
//! records, the per-bridge [`handle_registry::HandleRegistry`] that creates and
//! destroys them, and the lifecycle queue that moves those mutations off the
//! link's receive path while keeping them in submission order.

pub mod handle_registry;
pub(crate) mod lifecycle_queue;
pub mod service_handle;

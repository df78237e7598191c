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

//! Binding layer.
//!
//! Matches driver registrations against service handles and runs their
//! probe/remove callbacks. A handle is bound to at most one driver at a time,
//! the first registered driver whose id table accepts it and whose probe
//! succeeds.

pub mod driver;
pub mod driver_registry;
pub mod lifecycle_binding;
pub mod matcher;

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

//! Data-plane layer.
//!
//! Owns the collaborator seams a bridge moves frames across: the [`link::Link`]
//! below it and the [`router::Router`] above it, plus the outbound frame type
//! passed between them. Frames are opaque byte buffers here.

pub mod frame;
pub mod link;
pub mod router;

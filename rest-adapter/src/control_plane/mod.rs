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
//! Owns the adapter state machine and the reconciliation of running services against the
//! current model. Layers are rebuilt only as far as a model change requires:
//!
//! | Change                               | Rebuilt                               |
//! |--------------------------------------|---------------------------------------|
//! | `active == false`                    | everything, then stopped              |
//! | no endpoints                         | services and HTTP layer               |
//! | broker parameters or truststore      | broker session, HTTP layer, services  |
//! | per-service basic authentication     | HTTP layer, services                  |
//! | any other service or endpoint change | services                              |

pub mod adapter_lifecycle;
pub mod endpoint_initializer;
pub mod service_listener;
pub mod service_manager;
pub mod service_starter;

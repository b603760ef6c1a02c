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

//! Polling layer.
//!
//! Issues HTTP requests for endpoints and runs the steady-state poll loops of each service.
//! Every cycle result is checked against the owning session's liveness under the session lock
//! before it reaches a [`poll_handler::PollResultHandler`].

pub mod endpoint_poller;
pub mod poll_handler;
pub mod service_session;

pub use endpoint_poller::{
    EndpointPoller, EndpointPollerFactory, EndpointResponse, PollError, ReqwestEndpointPoller,
    ReqwestEndpointPollerFactory,
};
pub use poll_handler::{PollHandlerFactory, PollResultHandler, PublishingPollHandlerFactory};
pub use service_session::{ServiceSession, ServiceSessionError, ServiceSessionFactory};

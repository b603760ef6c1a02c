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

mod integration_test_utils;
pub use integration_test_utils::{eventually, init_logging};
mod integration_test_models;
pub use integration_test_models::{
    binary_endpoint, json_endpoint, model, service, BROKER_HOST, BROKER_PORT,
};
mod integration_test_listeners;
pub use integration_test_listeners::{RecordingServiceListener, ServiceNotification};
mod scripted_endpoint_poller;
pub use scripted_endpoint_poller::{json_response, FakePollerFactory, ScriptedEndpointPoller};
mod recording_broker;
pub use recording_broker::{
    AddedEndpoint, FakeBrokerSession, FakeBrokerSessionFactory, Publication,
    RecordingPublishingClient, RecordingTopicManagementClient, RecordingUpdateContext,
};

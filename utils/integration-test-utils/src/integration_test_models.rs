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

use rest_adapter::{BrokerConfig, EndpointConfig, Model, ServiceConfig};

pub const BROKER_HOST: &str = "broker.test";
pub const BROKER_PORT: u16 = 8080;

/// Active model with the test broker and the given services.
pub fn model(services: Vec<ServiceConfig>) -> Model {
    Model {
        active: true,
        broker: BrokerConfig::new(BROKER_HOST, BROKER_PORT),
        services,
        truststore: None,
        metrics: Default::default(),
    }
}

/// Plain HTTP service named `name`, publishing under `rest/<name>`.
pub fn service(name: &str, poll_period_ms: u64, endpoints: Vec<EndpointConfig>) -> ServiceConfig {
    endpoints.into_iter().fold(
        ServiceConfig::new(name, format!("{name}.test"), 80, format!("rest/{name}"))
            .with_poll_period_ms(poll_period_ms),
        ServiceConfig::with_endpoint,
    )
}

pub fn json_endpoint(name: &str) -> EndpointConfig {
    EndpointConfig::new(name, format!("/{name}"), name, "json")
}

pub fn binary_endpoint(name: &str) -> EndpointConfig {
    EndpointConfig::new(name, format!("/{name}"), name, "binary")
}

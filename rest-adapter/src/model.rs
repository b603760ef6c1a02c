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

//! Declarative adapter configuration.
//!
//! A [`Model`] is an immutable snapshot. Reconfiguration replaces the whole snapshot and
//! the lifecycle diffs old against new with structural equality.

use serde::{Deserialize, Serialize};

/// Value of [`EndpointConfig::produces`] that asks for the payload kind to be inferred
/// from the first response.
pub const PRODUCES_AUTO: &str = "auto";

const DEFAULT_BROKER_PORT: u16 = 8080;
const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_RECONNECTION_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_MAXIMUM_MESSAGE_SIZE: u32 = 32 * 1024 * 1024;
const DEFAULT_BUFFER_SIZE: u32 = 1024 * 1024;
const DEFAULT_RECOVERY_BUFFER_SIZE: u32 = 256;
const DEFAULT_SERVICE_PORT: u16 = 443;
const DEFAULT_POLL_PERIOD_MS: u64 = 60_000;
const DEFAULT_METRICS_LOGGING_INTERVAL_MS: u64 = 60_000;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Model {
    #[serde(default)]
    pub active: bool,
    pub broker: BrokerConfig,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    /// Path to a PEM truststore used for both broker and HTTPS connections.
    #[serde(default)]
    pub truststore: Option<String>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Model {
    /// True when no endpoint is configured across all services.
    pub fn has_nothing_to_poll(&self) -> bool {
        self.services
            .iter()
            .map(|service| service.endpoints.len())
            .sum::<usize>()
            == 0
    }

    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|service| service.name == name)
    }
}

/// Connection parameters for the messaging broker.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    pub host: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub principal: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_reconnection_timeout_ms")]
    pub reconnection_timeout_ms: u64,
    #[serde(default = "default_maximum_message_size")]
    pub maximum_message_size: u32,
    #[serde(default = "default_buffer_size")]
    pub input_buffer_size: u32,
    #[serde(default = "default_buffer_size")]
    pub output_buffer_size: u32,
    #[serde(default = "default_recovery_buffer_size")]
    pub recovery_buffer_size: u32,
}

impl BrokerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            secure: false,
            principal: None,
            password: None,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            reconnection_timeout_ms: DEFAULT_RECONNECTION_TIMEOUT_MS,
            maximum_message_size: DEFAULT_MAXIMUM_MESSAGE_SIZE,
            input_buffer_size: DEFAULT_BUFFER_SIZE,
            output_buffer_size: DEFAULT_BUFFER_SIZE,
            recovery_buffer_size: DEFAULT_RECOVERY_BUFFER_SIZE,
        }
    }
}

/// One REST service: a host, a poll period and the endpoints published under
/// `topic_path_root`. `name` is the identity used when diffing models.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_service_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub secure: bool,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,
    pub topic_path_root: String,
    #[serde(default)]
    pub security: SecurityConfig,
}

impl ServiceConfig {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        topic_path_root: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            secure: false,
            endpoints: Vec::new(),
            poll_period_ms: DEFAULT_POLL_PERIOD_MS,
            topic_path_root: topic_path_root.into(),
            security: SecurityConfig::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: EndpointConfig) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn with_poll_period_ms(mut self, poll_period_ms: u64) -> Self {
        self.poll_period_ms = poll_period_ms;
        self
    }

    /// Full path of the topic an endpoint of this service publishes to.
    pub fn topic_path(&self, endpoint: &EndpointConfig) -> String {
        format!(
            "{}/{}",
            self.topic_path_root.trim_end_matches('/'),
            endpoint.topic_path.trim_start_matches('/')
        )
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    #[serde(default)]
    pub basic: Option<BasicAuthenticationConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BasicAuthenticationConfig {
    pub userid: String,
    pub password: String,
}

/// One URL under a service mapped to one topic.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub name: String,
    pub url: String,
    pub topic_path: String,
    /// `json`, `binary`, `string`/`text/plain`, a supported media type or [`PRODUCES_AUTO`].
    #[serde(default = "default_produces")]
    pub produces: String,
}

impl EndpointConfig {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        topic_path: impl Into<String>,
        produces: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            topic_path: topic_path.into(),
            produces: produces.into(),
        }
    }

    pub fn is_auto(&self) -> bool {
        self.produces == PRODUCES_AUTO
    }

    /// Copy of this endpoint with `produces` pinned to a concrete identifier.
    pub fn with_produces(&self, produces: &str) -> Self {
        Self {
            produces: produces.to_string(),
            ..self.clone()
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default)]
    pub logging: bool,
    #[serde(default = "default_metrics_logging_interval_ms")]
    pub logging_interval_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            logging: false,
            logging_interval_ms: DEFAULT_METRICS_LOGGING_INTERVAL_MS,
        }
    }
}

fn default_broker_port() -> u16 {
    DEFAULT_BROKER_PORT
}

fn default_connection_timeout_ms() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_MS
}

fn default_reconnection_timeout_ms() -> u64 {
    DEFAULT_RECONNECTION_TIMEOUT_MS
}

fn default_maximum_message_size() -> u32 {
    DEFAULT_MAXIMUM_MESSAGE_SIZE
}

fn default_buffer_size() -> u32 {
    DEFAULT_BUFFER_SIZE
}

fn default_recovery_buffer_size() -> u32 {
    DEFAULT_RECOVERY_BUFFER_SIZE
}

fn default_service_port() -> u16 {
    DEFAULT_SERVICE_PORT
}

fn default_true() -> bool {
    true
}

fn default_poll_period_ms() -> u64 {
    DEFAULT_POLL_PERIOD_MS
}

fn default_produces() -> String {
    PRODUCES_AUTO.to_string()
}

fn default_metrics_logging_interval_ms() -> u64 {
    DEFAULT_METRICS_LOGGING_INTERVAL_MS
}

#[cfg(test)]
mod tests {
    use super::{BrokerConfig, EndpointConfig, Model, ServiceConfig, PRODUCES_AUTO};

    fn model_with(services: Vec<ServiceConfig>) -> Model {
        Model {
            active: true,
            broker: BrokerConfig::new("localhost", 8080),
            services,
            truststore: None,
            metrics: Default::default(),
        }
    }

    #[test]
    fn nothing_to_poll_without_services_or_endpoints() {
        assert!(model_with(vec![]).has_nothing_to_poll());
        assert!(
            model_with(vec![ServiceConfig::new("svc", "localhost", 80, "root")])
                .has_nothing_to_poll()
        );

        let service = ServiceConfig::new("svc", "localhost", 80, "root")
            .with_endpoint(EndpointConfig::new("ep", "/a", "a", "json"));
        assert!(!model_with(vec![service]).has_nothing_to_poll());
    }

    #[test]
    fn topic_path_joins_root_and_endpoint_without_duplicate_separators() {
        let service = ServiceConfig::new("svc", "localhost", 80, "root/");
        let endpoint = EndpointConfig::new("ep", "/a", "/child", "json");

        assert_eq!(service.topic_path(&endpoint), "root/child");
    }

    #[test]
    fn endpoint_produces_defaults_to_auto_when_deserialized() {
        let endpoint: EndpointConfig =
            serde_json::from_str(r#"{"name":"ep","url":"/a","topic_path":"a"}"#)
                .expect("endpoint should deserialize");

        assert_eq!(endpoint.produces, PRODUCES_AUTO);
        assert!(endpoint.is_auto());
        assert_eq!(endpoint.with_produces("json").produces, "json");
    }

    #[test]
    fn service_defaults_follow_https_conventions() {
        let service: ServiceConfig = serde_json::from_str(
            r#"{"name":"svc","host":"example.org","topic_path_root":"root"}"#,
        )
        .expect("service should deserialize");

        assert_eq!(service.port, 443);
        assert!(service.secure);
        assert_eq!(service.poll_period_ms, 60_000);
        assert!(service.security.basic.is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<EndpointConfig, _> = serde_json::from_str(
            r#"{"name":"ep","url":"/a","topic_path":"a","unexpected":true}"#,
        );

        assert!(result.is_err());
    }
}

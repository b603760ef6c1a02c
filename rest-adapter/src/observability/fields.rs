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

//! Canonical structured field keys and value-format helpers.

use crate::model::{BrokerConfig, EndpointConfig, ServiceConfig};

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const SESSION_ID: &str = "session_id";
pub const SERVICE: &str = "service";
pub const ENDPOINT: &str = "endpoint";
pub const URL: &str = "url";
pub const TOPIC_PATH: &str = "topic_path";
pub const ENDPOINT_TYPE: &str = "endpoint_type";
pub const BROKER: &str = "broker";
pub const GENERATION: &str = "generation";
pub const FROM_STATE: &str = "from_state";
pub const TO_STATE: &str = "to_state";
pub const POLL_PERIOD_MS: &str = "poll_period_ms";

pub const REASON: &str = "reason";
pub const ERR: &str = "err";

pub const NONE: &str = "none";
pub const REASON_SESSION_STOPPED: &str = "session_stopped";
pub const REASON_ENDPOINT_REPLACED: &str = "endpoint_replaced";
pub const REASON_SERVICE_REMOVED: &str = "service_removed";
pub const REASON_STALE_GENERATION: &str = "stale_generation";
pub const REASON_NOT_CONNECTING: &str = "not_connecting";
pub const REASON_STOPPED: &str = "stopped";

/// Broker address as `host:port`, with the scheme implied by the secure flag.
pub fn format_broker(broker: &BrokerConfig) -> String {
    let scheme = if broker.secure { "wss" } else { "ws" };
    format!("{scheme}://{}:{}", broker.host, broker.port)
}

/// Endpoint location as `service/endpoint`, used for log correlation.
pub fn format_endpoint(service: &ServiceConfig, endpoint: &EndpointConfig) -> String {
    format!("{}/{}", service.name, endpoint.name)
}

pub fn format_optional(value: Option<&str>) -> String {
    value.unwrap_or(NONE).to_string()
}

#[cfg(test)]
mod tests {
    use super::{format_broker, format_endpoint, format_optional, NONE};
    use crate::model::{BrokerConfig, EndpointConfig, ServiceConfig};

    #[test]
    fn format_broker_reflects_secure_flag() {
        let mut broker = BrokerConfig::new("broker.local", 8080);
        assert_eq!(format_broker(&broker), "ws://broker.local:8080");

        broker.secure = true;
        assert_eq!(format_broker(&broker), "wss://broker.local:8080");
    }

    #[test]
    fn format_endpoint_joins_service_and_endpoint_names() {
        let service = ServiceConfig::new("weather", "localhost", 80, "rest/weather");
        let endpoint = EndpointConfig::new("forecast", "/forecast", "forecast", "json");

        assert_eq!(format_endpoint(&service, &endpoint), "weather/forecast");
    }

    #[test]
    fn format_optional_returns_none_when_absent() {
        assert_eq!(format_optional(None), NONE);
        assert_eq!(format_optional(Some("text/plain")), "text/plain");
    }
}

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

use rest_adapter::Model;
use std::fs;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("unable to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Reads the adapter model from a json5 file.
pub(crate) fn load_model(path: &str) -> Result<Model, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    parse_model(path, &contents)
}

pub(crate) fn parse_model(path: &str, contents: &str) -> Result<Model, ConfigError> {
    json5::from_str(contents).map_err(|err| ConfigError::Parse {
        path: path.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{load_model, parse_model, ConfigError};

    const SAMPLE: &str = r#"{
        // Comments and trailing commas are accepted.
        active: true,
        broker: { host: "localhost", port: 8080 },
        services: [
            {
                name: "weather",
                host: "api.example.org",
                poll_period_ms: 30000,
                topic_path_root: "rest/weather",
                endpoints: [
                    { name: "current", url: "/current", topic_path: "current", produces: "json" },
                ],
            },
        ],
        metrics: { logging: true, logging_interval_ms: 5000 },
    }"#;

    #[test]
    fn json5_model_is_parsed_with_defaults() {
        let model = parse_model("sample.json5", SAMPLE).expect("sample should parse");

        assert!(model.active);
        assert_eq!(model.broker.connection_timeout_ms, 10_000);
        assert_eq!(model.services.len(), 1);
        assert_eq!(model.services[0].port, 443);
        assert!(model.services[0].secure);
        assert_eq!(model.services[0].endpoints[0].produces, "json");
        assert!(model.metrics.logging);
    }

    #[test]
    fn unknown_field_is_a_parse_error() {
        let result = parse_model(
            "broken.json5",
            r#"{ broker: { host: "localhost" }, surprise: 1 }"#,
        );

        assert!(matches!(result, Err(ConfigError::Parse { path, .. }) if path == "broken.json5"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = load_model("/definitely/not/a/config.json5");

        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}

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

//! One-shot HTTP requests against configured endpoints.

use crate::model::{EndpointConfig, Model, ServiceConfig};
use crate::tls::TlsContext;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("rest-adapter/", env!("CARGO_PKG_VERSION"));
const CONTENT_TYPE: &str = "content-type";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("unexpected status code {0}")]
    Status(u16),
    #[error("unable to read response body: {0}")]
    Body(String),
    #[error("unable to parse response: {0}")]
    Parse(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("HTTP client is not available: {0}")]
    ClientUnavailable(String),
}

/// Status, headers and body of a successful endpoint request.
///
/// Header names are stored lowercased so lookups are case-insensitive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl EndpointResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Issues a single request for an endpoint of a service.
#[async_trait]
pub trait EndpointPoller: Send + Sync {
    async fn request(
        &self,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
    ) -> Result<EndpointResponse, PollError>;
}

/// Builds the HTTP layer for a model generation.
pub trait EndpointPollerFactory: Send + Sync {
    fn create(
        &self,
        model: &Model,
        tls: Option<&TlsContext>,
    ) -> Result<Arc<dyn EndpointPoller>, PollError>;
}

/// [`EndpointPoller`] backed by a shared `reqwest` client.
#[derive(Clone, Debug)]
pub struct ReqwestEndpointPoller {
    client: reqwest::Client,
}

impl ReqwestEndpointPoller {
    pub fn new(tls: Option<&TlsContext>, timeout: Option<Duration>) -> Result<Self, PollError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(tls) = tls {
            for certificate in tls.certificates() {
                builder = builder.add_root_certificate(certificate.clone());
            }
        }

        let client = builder
            .build()
            .map_err(|err| PollError::ClientUnavailable(err.to_string()))?;
        Ok(Self { client })
    }

    /// Absolute URL of an endpoint: the service origin followed by the endpoint path.
    pub fn request_url(service: &ServiceConfig, endpoint: &EndpointConfig) -> String {
        let scheme = if service.secure { "https" } else { "http" };
        let path = if endpoint.url.starts_with('/') {
            endpoint.url.clone()
        } else {
            format!("/{}", endpoint.url)
        };
        format!("{scheme}://{}:{}{path}", service.host, service.port)
    }
}

#[async_trait]
impl EndpointPoller for ReqwestEndpointPoller {
    async fn request(
        &self,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
    ) -> Result<EndpointResponse, PollError> {
        let mut request = self.client.get(Self::request_url(service, endpoint));
        if let Some(basic) = service.security.basic.as_ref() {
            request = request.basic_auth(&basic.userid, Some(&basic.password));
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                PollError::Timeout(err.to_string())
            } else {
                PollError::Transport(err.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|err| PollError::Body(err.to_string()))?;

        Ok(EndpointResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// Creates one [`ReqwestEndpointPoller`] per HTTP layer, trusting the model's truststore.
#[derive(Clone, Debug, Default)]
pub struct ReqwestEndpointPollerFactory {
    timeout: Option<Duration>,
}

impl ReqwestEndpointPollerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

impl EndpointPollerFactory for ReqwestEndpointPollerFactory {
    fn create(
        &self,
        _model: &Model,
        tls: Option<&TlsContext>,
    ) -> Result<Arc<dyn EndpointPoller>, PollError> {
        let poller = ReqwestEndpointPoller::new(tls, self.timeout)?;
        Ok(Arc::new(poller))
    }
}

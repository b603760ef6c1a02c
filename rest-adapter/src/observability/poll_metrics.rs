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

//! Poll event hooks for metrics collection.

use crate::model::{EndpointConfig, ServiceConfig};
use crate::observability::events;
use crate::polling::endpoint_poller::{EndpointResponse, PollError};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

const COMPONENT: &str = "poll_metrics";

/// Notified for every poll request issued by a service session and for its outcome.
///
/// Implementations are called from polling tasks and must not block.
pub trait PollListener: Send + Sync {
    fn on_poll_request(&self, service: &ServiceConfig, endpoint: &EndpointConfig);

    fn on_poll_response(
        &self,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
        response: &EndpointResponse,
    );

    fn on_poll_failure(&self, service: &ServiceConfig, endpoint: &EndpointConfig, error: &PollError);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPollListener;

impl PollListener for NoopPollListener {
    fn on_poll_request(&self, _service: &ServiceConfig, _endpoint: &EndpointConfig) {}

    fn on_poll_response(
        &self,
        _service: &ServiceConfig,
        _endpoint: &EndpointConfig,
        _response: &EndpointResponse,
    ) {
    }

    fn on_poll_failure(
        &self,
        _service: &ServiceConfig,
        _endpoint: &EndpointConfig,
        _error: &PollError,
    ) {
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PollMetricsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub response_bytes: u64,
}

/// Keeps running totals of poll events across all services.
#[derive(Debug, Default)]
pub struct CountingPollListener {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    response_bytes: AtomicU64,
}

impl CountingPollListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PollMetricsSnapshot {
        PollMetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            response_bytes: self.response_bytes.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let snapshot = self.snapshot();
        info!(
            event = events::POLL_METRICS_SUMMARY,
            component = COMPONENT,
            requests = snapshot.requests,
            successes = snapshot.successes,
            failures = snapshot.failures,
            response_bytes = snapshot.response_bytes,
            "poll metrics"
        );
    }
}

impl PollListener for CountingPollListener {
    fn on_poll_request(&self, _service: &ServiceConfig, _endpoint: &EndpointConfig) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn on_poll_response(
        &self,
        _service: &ServiceConfig,
        _endpoint: &EndpointConfig,
        response: &EndpointResponse,
    ) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.response_bytes
            .fetch_add(response.body().len() as u64, Ordering::Relaxed);
    }

    fn on_poll_failure(
        &self,
        _service: &ServiceConfig,
        _endpoint: &EndpointConfig,
        _error: &PollError,
    ) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}

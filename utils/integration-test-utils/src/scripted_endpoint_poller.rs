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

use async_trait::async_trait;
use rest_adapter::{
    EndpointConfig, EndpointPoller, EndpointPollerFactory, EndpointResponse, Model, PollError,
    ServiceConfig, TlsContext,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

type PollResult = Result<EndpointResponse, PollError>;

/// 200 response with an `application/json` content type.
pub fn json_response(body: serde_json::Value) -> EndpointResponse {
    EndpointResponse::new(200, body.to_string()).with_header("content-type", "application/json")
}

#[derive(Default)]
struct EndpointScript {
    queued: VecDeque<PollResult>,
    repeated: Option<PollResult>,
    delay: Duration,
    started: Vec<Instant>,
    completed: Vec<Instant>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Endpoint poller answering from per-endpoint scripts.
///
/// Scripts are keyed by endpoint name. Queued results are used first, then the repeated one.
/// An endpoint without any script fails with a transport error.
#[derive(Default)]
pub struct ScriptedEndpointPoller {
    scripts: Mutex<HashMap<String, EndpointScript>>,
}

impl ScriptedEndpointPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every request of `endpoint` with `result` once the queue is empty.
    pub fn respond(&self, endpoint: &str, result: PollResult) -> &Self {
        self.with_script(endpoint, |script| script.repeated = Some(result));
        self
    }

    pub fn respond_once(&self, endpoint: &str, result: PollResult) -> &Self {
        self.with_script(endpoint, |script| script.queued.push_back(result));
        self
    }

    /// Makes every request of `endpoint` take `delay` on the tokio clock.
    pub fn delay(&self, endpoint: &str, delay: Duration) -> &Self {
        self.with_script(endpoint, |script| script.delay = delay);
        self
    }

    pub fn requests(&self, endpoint: &str) -> usize {
        self.scripts()
            .get(endpoint)
            .map_or(0, |script| script.started.len())
    }

    /// Start instants of every request of `endpoint`.
    pub fn request_times(&self, endpoint: &str) -> Vec<Instant> {
        self.scripts()
            .get(endpoint)
            .map(|script| script.started.clone())
            .unwrap_or_default()
    }

    /// Completion instants of requests of `endpoint` that were not cancelled.
    pub fn completion_times(&self, endpoint: &str) -> Vec<Instant> {
        self.scripts()
            .get(endpoint)
            .map(|script| script.completed.clone())
            .unwrap_or_default()
    }

    pub fn in_flight(&self, endpoint: &str) -> usize {
        self.scripts()
            .get(endpoint)
            .map_or(0, |script| script.in_flight)
    }

    /// Highest number of simultaneously outstanding requests seen for `endpoint`.
    pub fn max_in_flight(&self, endpoint: &str) -> usize {
        self.scripts()
            .get(endpoint)
            .map_or(0, |script| script.max_in_flight)
    }

    fn with_script(&self, endpoint: &str, update: impl FnOnce(&mut EndpointScript)) {
        update(self.scripts().entry(endpoint.to_string()).or_default());
    }

    fn scripts(&self) -> MutexGuard<'_, HashMap<String, EndpointScript>> {
        self.scripts.lock().expect("poller scripts lock poisoned")
    }
}

/// Decrements the in-flight count even when the request future is dropped mid-way.
struct InFlight<'a> {
    poller: &'a ScriptedEndpointPoller,
    endpoint: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(script) = self.poller.scripts().get_mut(&self.endpoint) {
            script.in_flight -= 1;
        }
    }
}

#[async_trait]
impl EndpointPoller for ScriptedEndpointPoller {
    async fn request(
        &self,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
    ) -> Result<EndpointResponse, PollError> {
        let (delay, result) = {
            let mut scripts = self.scripts();
            let script = scripts.entry(endpoint.name.clone()).or_default();
            script.started.push(Instant::now());
            script.in_flight += 1;
            script.max_in_flight = script.max_in_flight.max(script.in_flight);

            let result = script
                .queued
                .pop_front()
                .or_else(|| script.repeated.clone())
                .unwrap_or_else(|| {
                    Err(PollError::Transport(format!(
                        "no scripted response for {}",
                        endpoint.name
                    )))
                });
            (script.delay, result)
        };
        let _in_flight = InFlight {
            poller: self,
            endpoint: endpoint.name.clone(),
        };

        debug!(
            service = service.name.as_str(),
            endpoint = endpoint.name.as_str(),
            delay_ms = delay.as_millis() as u64,
            "scripted request"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(script) = self.scripts().get_mut(&endpoint.name) {
            script.completed.push(Instant::now());
        }
        result
    }
}

/// Poller factory handing out one shared [`ScriptedEndpointPoller`].
pub struct FakePollerFactory {
    poller: Arc<ScriptedEndpointPoller>,
    fail: AtomicBool,
    created: AtomicUsize,
}

impl FakePollerFactory {
    pub fn new(poller: Arc<ScriptedEndpointPoller>) -> Self {
        Self {
            poller,
            fail: AtomicBool::new(false),
            created: AtomicUsize::new(0),
        }
    }

    pub fn poller(&self) -> &Arc<ScriptedEndpointPoller> {
        &self.poller
    }

    /// Makes subsequent HTTP layer builds fail.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of HTTP layers built.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl EndpointPollerFactory for FakePollerFactory {
    fn create(
        &self,
        _model: &Model,
        _tls: Option<&TlsContext>,
    ) -> Result<Arc<dyn EndpointPoller>, PollError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PollError::ClientUnavailable(
                "scripted HTTP layer failure".to_string(),
            ));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.poller.clone())
    }
}

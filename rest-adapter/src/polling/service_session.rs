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

//! Steady-state polling of the endpoints of one service.

use crate::content_type::ContentTypeError;
use crate::model::{EndpointConfig, ServiceConfig};
use crate::observability::{events, fields, PollListener};
use crate::polling::endpoint_poller::{EndpointPoller, PollError};
use crate::polling::poll_handler::{PollHandlerFactory, PollResultHandler};
use crate::publication::PublishingError;
use crate::runtime::{ScheduledTask, Scheduler};
use futures::future::{abortable, AbortHandle, Aborted};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

const COMPONENT: &str = "service_session";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceSessionError {
    #[error("service {service} has an invalid poll period of {poll_period_ms} ms")]
    InvalidPollPeriod { service: String, poll_period_ms: u64 },
    #[error(transparent)]
    ContentType(#[from] ContentTypeError),
    #[error(transparent)]
    Publishing(#[from] PublishingError),
}

/// Recurring task plus the request of the cycle currently in flight, if any.
struct PollHandle {
    task: ScheduledTask,
    in_flight: Option<AbortHandle>,
}

impl PollHandle {
    fn cancel(&self) {
        self.task.cancel();
        if let Some(in_flight) = self.in_flight.as_ref() {
            in_flight.abort();
        }
    }
}

struct EndpointSlot {
    config: EndpointConfig,
    /// Distinguishes this registration from an earlier one with the same name.
    epoch: u64,
    handler: Arc<dyn PollResultHandler>,
    handle: Option<PollHandle>,
}

#[derive(Default)]
struct SessionState {
    running: bool,
    /// Set by `stop`. A stopped session never runs again.
    stopped: bool,
    next_epoch: u64,
    endpoints: HashMap<String, EndpointSlot>,
}

struct SessionShared {
    session_id: String,
    service: ServiceConfig,
    poll_period: Duration,
    poller: Arc<dyn EndpointPoller>,
    handler_factory: Arc<dyn PollHandlerFactory>,
    poll_listener: Arc<dyn PollListener>,
    scheduler: Scheduler,
    state: Mutex<SessionState>,
}

/// Runs the recurring poll loop of every endpoint added to one service.
///
/// Endpoints added before [`ServiceSession::start`] stay dormant until the session starts.
/// Each endpoint has at most one recurring task and at most one request in flight.
/// [`ServiceSession::stop`] is final: later starts and additions are ignored.
#[derive(Clone)]
pub struct ServiceSession {
    shared: Arc<SessionShared>,
}

impl ServiceSession {
    pub fn new(
        service: ServiceConfig,
        poller: Arc<dyn EndpointPoller>,
        handler_factory: Arc<dyn PollHandlerFactory>,
        poll_listener: Arc<dyn PollListener>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                session_id: Uuid::new_v4().hyphenated().to_string(),
                poll_period: Duration::from_millis(service.poll_period_ms),
                service,
                poller,
                handler_factory,
                poll_listener,
                scheduler,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn service(&self) -> &ServiceConfig {
        &self.shared.service
    }

    /// Marks the session running and starts every dormant endpoint, first cycle immediately.
    ///
    /// Returns `false` without doing anything once the session has been stopped.
    pub async fn start(&self) -> bool {
        let mut state = self.shared.state.lock().await;
        if state.stopped {
            self.log_ignored("start");
            return false;
        }
        state.running = true;

        info!(
            event = events::SESSION_START,
            component = COMPONENT,
            session_id = self.shared.session_id.as_str(),
            service = self.shared.service.name.as_str(),
            endpoints = state.endpoints.len(),
            "starting service session"
        );

        for slot in state.endpoints.values_mut() {
            if slot.handle.is_none() {
                slot.handle = Some(self.schedule(slot));
            }
        }
        true
    }

    /// Tracks an endpoint. A no-op when an endpoint with the same name is already tracked
    /// or the session has been stopped.
    pub async fn add_endpoint(&self, endpoint: EndpointConfig) -> Result<(), ServiceSessionError> {
        let mut state = self.shared.state.lock().await;
        if state.stopped {
            self.log_ignored("add_endpoint");
            return Ok(());
        }
        if let Some(tracked) = state.endpoints.get(&endpoint.name) {
            if tracked.config == endpoint {
                debug!(
                    event = events::SESSION_ENDPOINT_DUPLICATE,
                    component = COMPONENT,
                    session_id = self.shared.session_id.as_str(),
                    service = self.shared.service.name.as_str(),
                    endpoint = endpoint.name.as_str(),
                    "endpoint already tracked"
                );
            } else {
                warn!(
                    event = events::SESSION_ENDPOINT_CONFLICT,
                    component = COMPONENT,
                    session_id = self.shared.session_id.as_str(),
                    service = self.shared.service.name.as_str(),
                    endpoint = endpoint.name.as_str(),
                    tracked_url = tracked.config.url.as_str(),
                    tracked_produces = tracked.config.produces.as_str(),
                    url = endpoint.url.as_str(),
                    produces = endpoint.produces.as_str(),
                    "endpoint with the same name already tracked, new configuration ignored"
                );
            }
            return Ok(());
        }

        let handler = self
            .shared
            .handler_factory
            .create(&self.shared.service, &endpoint)?;
        let epoch = state.next_epoch;
        state.next_epoch += 1;

        let mut slot = EndpointSlot {
            config: endpoint,
            epoch,
            handler,
            handle: None,
        };
        if state.running {
            slot.handle = Some(self.schedule(&slot));
        }

        info!(
            event = events::SESSION_ENDPOINT_ADD,
            component = COMPONENT,
            session_id = self.shared.session_id.as_str(),
            service = self.shared.service.name.as_str(),
            endpoint = slot.config.name.as_str(),
            running = state.running,
            "endpoint added to service session"
        );
        state.endpoints.insert(slot.config.name.clone(), slot);
        Ok(())
    }

    /// Cancels every recurring task and in-flight request and forgets all endpoints.
    ///
    /// Returns without waiting for cancelled requests. Their results are discarded.
    pub async fn stop(&self) {
        let mut state = self.shared.state.lock().await;
        let was_running = state.running;
        state.running = false;
        state.stopped = true;

        for slot in state.endpoints.values() {
            if let Some(handle) = slot.handle.as_ref() {
                handle.cancel();
            }
        }
        let stopped = state.endpoints.len();
        state.endpoints.clear();

        if was_running || stopped > 0 {
            info!(
                event = events::SESSION_STOP,
                component = COMPONENT,
                session_id = self.shared.session_id.as_str(),
                service = self.shared.service.name.as_str(),
                endpoints = stopped,
                "stopped service session"
            );
        }
    }

    pub async fn is_running(&self) -> bool {
        self.shared.state.lock().await.running
    }

    pub async fn is_stopped(&self) -> bool {
        self.shared.state.lock().await.stopped
    }

    /// Names of the tracked endpoints, sorted.
    pub async fn endpoints(&self) -> Vec<String> {
        let state = self.shared.state.lock().await;
        let mut names: Vec<String> = state.endpoints.keys().cloned().collect();
        names.sort();
        names
    }

    fn log_ignored(&self, operation: &'static str) {
        debug!(
            event = events::SESSION_IGNORED,
            component = COMPONENT,
            session_id = self.shared.session_id.as_str(),
            service = self.shared.service.name.as_str(),
            operation,
            reason = fields::REASON_SESSION_STOPPED,
            "service session already stopped"
        );
    }

    fn schedule(&self, slot: &EndpointSlot) -> PollHandle {
        debug!(
            event = events::SESSION_ENDPOINT_SCHEDULE,
            component = COMPONENT,
            session_id = self.shared.session_id.as_str(),
            service = self.shared.service.name.as_str(),
            endpoint = slot.config.name.as_str(),
            poll_period_ms = self.shared.service.poll_period_ms,
            "scheduling endpoint polling"
        );

        let session = Arc::downgrade(&self.shared);
        let endpoint_name = slot.config.name.clone();
        let epoch = slot.epoch;

        let task = self.shared.scheduler.schedule_with_fixed_delay(
            Duration::ZERO,
            self.shared.poll_period,
            move || {
                let session: Weak<SessionShared> = session.clone();
                let endpoint_name = endpoint_name.clone();
                async move {
                    if let Some(session) = session.upgrade() {
                        session.poll_once(&endpoint_name, epoch).await;
                    }
                }
            },
        );

        PollHandle {
            task,
            in_flight: None,
        }
    }
}

impl SessionShared {
    async fn poll_once(&self, endpoint_name: &str, epoch: u64) {
        let (request, endpoint) = {
            let mut state = self.state.lock().await;
            if !state.running {
                return;
            }
            let Some(slot) = state
                .endpoints
                .get_mut(endpoint_name)
                .filter(|slot| slot.epoch == epoch)
            else {
                return;
            };
            let Some(handle) = slot.handle.as_mut() else {
                return;
            };

            let poller = self.poller.clone();
            let service = self.service.clone();
            let endpoint = slot.config.clone();
            let request_endpoint = endpoint.clone();
            let (request, abort_handle) =
                abortable(async move { poller.request(&service, &request_endpoint).await });
            handle.in_flight = Some(abort_handle);
            (request, endpoint)
        };

        debug!(
            event = events::POLL_REQUEST_START,
            component = COMPONENT,
            session_id = self.session_id.as_str(),
            service = self.service.name.as_str(),
            endpoint = endpoint.name.as_str(),
            url = endpoint.url.as_str(),
            "polling endpoint"
        );
        self.poll_listener.on_poll_request(&self.service, &endpoint);

        let result = match request.await {
            Ok(result) => result,
            Err(Aborted) => Err(PollError::Cancelled),
        };

        match result.as_ref() {
            Ok(response) => {
                debug!(
                    event = events::POLL_REQUEST_OK,
                    component = COMPONENT,
                    session_id = self.session_id.as_str(),
                    service = self.service.name.as_str(),
                    endpoint = endpoint.name.as_str(),
                    status = response.status(),
                    "poll request complete"
                );
                self.poll_listener
                    .on_poll_response(&self.service, &endpoint, response);
            }
            Err(err) => {
                warn!(
                    event = events::POLL_REQUEST_FAILED,
                    component = COMPONENT,
                    session_id = self.session_id.as_str(),
                    service = self.service.name.as_str(),
                    endpoint = endpoint.name.as_str(),
                    err = %err,
                    "poll request failed"
                );
                self.poll_listener
                    .on_poll_failure(&self.service, &endpoint, err);
            }
        }

        let mut state = self.state.lock().await;
        let running = state.running;
        match state
            .endpoints
            .get_mut(endpoint_name)
            .filter(|slot| slot.epoch == epoch)
        {
            Some(slot) if running => {
                if let Some(handle) = slot.handle.as_mut() {
                    handle.in_flight = None;
                }
                slot.handler.handle(result);
            }
            Some(_) | None => {
                let reason = if running {
                    fields::REASON_ENDPOINT_REPLACED
                } else {
                    fields::REASON_SESSION_STOPPED
                };
                debug!(
                    event = events::POLL_RESULT_DISCARDED,
                    component = COMPONENT,
                    session_id = self.session_id.as_str(),
                    service = self.service.name.as_str(),
                    endpoint = endpoint.name.as_str(),
                    reason,
                    "discarding poll result"
                );
            }
        }
    }
}

/// Builds the [`ServiceSession`] of each service for one HTTP layer.
#[derive(Clone)]
pub struct ServiceSessionFactory {
    poller: Arc<dyn EndpointPoller>,
    handler_factory: Arc<dyn PollHandlerFactory>,
    poll_listener: Arc<dyn PollListener>,
    scheduler: Scheduler,
}

impl ServiceSessionFactory {
    pub fn new(
        poller: Arc<dyn EndpointPoller>,
        handler_factory: Arc<dyn PollHandlerFactory>,
        poll_listener: Arc<dyn PollListener>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            poller,
            handler_factory,
            poll_listener,
            scheduler,
        }
    }

    pub fn create(&self, service: &ServiceConfig) -> Result<ServiceSession, ServiceSessionError> {
        if service.poll_period_ms == 0 {
            return Err(ServiceSessionError::InvalidPollPeriod {
                service: service.name.clone(),
                poll_period_ms: service.poll_period_ms,
            });
        }

        Ok(ServiceSession::new(
            service.clone(),
            self.poller.clone(),
            self.handler_factory.clone(),
            self.poll_listener.clone(),
            self.scheduler.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{ServiceSession, ServiceSessionError, ServiceSessionFactory};
    use crate::model::{EndpointConfig, ServiceConfig};
    use crate::observability::NoopPollListener;
    use crate::polling::endpoint_poller::{EndpointPoller, EndpointResponse, PollError};
    use crate::polling::poll_handler::{PollHandlerFactory, PollResultHandler};
    use crate::runtime::Scheduler;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct SlowPoller {
        delay: Duration,
        requests: AtomicUsize,
    }

    #[async_trait]
    impl EndpointPoller for SlowPoller {
        async fn request(
            &self,
            _service: &ServiceConfig,
            _endpoint: &EndpointConfig,
        ) -> Result<EndpointResponse, PollError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(EndpointResponse::new(200, "ok"))
        }
    }

    #[derive(Default)]
    struct Results {
        delivered: Mutex<Vec<String>>,
    }

    struct RecordingHandler {
        endpoint: String,
        results: Arc<Results>,
    }

    impl PollResultHandler for RecordingHandler {
        fn handle(&self, result: Result<EndpointResponse, PollError>) {
            let outcome = match result {
                Ok(_) => format!("{}:ok", self.endpoint),
                Err(err) => format!("{}:{err}", self.endpoint),
            };
            self.results
                .delivered
                .lock()
                .expect("lock delivered")
                .push(outcome);
        }
    }

    struct RecordingHandlerFactory {
        results: Arc<Results>,
    }

    impl PollHandlerFactory for RecordingHandlerFactory {
        fn create(
            &self,
            _service: &ServiceConfig,
            endpoint: &EndpointConfig,
        ) -> Result<Arc<dyn PollResultHandler>, ServiceSessionError> {
            Ok(Arc::new(RecordingHandler {
                endpoint: endpoint.name.clone(),
                results: self.results.clone(),
            }))
        }
    }

    fn session(poll_period_ms: u64, delay: Duration) -> (ServiceSession, Arc<SlowPoller>, Arc<Results>) {
        let poller = Arc::new(SlowPoller {
            delay,
            requests: AtomicUsize::new(0),
        });
        let results = Arc::new(Results::default());
        let service = ServiceConfig::new("svc", "localhost", 80, "root")
            .with_poll_period_ms(poll_period_ms);
        let session = ServiceSession::new(
            service,
            poller.clone(),
            Arc::new(RecordingHandlerFactory {
                results: results.clone(),
            }),
            Arc::new(NoopPollListener),
            Scheduler::current(),
        );
        (session, poller, results)
    }

    fn endpoint(name: &str) -> EndpointConfig {
        EndpointConfig::new(name, format!("/{name}"), name, "json")
    }

    fn delivered(results: &Results) -> Vec<String> {
        results.delivered.lock().expect("lock delivered").clone()
    }

    #[tokio::test(start_paused = true)]
    async fn endpoints_added_before_start_stay_dormant() {
        let (session, poller, results) = session(1000, Duration::from_millis(10));
        session
            .add_endpoint(endpoint("a"))
            .await
            .expect("endpoint should be added");

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(poller.requests.load(Ordering::SeqCst), 0);

        session.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(poller.requests.load(Ordering::SeqCst), 1);
        assert_eq!(delivered(&results), vec!["a:ok".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn adding_the_same_endpoint_twice_schedules_it_once() {
        let (session, poller, _results) = session(1000, Duration::from_millis(10));
        session.start().await;

        session
            .add_endpoint(endpoint("a"))
            .await
            .expect("endpoint should be added");
        session
            .add_endpoint(endpoint("a"))
            .await
            .expect("duplicate add is a no-op");
        tokio::time::sleep(Duration::from_millis(2050)).await;

        assert_eq!(session.endpoints().await, vec!["a".to_string()]);
        assert_eq!(poller.requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_in_flight_results_and_clears_endpoints() {
        let (session, poller, results) = session(1000, Duration::from_millis(300));
        session.start().await;
        session
            .add_endpoint(endpoint("a"))
            .await
            .expect("endpoint should be added");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(poller.requests.load(Ordering::SeqCst), 1);

        session.stop().await;
        tokio::time::sleep(Duration::from_millis(5000)).await;

        assert!(delivered(&results).is_empty());
        assert_eq!(poller.requests.load(Ordering::SeqCst), 1);
        assert!(session.endpoints().await.is_empty());
        assert!(!session.is_running().await);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_session_is_never_started_again() {
        let (session, poller, results) = session(1000, Duration::from_millis(10));
        session.stop().await;

        assert!(!session.start().await);
        session
            .add_endpoint(endpoint("a"))
            .await
            .expect("adding to a stopped session is a no-op");
        tokio::time::sleep(Duration::from_millis(3000)).await;

        assert!(session.is_stopped().await);
        assert!(!session.is_running().await);
        assert!(session.endpoints().await.is_empty());
        assert_eq!(poller.requests.load(Ordering::SeqCst), 0);
        assert!(delivered(&results).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn same_name_with_other_configuration_keeps_the_first_schedule() {
        let (session, poller, _results) = session(1000, Duration::from_millis(10));
        assert!(session.start().await);

        session
            .add_endpoint(endpoint("a"))
            .await
            .expect("endpoint should be added");
        session
            .add_endpoint(EndpointConfig::new("a", "/elsewhere", "a", "binary"))
            .await
            .expect("conflicting add is ignored");
        tokio::time::sleep(Duration::from_millis(2050)).await;

        assert_eq!(session.endpoints().await, vec!["a".to_string()]);
        assert_eq!(poller.requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn factory_rejects_zero_poll_period() {
        let poller = Arc::new(SlowPoller {
            delay: Duration::ZERO,
            requests: AtomicUsize::new(0),
        });
        let factory = ServiceSessionFactory::new(
            poller,
            Arc::new(RecordingHandlerFactory {
                results: Arc::new(Results::default()),
            }),
            Arc::new(NoopPollListener),
            Scheduler::current(),
        );
        let service = ServiceConfig::new("svc", "localhost", 80, "root").with_poll_period_ms(0);

        let result = factory.create(&service);

        assert!(matches!(
            result,
            Err(ServiceSessionError::InvalidPollPeriod { poll_period_ms: 0, .. })
        ));
    }
}

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

//! Top-level state machine owning the broker session, the HTTP layer and the services.
//!
//! Every transition runs under one lock. A broker session is opened in the background and
//! tagged with a generation number; when it completes, the result is applied only if that
//! generation is still the one wanted and the lifecycle is still connecting. Anything else
//! is closed and dropped.

use crate::broker::{BrokerSession, BrokerSessionFactory, SessionError, SessionEvent, SessionListener};
use crate::control_plane::service_listener::{NullServiceListener, ServiceListener};
use crate::control_plane::service_manager::{
    ServiceManager, ServiceManagerContext, ServiceManagerError,
};
use crate::model::{BrokerConfig, Model, SecurityConfig};
use crate::observability::{events, fields, NoopPollListener, PollListener};
use crate::polling::endpoint_poller::{EndpointPoller, EndpointPollerFactory, PollError};
use crate::runtime::Scheduler;
use crate::tls::{TlsContext, TlsError};
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

const COMPONENT: &str = "adapter_lifecycle";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdapterState {
    /// Nothing to poll. A broker session may be kept alive.
    Standby,
    /// A broker session is being opened.
    Connecting,
    /// Broker session open and services running.
    Active,
    /// The broker session was lost or could not be built. Waits for a new model.
    Recovering,
    /// Terminal.
    Stopped,
}

impl Display for AdapterState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AdapterState::Standby => "STANDBY",
            AdapterState::Connecting => "CONNECTING",
            AdapterState::Active => "ACTIVE",
            AdapterState::Recovering => "RECOVERING",
            AdapterState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("unable to build TLS context: {0}")]
    Tls(#[from] TlsError),
    #[error("unable to build HTTP layer: {0}")]
    HttpLayer(PollError),
    #[error(transparent)]
    Services(#[from] ServiceManagerError),
}

type ShutdownCallback = Box<dyn FnOnce() + Send>;

struct BrokerLayer {
    session: Arc<dyn BrokerSession>,
    broker: BrokerConfig,
    truststore: Option<String>,
    generation: u64,
}

impl BrokerLayer {
    fn serves(&self, model: &Model) -> bool {
        self.broker == model.broker && self.truststore == model.truststore
    }
}

struct ConnectAttempt {
    broker: BrokerConfig,
    truststore: Option<String>,
}

impl ConnectAttempt {
    fn serves(&self, model: &Model) -> bool {
        self.broker == model.broker && self.truststore == model.truststore
    }
}

struct HttpLayer {
    poller: Arc<dyn EndpointPoller>,
}

struct LifecycleInner {
    state: AdapterState,
    model: Option<Model>,
    generation: u64,
    tls: Option<TlsContext>,
    connecting: Option<ConnectAttempt>,
    broker: Option<BrokerLayer>,
    http: Option<HttpLayer>,
    shutdown: Option<ShutdownCallback>,
}

struct LifecycleShared {
    session_factory: Arc<dyn BrokerSessionFactory>,
    poller_factory: Arc<dyn EndpointPollerFactory>,
    scheduler: Scheduler,
    service_listener: Arc<dyn ServiceListener>,
    poll_listener: Arc<dyn PollListener>,
    services: ServiceManager,
    inner: Mutex<LifecycleInner>,
}

/// Builder for [`AdapterLifecycle`].
pub struct AdapterLifecycleBuilder {
    session_factory: Arc<dyn BrokerSessionFactory>,
    poller_factory: Arc<dyn EndpointPollerFactory>,
    scheduler: Scheduler,
    service_listener: Arc<dyn ServiceListener>,
    poll_listener: Arc<dyn PollListener>,
    shutdown: Option<ShutdownCallback>,
}

impl AdapterLifecycleBuilder {
    pub fn service_listener(mut self, service_listener: Arc<dyn ServiceListener>) -> Self {
        self.service_listener = service_listener;
        self
    }

    pub fn poll_listener(mut self, poll_listener: Arc<dyn PollListener>) -> Self {
        self.poll_listener = poll_listener;
        self
    }

    /// Invoked once, when a model marked inactive stops the adapter.
    pub fn on_shutdown(mut self, shutdown: impl FnOnce() + Send + 'static) -> Self {
        self.shutdown = Some(Box::new(shutdown));
        self
    }

    pub fn build(self) -> AdapterLifecycle {
        AdapterLifecycle {
            shared: Arc::new(LifecycleShared {
                session_factory: self.session_factory,
                poller_factory: self.poller_factory,
                scheduler: self.scheduler,
                service_listener: self.service_listener,
                poll_listener: self.poll_listener,
                services: ServiceManager::new(),
                inner: Mutex::new(LifecycleInner {
                    state: AdapterState::Standby,
                    model: None,
                    generation: 0,
                    tls: None,
                    connecting: None,
                    broker: None,
                    http: None,
                    shutdown: self.shutdown,
                }),
            }),
        }
    }
}

/// Drives the adapter from successive configuration snapshots and broker notifications.
///
/// ```no_run
/// use rest_adapter::{AdapterLifecycle, ReqwestEndpointPollerFactory, Scheduler};
/// # use rest_adapter::{BrokerSessionFactory, Model};
/// # use std::sync::Arc;
/// # async fn run(broker: Arc<dyn BrokerSessionFactory>, model: Model) {
/// let lifecycle = AdapterLifecycle::builder(
///     broker,
///     Arc::new(ReqwestEndpointPollerFactory::new()),
///     Scheduler::current(),
/// )
/// .on_shutdown(|| println!("adapter deactivated"))
/// .build();
///
/// lifecycle.on_reconfiguration(model).await.ok();
/// # }
/// ```
#[derive(Clone)]
pub struct AdapterLifecycle {
    shared: Arc<LifecycleShared>,
}

impl AdapterLifecycle {
    pub fn builder(
        session_factory: Arc<dyn BrokerSessionFactory>,
        poller_factory: Arc<dyn EndpointPollerFactory>,
        scheduler: Scheduler,
    ) -> AdapterLifecycleBuilder {
        AdapterLifecycleBuilder {
            session_factory,
            poller_factory,
            scheduler,
            service_listener: Arc::new(NullServiceListener),
            poll_listener: Arc::new(NoopPollListener),
            shutdown: None,
        }
    }

    /// Applies a new configuration snapshot.
    ///
    /// Only the layers affected by the difference to the current model are rebuilt. Returns an
    /// error when a resource needed for the new model could not be built; the lifecycle is
    /// then `Recovering` (or `Active` with some services missing) and a later call retries.
    pub async fn on_reconfiguration(&self, model: Model) -> Result<(), LifecycleError> {
        self.shared.on_reconfiguration(model).await
    }

    /// Stops everything without invoking the shutdown callback. Idempotent.
    pub async fn close(&self) {
        self.shared.close().await
    }

    pub async fn state(&self) -> AdapterState {
        self.shared.inner.lock().await.state
    }

    pub async fn current_model(&self) -> Option<Model> {
        self.shared.inner.lock().await.model.clone()
    }

    /// Names of the running services.
    pub async fn running_services(&self) -> Vec<String> {
        self.shared.services.running_services().await
    }
}

impl LifecycleShared {
    async fn on_reconfiguration(self: &Arc<Self>, model: Model) -> Result<(), LifecycleError> {
        let mut inner = self.inner.lock().await;
        info!(
            event = events::LIFECYCLE_RECONFIGURE,
            component = COMPONENT,
            state = %inner.state,
            active = model.active,
            services = model.services.len(),
            broker = fields::format_broker(&model.broker).as_str(),
            "applying configuration"
        );

        if inner.state == AdapterState::Stopped {
            debug!(
                event = events::LIFECYCLE_IGNORED,
                component = COMPONENT,
                reason = fields::REASON_STOPPED,
                "configuration ignored"
            );
            return Ok(());
        }

        if !model.active {
            self.teardown(&mut inner).await;
            self.transition(&mut inner, AdapterState::Stopped);
            inner.model = Some(model);
            if let Some(shutdown) = inner.shutdown.take() {
                info!(
                    event = events::LIFECYCLE_SHUTDOWN,
                    component = COMPONENT,
                    "adapter deactivated"
                );
                shutdown();
            }
            return Ok(());
        }

        if model.has_nothing_to_poll() {
            self.services.close().await;
            inner.http = None;
            if inner.connecting.take().is_some() {
                inner.generation += 1;
            }
            self.transition(&mut inner, AdapterState::Standby);
            inner.model = Some(model);
            return Ok(());
        }

        let previous = inner.model.replace(model.clone());

        if inner.state == AdapterState::Connecting
            && inner
                .connecting
                .as_ref()
                .is_some_and(|attempt| attempt.serves(&model))
        {
            debug!(
                event = events::LIFECYCLE_RECONFIGURE,
                component = COMPONENT,
                state = %inner.state,
                "connection in progress, model applied once open"
            );
            return Ok(());
        }

        let broker_reusable = inner
            .broker
            .as_ref()
            .is_some_and(|layer| layer.serves(&model));

        // Leaving standby always reconnects, even to an unchanged broker.
        match inner.state {
            AdapterState::Active if broker_reusable => {
                let security_changed = previous
                    .as_ref()
                    .map_or(true, |previous| security_of(previous) != security_of(&model));
                let services_changed = previous
                    .as_ref()
                    .map_or(true, |previous| previous.services != model.services);

                if security_changed {
                    self.activate(&mut inner, &model, true).await
                } else if services_changed {
                    self.activate(&mut inner, &model, false).await
                } else {
                    debug!(
                        event = events::LIFECYCLE_RECONFIGURE,
                        component = COMPONENT,
                        state = %inner.state,
                        "no change to apply"
                    );
                    Ok(())
                }
            }
            _ => self.reconnect(&mut inner, &model).await,
        }
    }

    /// Builds the HTTP layer if needed and restarts all services on the live broker session.
    async fn activate(
        &self,
        inner: &mut MutexGuard<'_, LifecycleInner>,
        model: &Model,
        rebuild_http: bool,
    ) -> Result<(), LifecycleError> {
        if rebuild_http || inner.http.is_none() {
            match self.poller_factory.create(model, inner.tls.as_ref()) {
                Ok(poller) => {
                    debug!(
                        event = events::HTTP_LAYER_CREATE,
                        component = COMPONENT,
                        "HTTP layer created"
                    );
                    inner.http = Some(HttpLayer { poller });
                }
                Err(err) => {
                    warn!(
                        event = events::HTTP_LAYER_FAILED,
                        component = COMPONENT,
                        err = %err,
                        "unable to create HTTP layer"
                    );
                    self.services.close().await;
                    inner.http = None;
                    self.transition(inner, AdapterState::Recovering);
                    return Err(LifecycleError::HttpLayer(err));
                }
            }
        }

        let (Some(broker), Some(http)) = (inner.broker.as_ref(), inner.http.as_ref()) else {
            return Ok(());
        };
        let context = ServiceManagerContext::new(
            http.poller.clone(),
            broker.session.topic_management(),
            broker.session.publishing(),
            self.service_listener.clone(),
            self.poll_listener.clone(),
            self.scheduler.clone(),
        );

        let result = self.services.reconfigure(&context, model).await;
        self.transition(inner, AdapterState::Active);
        result.map_err(LifecycleError::from)
    }

    /// Drops every layer and opens a new broker session in the background.
    async fn reconnect(
        self: &Arc<Self>,
        inner: &mut MutexGuard<'_, LifecycleInner>,
        model: &Model,
    ) -> Result<(), LifecycleError> {
        self.teardown(inner).await;
        let generation = inner.generation;

        inner.tls = match TlsContext::from_model(model) {
            Ok(tls) => tls,
            Err(err) => {
                warn!(
                    event = events::TLS_CONTEXT_FAILED,
                    component = COMPONENT,
                    err = %err,
                    "unable to build TLS context"
                );
                inner.tls = None;
                self.transition(inner, AdapterState::Recovering);
                return Err(err.into());
            }
        };

        inner.connecting = Some(ConnectAttempt {
            broker: model.broker.clone(),
            truststore: model.truststore.clone(),
        });
        self.transition(inner, AdapterState::Connecting);

        info!(
            event = events::BROKER_CONNECT_START,
            component = COMPONENT,
            broker = fields::format_broker(&model.broker).as_str(),
            generation,
            "opening broker session"
        );

        let lifecycle = Arc::downgrade(self);
        let factory = self.session_factory.clone();
        let broker = model.broker.clone();
        let tls = inner.tls.clone();
        let listener = self.session_listener(generation);

        self.scheduler.spawn(async move {
            let result = factory.open(&broker, tls.as_ref(), listener).await;
            match lifecycle.upgrade() {
                Some(lifecycle) => lifecycle.on_session_open(generation, result).await,
                None => {
                    if let Ok(session) = result {
                        session.close().await;
                    }
                }
            }
        });

        Ok(())
    }

    fn session_listener(self: &Arc<Self>, generation: u64) -> SessionListener {
        let lifecycle: Weak<LifecycleShared> = Arc::downgrade(self);
        let scheduler = self.scheduler.clone();

        Arc::new(move |event| {
            let lifecycle = lifecycle.clone();
            scheduler.spawn(async move {
                if let Some(lifecycle) = lifecycle.upgrade() {
                    lifecycle.on_session_event(generation, event).await;
                }
            });
        })
    }

    async fn on_session_open(
        &self,
        generation: u64,
        result: Result<Arc<dyn BrokerSession>, SessionError>,
    ) {
        let mut inner = self.inner.lock().await;

        if generation != inner.generation || inner.state != AdapterState::Connecting {
            let reason = if generation != inner.generation {
                fields::REASON_STALE_GENERATION
            } else {
                fields::REASON_NOT_CONNECTING
            };
            if let Ok(session) = result {
                debug!(
                    event = events::BROKER_SESSION_DISCARDED,
                    component = COMPONENT,
                    session_id = session.session_id().as_str(),
                    generation,
                    reason,
                    "closing unwanted broker session"
                );
                session.close().await;
            }
            return;
        }

        inner.connecting = None;
        let session = match result {
            Ok(session) => session,
            Err(err) => {
                warn!(
                    event = events::BROKER_CONNECT_FAILED,
                    component = COMPONENT,
                    generation,
                    err = %err,
                    "unable to open broker session"
                );
                self.transition(&mut inner, AdapterState::Recovering);
                return;
            }
        };

        let Some(model) = inner.model.clone() else {
            session.close().await;
            self.transition(&mut inner, AdapterState::Recovering);
            return;
        };

        info!(
            event = events::BROKER_CONNECT_OK,
            component = COMPONENT,
            session_id = session.session_id().as_str(),
            broker = fields::format_broker(&model.broker).as_str(),
            generation,
            "broker session open"
        );
        inner.broker = Some(BrokerLayer {
            session,
            broker: model.broker.clone(),
            truststore: model.truststore.clone(),
            generation,
        });

        if let Err(err) = self.activate(&mut inner, &model, true).await {
            warn!(
                event = events::SERVICES_RECONFIGURE_FAILED,
                component = COMPONENT,
                err = %err,
                "activation incomplete"
            );
        }
    }

    async fn on_session_event(&self, generation: u64, event: SessionEvent) {
        let mut inner = self.inner.lock().await;

        let current_session = inner
            .broker
            .as_ref()
            .is_some_and(|layer| layer.generation == generation);
        let current_attempt = inner.connecting.is_some() && inner.generation == generation;
        if inner.state == AdapterState::Stopped || !(current_session || current_attempt) {
            debug!(
                event = events::LIFECYCLE_IGNORED,
                component = COMPONENT,
                generation,
                session_event = ?event,
                reason = fields::REASON_STALE_GENERATION,
                "broker notification ignored"
            );
            return;
        }

        match event {
            SessionEvent::Lost => {
                warn!(
                    event = events::BROKER_SESSION_LOST,
                    component = COMPONENT,
                    state = %inner.state,
                    generation,
                    "broker session lost"
                );
                // A lost session is not closed again.
                inner.broker = None;
                if matches!(inner.state, AdapterState::Active | AdapterState::Connecting) {
                    self.services.close().await;
                    inner.http = None;
                    inner.connecting = None;
                    self.transition(&mut inner, AdapterState::Recovering);
                }
            }
            SessionEvent::Closed => {
                warn!(
                    event = events::BROKER_SESSION_CLOSED,
                    component = COMPONENT,
                    state = %inner.state,
                    generation,
                    "broker session closed"
                );
                inner.broker = None;
                self.services.close().await;
                inner.http = None;
                inner.connecting = None;
                self.transition(&mut inner, AdapterState::Recovering);
            }
        }
    }

    async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == AdapterState::Stopped {
            return;
        }
        self.teardown(&mut inner).await;
        self.transition(&mut inner, AdapterState::Stopped);
    }

    /// Stops services, drops the HTTP layer, abandons any connection attempt and closes the
    /// broker session.
    async fn teardown(&self, inner: &mut MutexGuard<'_, LifecycleInner>) {
        self.services.close().await;
        inner.http = None;
        inner.connecting = None;
        inner.generation += 1;
        if let Some(layer) = inner.broker.take() {
            layer.session.close().await;
        }
    }

    fn transition(&self, inner: &mut LifecycleInner, to: AdapterState) {
        if inner.state == to {
            return;
        }
        info!(
            event = events::LIFECYCLE_TRANSITION,
            component = COMPONENT,
            from_state = %inner.state,
            to_state = %to,
            "adapter state changed"
        );
        inner.state = to;
    }
}

fn security_of(model: &Model) -> Vec<(&str, &SecurityConfig)> {
    model
        .services
        .iter()
        .map(|service| (service.name.as_str(), &service.security))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{security_of, AdapterState};
    use crate::model::{BasicAuthenticationConfig, BrokerConfig, Model, ServiceConfig};

    fn model(services: Vec<ServiceConfig>) -> Model {
        Model {
            active: true,
            broker: BrokerConfig::new("localhost", 8080),
            services,
            truststore: None,
            metrics: Default::default(),
        }
    }

    #[test]
    fn security_comparison_ignores_non_security_changes() {
        let before = model(vec![ServiceConfig::new("svc", "localhost", 80, "root")]);
        let after = model(vec![
            ServiceConfig::new("svc", "localhost", 80, "root").with_poll_period_ms(1)
        ]);

        assert_eq!(security_of(&before), security_of(&after));
    }

    #[test]
    fn security_comparison_detects_basic_auth_change() {
        let before = model(vec![ServiceConfig::new("svc", "localhost", 80, "root")]);
        let mut secured = ServiceConfig::new("svc", "localhost", 80, "root");
        secured.security.basic = Some(BasicAuthenticationConfig {
            userid: "user".to_string(),
            password: "secret".to_string(),
        });
        let after = model(vec![secured]);

        assert_ne!(security_of(&before), security_of(&after));
    }

    #[test]
    fn states_display_in_upper_case() {
        assert_eq!(AdapterState::Recovering.to_string(), "RECOVERING");
        assert_eq!(AdapterState::Standby.to_string(), "STANDBY");
    }
}

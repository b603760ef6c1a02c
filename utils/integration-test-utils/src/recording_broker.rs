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
use futures::future::BoxFuture;
use rest_adapter::{
    BrokerConfig, BrokerSession, BrokerSessionFactory, EndpointConfig, EndpointType,
    PublishingClient, PublishingError, ServiceConfig, SessionError, SessionEvent,
    SessionListener, TlsContext, TopicCreation, TopicCreationError, TopicManagementClient,
    TopicType, TopicValue, UpdateContext, UpdateSource, UpdateSourceState,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("recording lock poisoned")
}

/// One `add_endpoint` call seen by [`RecordingTopicManagementClient`].
#[derive(Clone, Debug, PartialEq)]
pub struct AddedEndpoint {
    pub service: String,
    pub endpoint: EndpointConfig,
    pub topic_path: String,
    pub endpoint_type: EndpointType,
    pub initial_value: Option<TopicValue>,
}

/// Topic-management client recording every call. Topic creation succeeds unless scripted.
#[derive(Debug, Default)]
pub struct RecordingTopicManagementClient {
    services: Mutex<Vec<String>>,
    endpoints: Mutex<Vec<AddedEndpoint>>,
    outcomes: Mutex<HashMap<String, Result<TopicCreation, TopicCreationError>>>,
}

impl RecordingTopicManagementClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome of every later topic creation for the endpoint named `endpoint`.
    pub fn respond_with(&self, endpoint: &str, outcome: Result<TopicCreation, TopicCreationError>) {
        lock(&self.outcomes).insert(endpoint.to_string(), outcome);
    }

    pub fn added_services(&self) -> Vec<String> {
        lock(&self.services).clone()
    }

    pub fn added_endpoints(&self) -> Vec<AddedEndpoint> {
        lock(&self.endpoints).clone()
    }

    /// `add_endpoint` calls for the topic at `topic_path`.
    pub fn topic_creations(&self, topic_path: &str) -> Vec<AddedEndpoint> {
        lock(&self.endpoints)
            .iter()
            .filter(|added| added.topic_path == topic_path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TopicManagementClient for RecordingTopicManagementClient {
    fn add_service(&self, service: &ServiceConfig) {
        lock(&self.services).push(service.name.clone());
    }

    async fn add_endpoint(
        &self,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
        endpoint_type: EndpointType,
        initial_value: Option<TopicValue>,
    ) -> Result<TopicCreation, TopicCreationError> {
        lock(&self.endpoints).push(AddedEndpoint {
            service: service.name.clone(),
            endpoint: endpoint.clone(),
            topic_path: service.topic_path(endpoint),
            endpoint_type,
            initial_value,
        });
        lock(&self.outcomes)
            .get(&endpoint.name)
            .cloned()
            .unwrap_or(Ok(TopicCreation::Created))
    }
}

/// One value published through a [`RecordingUpdateContext`].
#[derive(Clone, Debug, PartialEq)]
pub struct Publication {
    pub topic_path: String,
    pub value: TopicValue,
}

type Publications = Arc<Mutex<Vec<Publication>>>;

/// Update context appending to the publications of its [`RecordingPublishingClient`].
pub struct RecordingUpdateContext {
    topic_path: String,
    topic_type: TopicType,
    publications: Publications,
}

impl UpdateContext for RecordingUpdateContext {
    fn topic_path(&self) -> &str {
        &self.topic_path
    }

    fn publish(&self, value: TopicValue) -> Result<(), PublishingError> {
        if value.topic_type() != self.topic_type {
            return Err(PublishingError::ValueMismatch {
                topic_path: self.topic_path.clone(),
                topic: self.topic_type,
                value: value.topic_type(),
            });
        }
        lock(&self.publications).push(Publication {
            topic_path: self.topic_path.clone(),
            value,
        });
        Ok(())
    }
}

/// Publishing client keeping one [`UpdateSource`] per service name.
///
/// By default a registered source is made active straight away, as a broker with no competing
/// publisher would.
pub struct RecordingPublishingClient {
    auto_activate: bool,
    sources: Mutex<HashMap<String, Arc<UpdateSource>>>,
    removed: Mutex<Vec<String>>,
    publications: Publications,
}

impl Default for RecordingPublishingClient {
    fn default() -> Self {
        Self {
            auto_activate: true,
            sources: Mutex::default(),
            removed: Mutex::default(),
            publications: Publications::default(),
        }
    }
}

impl RecordingPublishingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sources stay on standby until [`UpdateSource::activate`] is called by the test.
    pub fn without_auto_activation() -> Self {
        Self {
            auto_activate: false,
            ..Self::default()
        }
    }

    pub fn source(&self, service: &str) -> Option<Arc<UpdateSource>> {
        lock(&self.sources).get(service).cloned()
    }

    pub fn publications(&self) -> Vec<Publication> {
        lock(&self.publications).clone()
    }

    pub fn publications_to(&self, topic_path: &str) -> Vec<TopicValue> {
        lock(&self.publications)
            .iter()
            .filter(|publication| publication.topic_path == topic_path)
            .map(|publication| publication.value.clone())
            .collect()
    }

    /// Service names passed to `remove_service`, in call order.
    pub fn removed_services(&self) -> Vec<String> {
        lock(&self.removed).clone()
    }

    fn is_registered(&self, service: &str) -> bool {
        lock(&self.sources)
            .get(service)
            .is_some_and(|source| source.state() != UpdateSourceState::Closed)
    }
}

#[async_trait]
impl PublishingClient for RecordingPublishingClient {
    fn add_service(&self, service: &ServiceConfig) -> Arc<UpdateSource> {
        let source = Arc::new(UpdateSource::new(service.topic_path_root.clone()));
        lock(&self.sources).insert(service.name.clone(), source.clone());

        if source.register().is_ok() && self.auto_activate {
            source.activate();
        }
        source
    }

    fn create_update_context(
        &self,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
        endpoint_type: EndpointType,
    ) -> Result<Arc<dyn UpdateContext>, PublishingError> {
        if !self.is_registered(&service.name) {
            return Err(PublishingError::ServiceNotActive(service.name.clone()));
        }
        Ok(Arc::new(RecordingUpdateContext {
            topic_path: service.topic_path(endpoint),
            topic_type: endpoint_type.topic_type(),
            publications: self.publications.clone(),
        }))
    }

    async fn remove_service(&self, service: &ServiceConfig) -> Result<(), PublishingError> {
        lock(&self.removed).push(service.name.clone());
        let source = lock(&self.sources).remove(&service.name);
        match source {
            Some(source) => {
                source.close();
                Ok(())
            }
            None => Err(PublishingError::ServiceNotActive(service.name.clone())),
        }
    }

    async fn for_service<'a>(&self, service: &ServiceConfig, task: BoxFuture<'a, ()>) -> bool {
        if !self.is_registered(&service.name) {
            return false;
        }
        task.await;
        true
    }
}

/// Broker session sharing the clients of the [`FakeBrokerSessionFactory`] that opened it.
pub struct FakeBrokerSession {
    session_id: String,
    listener: SessionListener,
    topic_management: Arc<RecordingTopicManagementClient>,
    publishing: Arc<RecordingPublishingClient>,
    close_calls: AtomicUsize,
}

impl FakeBrokerSession {
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Delivers `event` to the listener the session was opened with.
    pub fn emit(&self, event: SessionEvent) {
        (self.listener)(event);
    }
}

#[async_trait]
impl BrokerSession for FakeBrokerSession {
    fn session_id(&self) -> String {
        self.session_id.clone()
    }

    fn topic_management(&self) -> Arc<dyn TopicManagementClient> {
        self.topic_management.clone()
    }

    fn publishing(&self) -> Arc<dyn PublishingClient> {
        self.publishing.clone()
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Opens [`FakeBrokerSession`]s. Opening can be made to fail or to wait for a release.
pub struct FakeBrokerSessionFactory {
    topic_management: Arc<RecordingTopicManagementClient>,
    publishing: Arc<RecordingPublishingClient>,
    sessions: Mutex<Vec<Arc<FakeBrokerSession>>>,
    failure: Mutex<Option<SessionError>>,
    gated: AtomicBool,
    gate: Notify,
    open_calls: AtomicUsize,
}

impl FakeBrokerSessionFactory {
    pub fn new(
        topic_management: Arc<RecordingTopicManagementClient>,
        publishing: Arc<RecordingPublishingClient>,
    ) -> Self {
        Self {
            topic_management,
            publishing,
            sessions: Mutex::default(),
            failure: Mutex::default(),
            gated: AtomicBool::new(false),
            gate: Notify::new(),
            open_calls: AtomicUsize::new(0),
        }
    }

    /// Later opens fail with `failure` until reset with `None`.
    pub fn fail_with(&self, failure: Option<SessionError>) {
        *lock(&self.failure) = failure;
    }

    /// Later opens block until [`FakeBrokerSessionFactory::release_one`].
    pub fn hold_opens(&self, gated: bool) {
        self.gated.store(gated, Ordering::SeqCst);
    }

    pub fn release_one(&self) {
        self.gate.notify_one();
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Sessions successfully opened, oldest first.
    pub fn sessions(&self) -> Vec<Arc<FakeBrokerSession>> {
        lock(&self.sessions).clone()
    }

    pub fn latest_session(&self) -> Option<Arc<FakeBrokerSession>> {
        lock(&self.sessions).last().cloned()
    }
}

#[async_trait]
impl BrokerSessionFactory for FakeBrokerSessionFactory {
    async fn open(
        &self,
        broker: &BrokerConfig,
        _tls: Option<&TlsContext>,
        listener: SessionListener,
    ) -> Result<Arc<dyn BrokerSession>, SessionError> {
        let attempt = self.open_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }

        let failure = lock(&self.failure).clone();
        if let Some(failure) = failure {
            return Err(failure);
        }

        let session = Arc::new(FakeBrokerSession {
            session_id: format!("fake-session-{attempt}"),
            listener,
            topic_management: self.topic_management.clone(),
            publishing: self.publishing.clone(),
            close_calls: AtomicUsize::new(0),
        });
        debug!(
            session_id = session.session_id.as_str(),
            host = broker.host.as_str(),
            port = broker.port,
            "fake broker session opened"
        );
        lock(&self.sessions).push(session.clone());
        Ok(session)
    }
}

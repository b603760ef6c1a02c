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

//! Broker stand-in that accepts every topic and logs every update.

use async_trait::async_trait;
use futures::future::BoxFuture;
use rest_adapter::observability::{events, fields};
use rest_adapter::{
    BrokerConfig, BrokerSession, BrokerSessionFactory, EndpointConfig, EndpointType,
    PublishingClient, PublishingError, ServiceConfig, SessionError, SessionListener, TlsContext,
    TopicCreation, TopicCreationError, TopicManagementClient, TopicType, TopicValue,
    UpdateContext, UpdateSource, UpdateSourceState,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

const COMPONENT: &str = "log_broker";

#[derive(Debug, Default)]
pub(crate) struct LogBrokerSessionFactory {
    opened: AtomicU64,
}

impl LogBrokerSessionFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BrokerSessionFactory for LogBrokerSessionFactory {
    async fn open(
        &self,
        broker: &BrokerConfig,
        tls: Option<&TlsContext>,
        _listener: SessionListener,
    ) -> Result<Arc<dyn BrokerSession>, SessionError> {
        let session_id = format!("log-{}", self.opened.fetch_add(1, Ordering::Relaxed) + 1);
        info!(
            event = events::LOG_BROKER_SESSION_OPEN,
            component = COMPONENT,
            session_id = session_id.as_str(),
            broker = fields::format_broker(broker).as_str(),
            truststore = fields::format_optional(tls.map(TlsContext::truststore)).as_str(),
            "log-only broker session open"
        );

        let publishing = Arc::new(LogPublishingClient::default());
        Ok(Arc::new(LogBrokerSession {
            session_id,
            topic_management: Arc::new(LogTopicManagementClient),
            publishing,
        }))
    }
}

struct LogBrokerSession {
    session_id: String,
    topic_management: Arc<LogTopicManagementClient>,
    publishing: Arc<LogPublishingClient>,
}

#[async_trait]
impl BrokerSession for LogBrokerSession {
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
        self.publishing.close_all();
        info!(
            event = events::LOG_BROKER_SESSION_CLOSE,
            component = COMPONENT,
            session_id = self.session_id.as_str(),
            "log-only broker session closed"
        );
    }
}

struct LogTopicManagementClient;

#[async_trait]
impl TopicManagementClient for LogTopicManagementClient {
    fn add_service(&self, service: &ServiceConfig) {
        debug!(
            event = events::LOG_BROKER_TOPIC_ADD,
            component = COMPONENT,
            service = service.name.as_str(),
            topic_path = service.topic_path_root.as_str(),
            "service topic root"
        );
    }

    async fn add_endpoint(
        &self,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
        endpoint_type: EndpointType,
        initial_value: Option<TopicValue>,
    ) -> Result<TopicCreation, TopicCreationError> {
        info!(
            event = events::LOG_BROKER_TOPIC_ADD,
            component = COMPONENT,
            service = service.name.as_str(),
            endpoint = endpoint.name.as_str(),
            topic_path = service.topic_path(endpoint).as_str(),
            endpoint_type = %endpoint_type,
            seeded = initial_value.is_some(),
            "topic added"
        );
        Ok(TopicCreation::Created)
    }
}

struct LogUpdateContext {
    topic_path: String,
    topic_type: TopicType,
}

impl UpdateContext for LogUpdateContext {
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
        let bytes = value.to_bytes();
        info!(
            event = events::LOG_BROKER_UPDATE,
            component = COMPONENT,
            topic_path = self.topic_path.as_str(),
            bytes = bytes.len(),
            value = %String::from_utf8_lossy(&bytes),
            "topic updated"
        );
        Ok(())
    }
}

/// Registers every service and makes it active immediately.
#[derive(Default)]
struct LogPublishingClient {
    sources: Mutex<HashMap<String, Arc<UpdateSource>>>,
}

impl LogPublishingClient {
    fn sources(&self) -> MutexGuard<'_, HashMap<String, Arc<UpdateSource>>> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close_all(&self) {
        let sources: Vec<_> = self.sources().drain().map(|(_, source)| source).collect();
        for source in sources {
            source.close();
        }
    }

    fn is_registered(&self, service: &str) -> bool {
        self.sources()
            .get(service)
            .is_some_and(|source| source.state() != UpdateSourceState::Closed)
    }
}

#[async_trait]
impl PublishingClient for LogPublishingClient {
    fn add_service(&self, service: &ServiceConfig) -> Arc<UpdateSource> {
        let source = Arc::new(UpdateSource::new(service.topic_path_root.clone()));
        let previous = self
            .sources()
            .insert(service.name.clone(), source.clone());
        if let Some(previous) = previous {
            previous.close();
        }

        if source.register().is_ok() {
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
        Ok(Arc::new(LogUpdateContext {
            topic_path: service.topic_path(endpoint),
            topic_type: endpoint_type.topic_type(),
        }))
    }

    async fn remove_service(&self, service: &ServiceConfig) -> Result<(), PublishingError> {
        let source = self.sources().remove(&service.name);
        let Some(source) = source else {
            return Err(PublishingError::ServiceNotActive(service.name.clone()));
        };
        source.close();
        info!(
            event = events::LOG_BROKER_SERVICE_REMOVE,
            component = COMPONENT,
            service = service.name.as_str(),
            "service removed"
        );
        Ok(())
    }

    async fn for_service<'a>(&self, service: &ServiceConfig, task: BoxFuture<'a, ()>) -> bool {
        if !self.is_registered(&service.name) {
            return false;
        }
        task.await;
        true
    }
}

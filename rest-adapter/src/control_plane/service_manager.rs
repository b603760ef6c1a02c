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

//! Owns the running service sessions of the current model.

use crate::control_plane::endpoint_initializer::EndpointInitializer;
use crate::control_plane::service_listener::ServiceListener;
use crate::control_plane::service_starter::ServiceSessionStarter;
use crate::model::{Model, ServiceConfig};
use crate::observability::{events, PollListener};
use crate::polling::endpoint_poller::EndpointPoller;
use crate::polling::poll_handler::PublishingPollHandlerFactory;
use crate::polling::service_session::{ServiceSession, ServiceSessionError, ServiceSessionFactory};
use crate::publication::PublishingClient;
use crate::runtime::Scheduler;
use crate::topic_management::TopicManagementClient;
use futures::future::join_all;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

const COMPONENT: &str = "service_manager";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStartFailure {
    pub service: String,
    pub error: ServiceSessionError,
}

impl Display for ServiceStartFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.service, self.error)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceManagerError {
    #[error("{} service(s) failed to start: {}", .0.len(), format_failures(.0))]
    ServicesFailed(Vec<ServiceStartFailure>),
}

fn format_failures(failures: &[ServiceStartFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Everything needed to start services against one broker session and one HTTP layer.
#[derive(Clone)]
pub struct ServiceManagerContext {
    session_factory: ServiceSessionFactory,
    starter: ServiceSessionStarter,
    publishing: Arc<dyn PublishingClient>,
}

impl ServiceManagerContext {
    pub fn new(
        poller: Arc<dyn EndpointPoller>,
        topic_management: Arc<dyn TopicManagementClient>,
        publishing: Arc<dyn PublishingClient>,
        service_listener: Arc<dyn ServiceListener>,
        poll_listener: Arc<dyn PollListener>,
        scheduler: Scheduler,
    ) -> Self {
        let session_factory = ServiceSessionFactory::new(
            poller.clone(),
            Arc::new(PublishingPollHandlerFactory::new(publishing.clone())),
            poll_listener,
            scheduler.clone(),
        );
        let initializer = Arc::new(EndpointInitializer::new(
            poller,
            topic_management.clone(),
            publishing.clone(),
        ));
        let starter = ServiceSessionStarter::new(
            topic_management,
            publishing.clone(),
            initializer,
            service_listener,
            scheduler,
        );

        Self {
            session_factory,
            starter,
            publishing,
        }
    }
}

struct RunningService {
    config: ServiceConfig,
    session: ServiceSession,
    publishing: Arc<dyn PublishingClient>,
}

impl RunningService {
    async fn close(self) {
        self.session.stop().await;

        match self.publishing.remove_service(&self.config).await {
            Ok(()) => info!(
                event = events::SERVICE_CLOSE,
                component = COMPONENT,
                service = self.config.name.as_str(),
                session_id = self.session.session_id(),
                "service removed"
            ),
            Err(err) => warn!(
                event = events::SERVICE_REMOVE_FAILED,
                component = COMPONENT,
                service = self.config.name.as_str(),
                err = %err,
                "service removal failed"
            ),
        }
    }
}

/// Stop-everything-then-start-everything owner of the service sessions.
#[derive(Default)]
pub struct ServiceManager {
    services: Mutex<Vec<RunningService>>,
}

impl ServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every running service with one session per service of `model`.
    ///
    /// A service that cannot be started is reported in the error. All other services of the
    /// model are started regardless.
    pub async fn reconfigure(
        &self,
        context: &ServiceManagerContext,
        model: &Model,
    ) -> Result<(), ServiceManagerError> {
        let mut services = self.services.lock().await;
        info!(
            event = events::SERVICES_RECONFIGURE_START,
            component = COMPONENT,
            previous = services.len(),
            next = model.services.len(),
            "reconfiguring services"
        );
        close_all(&mut services).await;

        let mut failures = Vec::new();
        for config in &model.services {
            match context.session_factory.create(config) {
                Ok(session) => {
                    context.starter.start(config, &session);
                    services.push(RunningService {
                        config: config.clone(),
                        session,
                        publishing: context.publishing.clone(),
                    });
                }
                Err(error) => {
                    warn!(
                        event = events::SERVICE_START_FAILED,
                        component = COMPONENT,
                        service = config.name.as_str(),
                        err = %error,
                        "service not started"
                    );
                    failures.push(ServiceStartFailure {
                        service: config.name.clone(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            info!(
                event = events::SERVICES_RECONFIGURE_OK,
                component = COMPONENT,
                running = services.len(),
                "services reconfigured"
            );
            Ok(())
        } else {
            warn!(
                event = events::SERVICES_RECONFIGURE_FAILED,
                component = COMPONENT,
                running = services.len(),
                failed = failures.len(),
                "services reconfigured with failures"
            );
            Err(ServiceManagerError::ServicesFailed(failures))
        }
    }

    /// Stops every running service. Safe to call when nothing is running.
    pub async fn close(&self) {
        let mut services = self.services.lock().await;
        close_all(&mut services).await;
    }

    /// Names of the running services in model order.
    pub async fn running_services(&self) -> Vec<String> {
        self.services
            .lock()
            .await
            .iter()
            .map(|service| service.config.name.clone())
            .collect()
    }
}

async fn close_all(services: &mut Vec<RunningService>) {
    join_all(services.drain(..).map(RunningService::close)).await;
}

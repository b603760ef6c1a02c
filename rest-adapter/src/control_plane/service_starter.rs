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

//! Wires a new service session to the broker's activation events.

use crate::control_plane::endpoint_initializer::EndpointInitializer;
use crate::control_plane::service_listener::ServiceListener;
use crate::model::ServiceConfig;
use crate::observability::events;
use crate::polling::service_session::ServiceSession;
use crate::publication::PublishingClient;
use crate::runtime::Scheduler;
use crate::topic_management::TopicManagementClient;
use futures::future::join_all;
use std::sync::Arc;
use tracing::info;

const COMPONENT: &str = "service_starter";

/// Registers a service with the broker and brings its endpoints up each time the broker
/// makes it active.
#[derive(Clone)]
pub struct ServiceSessionStarter {
    topic_management: Arc<dyn TopicManagementClient>,
    publishing: Arc<dyn PublishingClient>,
    initializer: Arc<EndpointInitializer>,
    service_listener: Arc<dyn ServiceListener>,
    scheduler: Scheduler,
}

impl ServiceSessionStarter {
    pub fn new(
        topic_management: Arc<dyn TopicManagementClient>,
        publishing: Arc<dyn PublishingClient>,
        initializer: Arc<EndpointInitializer>,
        service_listener: Arc<dyn ServiceListener>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            topic_management,
            publishing,
            initializer,
            service_listener,
            scheduler,
        }
    }

    pub fn start(&self, service: &ServiceConfig, session: &ServiceSession) {
        self.topic_management.add_service(service);
        let source = self.publishing.add_service(service);

        let standby_service = service.clone();
        let standby_listener = self.service_listener.clone();

        let active_service = service.clone();
        let active_listener = self.service_listener.clone();
        let active_session = session.clone();
        let initializer = self.initializer.clone();
        let scheduler = self.scheduler.clone();

        let closed_service = service.clone();
        let closed_listener = self.service_listener.clone();

        source
            .on_standby(move || {
                info!(
                    event = events::SERVICE_STANDBY,
                    component = COMPONENT,
                    service = standby_service.name.as_str(),
                    "service on standby"
                );
                standby_listener.on_standby(&standby_service);
            })
            .on_active(move || {
                info!(
                    event = events::SERVICE_ACTIVE,
                    component = COMPONENT,
                    service = active_service.name.as_str(),
                    "service active"
                );
                active_listener.on_active(&active_service);
                scheduler.spawn(activate(
                    initializer.clone(),
                    active_service.clone(),
                    active_session.clone(),
                ));
            })
            .on_close(move || {
                info!(
                    event = events::SERVICE_CLOSE,
                    component = COMPONENT,
                    service = closed_service.name.as_str(),
                    "service closed"
                );
                closed_listener.on_remove(&closed_service);
            });
    }
}

async fn activate(
    initializer: Arc<EndpointInitializer>,
    service: ServiceConfig,
    session: ServiceSession,
) {
    if !session.start().await {
        return;
    }

    let outcomes = join_all(
        service
            .endpoints
            .iter()
            .map(|endpoint| initializer.initialise(&service, endpoint, &session)),
    )
    .await;
    let initialised = outcomes.iter().filter(|outcome| outcome.is_ok()).count();

    info!(
        event = events::SERVICE_START,
        component = COMPONENT,
        service = service.name.as_str(),
        session_id = session.session_id(),
        initialised,
        endpoints = service.endpoints.len(),
        "service endpoints initialised"
    );
}

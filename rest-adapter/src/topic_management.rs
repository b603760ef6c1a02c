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

//! Topic-management contract towards the broker.

use crate::content_type::EndpointType;
use crate::model::{EndpointConfig, ServiceConfig};
use crate::publication::TopicValue;
use async_trait::async_trait;
use thiserror::Error;

/// Successful outcome of a topic creation request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TopicCreation {
    Created,
    /// The topic was already present. Callers treat this exactly like [`TopicCreation::Created`].
    AlreadyExists,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopicCreationError {
    #[error("topic {topic_path} was rejected: {reason}")]
    Rejected { topic_path: String, reason: String },
    #[error("permission denied creating topic {0}")]
    PermissionDenied(String),
    #[error("broker session is closed")]
    SessionClosed,
}

#[async_trait]
pub trait TopicManagementClient: Send + Sync {
    /// Announces a service before any of its endpoints are added.
    fn add_service(&self, service: &ServiceConfig);

    /// Creates the topic for an endpoint, seeded with the first value when one is given.
    async fn add_endpoint(
        &self,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
        endpoint_type: EndpointType,
        initial_value: Option<TopicValue>,
    ) -> Result<TopicCreation, TopicCreationError>;
}

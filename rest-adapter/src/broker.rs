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

//! Broker session contract.

use crate::model::BrokerConfig;
use crate::publication::PublishingClient;
use crate::tls::TlsContext;
use crate::topic_management::TopicManagementClient;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Involuntary change of a live session reported by the broker.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionEvent {
    /// The connection dropped. The session object is no longer usable.
    Lost,
    /// The session was closed by the broker.
    Closed,
}

/// Callback receiving [`SessionEvent`]s for the session it was opened with.
pub type SessionListener = Arc<dyn Fn(SessionEvent) + Send + Sync>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("unable to connect to {broker}: {reason}")]
    ConnectionFailed { broker: String, reason: String },
    #[error("authentication rejected by {0}")]
    AuthenticationFailed(String),
    #[error("connection to {0} timed out")]
    Timeout(String),
}

/// A live connection to the messaging broker.
#[async_trait]
pub trait BrokerSession: Send + Sync {
    fn session_id(&self) -> String;

    fn topic_management(&self) -> Arc<dyn TopicManagementClient>;

    fn publishing(&self) -> Arc<dyn PublishingClient>;

    async fn close(&self);
}

#[async_trait]
pub trait BrokerSessionFactory: Send + Sync {
    /// Opens a session. `listener` receives loss and close notifications for its lifetime.
    async fn open(
        &self,
        broker: &BrokerConfig,
        tls: Option<&TlsContext>,
        listener: SessionListener,
    ) -> Result<Arc<dyn BrokerSession>, SessionError>;
}

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

//! Publishing contract towards the broker.
//!
//! A [`PublishingClient`] hands out one [`UpdateSource`] per service. The source reports when
//! the broker made the service active, and endpoint results are pushed through an
//! [`UpdateContext`] bound to one topic.

use crate::content_type::{EndpointType, TopicType};
use crate::model::{EndpointConfig, ServiceConfig};
use crate::observability::events;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::debug;

const COMPONENT: &str = "update_source";

/// A value published to a topic.
#[derive(Clone, Debug, PartialEq)]
pub enum TopicValue {
    Json(serde_json::Value),
    Text(String),
    Binary(Bytes),
}

impl TopicValue {
    pub fn topic_type(&self) -> TopicType {
        match self {
            TopicValue::Json(_) => TopicType::Json,
            TopicValue::Text(_) | TopicValue::Binary(_) => TopicType::Binary,
        }
    }

    /// Wire representation: serialized JSON, UTF-8 text or the raw bytes.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            TopicValue::Json(value) => Bytes::from(value.to_string()),
            TopicValue::Text(text) => Bytes::from(text.clone()),
            TopicValue::Binary(bytes) => bytes.clone(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishingError {
    #[error("service {0} has not been added or is not active")]
    ServiceNotActive(String),
    #[error("update source for {0} has already been registered")]
    AlreadyRegistered(String),
    #[error("a {value:?} value cannot be published to the {topic:?} topic {topic_path}")]
    ValueMismatch {
        topic_path: String,
        topic: TopicType,
        value: TopicType,
    },
    #[error("update of {topic_path} failed: {reason}")]
    UpdateFailed { topic_path: String, reason: String },
    #[error("broker session is closed")]
    SessionClosed,
}

/// Publishing handle bound to the topic of one endpoint.
pub trait UpdateContext: Send + Sync {
    fn topic_path(&self) -> &str;

    /// Sends one update. Completion of the update on the broker is not awaited.
    fn publish(&self, value: TopicValue) -> Result<(), PublishingError>;
}

#[async_trait]
pub trait PublishingClient: Send + Sync {
    /// Registers an update source for a service. Its hooks report broker-side activation.
    fn add_service(&self, service: &ServiceConfig) -> Arc<UpdateSource>;

    fn create_update_context(
        &self,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
        endpoint_type: EndpointType,
    ) -> Result<Arc<dyn UpdateContext>, PublishingError>;

    /// Closes the update source of a service and waits for the broker to release it.
    async fn remove_service(&self, service: &ServiceConfig) -> Result<(), PublishingError>;

    /// Runs `task` only while `service` is still registered. Returns whether it ran.
    async fn for_service<'a>(&self, service: &ServiceConfig, task: BoxFuture<'a, ()>) -> bool;
}

/// Registration state of an [`UpdateSource`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpdateSourceState {
    Unregistered,
    Standby,
    Active,
    Closed,
}

type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Hooks {
    on_standby: Vec<Hook>,
    on_active: Vec<Hook>,
    on_close: Vec<Hook>,
}

struct UpdateSourceInner {
    state: UpdateSourceState,
    hooks: Hooks,
}

/// Evented registration of a service with the broker.
///
/// `Unregistered -> Standby <-> Active -> Closed`. Hooks run outside the internal lock, and a
/// hook added while the source is already in the matching state runs immediately.
pub struct UpdateSource {
    topic_path: String,
    inner: Mutex<UpdateSourceInner>,
}

impl UpdateSource {
    pub fn new(topic_path: impl Into<String>) -> Self {
        Self {
            topic_path: topic_path.into(),
            inner: Mutex::new(UpdateSourceInner {
                state: UpdateSourceState::Unregistered,
                hooks: Hooks::default(),
            }),
        }
    }

    pub fn topic_path(&self) -> &str {
        &self.topic_path
    }

    pub fn state(&self) -> UpdateSourceState {
        self.lock().state
    }

    pub fn on_standby(&self, hook: impl Fn() + Send + Sync + 'static) -> &Self {
        self.add_hook(UpdateSourceState::Standby, Arc::new(hook))
    }

    pub fn on_active(&self, hook: impl Fn() + Send + Sync + 'static) -> &Self {
        self.add_hook(UpdateSourceState::Active, Arc::new(hook))
    }

    pub fn on_close(&self, hook: impl Fn() + Send + Sync + 'static) -> &Self {
        self.add_hook(UpdateSourceState::Closed, Arc::new(hook))
    }

    /// Moves an unregistered source to standby.
    pub fn register(&self) -> Result<(), PublishingError> {
        let hooks = {
            let mut inner = self.lock();
            if inner.state != UpdateSourceState::Unregistered {
                return Err(PublishingError::AlreadyRegistered(self.topic_path.clone()));
            }
            self.transition(&mut inner, UpdateSourceState::Standby);
            inner.hooks.on_standby.clone()
        };
        run_hooks(&hooks);
        Ok(())
    }

    /// The broker made this source the active publisher. Ignored unless on standby.
    pub fn activate(&self) {
        self.move_between(UpdateSourceState::Standby, UpdateSourceState::Active);
    }

    /// The broker moved this source back to standby. Ignored unless active.
    pub fn standby(&self) {
        self.move_between(UpdateSourceState::Active, UpdateSourceState::Standby);
    }

    /// Closes the source. Close hooks run once.
    pub fn close(&self) {
        let hooks = {
            let mut inner = self.lock();
            if inner.state == UpdateSourceState::Closed {
                return;
            }
            self.transition(&mut inner, UpdateSourceState::Closed);
            inner.hooks.on_close.clone()
        };
        run_hooks(&hooks);
    }

    fn move_between(&self, from: UpdateSourceState, to: UpdateSourceState) {
        let hooks = {
            let mut inner = self.lock();
            if inner.state != from {
                return;
            }
            self.transition(&mut inner, to);
            match to {
                UpdateSourceState::Active => inner.hooks.on_active.clone(),
                _ => inner.hooks.on_standby.clone(),
            }
        };
        run_hooks(&hooks);
    }

    fn add_hook(&self, state: UpdateSourceState, hook: Hook) -> &Self {
        let run_now = {
            let mut inner = self.lock();
            let hooks = match state {
                UpdateSourceState::Standby => &mut inner.hooks.on_standby,
                UpdateSourceState::Active => &mut inner.hooks.on_active,
                _ => &mut inner.hooks.on_close,
            };
            hooks.push(hook.clone());
            inner.state == state
        };
        if run_now {
            hook();
        }
        self
    }

    fn transition(&self, inner: &mut UpdateSourceInner, to: UpdateSourceState) {
        debug!(
            event = events::UPDATE_SOURCE_TRANSITION,
            component = COMPONENT,
            topic_path = self.topic_path.as_str(),
            from_state = ?inner.state,
            to_state = ?to,
            "update source transition"
        );
        inner.state = to;
    }

    fn lock(&self) -> MutexGuard<'_, UpdateSourceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for UpdateSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSource")
            .field("topic_path", &self.topic_path)
            .field("state", &self.state())
            .finish()
    }
}

fn run_hooks(hooks: &[Hook]) {
    for hook in hooks {
        hook();
    }
}

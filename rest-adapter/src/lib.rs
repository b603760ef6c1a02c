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

//! # rest-adapter
//!
//! `rest-adapter` polls REST endpoints and republishes every result as an update of a topic on
//! a publish/subscribe broker.
//!
//! Typical usage is centered on [`AdapterLifecycle`]: build it with a
//! [`BrokerSessionFactory`] and an [`EndpointPollerFactory`], then hand it every new
//! [`Model`] snapshot. The lifecycle connects to the broker, starts one [`ServiceSession`]
//! per configured service and rebuilds only what a model change affects.
//!
//! ## Layers
//!
//! - [`polling`]: one-shot HTTP requests and the per-service steady-state poll loops.
//! - [`content_type`]: payload kinds, inference from `content-type` and response parsing.
//! - [`control_plane`]: endpoint bring-up, service reconciliation and the adapter state
//!   machine.
//! - [`broker`], [`publication`], [`topic_management`]: contracts towards the broker.
//! - [`runtime`]: the shared scheduler every component receives at construction.
//! - [`observability`]: structured log vocabulary and poll metrics hooks.
//!
//! ## Observability model
//!
//! Logs are `tracing` events carrying `event` and `component` fields plus the service,
//! endpoint and session they concern. Library code never installs a global subscriber;
//! binaries and tests initialise `tracing_subscriber` once at process boundaries.
//!
//! ## Endpoint bring-up
//!
//! When the broker makes a service active each endpoint is requested once. The response
//! decides (`produces: "auto"`) or validates the endpoint's payload kind, the topic is
//! created seeded with the first value, and only then does the endpoint join the session's
//! fixed-delay polling. A failure at any stage leaves that one endpoint idle until the
//! service is reconfigured.
//!
//! ```
//! use rest_adapter::{resolve_endpoint_type, EndpointConfig, EndpointResponse, EndpointType};
//!
//! let endpoint = EndpointConfig::new("status", "/status", "status", "auto");
//! let response = EndpointResponse::new(200, r#"{"up":true}"#)
//!     .with_header("Content-Type", "application/json; charset=utf-8");
//!
//! assert_eq!(resolve_endpoint_type(&endpoint, &response), Ok(EndpointType::Json));
//! ```

pub mod broker;
pub mod content_type;
pub mod control_plane;
pub mod model;
#[doc(hidden)]
pub mod observability;
pub mod polling;
pub mod publication;
pub mod runtime;
pub mod tls;
pub mod topic_management;

pub use broker::{BrokerSession, BrokerSessionFactory, SessionError, SessionEvent, SessionListener};
pub use content_type::{resolve as resolve_endpoint_type, ContentTypeError, EndpointType, TopicType};
pub use control_plane::adapter_lifecycle::{
    AdapterLifecycle, AdapterLifecycleBuilder, AdapterState, LifecycleError,
};
pub use control_plane::endpoint_initializer::{EndpointInitializer, InitialisationError};
pub use control_plane::service_listener::{NullServiceListener, ServiceListener};
pub use control_plane::service_manager::{
    ServiceManager, ServiceManagerContext, ServiceManagerError, ServiceStartFailure,
};
pub use control_plane::service_starter::ServiceSessionStarter;
pub use model::{
    BasicAuthenticationConfig, BrokerConfig, EndpointConfig, MetricsConfig, Model,
    SecurityConfig, ServiceConfig, PRODUCES_AUTO,
};
pub use observability::{CountingPollListener, NoopPollListener, PollListener, PollMetricsSnapshot};
pub use polling::{
    EndpointPoller, EndpointPollerFactory, EndpointResponse, PollError, PollHandlerFactory,
    PollResultHandler, PublishingPollHandlerFactory, ReqwestEndpointPoller,
    ReqwestEndpointPollerFactory, ServiceSession, ServiceSessionError, ServiceSessionFactory,
};
pub use publication::{
    PublishingClient, PublishingError, TopicValue, UpdateContext, UpdateSource, UpdateSourceState,
};
pub use runtime::{ScheduledTask, Scheduler};
pub use tls::{TlsContext, TlsError};
pub use topic_management::{TopicCreation, TopicCreationError, TopicManagementClient};

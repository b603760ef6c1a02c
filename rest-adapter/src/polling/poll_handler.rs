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

//! Downstream handling of steady-state poll results.

use crate::content_type::EndpointType;
use crate::model::{EndpointConfig, ServiceConfig};
use crate::observability::{events, fields};
use crate::polling::endpoint_poller::{EndpointResponse, PollError};
use crate::polling::service_session::ServiceSessionError;
use crate::publication::{PublishingClient, UpdateContext};
use std::sync::Arc;
use tracing::{debug, warn};

const COMPONENT: &str = "poll_handler";

/// Receives the outcome of every poll cycle of one endpoint.
///
/// Called while the owning session's lock is held, so implementations must not block.
pub trait PollResultHandler: Send + Sync {
    fn handle(&self, result: Result<EndpointResponse, PollError>);
}

pub trait PollHandlerFactory: Send + Sync {
    fn create(
        &self,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
    ) -> Result<Arc<dyn PollResultHandler>, ServiceSessionError>;
}

/// Parses each response with the endpoint's resolved type and publishes it to its topic.
pub struct PublishingPollHandlerFactory {
    publishing: Arc<dyn PublishingClient>,
}

impl PublishingPollHandlerFactory {
    pub fn new(publishing: Arc<dyn PublishingClient>) -> Self {
        Self { publishing }
    }
}

impl PollHandlerFactory for PublishingPollHandlerFactory {
    fn create(
        &self,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
    ) -> Result<Arc<dyn PollResultHandler>, ServiceSessionError> {
        let endpoint_type = EndpointType::from_identifier(&endpoint.produces)?;
        let update_context =
            self.publishing
                .create_update_context(service, endpoint, endpoint_type)?;

        Ok(Arc::new(PublishingPollHandler {
            endpoint_label: fields::format_endpoint(service, endpoint),
            endpoint_type,
            update_context,
        }))
    }
}

struct PublishingPollHandler {
    endpoint_label: String,
    endpoint_type: EndpointType,
    update_context: Arc<dyn UpdateContext>,
}

impl PollResultHandler for PublishingPollHandler {
    fn handle(&self, result: Result<EndpointResponse, PollError>) {
        let published = result
            .and_then(|response| self.endpoint_type.parse(&response))
            .map_err(|err| err.to_string())
            .and_then(|value| {
                self.update_context
                    .publish(value)
                    .map_err(|err| err.to_string())
            });

        match published {
            Ok(()) => debug!(
                event = events::POLL_PUBLISH_OK,
                component = COMPONENT,
                endpoint = self.endpoint_label.as_str(),
                topic_path = self.update_context.topic_path(),
                "published poll result"
            ),
            Err(err) => warn!(
                event = events::POLL_PUBLISH_FAILED,
                component = COMPONENT,
                endpoint = self.endpoint_label.as_str(),
                topic_path = self.update_context.topic_path(),
                err = err.as_str(),
                "poll result not published"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PollHandlerFactory, PublishingPollHandlerFactory};
    use crate::content_type::EndpointType;
    use crate::model::{EndpointConfig, ServiceConfig};
    use crate::polling::endpoint_poller::{EndpointResponse, PollError};
    use crate::polling::service_session::ServiceSessionError;
    use crate::publication::{
        PublishingClient, PublishingError, TopicValue, UpdateContext, UpdateSource,
    };
    use async_trait::async_trait;
    use futures::future::BoxFuture;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingContext {
        published: Mutex<Vec<TopicValue>>,
    }

    impl UpdateContext for RecordingContext {
        fn topic_path(&self) -> &str {
            "root/ep"
        }

        fn publish(&self, value: TopicValue) -> Result<(), PublishingError> {
            self.published.lock().expect("lock published").push(value);
            Ok(())
        }
    }

    struct SingleContextClient {
        context: Arc<RecordingContext>,
    }

    #[async_trait]
    impl PublishingClient for SingleContextClient {
        fn add_service(&self, service: &ServiceConfig) -> Arc<UpdateSource> {
            Arc::new(UpdateSource::new(service.topic_path_root.clone()))
        }

        fn create_update_context(
            &self,
            _service: &ServiceConfig,
            _endpoint: &EndpointConfig,
            _endpoint_type: EndpointType,
        ) -> Result<Arc<dyn UpdateContext>, PublishingError> {
            Ok(self.context.clone())
        }

        async fn remove_service(&self, _service: &ServiceConfig) -> Result<(), PublishingError> {
            Ok(())
        }

        async fn for_service<'a>(&self, _service: &ServiceConfig, task: BoxFuture<'a, ()>) -> bool {
            task.await;
            true
        }
    }

    fn factory() -> (Arc<RecordingContext>, PublishingPollHandlerFactory) {
        let context = Arc::new(RecordingContext::default());
        let client = SingleContextClient {
            context: context.clone(),
        };
        (context, PublishingPollHandlerFactory::new(Arc::new(client)))
    }

    #[test]
    fn handler_publishes_parsed_json() {
        let (context, factory) = factory();
        let service = ServiceConfig::new("svc", "localhost", 80, "root");
        let endpoint = EndpointConfig::new("ep", "/ep", "ep", "json");

        let handler = factory
            .create(&service, &endpoint)
            .expect("handler should be created");
        handler.handle(Ok(EndpointResponse::new(200, r#"{"value":1}"#)));
        handler.handle(Err(PollError::Status(500)));
        handler.handle(Ok(EndpointResponse::new(200, "not json")));

        assert_eq!(
            *context.published.lock().expect("lock published"),
            vec![TopicValue::Json(serde_json::json!({"value": 1}))]
        );
    }

    #[test]
    fn unresolved_produces_is_rejected_when_creating_handler() {
        let (_context, factory) = factory();
        let service = ServiceConfig::new("svc", "localhost", 80, "root");
        let endpoint = EndpointConfig::new("ep", "/ep", "ep", "auto");

        let result = factory.create(&service, &endpoint);

        assert!(matches!(result, Err(ServiceSessionError::ContentType(_))));
    }
}

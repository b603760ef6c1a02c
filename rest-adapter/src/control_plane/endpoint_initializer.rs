//! One-time bring-up of an endpoint: first request, type resolution, topic creation and
//! hand-off to the service session.

use crate::content_type::{self, ContentTypeError, EndpointType};
use crate::model::{EndpointConfig, ServiceConfig};
use crate::observability::{events, fields};
use crate::polling::endpoint_poller::{EndpointPoller, PollError};
use crate::polling::service_session::{ServiceSession, ServiceSessionError};
use crate::publication::PublishingClient;
use crate::topic_management::{TopicCreation, TopicCreationError, TopicManagementClient};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const COMPONENT: &str = "endpoint_initializer";

/// Why an endpoint was not brought up. Each stage fails only its own endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InitialisationError {
    #[error("initial request failed: {0}")]
    InitialRequestFailed(PollError),
    #[error("initial request cancelled")]
    InitialRequestCancelled,
    #[error("content type {content_type} does not match the declared type {endpoint_type}")]
    ContentTypeMismatch {
        content_type: String,
        endpoint_type: EndpointType,
    },
    #[error("unsupported endpoint type \"{0}\"")]
    UnsupportedProduces(String),
    #[error("topic creation failed: {0}")]
    TopicCreationFailed(TopicCreationError),
    #[error("unable to bind the endpoint for publishing: {0}")]
    UpdateContextUnavailable(ServiceSessionError),
    #[error("service {0} was removed during initialisation")]
    ServiceRemoved(String),
}

impl From<ContentTypeError> for InitialisationError {
    fn from(err: ContentTypeError) -> Self {
        match err {
            ContentTypeError::UnsupportedProduces(produces) => {
                InitialisationError::UnsupportedProduces(produces)
            }
            ContentTypeError::Mismatch {
                content_type,
                endpoint_type,
            } => InitialisationError::ContentTypeMismatch {
                content_type,
                endpoint_type,
            },
        }
    }
}

impl From<PollError> for InitialisationError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Cancelled => InitialisationError::InitialRequestCancelled,
            other => InitialisationError::InitialRequestFailed(other),
        }
    }
}

/// Drives endpoints from configured to polling.
pub struct EndpointInitializer {
    poller: Arc<dyn EndpointPoller>,
    topic_management: Arc<dyn TopicManagementClient>,
    publishing: Arc<dyn PublishingClient>,
}

impl EndpointInitializer {
    pub fn new(
        poller: Arc<dyn EndpointPoller>,
        topic_management: Arc<dyn TopicManagementClient>,
        publishing: Arc<dyn PublishingClient>,
    ) -> Self {
        Self {
            poller,
            topic_management,
            publishing,
        }
    }

    /// Brings up one endpoint and returns its resolved type.
    ///
    /// Failures are logged here. The endpoint is not retried until the service is
    /// reconfigured.
    pub async fn initialise(
        &self,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
        session: &ServiceSession,
    ) -> Result<EndpointType, InitialisationError> {
        let label = fields::format_endpoint(service, endpoint);
        debug!(
            event = events::ENDPOINT_INIT_START,
            component = COMPONENT,
            endpoint = label.as_str(),
            url = endpoint.url.as_str(),
            produces = endpoint.produces.as_str(),
            "initialising endpoint"
        );

        match self.bring_up(service, endpoint, session).await {
            Ok(endpoint_type) => {
                info!(
                    event = events::ENDPOINT_INIT_OK,
                    component = COMPONENT,
                    endpoint = label.as_str(),
                    endpoint_type = %endpoint_type,
                    topic_path = service.topic_path(endpoint).as_str(),
                    "endpoint initialised"
                );
                Ok(endpoint_type)
            }
            Err(InitialisationError::ServiceRemoved(service_name)) => {
                debug!(
                    event = events::ENDPOINT_INIT_SKIPPED,
                    component = COMPONENT,
                    endpoint = label.as_str(),
                    reason = fields::REASON_SERVICE_REMOVED,
                    "service removed before endpoint was bound"
                );
                Err(InitialisationError::ServiceRemoved(service_name))
            }
            Err(err) => {
                warn!(
                    event = events::ENDPOINT_INIT_FAILED,
                    component = COMPONENT,
                    endpoint = label.as_str(),
                    url = endpoint.url.as_str(),
                    err = %err,
                    "endpoint not initialised"
                );
                Err(err)
            }
        }
    }

    async fn bring_up(
        &self,
        service: &ServiceConfig,
        endpoint: &EndpointConfig,
        session: &ServiceSession,
    ) -> Result<EndpointType, InitialisationError> {
        ensure_live(service, session).await?;
        let response = self.poller.request(service, endpoint).await?;
        let endpoint_type = content_type::resolve(endpoint, &response)?;
        let initial_value = endpoint_type.parse(&response)?;
        let resolved = endpoint.with_produces(endpoint_type.identifier());

        ensure_live(service, session).await?;

        let creation = self
            .topic_management
            .add_endpoint(service, &resolved, endpoint_type, Some(initial_value))
            .await
            .map_err(InitialisationError::TopicCreationFailed)?;
        if creation == TopicCreation::AlreadyExists {
            debug!(
                event = events::ENDPOINT_TOPIC_EXISTS,
                component = COMPONENT,
                endpoint = fields::format_endpoint(service, endpoint).as_str(),
                topic_path = service.topic_path(endpoint).as_str(),
                "topic already exists"
            );
        }

        let mut added = None;
        let added_slot = &mut added;
        let ran = self
            .publishing
            .for_service(
                service,
                Box::pin(async move {
                    *added_slot = Some(session.add_endpoint(resolved).await);
                }),
            )
            .await;

        match added {
            Some(Ok(())) => Ok(endpoint_type),
            Some(Err(err)) => Err(InitialisationError::UpdateContextUnavailable(err)),
            None if ran => Ok(endpoint_type),
            None => Err(InitialisationError::ServiceRemoved(service.name.clone())),
        }
    }
}

/// Fails once the session has been stopped, so no broker state is created for a removed
/// service.
async fn ensure_live(
    service: &ServiceConfig,
    session: &ServiceSession,
) -> Result<(), InitialisationError> {
    if session.is_stopped().await {
        return Err(InitialisationError::ServiceRemoved(service.name.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::InitialisationError;
    use crate::content_type::{ContentTypeError, EndpointType};
    use crate::polling::endpoint_poller::PollError;

    #[test]
    fn content_type_errors_map_to_stage_errors() {
        assert_eq!(
            InitialisationError::from(ContentTypeError::UnsupportedProduces("xml".to_string())),
            InitialisationError::UnsupportedProduces("xml".to_string())
        );
        assert_eq!(
            InitialisationError::from(ContentTypeError::Mismatch {
                content_type: "text/plain".to_string(),
                endpoint_type: EndpointType::Json,
            }),
            InitialisationError::ContentTypeMismatch {
                content_type: "text/plain".to_string(),
                endpoint_type: EndpointType::Json,
            }
        );
    }

    #[test]
    fn cancelled_first_request_is_distinguished_from_failure() {
        assert_eq!(
            InitialisationError::from(PollError::Cancelled),
            InitialisationError::InitialRequestCancelled
        );
        assert_eq!(
            InitialisationError::from(PollError::Status(404)),
            InitialisationError::InitialRequestFailed(PollError::Status(404))
        );
    }
}

#![allow(dead_code)]

use integration_test_utils::{
    eventually, FakeBrokerSession, FakeBrokerSessionFactory, FakePollerFactory,
    RecordingPublishingClient, RecordingServiceListener, RecordingTopicManagementClient,
    ScriptedEndpointPoller,
};
use rest_adapter::{
    AdapterLifecycle, AdapterState, CountingPollListener, NullServiceListener, Scheduler,
    ServiceManagerContext,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const SETTLE: Duration = Duration::from_secs(1);

/// An adapter lifecycle wired to recording fakes for every collaborator.
pub(crate) struct Harness {
    pub(crate) poller: Arc<ScriptedEndpointPoller>,
    pub(crate) poller_factory: Arc<FakePollerFactory>,
    pub(crate) topics: Arc<RecordingTopicManagementClient>,
    pub(crate) publishing: Arc<RecordingPublishingClient>,
    pub(crate) broker: Arc<FakeBrokerSessionFactory>,
    pub(crate) service_listener: Arc<RecordingServiceListener>,
    pub(crate) poll_metrics: Arc<CountingPollListener>,
    pub(crate) shutdowns: Arc<AtomicUsize>,
    pub(crate) lifecycle: AdapterLifecycle,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_publishing(RecordingPublishingClient::new())
    }

    pub(crate) fn with_publishing(publishing: RecordingPublishingClient) -> Self {
        integration_test_utils::init_logging();

        let poller = Arc::new(ScriptedEndpointPoller::new());
        let poller_factory = Arc::new(FakePollerFactory::new(poller.clone()));
        let topics = Arc::new(RecordingTopicManagementClient::new());
        let publishing = Arc::new(publishing);
        let broker = Arc::new(FakeBrokerSessionFactory::new(
            topics.clone(),
            publishing.clone(),
        ));
        let service_listener = Arc::new(RecordingServiceListener::new());
        let poll_metrics = Arc::new(CountingPollListener::default());
        let shutdowns = Arc::new(AtomicUsize::new(0));

        let shutdown_count = shutdowns.clone();
        let lifecycle =
            AdapterLifecycle::builder(broker.clone(), poller_factory.clone(), Scheduler::current())
                .service_listener(service_listener.clone())
                .poll_listener(poll_metrics.clone())
                .on_shutdown(move || {
                    shutdown_count.fetch_add(1, Ordering::SeqCst);
                })
                .build();

        Self {
            poller,
            poller_factory,
            topics,
            publishing,
            broker,
            service_listener,
            poll_metrics,
            shutdowns,
            lifecycle,
        }
    }

    pub(crate) fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait_for_state(&self, state: AdapterState) -> bool {
        eventually(SETTLE, || async move { self.lifecycle.state().await == state }).await
    }

    pub(crate) async fn wait_for_publications(&self, topic_path: &str, count: usize) -> bool {
        self.wait_until(SETTLE, || self.publishing.publications_to(topic_path).len() >= count)
            .await
    }

    pub(crate) async fn wait_until(&self, timeout: Duration, condition: impl Fn() -> bool) -> bool {
        eventually(timeout, || {
            let holds = condition();
            async move { holds }
        })
        .await
    }

    pub(crate) fn latest_session(&self) -> Arc<FakeBrokerSession> {
        self.broker
            .latest_session()
            .expect("a broker session should have been opened")
    }
}

pub(crate) fn manager_context(
    poller: Arc<ScriptedEndpointPoller>,
    topics: Arc<RecordingTopicManagementClient>,
    publishing: Arc<RecordingPublishingClient>,
) -> ServiceManagerContext {
    integration_test_utils::init_logging();

    ServiceManagerContext::new(
        poller,
        topics,
        publishing,
        Arc::new(NullServiceListener),
        Arc::new(CountingPollListener::default()),
        Scheduler::current(),
    )
}

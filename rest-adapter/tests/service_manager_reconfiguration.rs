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

mod support;

use integration_test_utils::{
    eventually, json_endpoint, json_response, model, service, RecordingPublishingClient,
    RecordingTopicManagementClient, ScriptedEndpointPoller,
};
use rest_adapter::{ServiceManager, ServiceManagerError, ServiceSessionError};
use serde_json::json;
use std::sync::Arc;
use support::{manager_context, SETTLE};

struct Fixture {
    poller: Arc<ScriptedEndpointPoller>,
    topics: Arc<RecordingTopicManagementClient>,
    publishing: Arc<RecordingPublishingClient>,
}

impl Fixture {
    fn new(endpoints: &[&str]) -> Self {
        let poller = Arc::new(ScriptedEndpointPoller::new());
        for endpoint in endpoints {
            poller.respond(endpoint, Ok(json_response(json!({ "endpoint": endpoint }))));
        }
        Self {
            poller,
            topics: Arc::new(RecordingTopicManagementClient::new()),
            publishing: Arc::new(RecordingPublishingClient::new()),
        }
    }
}

fn removals(publishing: &RecordingPublishingClient, service: &str) -> usize {
    publishing
        .removed_services()
        .iter()
        .filter(|removed| removed.as_str() == service)
        .count()
}

#[tokio::test(flavor = "multi_thread")]
async fn reconfigure_keeps_exactly_the_services_of_the_new_model() {
    let fixture = Fixture::new(&["a1", "b1", "c1"]);
    let context = manager_context(
        fixture.poller.clone(),
        fixture.topics.clone(),
        fixture.publishing.clone(),
    );
    let manager = ServiceManager::new();

    let model_a = model(vec![
        service("a", 1_000, vec![json_endpoint("a1")]),
        service("b", 1_000, vec![json_endpoint("b1")]),
    ]);
    manager
        .reconfigure(&context, &model_a)
        .await
        .expect("model A should start");
    assert_eq!(manager.running_services().await, vec!["a", "b"]);

    let model_b = model(vec![
        service("b", 1_000, vec![json_endpoint("b1")]),
        service("c", 1_000, vec![json_endpoint("c1")]),
    ]);
    manager
        .reconfigure(&context, &model_b)
        .await
        .expect("model B should start");

    assert_eq!(manager.running_services().await, vec!["b", "c"]);
    assert_eq!(removals(&fixture.publishing, "a"), 1);
    assert_eq!(removals(&fixture.publishing, "c"), 0);
    assert!(fixture.publishing.source("a").is_none());
    assert!(fixture.publishing.source("c").is_some());

    let publishing = &fixture.publishing;
    assert!(
        eventually(SETTLE, || async move {
            !publishing.publications_to("rest/c/c1").is_empty()
        })
        .await
    );
}

#[tokio::test(start_paused = true)]
async fn service_replaced_before_activation_touches_neither_endpoint_nor_broker() {
    let fixture = Fixture::new(&["a1", "b1"]);
    let context = manager_context(
        fixture.poller.clone(),
        fixture.topics.clone(),
        fixture.publishing.clone(),
    );
    let manager = ServiceManager::new();

    manager
        .reconfigure(&context, &model(vec![service("a", 1_000, vec![json_endpoint("a1")])]))
        .await
        .expect("model A should start");
    manager
        .reconfigure(&context, &model(vec![service("b", 1_000, vec![json_endpoint("b1")])]))
        .await
        .expect("model B should start");

    tokio::time::sleep(std::time::Duration::from_secs(3)).await;

    assert_eq!(fixture.poller.requests("a1"), 0);
    assert!(fixture.topics.topic_creations("rest/a/a1").is_empty());
    assert!(fixture.publishing.publications_to("rest/a/a1").is_empty());
    assert_eq!(fixture.publishing.removed_services(), vec!["a"]);
    assert_eq!(fixture.topics.topic_creations("rest/b/b1").len(), 1);
    assert!(!fixture.publishing.publications_to("rest/b/b1").is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_poll_period_is_reported_while_other_services_start() {
    let fixture = Fixture::new(&["ok1", "bad1"]);
    let context = manager_context(
        fixture.poller.clone(),
        fixture.topics.clone(),
        fixture.publishing.clone(),
    );
    let manager = ServiceManager::new();

    let result = manager
        .reconfigure(
            &context,
            &model(vec![
                service("bad", 0, vec![json_endpoint("bad1")]),
                service("ok", 1_000, vec![json_endpoint("ok1")]),
            ]),
        )
        .await;

    let failures = match result {
        Err(ServiceManagerError::ServicesFailed(failures)) => failures,
        other => panic!("expected the zero poll period to be reported, got {other:?}"),
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].service, "bad");
    assert_eq!(
        failures[0].error,
        ServiceSessionError::InvalidPollPeriod {
            service: "bad".to_string(),
            poll_period_ms: 0,
        }
    );
    assert_eq!(manager.running_services().await, vec!["ok"]);

    let publishing = &fixture.publishing;
    assert!(
        eventually(SETTLE, || async move {
            !publishing.publications_to("rest/ok/ok1").is_empty()
        })
        .await
    );
    assert_eq!(fixture.poller.requests("bad1"), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn close_removes_every_service_exactly_once() {
    let fixture = Fixture::new(&["a1", "b1"]);
    let context = manager_context(
        fixture.poller.clone(),
        fixture.topics.clone(),
        fixture.publishing.clone(),
    );
    let manager = ServiceManager::new();

    manager
        .reconfigure(
            &context,
            &model(vec![
                service("a", 1_000, vec![json_endpoint("a1")]),
                service("b", 1_000, vec![json_endpoint("b1")]),
            ]),
        )
        .await
        .expect("services should start");

    manager.close().await;
    manager.close().await;

    assert!(manager.running_services().await.is_empty());
    assert_eq!(removals(&fixture.publishing, "a"), 1);
    assert_eq!(removals(&fixture.publishing, "b"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_model_stops_all_services() {
    let fixture = Fixture::new(&["a1"]);
    let context = manager_context(
        fixture.poller.clone(),
        fixture.topics.clone(),
        fixture.publishing.clone(),
    );
    let manager = ServiceManager::new();

    manager
        .reconfigure(&context, &model(vec![service("a", 1_000, vec![json_endpoint("a1")])]))
        .await
        .expect("service should start");
    manager
        .reconfigure(&context, &model(vec![]))
        .await
        .expect("empty model should apply");

    assert!(manager.running_services().await.is_empty());
    assert_eq!(fixture.publishing.removed_services(), vec!["a"]);
}

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

use integration_test_utils::{json_endpoint, json_response, model, service};
use rest_adapter::{AdapterState, BrokerConfig, LifecycleError, Model, SessionError, SessionEvent};
use serde_json::json;
use std::time::Duration;
use support::{Harness, SETTLE};

const TOPIC: &str = "rest/weather/current";

fn weather_model() -> Model {
    model(vec![service("weather", 1_000, vec![json_endpoint("current")])])
}

fn scripted_harness() -> Harness {
    let harness = Harness::new();
    harness
        .poller
        .respond("current", Ok(json_response(json!({"value": 1}))));
    harness
}

#[tokio::test(start_paused = true)]
async fn lost_session_moves_to_recovering_and_stops_polling() {
    let harness = scripted_harness();
    harness
        .lifecycle
        .on_reconfiguration(weather_model())
        .await
        .expect("reconfiguration should succeed");
    assert!(harness.wait_for_publications(TOPIC, 1).await);

    let session = harness.latest_session();
    session.emit(SessionEvent::Lost);

    assert!(harness.wait_for_state(AdapterState::Recovering).await);
    assert_eq!(session.close_calls(), 0);
    assert_eq!(harness.publishing.removed_services(), vec!["weather"]);
    assert!(harness.lifecycle.running_services().await.is_empty());

    let requested = harness.poller.requests("current");
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(harness.poller.requests("current"), requested);

    harness
        .lifecycle
        .on_reconfiguration(weather_model())
        .await
        .expect("reconnect should start");

    assert!(harness.wait_for_state(AdapterState::Active).await);
    assert_eq!(harness.broker.open_calls(), 2);
    let published = harness.publishing.publications_to(TOPIC).len();
    assert!(harness.wait_for_publications(TOPIC, published + 1).await);
}

#[tokio::test(start_paused = true)]
async fn notifications_from_a_replaced_session_are_ignored() {
    let harness = scripted_harness();
    harness
        .lifecycle
        .on_reconfiguration(weather_model())
        .await
        .expect("reconfiguration should succeed");
    assert!(harness.wait_for_state(AdapterState::Active).await);
    let first = harness.latest_session();

    let mut moved = weather_model();
    moved.broker = BrokerConfig::new("other-broker.test", 8080);
    harness
        .lifecycle
        .on_reconfiguration(moved)
        .await
        .expect("reconfiguration should succeed");
    assert!(
        harness
            .wait_until(SETTLE, || harness.broker.sessions().len() == 2)
            .await
    );
    assert!(harness.wait_for_state(AdapterState::Active).await);
    assert_eq!(first.close_calls(), 1);

    first.emit(SessionEvent::Closed);
    tokio::time::sleep(SETTLE).await;

    assert_eq!(harness.lifecycle.state().await, AdapterState::Active);
    assert_eq!(harness.lifecycle.running_services().await, vec!["weather"]);
}

#[tokio::test(start_paused = true)]
async fn broker_open_failure_moves_to_recovering() {
    let harness = scripted_harness();
    harness.broker.fail_with(Some(SessionError::AuthenticationFailed(
        "broker.test".to_string(),
    )));

    harness
        .lifecycle
        .on_reconfiguration(weather_model())
        .await
        .expect("the connection attempt runs in the background");

    assert!(harness.wait_for_state(AdapterState::Recovering).await);
    assert!(harness.broker.sessions().is_empty());
    assert_eq!(harness.poller.requests("current"), 0);

    harness.broker.fail_with(None);
    harness
        .lifecycle
        .on_reconfiguration(weather_model())
        .await
        .expect("reconnect should start");

    assert!(harness.wait_for_state(AdapterState::Active).await);
    assert!(harness.wait_for_publications(TOPIC, 1).await);
}

#[tokio::test(start_paused = true)]
async fn unreadable_truststore_moves_to_recovering_and_reports_the_error() {
    let harness = scripted_harness();
    let mut model = weather_model();
    model.truststore = Some("/nonexistent/truststore.pem".to_string());

    let result = harness.lifecycle.on_reconfiguration(model).await;

    assert!(matches!(result, Err(LifecycleError::Tls(_))));
    assert_eq!(harness.lifecycle.state().await, AdapterState::Recovering);
    tokio::time::sleep(SETTLE).await;
    assert_eq!(harness.broker.open_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn http_layer_failure_moves_to_recovering_until_the_next_model() {
    let harness = scripted_harness();
    harness.poller_factory.fail(true);

    harness
        .lifecycle
        .on_reconfiguration(weather_model())
        .await
        .expect("the connection attempt runs in the background");

    assert!(harness.wait_for_state(AdapterState::Recovering).await);
    assert_eq!(harness.poller.requests("current"), 0);

    harness.poller_factory.fail(false);
    harness
        .lifecycle
        .on_reconfiguration(weather_model())
        .await
        .expect("reconnect should start");

    assert!(harness.wait_for_state(AdapterState::Active).await);
    assert!(harness.wait_for_publications(TOPIC, 1).await);
    assert_eq!(harness.broker.sessions()[0].close_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn session_opened_for_a_superseded_model_is_closed() {
    let harness = scripted_harness();
    harness.broker.hold_opens(true);

    harness
        .lifecycle
        .on_reconfiguration(weather_model())
        .await
        .expect("first connection attempt starts");
    assert!(harness.wait_until(SETTLE, || harness.broker.open_calls() == 1).await);
    assert_eq!(harness.lifecycle.state().await, AdapterState::Connecting);

    let mut moved = weather_model();
    moved.broker = BrokerConfig::new("other-broker.test", 8080);
    harness
        .lifecycle
        .on_reconfiguration(moved.clone())
        .await
        .expect("second connection attempt starts");
    assert!(harness.wait_until(SETTLE, || harness.broker.open_calls() == 2).await);

    harness.broker.release_one();
    harness.broker.release_one();

    assert!(harness.wait_until(SETTLE, || harness.broker.sessions().len() == 2).await);
    assert!(harness.wait_for_state(AdapterState::Active).await);

    let closed: Vec<usize> = harness
        .broker
        .sessions()
        .iter()
        .map(|session| session.close_calls())
        .collect();
    assert_eq!(closed.iter().sum::<usize>(), 1);
    assert_eq!(harness.lifecycle.current_model().await, Some(moved));
    assert!(harness.wait_for_publications(TOPIC, 1).await);
}

#[tokio::test(start_paused = true)]
async fn same_broker_while_connecting_only_replaces_the_model() {
    let harness = scripted_harness();
    harness.broker.hold_opens(true);

    harness
        .lifecycle
        .on_reconfiguration(weather_model())
        .await
        .expect("connection attempt starts");
    assert!(harness.wait_until(SETTLE, || harness.broker.open_calls() == 1).await);

    let mut slower = weather_model();
    slower.services[0].poll_period_ms = 2_000;
    harness
        .lifecycle
        .on_reconfiguration(slower.clone())
        .await
        .expect("model replaced");

    harness.broker.release_one();
    assert!(harness.wait_for_state(AdapterState::Active).await);
    assert_eq!(harness.broker.open_calls(), 1);
    assert_eq!(harness.lifecycle.current_model().await, Some(slower));
}

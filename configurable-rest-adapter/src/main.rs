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

mod config;
mod log_broker;

use crate::config::load_model;
use crate::log_broker::LogBrokerSessionFactory;
use clap::Parser;
use rest_adapter::observability::events;
use rest_adapter::{
    AdapterLifecycle, AdapterState, CountingPollListener, MetricsConfig, Model,
    ReqwestEndpointPollerFactory, ScheduledTask, Scheduler,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const COMPONENT: &str = "configurable_rest_adapter";

#[derive(Parser)]
#[command()]
struct AdapterArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
    /// Seconds between checks of the config file for changes.
    #[arg(long, value_name = "SECONDS", default_value_t = 10)]
    reload_interval_secs: u64,
    /// Timeout of each endpoint request.
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    request_timeout_secs: u64,
}

/// Delivers changed models to the lifecycle and keeps the metrics log task in step.
struct Reloader {
    lifecycle: AdapterLifecycle,
    metrics: Arc<CountingPollListener>,
    scheduler: Scheduler,
    current: Option<Model>,
    metrics_task: Option<ScheduledTask>,
}

impl Reloader {
    /// Re-delivers an unchanged model only while the lifecycle is recovering.
    async fn offer(&mut self, model: Model) {
        let recovering = self.lifecycle.state().await == AdapterState::Recovering;
        if self.current.as_ref() == Some(&model) && !recovering {
            return;
        }

        if self.current.as_ref().map(|current| &current.metrics) != Some(&model.metrics) {
            if let Some(task) = self.metrics_task.take() {
                task.cancel();
            }
            self.metrics_task = self.schedule_metrics(&model.metrics);
        }
        self.current = Some(model.clone());

        if let Err(err) = self.lifecycle.on_reconfiguration(model).await {
            warn!(
                event = events::CONFIG_RECONFIGURE_FAILED,
                component = COMPONENT,
                err = %err,
                "configuration applied with errors"
            );
        }
    }

    fn schedule_metrics(&self, metrics: &MetricsConfig) -> Option<ScheduledTask> {
        if !metrics.logging || metrics.logging_interval_ms == 0 {
            return None;
        }
        let interval = Duration::from_millis(metrics.logging_interval_ms);
        let listener = self.metrics.clone();
        Some(
            self.scheduler
                .schedule_with_fixed_delay(interval, interval, move || {
                    let listener = listener.clone();
                    async move { listener.log_summary() }
                }),
        )
    }
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let args = AdapterArgs::parse();
    info!(
        event = events::ADAPTER_START,
        component = COMPONENT,
        config = args.config.as_str(),
        reload_interval_secs = args.reload_interval_secs,
        "started configurable-rest-adapter"
    );

    let scheduler = Scheduler::current();
    let metrics = Arc::new(CountingPollListener::new());
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let lifecycle = AdapterLifecycle::builder(
        Arc::new(LogBrokerSessionFactory::new()),
        Arc::new(ReqwestEndpointPollerFactory::with_timeout(Duration::from_secs(
            args.request_timeout_secs,
        ))),
        scheduler.clone(),
    )
    .poll_listener(metrics.clone())
    .on_shutdown(move || {
        let _ = shutdown_tx.send(());
    })
    .build();

    let mut reloader = Reloader {
        lifecycle: lifecycle.clone(),
        metrics: metrics.clone(),
        scheduler,
        current: None,
        metrics_task: None,
    };
    let mut reload = tokio::time::interval(Duration::from_secs(args.reload_interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                info!(
                    event = events::ADAPTER_EXIT,
                    component = COMPONENT,
                    reason = "deactivated",
                    "adapter deactivated by configuration"
                );
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!(
                    event = events::ADAPTER_EXIT,
                    component = COMPONENT,
                    reason = "interrupted",
                    "stopping adapter"
                );
                break;
            }
            _ = reload.tick() => match load_model(&args.config) {
                Ok(model) => {
                    info!(
                        event = events::CONFIG_LOAD_OK,
                        component = COMPONENT,
                        services = model.services.len(),
                        active = model.active,
                        "configuration loaded"
                    );
                    reloader.offer(model).await;
                }
                Err(err) => warn!(
                    event = events::CONFIG_LOAD_FAILED,
                    component = COMPONENT,
                    err = %err,
                    "keeping previous configuration"
                ),
            },
        }
    }

    lifecycle.close().await;
    metrics.log_summary();
}

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

use rest_adapter::{ServiceConfig, ServiceListener};
use std::sync::Mutex;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServiceNotification {
    Active(String),
    Standby(String),
    Removed(String),
}

/// Service listener keeping every notification in arrival order.
#[derive(Debug, Default)]
pub struct RecordingServiceListener {
    notifications: Mutex<Vec<ServiceNotification>>,
}

impl RecordingServiceListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<ServiceNotification> {
        self.notifications
            .lock()
            .expect("notifications lock poisoned")
            .clone()
    }

    fn record(&self, notification: ServiceNotification) {
        self.notifications
            .lock()
            .expect("notifications lock poisoned")
            .push(notification);
    }
}

impl ServiceListener for RecordingServiceListener {
    fn on_active(&self, service: &ServiceConfig) {
        self.record(ServiceNotification::Active(service.name.clone()));
    }

    fn on_standby(&self, service: &ServiceConfig) {
        self.record(ServiceNotification::Standby(service.name.clone()));
    }

    fn on_remove(&self, service: &ServiceConfig) {
        self.record(ServiceNotification::Removed(service.name.clone()));
    }
}

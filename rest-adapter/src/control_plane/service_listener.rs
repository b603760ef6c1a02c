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

use crate::model::ServiceConfig;

/// Observes broker-side activation of services.
pub trait ServiceListener: Send + Sync {
    fn on_active(&self, service: &ServiceConfig);

    fn on_standby(&self, service: &ServiceConfig);

    fn on_remove(&self, service: &ServiceConfig);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullServiceListener;

impl ServiceListener for NullServiceListener {
    fn on_active(&self, _service: &ServiceConfig) {}

    fn on_standby(&self, _service: &ServiceConfig) {}

    fn on_remove(&self, _service: &ServiceConfig) {}
}

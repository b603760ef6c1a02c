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

//! Shared timer/task scheduler backed by a tokio runtime handle.

use crate::observability::events;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::JoinHandle;
use tracing::trace;

const COMPONENT: &str = "scheduler";

/// Cloneable handle used to spawn one-shot and recurring work.
#[derive(Clone, Debug)]
pub struct Scheduler {
    handle: Handle,
}

impl Scheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler bound to the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime. Use [`Scheduler::try_current`] otherwise.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    pub fn try_current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Runs `task` after `initial_delay`, then again `delay` after each execution completes.
    ///
    /// Executions never overlap. A slow execution pushes the next one back rather than
    /// shortening the following delay.
    pub fn schedule_with_fixed_delay<F, Fut>(
        &self,
        initial_delay: Duration,
        delay: Duration,
        mut task: F,
    ) -> ScheduledTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let join_handle = self.handle.spawn(async move {
            tokio::time::sleep(initial_delay).await;
            loop {
                task().await;
                trace!(
                    event = events::SCHEDULER_CYCLE_COMPLETE,
                    component = COMPONENT,
                    delay_ms = delay.as_millis() as u64,
                    "scheduled execution complete"
                );
                tokio::time::sleep(delay).await;
            }
        });

        ScheduledTask { join_handle }
    }
}

/// Handle to recurring work started by [`Scheduler::schedule_with_fixed_delay`].
///
/// Dropping the handle cancels the work.
#[derive(Debug)]
pub struct ScheduledTask {
    join_handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Stops further executions and drops the current one at its next suspension point.
    /// Does not wait for the task to wind down.
    pub fn cancel(&self) {
        self.join_handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.join_handle.abort();
    }
}

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

//! Runtime integration layer.
//!
//! Every component that schedules work receives a [`scheduler::Scheduler`] at construction
//! instead of reaching for a process-wide runtime.
//!
//! ```
//! use rest_adapter::runtime::Scheduler;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let scheduler = Scheduler::current();
//! let task = scheduler.schedule_with_fixed_delay(
//!     Duration::ZERO,
//!     Duration::from_secs(60),
//!     || async { /* one poll cycle */ },
//! );
//! task.cancel();
//! # }
//! ```

pub mod scheduler;

pub use scheduler::{ScheduledTask, Scheduler};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! berth-storage: bounded metrics window with an append-only log

pub mod log;
mod store;
mod window;

pub use log::{LineError, LogError, MetricsLog};
pub use store::{CompactionStats, MetricsStore, StoreError};
pub use window::{MetricsWindow, RetentionPolicy, DEFAULT_CAPACITY, DEFAULT_MAX_AGE};

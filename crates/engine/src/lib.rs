// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! berth-engine: command execution, live output streaming, metrics sampling

pub mod broadcast;
pub mod command;
mod config;
mod error;
pub mod registry;
pub mod runner;
pub mod sampler;

pub use broadcast::{AttachError, OutputBroadcaster, Subscription, TranscriptLimits};
pub use command::{build_plan, CommandPlan, Invocation, PlanError, Toolchain};
pub use config::{EngineConfig, DEFAULT_HISTORY_LIMIT, DEFAULT_SUBSCRIBER_QUEUE};
pub use error::{CancelError, SubmitError};
pub use registry::{ProjectJobRegistry, SubmitRequest};
pub use runner::{CommandRunner, RunnerConfig};
pub use sampler::MetricsSampler;

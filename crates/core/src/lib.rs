// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! berth-core: domain types shared by the berth engine, storage and daemon

pub mod macros;

pub mod clock;
pub mod command;
pub mod id;
pub mod job;
pub mod metrics;
pub mod output;
pub mod project;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use command::{CommandKind, UnknownCommand, COMPOSE_FILE};
pub use job::{FailureKind, Job, JobEvent, JobId, JobOutcome, JobState, TransitionError};
#[cfg(any(test, feature = "test-support"))]
pub use metrics::MetricSampleBuilder;
pub use metrics::{MetricSample, SamplerHealth};
pub use output::{OutputChunk, StreamEvent, StreamTag};
pub use project::{IdentError, IdentKind, ProjectName, ProjectRef, ServiceName, MAX_IDENT_LEN};

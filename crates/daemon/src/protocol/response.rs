// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use berth_adapters::ContainerStatus;
use berth_core::{Job, JobId, MetricSample, SamplerHealth, StreamEvent};
use serde::{Deserialize, Serialize};

/// Why a request was refused without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Validation,
    Busy,
    NotFound,
    AlreadyFinished,
}

berth_core::simple_display! {
    RejectReason {
        Validation => "validation",
        Busy => "busy",
        NotFound => "not_found",
        AlreadyFinished => "already_finished",
    }
}

/// Response from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Version handshake response
    Hello { version: String },

    /// Job accepted and started
    Submitted { id: JobId },

    /// Request refused
    Rejected {
        reason: RejectReason,
        message: String,
        /// Job holding the project lock, for `busy`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        holder: Option<JobId>,
    },

    Job { job: Box<Job> },

    Jobs { jobs: Vec<Job> },

    /// One event of an attached stream
    Stream { event: StreamEvent },

    Metrics { samples: Vec<MetricSample> },

    MetricsHealth { health: SamplerHealth },

    Containers { containers: Vec<ContainerStatus> },

    /// Error response
    Error { message: String },
}

impl Response {
    pub fn rejected(reason: RejectReason, message: impl Into<String>) -> Self {
        Response::Rejected { reason, message: message.into(), holder: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error { message: message.into() }
    }
}

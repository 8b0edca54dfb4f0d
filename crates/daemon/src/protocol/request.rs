// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use berth_core::CommandKind;
use serde::{Deserialize, Serialize};

/// Request from a client to the daemon
///
/// Identifiers arrive as plain strings and are validated by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Run a command against a project
    Submit {
        project: String,
        command: CommandKind,
        /// Service name for per-container commands
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
    },

    /// Cancel a pending or running job
    Cancel { id: String },

    /// Fetch one job
    Job { id: String },

    /// List known jobs, newest first
    Jobs {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project: Option<String>,
    },

    /// Stream a job's output. Upgrades the connection to a stream of
    /// `Response::Stream` frames.
    Attach {
        id: String,
        /// First sequence number wanted; 0 replays everything retained
        #[serde(default)]
        from_seq: u64,
    },

    /// Metrics samples, optionally only those after `since_ms`
    Metrics {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        since_ms: Option<u64>,
    },

    /// Sampler health counters
    MetricsHealth,

    /// Containers of a project's compose stack
    Containers { project: String },

    /// Request daemon shutdown
    Shutdown,
}

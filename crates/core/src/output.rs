// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Captured process output and the events a live viewer receives.

use crate::job::JobOutcome;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which pipe a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamTag {
    Out,
    Err,
    /// Banner lines emitted by the engine itself (e.g. the step being run).
    Sys,
}

crate::simple_display! {
    StreamTag {
        Out => "out",
        Err => "err",
        Sys => "sys",
    }
}

/// One line of captured output. Sequence numbers start at 1 per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChunk {
    pub seq: u64,
    pub stream: StreamTag,
    pub ts_ms: u64,
    pub text: String,
}

impl OutputChunk {
    /// Approximate memory charged against the transcript byte budget.
    pub fn weight(&self) -> usize {
        self.text.len() + std::mem::size_of::<OutputChunk>()
    }
}

/// Item delivered to a subscriber, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    Chunk(Arc<OutputChunk>),
    /// Requested chunks `from..=to` were already evicted from the transcript.
    Skipped { from: u64, to: u64 },
    /// End of stream.
    Finished(JobOutcome),
    /// The subscription was closed because the viewer fell behind; reattach
    /// from `resume_from` to continue without a gap.
    Lagged { resume_from: u64 },
}

impl StreamEvent {
    /// Whether no further events follow on this subscription.
    pub fn is_final(&self) -> bool {
        matches!(self, StreamEvent::Finished(_) | StreamEvent::Lagged { .. })
    }
}

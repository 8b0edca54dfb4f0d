// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::broadcast::TranscriptLimits;
use crate::command::Toolchain;
use crate::runner::RunnerConfig;

/// Terminal jobs remembered for queries before the oldest are forgotten.
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

/// Default bound of each viewer's delivery queue.
pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 1024;

/// Settings for the job engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub toolchain: Toolchain,
    pub runner: RunnerConfig,
    pub transcript: TranscriptLimits,
    pub subscriber_queue: usize,
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            toolchain: Toolchain::default(),
            runner: RunnerConfig::default(),
            transcript: TranscriptLimits::default(),
            subscriber_queue: DEFAULT_SUBSCRIBER_QUEUE,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

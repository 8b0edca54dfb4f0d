// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable metrics history: the in-memory window backed by the log file.
//!
//! A single writer (the sampler) calls [`MetricsStore::record`]; any number of
//! readers take copy-on-read snapshots. Lock order is always log, then window.

use crate::log::{self, LogError, MetricsLog};
use crate::window::{MetricsWindow, RetentionPolicy};
use berth_core::MetricSample;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("metrics log: {0}")]
    Log(#[from] LogError),
}

/// Result of a compaction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    pub retained: usize,
    pub evicted: usize,
}

#[derive(Debug)]
pub struct MetricsStore {
    log: Mutex<MetricsLog>,
    window: RwLock<MetricsWindow>,
    policy: RetentionPolicy,
}

impl MetricsStore {
    /// Load the log at `path`, apply retention as of `now_ms`, and compact.
    ///
    /// Unreadable lines are skipped. When any are found, the original file is
    /// copied to a rotating `.bak` before the rewrite discards them.
    pub fn open(path: &Path, policy: RetentionPolicy, now_ms: u64) -> Result<Self, StoreError> {
        let loaded = log::load(path)?;
        let mut metrics_log = MetricsLog::open(path)?;

        if loaded.corrupt_lines > 0 {
            let bak = metrics_log.backup()?;
            tracing::warn!(
                corrupt = loaded.corrupt_lines,
                backup = %bak.display(),
                "metrics log had unreadable lines, original saved",
            );
        }

        let total = loaded.samples.len();
        let window = MetricsWindow::from_samples(policy, loaded.samples, now_ms);
        metrics_log.rewrite(&window.to_vec())?;

        tracing::info!(
            path = %path.display(),
            loaded = total,
            retained = window.len(),
            "metrics store opened",
        );

        Ok(Self { log: Mutex::new(metrics_log), window: RwLock::new(window), policy })
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Append a sample to the log and the window.
    ///
    /// The window is updated even when the append fails, so readers keep
    /// seeing fresh data; the error is returned for the caller to report.
    /// After `capacity` appends the log is compacted.
    pub fn record(&self, sample: MetricSample) -> Result<(), StoreError> {
        let mut log = self.log.lock();
        let appended = log.append(&sample);
        self.window.write().push(sample);
        appended?;

        if log.appended_since_rewrite() >= self.policy.capacity() {
            let retained = self.window.read().to_vec();
            log.rewrite(&retained)?;
            tracing::debug!(retained = retained.len(), "metrics log auto-compacted");
        }
        Ok(())
    }

    /// Evict expired samples and rewrite the log to match the window.
    pub fn compact(&self, now_ms: u64) -> Result<CompactionStats, StoreError> {
        let mut log = self.log.lock();
        let (evicted, retained) = {
            let mut window = self.window.write();
            let evicted = window.evict_older_than(self.policy.horizon_ms(now_ms));
            (evicted, window.to_vec())
        };
        log.rewrite(&retained)?;
        Ok(CompactionStats { retained: retained.len(), evicted })
    }

    /// Consistent copy of the whole window, oldest first.
    pub fn snapshot(&self) -> Arc<[MetricSample]> {
        self.window.read().iter().copied().collect()
    }

    /// Samples strictly newer than `since_ms`, oldest first.
    pub fn since(&self, since_ms: u64) -> Vec<MetricSample> {
        self.window.read().iter().filter(|s| s.ts_ms > since_ms).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.window.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.read().is_empty()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

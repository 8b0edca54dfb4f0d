// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded in-memory history of metric samples.

use berth_core::MetricSample;
use std::collections::VecDeque;
use std::time::Duration;

/// Default window capacity (samples).
pub const DEFAULT_CAPACITY: usize = 5000;

/// Default window horizon (24 hours).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// How much history to keep, applied identically to the window and the log.
///
/// A sample is evicted when the window holds more than `capacity` samples
/// (oldest first) or when it is older than `max_age`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    capacity: usize,
    max_age: Duration,
}

impl RetentionPolicy {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self { capacity: capacity.max(1), max_age }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Oldest timestamp still inside the horizon at `now_ms`.
    pub fn horizon_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.max_age.as_millis() as u64)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_MAX_AGE)
    }
}

/// Ring buffer of samples in insertion order.
#[derive(Debug, Clone)]
pub struct MetricsWindow {
    samples: VecDeque<MetricSample>,
    policy: RetentionPolicy,
}

impl MetricsWindow {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self { samples: VecDeque::with_capacity(policy.capacity().min(1024)), policy }
    }

    /// Seed a window from persisted samples, dropping anything outside the
    /// policy as of `now_ms`.
    pub fn from_samples(
        policy: RetentionPolicy,
        samples: impl IntoIterator<Item = MetricSample>,
        now_ms: u64,
    ) -> Self {
        let mut window = Self::new(policy);
        for sample in samples {
            window.push_back_bounded(sample);
        }
        window.evict_older_than(policy.horizon_ms(now_ms));
        window
    }

    /// Insert the newest sample. Age eviction is relative to its timestamp.
    ///
    /// Returns how many samples were evicted.
    pub fn push(&mut self, sample: MetricSample) -> usize {
        let horizon = self.policy.horizon_ms(sample.ts_ms);
        let mut evicted = self.push_back_bounded(sample);
        evicted += self.evict_older_than(horizon);
        evicted
    }

    fn push_back_bounded(&mut self, sample: MetricSample) -> usize {
        self.samples.push_back(sample);
        let mut evicted = 0;
        while self.samples.len() > self.policy.capacity() {
            self.samples.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Drop leading samples stamped before `horizon_ms`.
    pub fn evict_older_than(&mut self, horizon_ms: u64) -> usize {
        let mut evicted = 0;
        while self.samples.front().is_some_and(|s| s.ts_ms < horizon_ms) {
            self.samples.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricSample> {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<MetricSample> {
        self.samples.iter().copied().collect()
    }
}

#[cfg(test)]
#[path = "window_tests.rs"]
mod tests;

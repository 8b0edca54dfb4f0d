// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.
//!
//! Unparseable numeric values fall back to the default.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Protocol version (from Cargo.toml)
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve state directory: BERTH_STATE_DIR > XDG_STATE_HOME/berth > ~/.local/state/berth
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Some(dir) = non_empty("BERTH_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("berth"));
    }
    let home = non_empty("HOME").ok_or(LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/berth"))
}

/// Root under which every project has its deployment directory.
pub fn deploy_root() -> PathBuf {
    non_empty("BERTH_DEPLOY_ROOT").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/var/deploy"))
}

/// Clone remote template, e.g. `git@github.com:acme/{project}.git`.
pub fn remote_template() -> Option<String> {
    non_empty("BERTH_REMOTE_TEMPLATE")
}

/// Log filter directive (default `info`).
pub fn log_filter() -> String {
    non_empty("BERTH_LOG").unwrap_or_else(|| "info".to_string())
}

pub fn git() -> PathBuf {
    non_empty("BERTH_GIT").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("git"))
}

pub fn docker() -> PathBuf {
    non_empty("BERTH_DOCKER").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("docker"))
}

/// SIGTERM to SIGKILL grace when cancelling a job.
pub fn cancel_grace() -> Duration {
    millis("BERTH_CANCEL_GRACE_MS").unwrap_or(Duration::from_secs(10))
}

/// Zero is treated as unset.
pub fn sample_interval() -> Duration {
    millis("BERTH_SAMPLE_INTERVAL_MS").filter(|d| !d.is_zero()).unwrap_or(Duration::from_secs(5))
}

/// Metrics window capacity in samples.
pub fn metrics_capacity() -> usize {
    parsed("BERTH_METRICS_CAPACITY").unwrap_or(berth_storage::DEFAULT_CAPACITY)
}

pub fn metrics_retention() -> Duration {
    secs("BERTH_METRICS_RETENTION_SECS").unwrap_or(berth_storage::DEFAULT_MAX_AGE)
}

/// How often the metrics log is compacted.
pub fn compact_interval() -> Duration {
    secs("BERTH_COMPACT_INTERVAL_SECS").filter(|d| !d.is_zero()).unwrap_or(Duration::from_secs(600))
}

pub fn transcript_max_chunks() -> Option<usize> {
    parsed("BERTH_TRANSCRIPT_MAX_CHUNKS")
}

/// How long a finished job's output stays attachable.
pub fn transcript_retention() -> Option<Duration> {
    secs("BERTH_TRANSCRIPT_RETENTION_SECS")
}

pub fn subscriber_queue() -> usize {
    parsed("BERTH_SUBSCRIBER_QUEUE").unwrap_or(berth_engine::DEFAULT_SUBSCRIBER_QUEUE)
}

/// Default IPC timeout
pub fn ipc_timeout() -> Duration {
    millis("BERTH_IPC_TIMEOUT_MS").unwrap_or(Duration::from_secs(5))
}

/// Shutdown drain timeout (default 15s, configurable via `BERTH_DRAIN_TIMEOUT_MS`).
pub fn drain_timeout() -> Duration {
    millis("BERTH_DRAIN_TIMEOUT_MS").unwrap_or(Duration::from_secs(15))
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|s| !s.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(var: &str) -> Option<T> {
    non_empty(var).and_then(|s| s.trim().parse::<T>().ok())
}

fn millis(var: &str) -> Option<Duration> {
    parsed::<u64>(var).map(Duration::from_millis)
}

fn secs(var: &str) -> Option<Duration> {
    parsed::<u64>(var).map(Duration::from_secs)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;

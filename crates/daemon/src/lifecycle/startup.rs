// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use berth_adapters::{ProjectCatalog, SysinfoProbe};
use berth_core::{Clock, SystemClock};
use berth_engine::{MetricsSampler, ProjectJobRegistry};
use berth_storage::MetricsStore;
use fs2::FileExt;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Config, DaemonState, LifecycleError};

/// How often finished transcripts past their retention are dropped.
const REAPER_INTERVAL: Duration = Duration::from_secs(30);

/// Result of daemon startup - includes both the daemon state and the listener.
pub struct StartupResult {
    /// The daemon state
    pub daemon: DaemonState,
    /// The Unix socket listener to spawn as a task
    pub listener: UnixListener,
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock:
            // those files belong to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. Create state directory (needed for socket, lock, etc.)
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents races
    // Open without truncating so a running daemon's PID survives a failed attempt.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Load the metrics window from its durable log
    let store = Arc::new(MetricsStore::open(
        &config.metrics_path,
        config.metrics_policy,
        SystemClock.epoch_ms(),
    )?);
    info!(samples = store.len(), path = %config.metrics_path.display(), "loaded metrics window");

    // 4. Job engine
    let catalog: Arc<dyn ProjectCatalog> = Arc::new(config.catalog());
    let registry = ProjectJobRegistry::new(config.engine_config(), Arc::clone(&catalog), SystemClock);

    // 5. Background tasks, stopped again if a later step fails
    let background = CancellationToken::new();
    let stop_on_failure = background.clone().drop_guard();
    let sampler = MetricsSampler::new(
        SysinfoProbe::new(config.deploy_root.clone()),
        Arc::clone(&store),
        SystemClock,
    );
    let sampler_health = sampler.health();
    let tasks = vec![
        sampler.spawn(config.sample_interval, background.child_token()),
        spawn_compaction(Arc::clone(&store), config.compact_interval, background.child_token()),
        spawn_transcript_reaper(registry.clone(), REAPER_INTERVAL, background.child_token()),
    ];

    // 6. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path).map_err(|source| {
        LifecycleError::BindFailed { path: config.socket_path.clone(), source }
    })?;
    let background = stop_on_failure.disarm();

    info!(
        socket = %config.socket_path.display(),
        deploy_root = %config.deploy_root.display(),
        "Daemon started"
    );

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            registry,
            store,
            catalog,
            sampler_health,
            background,
            tasks,
            start_time: Instant::now(),
        },
        listener,
    })
}

/// Periodically rewrite the metrics log down to the retained window.
fn spawn_compaction(
    store: Arc<MetricsStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => match store.compact(SystemClock.epoch_ms()) {
                    Ok(stats) => tracing::debug!(retained = stats.retained, evicted = stats.evicted, "compacted metrics log"),
                    Err(e) => warn!(error = %e, "metrics log compaction failed"),
                },
            }
        }
    })
}

/// Periodically drop transcripts of jobs finished longer ago than the retention.
fn spawn_transcript_reaper(
    registry: ProjectJobRegistry<SystemClock>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let pruned = registry.prune(SystemClock.epoch_ms());
                    if pruned > 0 {
                        tracing::debug!(pruned, "dropped expired transcripts");
                    }
                }
            }
        }
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    // Remove socket if we created it
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }

    // Remove PID/lock file
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;

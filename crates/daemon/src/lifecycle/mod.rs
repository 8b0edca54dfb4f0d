// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: configuration, startup, shutdown.

mod startup;
pub use startup::{startup, StartupResult};

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use berth_adapters::{ComposeInspector, DirCatalog, ProjectCatalog};
use berth_core::{Clock, SamplerHealth, SystemClock};
use berth_engine::{EngineConfig, ProjectJobRegistry, RunnerConfig, Toolchain, TranscriptLimits};
use berth_storage::{MetricsStore, RetentionPolicy, StoreError};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::env;
use crate::listener::ListenCtx;

/// Daemon configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/berth)
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to the durable metrics log
    pub metrics_path: PathBuf,
    /// Root of project deployment directories
    pub deploy_root: PathBuf,
    /// Clone remote per project, `{project}` replaced by the name
    pub remote_template: Option<String>,
    pub log_filter: String,
    pub toolchain: Toolchain,
    pub cancel_grace: Duration,
    pub sample_interval: Duration,
    pub metrics_policy: RetentionPolicy,
    pub compact_interval: Duration,
    pub transcript: TranscriptLimits,
    pub subscriber_queue: usize,
    pub ipc_timeout: Duration,
    pub drain_timeout: Duration,
}

impl Config {
    /// Load configuration for the daemon.
    ///
    /// Paths live under `~/.local/state/berth/` (or `$XDG_STATE_HOME/berth/`)
    /// unless `BERTH_STATE_DIR` overrides them.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        let defaults = TranscriptLimits::default();

        Ok(Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            metrics_path: state_dir.join("metrics").join("host.log"),
            state_dir,
            deploy_root: env::deploy_root(),
            remote_template: env::remote_template(),
            log_filter: env::log_filter(),
            toolchain: Toolchain { git: env::git(), docker: env::docker() },
            cancel_grace: env::cancel_grace(),
            sample_interval: env::sample_interval(),
            metrics_policy: RetentionPolicy::new(env::metrics_capacity(), env::metrics_retention()),
            compact_interval: env::compact_interval(),
            transcript: TranscriptLimits {
                max_chunks: env::transcript_max_chunks().unwrap_or(defaults.max_chunks),
                retention: env::transcript_retention().unwrap_or(defaults.retention),
                ..defaults
            },
            subscriber_queue: env::subscriber_queue(),
            ipc_timeout: env::ipc_timeout(),
            drain_timeout: env::drain_timeout(),
        })
    }

    /// Settings handed to the job engine.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            toolchain: self.toolchain.clone(),
            runner: RunnerConfig { grace: self.cancel_grace, ..RunnerConfig::default() },
            transcript: self.transcript,
            subscriber_queue: self.subscriber_queue,
            ..EngineConfig::default()
        }
    }

    /// Default catalog: `<deploy_root>/<name>`.
    pub fn catalog(&self) -> DirCatalog {
        let catalog = DirCatalog::new(&self.deploy_root);
        match &self.remote_template {
            Some(template) => catalog.with_remote_template(template),
            None => catalog,
        }
    }
}

/// Initialise logging to `<state_dir>/daemon.log`.
///
/// The returned guard flushes the non-blocking writer on drop and must live
/// for the whole process.
pub fn init_logging(config: &Config) -> Result<WorkerGuard, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    let file_name = config.log_path.file_name().map(PathBuf::from).unwrap_or_else(|| "daemon.log".into());
    let dir = config.log_path.parent().map(PathBuf::from).unwrap_or_else(|| config.state_dir.clone());
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| LifecycleError::Logging(e.to_string()))?;
    Ok(guard)
}

/// Daemon state during operation.
///
/// The listener is returned separately from startup to be spawned as a task.
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub registry: ProjectJobRegistry<SystemClock>,
    pub store: Arc<MetricsStore>,
    pub catalog: Arc<dyn ProjectCatalog>,
    /// Sampler health handle
    pub sampler_health: Arc<Mutex<SamplerHealth>>,
    /// Stops the sampler and timers
    background: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    /// When daemon started
    pub start_time: Instant,
}

impl DaemonState {
    /// Shared context for connection handlers.
    pub fn listen_ctx(&self, shutdown: Arc<Notify>) -> Arc<ListenCtx> {
        Arc::new(ListenCtx {
            registry: self.registry.clone(),
            store: Arc::clone(&self.store),
            catalog: Arc::clone(&self.catalog),
            inspector: Arc::new(ComposeInspector::new(
                self.config.toolchain.docker.clone(),
                self.config.ipc_timeout,
            )),
            sampler_health: Arc::clone(&self.sampler_health),
            shutdown,
            ipc_timeout: self.config.ipc_timeout,
        })
    }

    /// Shutdown the daemon gracefully.
    ///
    /// Running jobs are cancelled and given `drain_timeout` to reach a
    /// terminal state; the metrics log is compacted one last time.
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Cancel jobs and wait for their process groups to exit
        if !self.registry.shutdown(self.config.drain_timeout).await {
            warn!(remaining = self.registry.active_count(), "jobs still active after drain timeout");
        }

        // 2. Stop the sampler and timers
        self.background.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("background task ended abnormally: {}", e);
            }
        }

        // 3. Final compaction
        match self.store.compact(SystemClock.epoch_ms()) {
            Ok(stats) => info!(retained = stats.retained, evicted = stats.evicted, "compacted metrics log"),
            Err(e) => warn!("Failed to compact metrics log on shutdown: {}", e),
        }

        // 4. Remove socket file
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        // 5. Remove PID file
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // 6. Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {}: {source}", path.display())]
    BindFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Metrics store error: {0}")]
    Store(#[from] StoreError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod test_helpers;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

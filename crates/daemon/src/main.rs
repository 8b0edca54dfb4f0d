// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! berthd: runs compose commands for the dashboard and samples host metrics.

use std::process::ExitCode;
use std::sync::Arc;

use berth_daemon::lifecycle::{self, Config, StartupResult};
use berth_daemon::listener::Listener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("berthd: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match lifecycle::init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("berthd: {e}");
            return ExitCode::FAILURE;
        }
    };

    let StartupResult { mut daemon, listener } = match lifecycle::startup(&config).await {
        Ok(result) => result,
        Err(e) => {
            error!("startup failed: {}", e);
            eprintln!("berthd: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Arc::new(Notify::new());
    let listen_task = tokio::spawn(Listener::new(listener, daemon.listen_ctx(Arc::clone(&shutdown))).run());

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!("failed to install SIGTERM handler: {}", e);
            eprintln!("berthd: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("READY");
    info!(pid = std::process::id(), "berthd ready");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = shutdown.notified() => info!("shutdown requested"),
    }

    listen_task.abort();
    match daemon.shutdown().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("shutdown failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for lifecycle tests.

use std::path::Path;
use std::time::Duration;

use berth_engine::{Toolchain, TranscriptLimits};
use berth_storage::RetentionPolicy;

use super::Config;

/// Config rooted entirely inside `dir`, with short timeouts.
pub(crate) fn test_config(dir: &Path) -> Config {
    let state_dir = dir.join("state");
    Config {
        socket_path: state_dir.join("daemon.sock"),
        lock_path: state_dir.join("daemon.pid"),
        log_path: state_dir.join("daemon.log"),
        metrics_path: state_dir.join("metrics").join("host.log"),
        state_dir,
        deploy_root: dir.join("deploy"),
        remote_template: None,
        log_filter: "debug".to_string(),
        toolchain: Toolchain::default(),
        cancel_grace: Duration::from_millis(200),
        sample_interval: Duration::from_secs(3600),
        metrics_policy: RetentionPolicy::default(),
        compact_interval: Duration::from_secs(3600),
        transcript: TranscriptLimits::default(),
        subscriber_queue: 16,
        ipc_timeout: Duration::from_secs(1),
        drain_timeout: Duration::from_secs(2),
    }
}

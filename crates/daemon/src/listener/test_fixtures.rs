// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for listener tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use berth_adapters::{DirCatalog, FakeInspector, ProjectCatalog};
use berth_core::{SamplerHealth, SystemClock};
use berth_engine::{EngineConfig, ProjectJobRegistry, RunnerConfig, Toolchain};
use berth_storage::{MetricsStore, RetentionPolicy};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::Notify;

use crate::protocol::{self, Request, Response};

use super::{handle_connection, ListenCtx};

pub(super) const TIMEOUT: Duration = Duration::from_secs(5);

/// Blocks until a `release` file appears in the project directory.
pub(super) const BLOCKING: &str = r#"echo "docker $*"
while [ ! -f release ]; do sleep 0.02; done
echo released"#;

pub(super) struct Fixture {
    pub dir: TempDir,
    pub ctx: Arc<ListenCtx>,
    pub inspector: FakeInspector,
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub(super) fn fixture(docker: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    let deploy = dir.path().join("deploy");
    std::fs::create_dir_all(&bin).unwrap();
    std::fs::create_dir_all(&deploy).unwrap();

    let config = EngineConfig {
        toolchain: Toolchain {
            git: write_script(&bin, "git", r#"echo "git $*""#),
            docker: write_script(&bin, "docker", docker),
        },
        runner: RunnerConfig { grace: Duration::from_millis(500), ..RunnerConfig::default() },
        ..EngineConfig::default()
    };
    let catalog: Arc<dyn ProjectCatalog> = Arc::new(DirCatalog::new(&deploy));
    let registry = ProjectJobRegistry::new(config, Arc::clone(&catalog), SystemClock);
    let store = Arc::new(
        MetricsStore::open(&dir.path().join("metrics.log"), RetentionPolicy::default(), 0).unwrap(),
    );
    let inspector = FakeInspector::new();

    let ctx = Arc::new(ListenCtx {
        registry,
        store,
        catalog,
        inspector: Arc::new(inspector.clone()),
        sampler_health: Arc::new(Mutex::new(SamplerHealth::default())),
        shutdown: Arc::new(Notify::new()),
        ipc_timeout: TIMEOUT,
    });
    Fixture { dir, ctx, inspector }
}

impl Fixture {
    pub fn project(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join("deploy").join(name);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn release(&self, name: &str) {
        std::fs::write(self.dir.path().join("deploy").join(name).join("release"), "").unwrap();
    }

    /// Open a connection served by `handle_connection` and send `request`.
    pub async fn connect(&self, request: &Request) -> tokio::io::DuplexStream {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            let (reader, writer) = tokio::io::split(server);
            let _ = handle_connection(reader, writer, &ctx).await;
        });
        protocol::write_request(&mut client, request, TIMEOUT).await.unwrap();
        client
    }

    /// Send one request and read its single response.
    pub async fn call(&self, request: Request) -> Response {
        let mut client = self.connect(&request).await;
        protocol::read_response(&mut client, TIMEOUT).await.unwrap()
    }

    /// Attach and collect every frame until the stream ends.
    pub async fn attach_all(&self, id: &str, from_seq: u64) -> Vec<Response> {
        let mut client = self.connect(&Request::Attach { id: id.to_string(), from_seq }).await;
        let mut frames = Vec::new();
        loop {
            match protocol::read_response(&mut client, TIMEOUT).await {
                Ok(frame) => frames.push(frame),
                Err(protocol::ProtocolError::ConnectionClosed) => return frames,
                Err(e) => panic!("attach read failed: {e}"),
            }
        }
    }
}

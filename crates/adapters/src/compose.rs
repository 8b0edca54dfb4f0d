// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only container status for a compose project.

use async_trait::async_trait;
use berth_core::COMPOSE_FILE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("failed to run docker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("docker compose ps timed out after {0:?}")]
    Timeout(Duration),
    #[error("docker compose ps exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("unparseable docker compose ps output: {0}")]
    Parse(String),
}

/// One container as reported by `docker compose ps --format json`.
///
/// Accepts docker's PascalCase keys; serializes snake_case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Service")]
    pub service: String,
    #[serde(default, alias = "Image")]
    pub image: String,
    /// Machine state: `running`, `exited`, `created`, ...
    #[serde(default, alias = "State")]
    pub state: String,
    /// Human status, e.g. `Up 3 hours`
    #[serde(default, alias = "Status")]
    pub status: String,
    #[serde(default, alias = "Health")]
    pub health: String,
}

/// Lists the containers of a compose project.
#[async_trait]
pub trait ContainerInspector: Send + Sync + 'static {
    async fn list(&self, project_dir: &Path) -> Result<Vec<ContainerStatus>, ComposeError>;
}

/// Parse `ps --format json` output.
///
/// Newer compose releases print one object per line; older ones print a
/// single JSON array.
pub fn parse_ps_output(stdout: &str) -> Result<Vec<ContainerStatus>, ComposeError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| ComposeError::Parse(e.to_string()));
    }
    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(|e| ComposeError::Parse(e.to_string())))
        .collect()
}

/// Runs the docker CLI in the project directory.
#[derive(Debug, Clone)]
pub struct ComposeInspector {
    docker: PathBuf,
    timeout: Duration,
}

impl ComposeInspector {
    pub fn new(docker: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { docker: docker.into(), timeout }
    }
}

#[async_trait]
impl ContainerInspector for ComposeInspector {
    async fn list(&self, project_dir: &Path) -> Result<Vec<ContainerStatus>, ComposeError> {
        if !project_dir.join(COMPOSE_FILE).is_file() {
            tracing::debug!(dir = %project_dir.display(), "no compose file, reporting no containers");
            return Ok(Vec::new());
        }

        let mut cmd = tokio::process::Command::new(&self.docker);
        cmd.args(["compose", "-f", COMPOSE_FILE, "ps", "--format", "json"])
            .current_dir(project_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ComposeError::Timeout(self.timeout))?
            .map_err(ComposeError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ComposeError::Failed { code: output.status.code(), stderr });
        }
        parse_ps_output(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{ComposeError, ContainerInspector, ContainerStatus};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// Inspector returning canned containers per project directory.
    #[derive(Clone, Default)]
    pub struct FakeInspector {
        containers: Arc<Mutex<HashMap<PathBuf, Vec<ContainerStatus>>>>,
    }

    impl FakeInspector {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, project_dir: impl Into<PathBuf>, containers: Vec<ContainerStatus>) {
            self.containers.lock().insert(project_dir.into(), containers);
        }
    }

    #[async_trait]
    impl ContainerInspector for FakeInspector {
        async fn list(&self, project_dir: &Path) -> Result<Vec<ContainerStatus>, ComposeError> {
            Ok(self.containers.lock().get(project_dir).cloned().unwrap_or_default())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeInspector;

#[cfg(test)]
#[path = "compose_tests.rs"]
mod tests;

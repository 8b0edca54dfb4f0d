// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier and state machine.

use crate::command::CommandKind;
use crate::project::{ProjectName, ServiceName};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for one job run.
    ///
    /// Also keys the job's output transcript in the broadcaster.
    pub struct JobId("job-");
}

/// Lifecycle state of a job.
///
/// `Pending → Running → {Succeeded | Failed}`, with `Cancelled` reachable
/// from `Pending` or `Running`, and `Failed` reachable from `Pending` when
/// the first process cannot be spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::Cancelled)
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Pending, Failed)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

crate::simple_display! {
    JobState {
        Pending => "pending",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Why a job failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// The command ran and exited nonzero.
    Process { exit_code: i32 },
    /// The process could not be started.
    Spawn { message: String },
    /// The toolchain or container engine is unavailable.
    Infrastructure { message: String },
    /// The supervisor ended without reporting an outcome.
    Lost,
}

crate::simple_display! {
    FailureKind {
        Process { .. } => "process",
        Spawn { .. } => "spawn",
        Infrastructure { .. } => "infrastructure unavailable",
        Lost => "lost",
    }
}

/// Terminal result of a job, broadcast to viewers as the end of stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Last captured stderr lines, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stderr_tail: Vec<String>,
}

impl JobOutcome {
    pub fn succeeded() -> Self {
        Self { state: JobState::Succeeded, exit_code: Some(0), failure: None, stderr_tail: Vec::new() }
    }

    pub fn failed(failure: FailureKind, exit_code: Option<i32>, stderr_tail: Vec<String>) -> Self {
        Self { state: JobState::Failed, exit_code, failure: Some(failure), stderr_tail }
    }

    pub fn cancelled(exit_code: Option<i32>) -> Self {
        Self { state: JobState::Cancelled, exit_code, failure: None, stderr_tail: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job {id}: invalid transition {from} -> {to}")]
pub struct TransitionError {
    pub id: JobId,
    pub from: JobState,
    pub to: JobState,
}

/// One tracked execution of a command template against a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub project: ProjectName,
    pub project_path: PathBuf,
    pub command: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceName>,
    pub state: JobState,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl Job {
    pub fn new(
        id: JobId,
        project: ProjectName,
        project_path: PathBuf,
        command: CommandKind,
        service: Option<ServiceName>,
        created_at_ms: u64,
    ) -> Self {
        Self {
            id,
            project,
            project_path,
            command,
            service,
            state: JobState::Pending,
            created_at_ms,
            started_at_ms: None,
            finished_at_ms: None,
            exit_code: None,
            failure: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn transition(&mut self, to: JobState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(to) {
            return Err(TransitionError { id: self.id.clone(), from: self.state, to });
        }
        self.state = to;
        Ok(())
    }

    /// Mark the first process as spawned.
    pub fn start(&mut self, now_ms: u64) -> Result<(), TransitionError> {
        self.transition(JobState::Running)?;
        self.started_at_ms = Some(now_ms);
        Ok(())
    }

    /// Record the terminal outcome.
    pub fn finish(&mut self, outcome: &JobOutcome, now_ms: u64) -> Result<(), TransitionError> {
        self.transition(outcome.state)?;
        self.finished_at_ms = Some(now_ms);
        self.exit_code = outcome.exit_code;
        self.failure = outcome.failure.clone();
        Ok(())
    }
}

/// State transition notification for UI consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    pub id: JobId,
    pub project: ProjectName,
    pub state: JobState,
    pub at_ms: u64,
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;

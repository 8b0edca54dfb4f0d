// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors returned by the job registry.

use crate::command::PlanError;
use berth_core::{IdentError, JobId, JobState, ProjectName};
use std::path::PathBuf;
use thiserror::Error;

/// Why a submission was refused. Nothing was spawned.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] IdentError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("failed to create {}: {source}", path.display())]
    ProjectDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A `container-logs` follow holds the lock until it is cancelled.
    #[error("project {project} is busy with {holder}; cancel it or wait for it to finish")]
    Busy { project: ProjectName, holder: JobId },
    #[error("engine is shutting down")]
    ShuttingDown,
}

impl SubmitError {
    /// Whether the request itself was malformed.
    pub fn is_validation(&self) -> bool {
        matches!(self, SubmitError::Validation(_) | SubmitError::Plan(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CancelError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job {id} already finished ({state})")]
    AlreadyFinished { id: JobId, state: JobState },
}

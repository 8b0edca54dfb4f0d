// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job submission, cancellation and lookup handlers.

use berth_core::{CommandKind, JobId, ProjectName};
use berth_engine::{CancelError, SubmitError, SubmitRequest};
use tracing::warn;

use crate::protocol::{RejectReason, Response};

use super::ListenCtx;

pub(super) fn handle_submit(
    ctx: &ListenCtx,
    project: String,
    command: CommandKind,
    container: Option<String>,
) -> Response {
    match ctx.registry.submit(SubmitRequest { project, command, service: container }) {
        Ok(id) => Response::Submitted { id },
        Err(e) => submit_rejection(e),
    }
}

/// Map a refused submission onto the wire.
pub(super) fn submit_rejection(e: SubmitError) -> Response {
    let message = e.to_string();
    match e {
        SubmitError::Validation(_) | SubmitError::Plan(_) => {
            Response::rejected(RejectReason::Validation, message)
        }
        SubmitError::Busy { holder, .. } => {
            Response::Rejected { reason: RejectReason::Busy, message, holder: Some(holder) }
        }
        SubmitError::ProjectNotFound(_) => Response::rejected(RejectReason::NotFound, message),
        SubmitError::ProjectDir { .. } | SubmitError::ShuttingDown => {
            warn!(error = %message, "submission failed");
            Response::error(message)
        }
    }
}

pub(super) fn handle_cancel(ctx: &ListenCtx, id: &str) -> Response {
    match ctx.registry.cancel(&JobId::from_string(id)) {
        Ok(_) => Response::Ok,
        Err(e @ CancelError::NotFound(_)) => Response::rejected(RejectReason::NotFound, e.to_string()),
        Err(e @ CancelError::AlreadyFinished { .. }) => {
            Response::rejected(RejectReason::AlreadyFinished, e.to_string())
        }
    }
}

pub(super) fn handle_job(ctx: &ListenCtx, id: &str) -> Response {
    match ctx.registry.get(&JobId::from_string(id)) {
        Some(job) => Response::Job { job: Box::new(job) },
        None => Response::rejected(RejectReason::NotFound, format!("job not found: {id}")),
    }
}

pub(super) fn handle_jobs(ctx: &ListenCtx, project: Option<String>) -> Response {
    let project = match project.map(ProjectName::parse).transpose() {
        Ok(project) => project,
        Err(e) => return Response::rejected(RejectReason::Validation, e.to_string()),
    };
    Response::Jobs { jobs: ctx.registry.list(project.as_ref()) }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only queries: metrics and container status.

use berth_core::ProjectName;
use tracing::warn;

use crate::protocol::{RejectReason, Response};

use super::ListenCtx;

pub(super) fn handle_metrics(ctx: &ListenCtx, since_ms: Option<u64>) -> Response {
    let samples = match since_ms {
        Some(ts) => ctx.store.since(ts),
        None => ctx.store.snapshot().to_vec(),
    };
    Response::Metrics { samples }
}

pub(super) fn handle_metrics_health(ctx: &ListenCtx) -> Response {
    Response::MetricsHealth { health: ctx.sampler_health.lock().clone() }
}

/// List a project's containers. Does not take the project lock.
pub(super) async fn handle_containers(ctx: &ListenCtx, project: String) -> Response {
    let name = match ProjectName::parse(project) {
        Ok(name) => name,
        Err(e) => return Response::rejected(RejectReason::Validation, e.to_string()),
    };
    let project = match ctx.catalog.resolve(&name) {
        Ok(project) if project.path.is_dir() => project,
        _ => return Response::rejected(RejectReason::NotFound, format!("project not found: {name}")),
    };
    match ctx.inspector.list(&project.path).await {
        Ok(containers) => Response::Containers { containers },
        Err(e) => {
            warn!(project = %name, error = %e, "container listing failed");
            Response::error(e.to_string())
        }
    }
}

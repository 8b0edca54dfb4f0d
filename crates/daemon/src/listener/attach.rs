// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-side handler for `Attach`.
//!
//! Streams a job's replayed and live output as `Response::Stream` frames
//! until the stream ends or the client goes away. A client that disconnects
//! only drops its own subscription; the job keeps running.

use berth_core::{JobId, StreamEvent};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::protocol::{self, RejectReason, Response};

use super::{detect_client_disconnect, ConnectionError, ListenCtx};

pub(super) async fn handle_attach<R, W>(
    id: &str,
    from_seq: u64,
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let job = JobId::from_string(id);
    let mut subscription = match ctx.registry.attach(&job, from_seq) {
        Ok(subscription) => subscription,
        Err(e) => {
            let resp = Response::rejected(RejectReason::NotFound, e.to_string());
            protocol::write_response(&mut writer, &resp, ctx.ipc_timeout).await?;
            return Ok(());
        }
    };
    info!(job_id = %job, from_seq, "viewer attached");

    let disconnected = detect_client_disconnect(&mut reader);
    tokio::pin!(disconnected);

    loop {
        let event = tokio::select! {
            event = subscription.next() => event,
            _ = &mut disconnected => {
                debug!(job_id = %job, "viewer disconnected");
                return Ok(());
            }
        };
        let Some(event) = event else {
            return Ok(());
        };
        let last = event.is_final();
        if let StreamEvent::Lagged { resume_from } = &event {
            info!(job_id = %job, resume_from, "viewer lagged, closing stream");
        }
        protocol::write_response(&mut writer, &Response::Stream { event }, ctx.ipc_timeout).await?;
        if last {
            return Ok(());
        }
    }
}

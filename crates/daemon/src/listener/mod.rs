// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The Listener runs in a spawned task, accepting connections and handling
//! each on its own task so a slow client never blocks another.

mod attach;
mod jobs;
mod query;

use std::sync::Arc;
use std::time::Duration;

use berth_adapters::{ContainerInspector, ProjectCatalog};
use berth_core::{SamplerHealth, SystemClock};
use berth_engine::ProjectJobRegistry;
use berth_storage::MetricsStore;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::env::PROTOCOL_VERSION;
use crate::protocol::{self, Request, Response};

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub registry: ProjectJobRegistry<SystemClock>,
    pub store: Arc<MetricsStore>,
    pub catalog: Arc<dyn ProjectCatalog>,
    pub inspector: Arc<dyn ContainerInspector>,
    pub sampler_health: Arc<Mutex<SamplerHealth>>,
    pub shutdown: Arc<Notify>,
    pub ipc_timeout: Duration,
}

/// Listener task for accepting socket connections.
pub struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, ctx }
    }

    /// Run the listener loop, spawning a task for each connection.
    pub async fn run(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handle_connection(reader, writer, &ctx).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("Unix accept error: {}", e),
            }
        }
    }
}

fn log_connection_error(e: ConnectionError) {
    match e {
        ConnectionError::Protocol(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected")
        }
        ConnectionError::Protocol(protocol::ProtocolError::Timeout) => {
            warn!("Connection timeout")
        }
        _ => error!("Connection error: {}", e),
    }
}

/// Handle a single client connection.
///
/// Ordinary requests get exactly one response. `Attach` turns the rest of
/// the connection into a stream of `Response::Stream` frames.
pub(crate) async fn handle_connection<R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let request = protocol::read_request(&mut reader, ctx.ipc_timeout).await?;

    // Log polling requests at debug level, other requests at info
    if matches!(request, Request::Ping | Request::Metrics { .. } | Request::MetricsHealth | Request::Jobs { .. }) {
        debug!(request = ?request, "received request");
    } else {
        info!(request = ?request, "received request");
    }

    // Attach upgrades the connection to a stream; handle it before the
    // normal request/response dispatch.
    if let Request::Attach { ref id, from_seq } = request {
        return attach::handle_attach(id, from_seq, reader, writer, ctx).await;
    }

    // Race handler against client disconnect
    let response = tokio::select! {
        response = handle_request(request, ctx) => response,
        _ = detect_client_disconnect(&mut reader) => {
            debug!("Client disconnected, dropping handler");
            return Ok(());
        }
    };

    debug!("Sending response: {:?}", response);
    protocol::write_response(&mut writer, &response, ctx.ipc_timeout).await?;
    Ok(())
}

/// Resolves once the client closes its end (EOF or error).
///
/// In the request-response protocol, the client sends one request then waits,
/// so any further bytes are ignored.
async fn detect_client_disconnect<R: AsyncRead + Unpin>(reader: &mut R) {
    let mut buf = [0u8; 64];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => continue,
        }
    }
}

/// Handle a single request and return a response.
async fn handle_request(request: Request, ctx: &ListenCtx) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version } => {
            if version != PROTOCOL_VERSION {
                debug!(client = %version, daemon = PROTOCOL_VERSION, "protocol version mismatch");
            }
            Response::Hello { version: PROTOCOL_VERSION.to_string() }
        }

        Request::Submit { project, command, container } => {
            jobs::handle_submit(ctx, project, command, container)
        }

        Request::Cancel { id } => jobs::handle_cancel(ctx, &id),

        Request::Job { id } => jobs::handle_job(ctx, &id),

        Request::Jobs { project } => jobs::handle_jobs(ctx, project),

        Request::Metrics { since_ms } => query::handle_metrics(ctx, since_ms),

        Request::MetricsHealth => query::handle_metrics_health(ctx),

        Request::Containers { project } => query::handle_containers(ctx, project).await,

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::Ok
        }

        Request::Attach { .. } => Response::error("attach must be the first request on a connection"),
    }
}

#[cfg(test)]
mod test_fixtures;

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;

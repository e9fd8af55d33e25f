//! Accept loop
//!
//! Every accepted connection runs in its own task. When the shutdown future
//! resolves the loop stops accepting, cancels every in-flight call and waits
//! briefly for them to clean up.

use std::future::Future;
use std::time::Duration;

use depot_common::framing::{DEFAULT_FRAME_TIMEOUT, DEFAULT_IDLE_TIMEOUT};
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::connection::{self, ConnectionParams};
use crate::constants::SHUTDOWN_GRACE_PERIOD;
use crate::context::Shutdown;
use crate::service::FileService;

/// Per-connection limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Deadline for each call, measured from accept; `None` for no deadline
    pub call_timeout: Option<Duration>,
    /// Longest wait for the client to start sending the next frame
    pub idle_timeout: Duration,
    /// Longest time one frame may take once started
    pub frame_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            call_timeout: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
        }
    }
}

/// Serve calls from `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, service: FileService, config: ServerConfig, shutdown: F)
where
    F: Future<Output = ()>,
{
    let cancel = Shutdown::new();
    let mut calls = JoinSet::new();

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,

            accepted = listener.accept() => {
                let (socket, peer_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };
                // Small frames carry control messages
                let _ = socket.set_nodelay(true);

                let mut ctx = cancel.context();
                if let Some(timeout) = config.call_timeout {
                    ctx = ctx.with_timeout(timeout);
                }
                let params = ConnectionParams {
                    peer_addr,
                    service: service.clone(),
                    ctx,
                    idle_timeout: config.idle_timeout,
                    frame_timeout: config.frame_timeout,
                };

                calls.spawn(async move {
                    if let Err(e) = connection::handle_connection(socket, params).await {
                        tracing::debug!(peer = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            // Reap finished calls so the set does not grow
            Some(_) = calls.join_next(), if !calls.is_empty() => {}
        }
    }

    tracing::info!(in_flight = calls.len(), "shutting down");
    cancel.trigger();

    let drained = tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, async {
        while calls.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        tracing::warn!(remaining = calls.len(), "aborting calls that did not finish in time");
        calls.shutdown().await;
    }
}

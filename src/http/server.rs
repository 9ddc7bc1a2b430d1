//! HTTP compatibility listener.
//!
//! # Responsibilities
//! - Bind the secondary listener
//! - Acknowledge readiness once bound
//! - Serve the compatibility router until cancellation
//!
//! Every error here is handed back to the launcher, which treats it as fatal.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Failures of the compatibility listener.
#[derive(Debug, thiserror::Error)]
pub enum CompatError {
    #[error("failed to bind HTTP compatibility listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP compatibility listener on {addr} failed: {source}")]
    Serve {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP compatibility listener on {addr} stopped without being cancelled")]
    Stopped { addr: SocketAddr },
}

/// Bind `addr`, report the bound address on `ready`, and serve `router`.
///
/// Returns `Ok` only when `cancel` fired; any other exit is an error.
pub async fn serve_compat(
    addr: SocketAddr,
    router: Router,
    cancel: CancellationToken,
    ready: watch::Sender<Option<SocketAddr>>,
) -> Result<(), CompatError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| CompatError::Bind { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| CompatError::Bind { addr, source })?;

    ready.send_replace(Some(local_addr));
    tracing::info!(address = %local_addr, "HTTP compatibility listener accepting connections");

    let shutdown = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|source| CompatError::Serve {
            addr: local_addr,
            source,
        })?;

    if cancel.is_cancelled() {
        tracing::info!(address = %local_addr, "HTTP compatibility listener stopped");
        Ok(())
    } else {
        Err(CompatError::Stopped { addr: local_addr })
    }
}

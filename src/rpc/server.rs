//! Native RPC transport: newline-delimited JSON-RPC over TCP.
//!
//! # Responsibilities
//! - Bind the primary listener and publish its address (readiness)
//! - Accept connections until the cancellation token fires
//! - Pipeline frames per connection through the shared [`RpcHandle`]
//!
//! # Design Decisions
//! - Cancellation stops accepting and stops reading new frames; nothing
//!   is drained and no timeout applies
//! - Failures are returned from [`RpcServer::run`] and mirrored into the
//!   readiness state; the caller decides how to report them

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;

use crate::config::UserConfig;
use crate::net::{ConnectionId, ConnectionTracker, Listener, ListenerError};
use crate::rpc::methods::RpcHandle;
use crate::rpc::protocol::{RpcResponse, INVALID_REQUEST};
use crate::rpc::telemetry::{TelemetryClient, Transport};

/// Errors raised by the native RPC listener.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame error: {0}")]
    Frame(#[from] LinesCodecError),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("daemon host `{0}` is not an IP address")]
    InvalidHost(String),
    #[error("RPC listener is not ready: {0}")]
    NotReady(String),
}

/// Bind state of the primary listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Bound(SocketAddr),
    Failed(String),
}

/// Construction parameters for [`RpcServer`].
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    /// Requested port; 0 lets the OS choose.
    pub port: u16,
    pub user_config: Arc<UserConfig>,
}

/// The daemon's RPC service.
pub struct RpcServer {
    config: RpcServerConfig,
    handle: RpcHandle,
    tracker: ConnectionTracker,
    readiness: watch::Sender<Readiness>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, telemetry: Arc<dyn TelemetryClient>) -> Self {
        let handle = RpcHandle::new(Arc::clone(&config.user_config), telemetry);
        let (readiness, _) = watch::channel(Readiness::Pending);
        Self {
            config,
            handle,
            tracker: ConnectionTracker::new(),
            readiness,
        }
    }

    /// Transport-independent handle for wrapping in other transports.
    pub fn handle(&self) -> RpcHandle {
        self.handle.clone()
    }

    /// Watch the listener's bind state.
    pub fn readiness(&self) -> watch::Receiver<Readiness> {
        self.readiness.subscribe()
    }

    /// Wait until the listener is bound, or report why it never will be.
    pub async fn wait_ready(&self) -> Result<SocketAddr, RpcError> {
        wait_bound(self.readiness()).await
    }

    /// Address the listener is bound to, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match *self.readiness.borrow() {
            Readiness::Bound(addr) => Some(addr),
            _ => None,
        }
    }

    /// Connections currently being served.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Bind and serve until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), RpcError> {
        let listener = match self.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                self.readiness.send_replace(Readiness::Failed(e.to_string()));
                return Err(e);
            }
        };
        let addr = listener.local_addr()?;
        self.readiness.send_replace(Readiness::Bound(addr));

        tracing::info!(address = %addr, "RPC server accepting connections");

        let mut accept_failures = 0u32;
        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            let (stream, peer, permit) = match accepted {
                Ok(conn) => {
                    accept_failures = 0;
                    conn
                }
                Err(ListenerError::Accept(e)) => {
                    let delay = accept_backoff(accept_failures);
                    accept_failures = accept_failures.saturating_add(1);
                    tracing::warn!(error = %e, delay = ?delay, "Accept failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => continue,
                    }
                }
                Err(e) => return Err(e.into()),
            };

            let guard = self.tracker.track();
            let handle = self.handle.clone();
            let cancel = cancel.clone();
            let max_frame_bytes = self.config.user_config.daemon.max_request_bytes;

            tokio::spawn(async move {
                let _permit = permit;
                let id = guard.id();
                tracing::debug!(connection_id = %id, peer_addr = %peer, "Serving connection");
                if let Err(e) = serve_connection(stream, handle, max_frame_bytes, cancel, id).await {
                    tracing::debug!(connection_id = %id, error = %e, "Connection ended with error");
                }
                drop(guard);
            });
        }

        tracing::info!(address = %addr, "RPC server stopped accepting");
        Ok(())
    }

    async fn bind(&self) -> Result<Listener, RpcError> {
        let daemon = &self.config.user_config.daemon;
        let host: IpAddr = daemon
            .host
            .parse()
            .map_err(|_| RpcError::InvalidHost(daemon.host.clone()))?;
        Ok(Listener::bind(host, self.config.port, daemon.max_connections).await?)
    }
}

const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Pause before retrying after `failures` consecutive accept errors
/// (e.g. EMFILE), doubling up to one second.
fn accept_backoff(failures: u32) -> Duration {
    ACCEPT_BACKOFF_BASE
        .saturating_mul(2u32.saturating_pow(failures.min(16)))
        .min(ACCEPT_BACKOFF_MAX)
}

/// Resolve a readiness watch into the bound address.
pub async fn wait_bound(mut readiness: watch::Receiver<Readiness>) -> Result<SocketAddr, RpcError> {
    let state = readiness
        .wait_for(|state| *state != Readiness::Pending)
        .await
        .map_err(|_| RpcError::NotReady("server dropped before binding".into()))?
        .clone();

    match state {
        Readiness::Bound(addr) => Ok(addr),
        Readiness::Failed(reason) => Err(RpcError::NotReady(reason)),
        Readiness::Pending => Err(RpcError::NotReady("still pending".into())),
    }
}

async fn serve_connection(
    stream: TcpStream,
    handle: RpcHandle,
    max_frame_bytes: usize,
    cancel: CancellationToken,
    id: ConnectionId,
) -> Result<(), RpcError> {
    let (reader, writer) = stream.into_split();
    let mut frames = FramedRead::new(reader, LinesCodec::new_with_max_length(max_frame_bytes));
    let mut replies = FramedWrite::new(writer, LinesCodec::new());

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = frames.next() => frame,
        };

        let line = match frame {
            None => break,
            Some(Ok(line)) => line,
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                tracing::warn!(connection_id = %id, max_frame_bytes, "Frame too large, closing connection");
                let response = RpcResponse::failure(Value::Null, INVALID_REQUEST, "Request exceeds maximum frame size");
                replies.send(serde_json::to_string(&response)?).await?;
                break;
            }
            Some(Err(e)) => return Err(e.into()),
        };

        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = handle.call_raw(line.as_bytes(), Transport::Native) {
            replies.send(serde_json::to_string(&response)?).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::telemetry::NoopTelemetry;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn server_with(config: UserConfig) -> Arc<RpcServer> {
        Arc::new(RpcServer::new(
            RpcServerConfig {
                port: 0,
                user_config: Arc::new(config),
            },
            Arc::new(NoopTelemetry),
        ))
    }

    #[tokio::test]
    async fn serves_pipelined_frames() {
        let server = server_with(UserConfig::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let server = server.clone();
            let cancel = cancel.clone();
            async move { server.run(cancel).await }
        });

        let addr = server.wait_ready().await.unwrap();
        assert_eq!(server.local_addr(), Some(addr));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":1}\n\n{\"jsonrpc\":\"2.0\",\"method\":\"ping\"}\nnot json\n")
            .await
            .unwrap();

        let mut lines = BufReader::new(stream).lines();
        let first: RpcResponse = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first.result, Some(json!({"message": "pong"})));
        // The notification in between produces no line.
        let second: RpcResponse = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(second.error_code(), Some(crate::rpc::protocol::PARSE_ERROR));

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn oversized_frame_closes_connection() {
        let mut config = UserConfig::default();
        config.daemon.max_request_bytes = 16;
        let server = server_with(config);
        let cancel = CancellationToken::new();
        tokio::spawn({
            let server = server.clone();
            let cancel = cancel.clone();
            async move { server.run(cancel).await }
        });

        let addr = server.wait_ready().await.unwrap();
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut frame = vec![b'x'; 64];
        frame.push(b'\n');
        stream.write_all(&frame).await.unwrap();

        let mut lines = BufReader::new(stream).lines();
        let reply: RpcResponse = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(reply.error_code(), Some(INVALID_REQUEST));
        assert!(!matches!(lines.next_line().await, Ok(Some(_))));

        cancel.cancel();
    }

    #[test]
    fn accept_backoff_doubles_and_caps() {
        assert_eq!(accept_backoff(0), Duration::from_millis(5));
        assert_eq!(accept_backoff(1), Duration::from_millis(10));
        assert_eq!(accept_backoff(4), Duration::from_millis(80));
        assert_eq!(accept_backoff(8), Duration::from_secs(1));
        assert_eq!(accept_backoff(u32::MAX), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn bind_failure_is_reported_through_readiness() {
        let mut config = UserConfig::default();
        config.daemon.host = "not-an-ip".into();
        let server = server_with(config);

        let err = server.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RpcError::InvalidHost(_)));
        assert!(matches!(server.wait_ready().await, Err(RpcError::NotReady(_))));
    }

    #[tokio::test]
    async fn cancelled_before_start_returns_after_bind() {
        let server = server_with(UserConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        server.run(cancel).await.unwrap();
        assert!(server.local_addr().is_some());
        assert_eq!(server.active_connections(), 0);
    }
}

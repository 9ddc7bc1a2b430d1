//! Service launch orchestration.
//!
//! # Responsibilities
//! - Build the RPC server from the launch configuration
//! - Start the primary listener on its own task
//! - Optionally wrap the server for HTTP clients and start the
//!   compatibility listener on the adjacent port
//! - Expose readiness and the single join point (`wait`)
//!
//! # Design Decisions
//! - `launch` only schedules; binding happens on the spawned tasks and is
//!   observable through [`RunningService::ready`]
//! - Primary listener failures are logged and otherwise left alone
//! - Compatibility listener failures are fatal and go to the supervisor;
//!   the primary listener is not stopped first
//! - `wait` returns as soon as the shutdown token fires; listener tasks
//!   are never joined or drained

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::sync::watch;

use crate::config::UserConfig;
use crate::http::{serve_compat, wrap_server, OriginPolicy};
use crate::lifecycle::shutdown::ShutdownToken;
use crate::lifecycle::supervisor::{FatalError, FatalReporter};
use crate::rpc::server::{wait_bound, Readiness};
use crate::rpc::{RpcError, RpcServer, RpcServerConfig, TelemetryClient};

/// Everything needed to start the daemon. Immutable once launched.
#[derive(Clone)]
pub struct LaunchConfig {
    /// Primary port; 0 lets the OS choose.
    pub port: u16,
    /// Also serve the HTTP compatibility transport.
    pub compat_mode: bool,
    pub user_config: Arc<UserConfig>,
    pub telemetry: Arc<dyn TelemetryClient>,
}

impl std::fmt::Debug for LaunchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchConfig")
            .field("port", &self.port)
            .field("compat_mode", &self.compat_mode)
            .field("user_config", &self.user_config)
            .finish_non_exhaustive()
    }
}

/// How the compatibility port is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryPort {
    /// Explicit primary port `p`; the compatibility listener uses `p + 1`.
    Adjacent(u16),
    /// OS-assigned primary port; `bound + 1` once the primary is bound.
    AfterPrimary,
    /// Primary port is `u16::MAX`; there is no adjacent port.
    OutOfRange,
}

impl SecondaryPort {
    pub fn for_primary(port: u16) -> Self {
        match port {
            0 => SecondaryPort::AfterPrimary,
            p => p.checked_add(1).map_or(SecondaryPort::OutOfRange, SecondaryPort::Adjacent),
        }
    }
}

/// Lifecycle of a launched service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Idle,
    Starting,
    Running,
    Cancelling,
    Stopped,
}

/// Addresses the listeners actually bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundPorts {
    pub primary: SocketAddr,
    pub secondary: Option<SocketAddr>,
}

/// A listener that will never accept connections.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("RPC listener never became ready: {0}")]
    Primary(#[source] RpcError),
    #[error("HTTP compatibility listener never became ready")]
    Secondary,
}

/// Starts the daemon's listeners.
pub struct Launcher {
    fatal: FatalReporter,
    state: Arc<watch::Sender<ServiceState>>,
}

impl Launcher {
    pub fn new(fatal: FatalReporter) -> Self {
        let (state, _) = watch::channel(ServiceState::Idle);
        Self {
            fatal,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> ServiceState {
        *self.state.borrow()
    }

    /// Schedule the listeners and return without waiting for them to bind.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn launch(self, config: LaunchConfig, shutdown: &ShutdownToken) -> RunningService {
        self.state.send_replace(ServiceState::Starting);
        tracing::info!(
            port = config.port,
            compat_mode = config.compat_mode,
            profile = %config.user_config.profile.name,
            "Launching daemon"
        );

        let server = Arc::new(RpcServer::new(
            RpcServerConfig {
                port: config.port,
                user_config: Arc::clone(&config.user_config),
            },
            Arc::clone(&config.telemetry),
        ));

        tokio::spawn({
            let server = Arc::clone(&server);
            let cancel = shutdown.cancellation();
            let port = config.port;
            async move {
                if let Err(e) = server.run(cancel).await {
                    tracing::error!(port, error = %e, "RPC server failed");
                }
            }
        });

        let secondary_port = config.compat_mode.then(|| SecondaryPort::for_primary(config.port));
        let secondary_ready = secondary_port.map(|secondary| {
            let (ready_tx, ready_rx) = watch::channel(None);
            let router = wrap_server(
                server.handle(),
                OriginPolicy::AllowAny,
                config.user_config.daemon.max_request_bytes,
            );
            tokio::spawn(run_compat(CompatTask {
                secondary,
                host: config.user_config.daemon.host.clone(),
                primary: server.readiness(),
                router,
                shutdown: shutdown.clone(),
                ready: ready_tx,
                fatal: self.fatal.clone(),
            }));
            ready_rx
        });

        self.state.send_replace(ServiceState::Running);

        RunningService {
            primary_port: config.port,
            secondary_port,
            shutdown: shutdown.clone(),
            server,
            secondary_ready,
            state: self.state,
        }
    }
}

struct CompatTask {
    secondary: SecondaryPort,
    host: String,
    primary: watch::Receiver<Readiness>,
    router: axum::Router,
    shutdown: ShutdownToken,
    ready: watch::Sender<Option<SocketAddr>>,
    fatal: FatalReporter,
}

async fn run_compat(task: CompatTask) {
    let host: IpAddr = match task.host.parse() {
        Ok(host) => host,
        Err(_) => return task.fatal.report(FatalError::InvalidHost(task.host)),
    };

    let port = match task.secondary {
        SecondaryPort::Adjacent(port) => port,
        SecondaryPort::OutOfRange => {
            return task.fatal.report(FatalError::CompatPortOutOfRange(u16::MAX));
        }
        SecondaryPort::AfterPrimary => match wait_bound(task.primary).await {
            Ok(primary) => match primary.port().checked_add(1) {
                Some(port) => port,
                None => return task.fatal.report(FatalError::CompatPortOutOfRange(primary.port())),
            },
            Err(e) => return task.fatal.report(FatalError::PrimaryNotReady(e)),
        },
    };

    let addr = SocketAddr::new(host, port);
    if let Err(e) = serve_compat(addr, task.router, task.shutdown.cancellation(), task.ready).await {
        task.fatal.report(e.into());
    }
}

/// Handle to the launched daemon.
pub struct RunningService {
    primary_port: u16,
    secondary_port: Option<SecondaryPort>,
    shutdown: ShutdownToken,
    server: Arc<RpcServer>,
    secondary_ready: Option<watch::Receiver<Option<SocketAddr>>>,
    state: Arc<watch::Sender<ServiceState>>,
}

impl RunningService {
    /// Port requested for the primary listener (0 = OS-assigned).
    pub fn primary_port(&self) -> u16 {
        self.primary_port
    }

    /// Compatibility port rule; `Some` exactly when compat mode is on.
    pub fn secondary_port(&self) -> Option<SecondaryPort> {
        self.secondary_port
    }

    pub fn shutdown(&self) -> &ShutdownToken {
        &self.shutdown
    }

    pub fn server(&self) -> &Arc<RpcServer> {
        &self.server
    }

    pub fn state(&self) -> ServiceState {
        let state = *self.state.borrow();
        if state == ServiceState::Running && self.shutdown.is_triggered() {
            ServiceState::Cancelling
        } else {
            state
        }
    }

    /// Wait until every started listener is accepting connections.
    pub async fn ready(&self) -> Result<BoundPorts, LaunchError> {
        let primary = self.server.wait_ready().await.map_err(LaunchError::Primary)?;

        let secondary = match &self.secondary_ready {
            None => None,
            Some(ready) => {
                let mut ready = ready.clone();
                let addr = *ready
                    .wait_for(Option::is_some)
                    .await
                    .map_err(|_| LaunchError::Secondary)?;
                addr
            }
        };

        Ok(BoundPorts { primary, secondary })
    }

    /// Block until the shutdown token fires.
    pub async fn wait(&self) {
        self.shutdown.wait().await;
        self.state.send_replace(ServiceState::Stopped);
        tracing::info!("Daemon stopped");
    }
}

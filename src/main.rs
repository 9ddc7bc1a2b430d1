//! Local RPC daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │                  RPC DAEMON                  │
//!   Native client     │  ┌──────────┐                                │
//!   ──────────────────┼─▶│ rpc      │───┐                            │
//!   (port P)          │  │ server   │   │   ┌──────────────┐         │
//!                     │  └──────────┘   ├──▶│  RpcHandle   │         │
//!   HTTP/1.1 client   │  ┌──────────┐   │   │ (method table│         │
//!   ──────────────────┼─▶│ http     │───┘   │  + telemetry)│         │
//!   (port P + 1)      │  │ compat   │       └──────────────┘         │
//!                     │  └──────────┘                                │
//!                     │                                              │
//!                     │  lifecycle: signals → cleanup → token fires  │
//!                     │             fatal errors → supervisor exit   │
//!                     └──────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use rpc_daemon::cli::{Cli, Commands, DaemonArgs};
use rpc_daemon::config::{load_or_default, UserConfig};
use rpc_daemon::lifecycle::{fatal_channel, supervise, CancellationSource, LaunchConfig, Launcher, OsSignals};
use rpc_daemon::observability::init_logging;
use rpc_daemon::rpc::telemetry_from_config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let user_config = Arc::new(load_or_default(cli.config.as_deref())?);
    init_logging(&user_config.observability);

    match cli.command {
        Commands::Daemon(args) => run_daemon(args, user_config).await,
    }
}

async fn run_daemon(args: DaemonArgs, user_config: Arc<UserConfig>) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("rpc-daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let (fatal, fatal_events) = fatal_channel();
    tokio::spawn(supervise(fatal_events));

    let root = CancellationToken::new();
    let shutdown = CancellationSource::new(OsSignals::install()?).arm(&root, || {
        tracing::debug!(prefix = "daemon", "Ctrl+C received, cleaning up...");
    });

    let telemetry = telemetry_from_config(&user_config.telemetry);
    let service = Launcher::new(fatal).launch(
        LaunchConfig {
            port: args.port,
            compat_mode: args.http_compat,
            user_config,
            telemetry,
        },
        &shutdown,
    );

    tokio::select! {
        ready = service.ready() => match ready {
            Ok(ports) => tracing::info!(
                primary = %ports.primary,
                http_compat = ?ports.secondary,
                "Daemon ready"
            ),
            Err(e) => tracing::warn!(error = %e, "Daemon listener not ready"),
        },
        _ = service.shutdown().wait() => {}
    }

    service.wait().await;
    Ok(())
}

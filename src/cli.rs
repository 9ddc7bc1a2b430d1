//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "rpc-daemon", version)]
#[command(about = "Drive command-line functionality from a local RPC client", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file (defaults are used when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run as a daemon on your localhost
    #[command(
        hide = true,
        long_about = "Start a local RPC server, enabling you to invoke commands programmatically from an RPC client.\n\n\
                      Pass --http to also expose the service to HTTP/1.1 clients (such as browsers) on the next port."
    )]
    Daemon(DaemonArgs),
}

#[derive(Debug, Clone, Args)]
pub struct DaemonArgs {
    /// The TCP port the daemon will listen to (default: an available port)
    #[arg(long, default_value_t = 0)]
    pub port: u16,

    /// Spin up an HTTP-compatible RPC service on port + 1 (default: false)
    #[arg(long = "http")]
    pub http_compat: bool,
}

//! Local RPC daemon library.
//!
//! Starts a localhost JSON-RPC service, optionally mirrored over an
//! HTTP/1.1 compatibility transport, and coordinates its shutdown.

pub mod cli;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rpc;

pub use config::UserConfig;
pub use lifecycle::{CancellationSource, LaunchConfig, Launcher, RunningService, ShutdownToken};
pub use rpc::RpcServer;

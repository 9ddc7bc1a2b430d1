//! RPC service subsystem.
//!
//! # Data Flow
//! ```text
//! Native client (TCP, one JSON-RPC envelope per line)
//!     → server.rs (accept loop, frame codec)
//!     → methods.rs (RpcHandle: decode, dispatch, telemetry)
//!     → protocol.rs (response envelope)
//!
//! HTTP compatibility client
//!     → crate::http::compat (wraps the same RpcHandle)
//! ```
//!
//! # Design Decisions
//! - One RpcHandle is shared by every transport; dispatch is lock-free
//! - The server owns its readiness state so launchers can await the bind

pub mod methods;
pub mod protocol;
pub mod server;
pub mod telemetry;

pub use methods::RpcHandle;
pub use protocol::{RpcRequest, RpcResponse};
pub use server::{Readiness, RpcError, RpcServer, RpcServerConfig};
pub use telemetry::{telemetry_from_config, NoopTelemetry, TelemetryClient, TracingTelemetry, Transport};

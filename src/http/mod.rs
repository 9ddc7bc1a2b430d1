//! HTTP compatibility transport subsystem.
//!
//! # Data Flow
//! ```text
//! Browser / HTTP/1.1 client
//!     → server.rs (secondary listener, readiness ack)
//!     → compat.rs (CORS per origin policy, body limit, envelope decode)
//!     → RpcHandle shared with the native transport
//!     → JSON-RPC response body
//! ```

pub mod compat;
pub mod server;

pub use compat::{wrap_server, OriginPolicy};
pub use server::{serve_compat, CompatError};

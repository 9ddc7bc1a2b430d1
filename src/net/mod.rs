//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection (native RPC transport)
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (connection ID, live count)
//!     → Hand off to the RPC frame loop
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Listeners bind to the local host only

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields: address, port, connection_id, ...)
//!     → metrics counters (daemon_rpc_requests_total, daemon_connections_total)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, text or JSON)
//!     → whatever metrics recorder the embedding process installs
//! ```

pub mod logging;

pub use logging::init_logging;

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     LaunchConfig → build RpcServer → spawn primary listener
//!                  → (compat mode) wrap handle → spawn HTTP listener on port + 1
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGINT/SIGTERM → cleanup action → ShutdownToken fires → wait() returns
//!
//! Fatal errors (supervisor.rs):
//!     HTTP listener bind/serve failure → FatalReporter → supervisor exits
//! ```
//!
//! # Design Decisions
//! - No drain and no timeout: cancellation is advisory for listeners
//! - One shutdown token per process, fired at most once
//! - Fatal errors are events, so tests can observe them without exiting

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use shutdown::{CancellationSource, ShutdownToken, TokenState};
pub use signals::{manual, ManualSignals, OsSignals, SignalSource, SignalTrigger, Termination};
pub use startup::{BoundPorts, LaunchConfig, LaunchError, Launcher, RunningService, SecondaryPort, ServiceState};
pub use supervisor::{fatal_channel, supervise, supervise_with, FatalError, FatalEvents, FatalReporter};

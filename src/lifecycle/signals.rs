//! Termination signal sources.
//!
//! # Responsibilities
//! - Observe SIGINT/SIGTERM (Ctrl+C on non-unix targets)
//! - Offer a channel-driven source so tests can deliver "signals"
//!   without touching process-wide signal state

use std::future::Future;

use tokio::sync::mpsc;

/// A termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Interrupt => write!(f, "interrupt"),
            Termination::Terminate => write!(f, "terminate"),
        }
    }
}

/// Something that yields termination signals.
pub trait SignalSource: Send + 'static {
    /// Resolves with the next signal, or `None` once no more can arrive.
    fn recv(&mut self) -> impl Future<Output = Option<Termination>> + Send;
}

/// Process signals, via Tokio's async-safe handlers.
pub struct OsSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl OsSignals {
    /// Register the handlers. Must be called inside a Tokio runtime.
    pub fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            #[cfg(unix)]
            interrupt: signal(SignalKind::interrupt())?,
            #[cfg(unix)]
            terminate: signal(SignalKind::terminate())?,
        })
    }
}

impl SignalSource for OsSignals {
    async fn recv(&mut self) -> Option<Termination> {
        #[cfg(unix)]
        {
            tokio::select! {
                s = self.interrupt.recv() => s.map(|_| Termination::Interrupt),
                s = self.terminate.recv() => s.map(|_| Termination::Terminate),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok().map(|_| Termination::Interrupt)
        }
    }
}

/// Create a manually driven source and the trigger that feeds it.
pub fn manual() -> (SignalTrigger, ManualSignals) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalTrigger { tx }, ManualSignals { rx })
}

/// Delivers signals to a [`ManualSignals`]. Clone freely; safe from any task.
#[derive(Debug, Clone)]
pub struct SignalTrigger {
    tx: mpsc::UnboundedSender<Termination>,
}

impl SignalTrigger {
    pub fn deliver(&self, signal: Termination) {
        // The observer stops listening after the first signal.
        let _ = self.tx.send(signal);
    }
}

/// Signal source fed by a [`SignalTrigger`].
#[derive(Debug)]
pub struct ManualSignals {
    rx: mpsc::UnboundedReceiver<Termination>,
}

impl SignalSource for ManualSignals {
    async fn recv(&mut self) -> Option<Termination> {
        self.rx.recv().await
    }
}

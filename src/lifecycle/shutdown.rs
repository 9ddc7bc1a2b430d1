//! Shutdown coordination for the daemon.
//!
//! A [`CancellationSource`] turns the first termination signal into a
//! one-shot [`ShutdownToken`]. The cleanup action always finishes before
//! any consumer can observe the token as fired.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::lifecycle::signals::{SignalSource, Termination};

/// Observable state of a [`ShutdownToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Armed,
    Fired,
}

/// Why the token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Signal(Termination),
    Parent,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Signal(signal) => write!(f, "signal:{}", signal),
            Trigger::Parent => write!(f, "parent"),
        }
    }
}

/// Single-fire broadcast handed to every task that must know when to stop.
///
/// Consumers can only observe it; firing is reserved to the
/// [`CancellationSource`] that armed it.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    fired: CancellationToken,
    triggered: Arc<AtomicBool>,
}

impl ShutdownToken {
    fn new() -> Self {
        Self {
            fired: CancellationToken::new(),
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wait until the token fires.
    pub async fn wait(&self) {
        self.fired.cancelled().await;
    }

    /// Non-blocking fired check.
    pub fn is_fired(&self) -> bool {
        self.fired.is_cancelled()
    }

    /// True from the moment the signal is observed, before cleanup runs.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> TokenState {
        if self.is_fired() {
            TokenState::Fired
        } else {
            TokenState::Armed
        }
    }

    /// A cancellation token that fires with this one, for listener loops.
    ///
    /// Cancelling the returned token does not fire the shutdown token.
    pub fn cancellation(&self) -> CancellationToken {
        self.fired.child_token()
    }
}

/// Instantiable signal-to-cancellation bridge.
pub struct CancellationSource<S> {
    signals: S,
}

impl<S: SignalSource> CancellationSource<S> {
    pub fn new(signals: S) -> Self {
        Self { signals }
    }

    /// Start observing. On the first signal, or when `parent` is cancelled,
    /// `cleanup` runs to completion and then the returned token fires.
    /// Later signals are ignored.
    ///
    /// `cleanup` runs on the blocking pool, so a slow cleanup does not stall
    /// other tasks on the runtime.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn arm<F>(self, parent: &CancellationToken, cleanup: F) -> ShutdownToken
    where
        F: FnOnce() + Send + 'static,
    {
        let token = ShutdownToken::new();
        let fired = token.fired.clone();
        let triggered = Arc::clone(&token.triggered);
        let parent = parent.clone();
        let mut signals = self.signals;

        tokio::spawn(async move {
            let trigger = observe(&mut signals, &parent).await;
            triggered.store(true, Ordering::SeqCst);
            tracing::debug!(trigger = %trigger, "Shutdown triggered, running cleanup");

            if let Err(e) = tokio::task::spawn_blocking(cleanup).await {
                tracing::error!(error = %e, "Shutdown cleanup panicked");
            }

            // Log before firing; the process may exit as soon as `wait` returns.
            tracing::info!(trigger = %trigger, "Shutdown token fired");
            fired.cancel();
        });

        token
    }
}

async fn observe<S: SignalSource>(signals: &mut S, parent: &CancellationToken) -> Trigger {
    let mut signals_open = true;
    loop {
        tokio::select! {
            _ = parent.cancelled() => return Trigger::Parent,
            signal = signals.recv(), if signals_open => match signal {
                Some(signal) => return Trigger::Signal(signal),
                None => {
                    tracing::debug!("Signal source closed, waiting on parent only");
                    signals_open = false;
                }
            },
        }
    }
}

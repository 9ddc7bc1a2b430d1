//! Fatal-error delivery.
//!
//! Background listeners that must not fail silently report a [`FatalError`]
//! instead of exiting the process themselves. The top-level supervisor
//! decides what a fatal error means: the daemon binary exits immediately,
//! tests inspect the event.

use tokio::sync::mpsc;

use crate::http::CompatError;
use crate::rpc::RpcError;

/// Conditions that end the daemon.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error(transparent)]
    CompatListener(#[from] CompatError),
    #[error("cannot derive the HTTP compatibility port: {0}")]
    PrimaryNotReady(#[source] RpcError),
    #[error("HTTP compatibility port would be {0} + 1, which is out of range")]
    CompatPortOutOfRange(u16),
    #[error("daemon host `{0}` is not an IP address")]
    InvalidHost(String),
}

/// Sending half, cloned into every task that can fail fatally.
#[derive(Debug, Clone)]
pub struct FatalReporter {
    tx: mpsc::UnboundedSender<FatalError>,
}

impl FatalReporter {
    pub fn report(&self, error: FatalError) {
        tracing::error!(error = %error, "Fatal error reported");
        if self.tx.send(error).is_err() {
            tracing::warn!("No supervisor is listening for fatal errors");
        }
    }
}

/// Receiving half, owned by the supervisor.
#[derive(Debug)]
pub struct FatalEvents {
    rx: mpsc::UnboundedReceiver<FatalError>,
}

impl FatalEvents {
    /// Next fatal error, or `None` once every reporter is gone.
    pub async fn recv(&mut self) -> Option<FatalError> {
        self.rx.recv().await
    }
}

pub fn fatal_channel() -> (FatalReporter, FatalEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FatalReporter { tx }, FatalEvents { rx })
}

/// Hand the first fatal error to `on_fatal`.
pub async fn supervise_with<F>(mut events: FatalEvents, on_fatal: F)
where
    F: FnOnce(FatalError),
{
    if let Some(error) = events.recv().await {
        on_fatal(error);
    }
}

/// Exit the process with status 1 on the first fatal error.
///
/// Nothing else is stopped first; still-running listeners die with the process.
pub async fn supervise(events: FatalEvents) {
    supervise_with(events, |error| {
        tracing::error!(error = %error, "failed to serve, exiting");
        std::process::exit(1);
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_event_reaches_handler() {
        let (reporter, events) = fatal_channel();
        reporter.report(FatalError::CompatPortOutOfRange(u16::MAX));
        reporter.report(FatalError::InvalidHost("nope".into()));

        let mut seen = None;
        supervise_with(events, |e| seen = Some(e)).await;
        assert!(matches!(seen, Some(FatalError::CompatPortOutOfRange(u16::MAX))));
    }

    #[tokio::test]
    async fn returns_when_reporters_dropped() {
        let (reporter, events) = fatal_channel();
        drop(reporter);

        let mut called = false;
        supervise_with(events, |_| called = true).await;
        assert!(!called);
    }
}

//! Usage reporting for method invocations.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::config::TelemetryConfig;

/// Which transport a call arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Native,
    HttpCompat,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Native => write!(f, "native"),
            Transport::HttpCompat => write!(f, "http-compat"),
        }
    }
}

/// One completed method call.
#[derive(Debug, Clone)]
pub struct InvocationEvent {
    pub invocation_id: Uuid,
    pub method: String,
    pub transport: Transport,
    /// JSON-RPC error code when the call failed.
    pub error_code: Option<i64>,
    pub elapsed: Duration,
}

/// Receiver of usage events. Called from any task, concurrently.
pub trait TelemetryClient: Send + Sync {
    fn record_invocation(&self, event: &InvocationEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetryClient for NoopTelemetry {
    fn record_invocation(&self, _event: &InvocationEvent) {}
}

/// Emits each event as a structured `debug` log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetryClient for TracingTelemetry {
    fn record_invocation(&self, event: &InvocationEvent) {
        tracing::debug!(
            invocation_id = %event.invocation_id,
            method = %event.method,
            transport = %event.transport,
            error_code = ?event.error_code,
            elapsed_us = event.elapsed.as_micros() as u64,
            "RPC invocation"
        );
    }
}

/// Pick the client matching the telemetry settings.
pub fn telemetry_from_config(config: &TelemetryConfig) -> Arc<dyn TelemetryClient> {
    if config.enabled {
        Arc::new(TracingTelemetry)
    } else {
        Arc::new(NoopTelemetry)
    }
}

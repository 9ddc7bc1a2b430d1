//! Method table and dispatch.
//!
//! # Design Decisions
//! - Dispatch takes `&self` only; the table is immutable after construction,
//!   so both transports call into it concurrently without locks
//! - Every call is reported to telemetry and counted, successful or not

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::UserConfig;
use crate::rpc::protocol::{
    parse_request, RpcRequest, RpcResponse, INVALID_PARAMS, METHOD_NOT_FOUND,
};
use crate::rpc::telemetry::{InvocationEvent, TelemetryClient, Transport};

/// Names of every method the daemon answers.
pub const METHODS: [&str; 5] = ["ping", "version", "methods", "echo", "config.profile"];

#[derive(Deserialize)]
struct EchoParams {
    message: String,
}

/// Shared dispatch state behind an [`RpcHandle`].
struct Dispatcher {
    user_config: Arc<UserConfig>,
    telemetry: Arc<dyn TelemetryClient>,
}

impl Dispatcher {
    fn invoke(&self, request: &RpcRequest) -> Result<Value, (i64, String)> {
        match request.method.as_str() {
            "ping" => Ok(json!({ "message": "pong" })),
            "version" => Ok(json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            })),
            "methods" => Ok(json!(METHODS)),
            "echo" => {
                let params: EchoParams = serde_json::from_value(request.params.clone())
                    .map_err(|e| (INVALID_PARAMS, format!("Invalid params: {e}")))?;
                Ok(json!({ "message": params.message }))
            }
            "config.profile" => Ok(json!({
                "name": self.user_config.profile.name,
                "project_name": self.user_config.profile.project_name,
            })),
            other => Err((METHOD_NOT_FOUND, format!("Method not found: {other}"))),
        }
    }
}

/// Cheap, clonable handle to the RPC method table.
///
/// This is the transport-independent entry point: the native listener and
/// the HTTP compatibility wrapper both call through it.
#[derive(Clone)]
pub struct RpcHandle {
    inner: Arc<Dispatcher>,
}

impl RpcHandle {
    pub fn new(user_config: Arc<UserConfig>, telemetry: Arc<dyn TelemetryClient>) -> Self {
        Self {
            inner: Arc::new(Dispatcher {
                user_config,
                telemetry,
            }),
        }
    }

    /// Dispatch a decoded request.
    ///
    /// Notifications are dispatched too; the returned response carries a
    /// `null` id and callers on the wire drop it.
    pub fn call(&self, request: RpcRequest, transport: Transport) -> RpcResponse {
        let start = Instant::now();
        let id = request.id.clone().unwrap_or(Value::Null);
        let response = match self.inner.invoke(&request) {
            Ok(result) => RpcResponse::success(id, result),
            Err((code, message)) => RpcResponse::failure(id, code, message),
        };

        let outcome = if response.error.is_some() { "error" } else { "ok" };
        metrics::counter!(
            "daemon_rpc_requests_total",
            "transport" => transport.to_string(),
            "outcome" => outcome
        )
        .increment(1);

        self.inner.telemetry.record_invocation(&InvocationEvent {
            invocation_id: Uuid::new_v4(),
            method: request.method,
            transport,
            error_code: response.error_code(),
            elapsed: start.elapsed(),
        });

        response
    }

    /// Decode and dispatch one raw envelope.
    ///
    /// Returns the reply to send, or `None` for a well-formed notification.
    /// Envelopes that fail to decode are always answered.
    pub fn call_raw(&self, bytes: &[u8], transport: Transport) -> Option<RpcResponse> {
        match parse_request(bytes) {
            Ok(request) if request.is_notification() => {
                self.call(request, transport);
                None
            }
            Ok(request) => Some(self.call(request, transport)),
            Err(response) => {
                tracing::debug!(transport = %transport, "Rejected malformed request");
                Some(response)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::protocol::PARSE_ERROR;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, Option<i64>)>>);

    impl TelemetryClient for Recorder {
        fn record_invocation(&self, event: &InvocationEvent) {
            self.0.lock().unwrap().push((event.method.clone(), event.error_code));
        }
    }

    fn handle_with(recorder: Arc<Recorder>) -> RpcHandle {
        let mut config = UserConfig::default();
        config.profile.name = "work".into();
        config.profile.project_name = Some("billing".into());
        RpcHandle::new(Arc::new(config), recorder)
    }

    #[test]
    fn ping_answers_pong() {
        let handle = handle_with(Arc::default());
        let resp = handle.call(RpcRequest::new("ping", Value::Null, 1), Transport::Native);
        assert_eq!(resp.result, Some(json!({"message": "pong"})));
        assert_eq!(resp.id, json!(1));
    }

    #[test]
    fn profile_comes_from_user_config() {
        let handle = handle_with(Arc::default());
        let resp = handle.call(RpcRequest::new("config.profile", Value::Null, 2), Transport::HttpCompat);
        assert_eq!(resp.result, Some(json!({"name": "work", "project_name": "billing"})));
    }

    #[test]
    fn echo_validates_params() {
        let handle = handle_with(Arc::default());
        let ok = handle.call(RpcRequest::new("echo", json!({"message": "hi"}), 3), Transport::Native);
        assert_eq!(ok.result, Some(json!({"message": "hi"})));

        let bad = handle.call(RpcRequest::new("echo", json!([1, 2]), 4), Transport::Native);
        assert_eq!(bad.error_code(), Some(INVALID_PARAMS));
    }

    #[test]
    fn unknown_method_is_reported_to_telemetry() {
        let recorder = Arc::new(Recorder::default());
        let handle = handle_with(recorder.clone());

        let resp = handle.call(RpcRequest::new("nope", Value::Null, 5), Transport::Native);
        assert_eq!(resp.error_code(), Some(METHOD_NOT_FOUND));

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.as_slice(), &[("nope".to_string(), Some(METHOD_NOT_FOUND))]);
    }

    #[test]
    fn malformed_frames_skip_telemetry() {
        let recorder = Arc::new(Recorder::default());
        let handle = handle_with(recorder.clone());

        let resp = handle.call_raw(b"][", Transport::Native).unwrap();
        assert_eq!(resp.error_code(), Some(PARSE_ERROR));
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn notifications_are_dispatched_without_reply() {
        let recorder = Arc::new(Recorder::default());
        let handle = handle_with(recorder.clone());

        let reply = handle.call_raw(br#"{"jsonrpc":"2.0","method":"nope"}"#, Transport::HttpCompat);
        assert!(reply.is_none());
        assert_eq!(
            recorder.0.lock().unwrap().as_slice(),
            &[("nope".to_string(), Some(METHOD_NOT_FOUND))]
        );

        let unparsable = handle.call_raw(br#"{"jsonrpc":"2.0"}"#, Transport::Native);
        assert_eq!(unparsable.and_then(|r| r.error_code()), Some(crate::rpc::protocol::INVALID_REQUEST));
    }

    #[test]
    fn concurrent_dispatch_from_many_threads() {
        let recorder = Arc::new(Recorder::default());
        let handle = handle_with(recorder.clone());

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let handle = handle.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        let resp = handle.call(RpcRequest::new("ping", Value::Null, i * 100 + j), Transport::Native);
                        assert!(resp.error.is_none());
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(recorder.0.lock().unwrap().len(), 200);
    }
}

//! HTTP/1.1 compatibility wrapper around the RPC handle.
//!
//! Browser-style clients cannot speak the native line-framed transport, so
//! this router accepts one JSON-RPC envelope per `POST` body and answers
//! with the envelope the native transport would have written.
//!
//! # Design Decisions
//! - Transport errors still answer `200 OK` with a JSON-RPC error body;
//!   only body-limit violations surface as HTTP errors (413)
//! - Notifications are answered with `204 No Content`
//! - Cross-origin access is decided by an [`OriginPolicy`]; the daemon
//!   passes [`OriginPolicy::AllowAny`], which accepts every origin

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::rpc::{RpcHandle, Transport};

/// Which browser origins may call the wrapped service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Accept requests from any origin.
    ///
    /// Security-relevant: any web page the user visits can call the daemon.
    AllowAny,
    /// Accept only these exact origins (e.g., "http://localhost:3000").
    AllowList(Vec<String>),
}

impl OriginPolicy {
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            OriginPolicy::AllowAny => true,
            OriginPolicy::AllowList(origins) => origins.iter().any(|o| o == origin),
        }
    }

    fn cors_layer(&self) -> CorsLayer {
        let policy = self.clone();
        let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin.to_str().map(|o| policy.allows(o)).unwrap_or(false)
        });

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    }
}

/// Build the HTTP handler translating requests into calls on `handle`.
pub fn wrap_server(handle: RpcHandle, policy: OriginPolicy, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", post(rpc_handler))
        .route("/rpc", post(rpc_handler))
        .with_state(handle)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(policy.cors_layer())
        .layer(TraceLayer::new_for_http())
}

async fn rpc_handler(State(handle): State<RpcHandle>, body: Bytes) -> Response {
    match handle.call_raw(&body, Transport::HttpCompat) {
        Some(reply) => Json(reply).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

//! Shutdown rejection gate.
//! Runs in front of every route; once the flag is set, new requests get 503.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::RequestIdExt;
use crate::observability::metrics;

/// Body sent with every rejected request.
pub const SHUTTING_DOWN_BODY: &str = "service is shutting down";

/// Shared accept/reject flag for one server.
#[derive(Debug, Clone)]
pub struct RejectGate {
    server: Arc<str>,
    rejecting: Arc<AtomicBool>,
}

impl RejectGate {
    pub fn new(server: &str) -> Self {
        Self {
            server: Arc::from(server),
            rejecting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flip to rejecting. Returns `true` only for the call that flipped it.
    pub fn close(&self) -> bool {
        !self.rejecting.swap(true, Ordering::SeqCst)
    }

    pub fn is_rejecting(&self) -> bool {
        self.rejecting.load(Ordering::SeqCst)
    }
}

pub async fn reject_middleware(
    State(gate): State<RejectGate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !gate.is_rejecting() {
        return next.run(request).await;
    }

    tracing::debug!(
        server = %gate.server,
        request_id = %request.request_id(),
        path = %request.uri().path(),
        "Rejecting request during shutdown"
    );
    metrics::record_rejected(&gate.server);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::CONNECTION, "close")],
        SHUTTING_DOWN_BODY,
    )
        .into_response()
}

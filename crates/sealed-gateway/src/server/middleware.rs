//! Layers wrapped around every route.

use std::time::Duration;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    Router,
};
use common::protocol::TRACE_ID_HEADER;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Span;

/// Requests still running after this are answered with 408.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest body the gateway buffers; sealed payloads are small JSON documents.
pub const BODY_LIMIT: usize = 1024 * 1024;

/// Attach the body limit, per-request tracing span and timeout to `router`.
pub fn apply<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

/// One span per request, tagged with the caller's trace id when it sent one.
fn request_span(request: &Request<Body>) -> Span {
    let trace_id = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        trace_id,
    )
}

//! Axum request handlers for all gateway endpoints.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use common::protocol::{EchoResponse, ErrorResponse, HealthResponse};
use common::ServiceError;
use tracing::{info, warn};

use super::state::AppState;
use crate::opener;

/// `POST /echo`: open the request and send its JSON back.
///
/// Sealed requests get a sealed `text/plain` reply under the same session
/// key; plain requests get plain JSON.
pub async fn echo(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let opened = match opener::open_request(&state.private_key, &headers, &body) {
        Ok(opened) => opened,
        Err(e) => {
            warn!(error = %e, "request rejected");
            return reject(e);
        }
    };

    let sealed = opened.seal.is_some();
    info!(sealed, trace_id = opened.trace_id.as_deref().unwrap_or_default(), "echoing request");

    let reply = EchoResponse {
        echo: opened.body,
        trace_id: opened.trace_id,
    };
    match opened.seal {
        None => (StatusCode::OK, Json(reply)).into_response(),
        Some(seal) => match seal.seal(&reply) {
            Ok(frame) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], frame).into_response(),
            Err(e) => {
                warn!(error = %e, "response sealing failed");
                reject(e)
            }
        },
    }
}

/// `GET /health`: liveness check.
pub async fn health() -> impl IntoResponse {
    let body = HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    };
    (StatusCode::OK, Json(body))
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

fn reject(err: ServiceError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::new(err.code(), err.to_string()))).into_response()
}

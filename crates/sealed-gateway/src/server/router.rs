//! Axum router construction.

use axum::{
    routing::{get, post},
    Router,
};

use super::{handlers, middleware, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState) -> Router {
    let routes = Router::new()
        .route("/echo", post(handlers::echo))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found);
    middleware::apply(routes).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::state::{test_private_key, test_state};
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use sealed_client::crypto::{VersionToken, WrappingKey};
    use sealed_client::dispatch::{
        HttpTransport, InboundResponse, OutboundRequest, TransportError,
    };
    use sealed_client::{
        EncryptionContext, Framing, ResponsePayload, SecureDispatcher, SecureRequest,
        SessionContext,
    };
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = build(test_state());
        let req = Request::builder()
            .uri("/unknown")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn health_route_exists() {
        let app = build(test_state());
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    /// Drives the router in-process, standing in for the network.
    struct RouterTransport(Router);

    #[async_trait]
    impl HttpTransport for RouterTransport {
        async fn execute(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError> {
            let mut builder = Request::builder()
                .method(request.method)
                .uri(request.url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            let req = builder
                .body(Body::from(request.body.unwrap_or_default()))
                .map_err(|e| TransportError::Unreachable(e.to_string()))?;

            let resp = self
                .0
                .clone()
                .oneshot(req)
                .await
                .map_err(|e| TransportError::Unreachable(e.to_string()))?;
            let status = resp.status();
            let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
                .await
                .map_err(|e| TransportError::Body(e.to_string()))?;

            Ok(InboundResponse {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_owned(),
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    }

    fn dispatcher(token: Option<&str>) -> SecureDispatcher<RouterTransport> {
        let encryption = token.map(|t| {
            let public_key = WrappingKey::from(test_private_key().to_public_key());
            EncryptionContext::new(VersionToken::new(t), public_key).unwrap()
        });
        SecureDispatcher::new(
            RouterTransport(build(test_state())),
            SessionContext::new("trace-e2e", Some("SAV".into())),
            encryption,
        )
    }

    #[tokio::test]
    async fn sealed_round_trip_through_gateway() {
        for token in [
            "epsilon.alpha.tau.omega.sigma",
            "alpha.alpha.psi.lambda",
            "beta.gamma.phi.theta.tau",
            "gamma.delta.tau.omega.phi",
            "delta.epsilon.psi.omega.psi",
        ] {
            for framing in [Framing::HeaderFramed, Framing::Inline] {
                let request = SecureRequest::post("http://gateway.test/echo", json!({"a": 1}))
                    .framing(framing);
                let payload = dispatcher(Some(token)).dispatch(request).await.unwrap();
                assert_eq!(
                    payload,
                    ResponsePayload::Json(json!({"echo": {"a": 1}, "traceId": "trace-e2e"})),
                    "{token} / {framing:?}"
                );
            }
        }
    }

    #[tokio::test]
    async fn plain_round_trip_through_gateway() {
        let payload = dispatcher(None)
            .dispatch(SecureRequest::post("http://gateway.test/echo", json!({"b": [1, 2]})))
            .await
            .unwrap();
        assert_eq!(
            payload,
            ResponsePayload::Json(json!({"echo": {"b": [1, 2]}, "traceId": "trace-e2e"}))
        );
    }

    #[tokio::test]
    async fn gateway_rejection_is_network_failure() {
        let err = dispatcher(Some("epsilon.alpha.tau.omega.sigma"))
            .dispatch(SecureRequest::post("http://gateway.test/missing", json!({})))
            .await
            .unwrap_err();
        match err {
            sealed_client::DispatchError::Network(report) => {
                assert_eq!(report.status, 404);
                assert!(report.raw_body.contains("not_found"));
            }
            other => panic!("expected network failure, got {other:?}"),
        }
    }
}

//! The HTTP seam under the dispatcher.
//!
//! [`HttpTransport`] takes a fully built request and returns whatever the
//! server answered, success or not. Status interpretation stays in the
//! dispatcher so every transport behaves the same.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use thiserror::Error;

/// A request ready to go on the wire.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl OutboundRequest {
    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Whatever the server answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl InboundResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced an HTTP response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, TLS, DNS or URL failure.
    #[error("request failed: {0}")]
    Unreachable(String),

    /// The response arrived but its body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Executes one HTTP exchange.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError>;
}

/// Production transport backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, root certificates, pool limits).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<InboundResponse, TransportError> {
        let mut builder = self.client.request(request.method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(InboundResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let request = OutboundRequest {
            method: Method::POST,
            url: "http://localhost".into(),
            query: Vec::new(),
            headers: vec![("Content-Type".into(), "text/plain".into())],
            body: None,
        };
        assert_eq!(request.header("content-type"), Some("text/plain"));
        assert_eq!(request.header("x-iv"), None);
    }

    #[test]
    fn success_range() {
        let response = |status| InboundResponse {
            status,
            status_text: String::new(),
            body: String::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(302).is_success());
        assert!(!response(500).is_success());
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let transport = ReqwestTransport::new();
        let request = OutboundRequest {
            method: Method::GET,
            url: "http://127.0.0.1:1/".into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        };
        assert!(matches!(
            transport.execute(request).await,
            Err(TransportError::Unreachable(_))
        ));
    }
}

//! Per-request inputs: the session's ambient identifiers and the request builder.

use std::time::Duration;

use common::protocol::{DEFAULT_PRODUCT_CODE, PRODUCT_CODE_HEADER, TRACE_ID_HEADER};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// How a sealed request carries its key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Framing {
    /// Everything in a JSON envelope body (`{ev, pa, xe, xs, xtd, xpc, xl?}`).
    #[serde(rename = "inline")]
    Inline,
    /// Raw ciphertext as a `text/plain` body, key material in request headers.
    #[default]
    #[serde(rename = "header")]
    HeaderFramed,
}

/// Session-wide identifiers attached to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub trace_id: String,
    pub product_code: String,
}

impl SessionContext {
    /// Build a context; an empty or absent product code becomes `N/A`.
    pub fn new(trace_id: impl Into<String>, product_code: Option<String>) -> Self {
        let product_code = product_code
            .filter(|code| !code.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PRODUCT_CODE.to_owned());
        Self {
            trace_id: trace_id.into(),
            product_code,
        }
    }

    /// Build a context with a freshly generated trace id.
    pub fn generated(product_code: Option<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), product_code)
    }

    /// Headers every request starts from.
    pub fn base_headers(&self) -> Vec<(String, String)> {
        vec![
            (TRACE_ID_HEADER.to_owned(), self.trace_id.clone()),
            (PRODUCT_CODE_HEADER.to_owned(), self.product_code.clone()),
        ]
    }
}

/// One request to send through the dispatcher.
///
/// Built with chained setters:
///
/// ```ignore
/// let request = SecureRequest::post("https://api.example/submit", json!({"step": 2}))
///     .framing(Framing::Inline)
///     .deadline(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct SecureRequest {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<Value>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) framing: Framing,
    pub(crate) deadline: Option<Duration>,
    pub(crate) cancel: CancellationToken,
}

impl SecureRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
            framing: Framing::default(),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// `POST` with a JSON body.
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, url).body(body)
    }

    /// `GET` without a body.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Set the JSON body. Only requests with a body are sealed.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Add or override a header. Overrides win over the session's base headers.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Fail with `DeadlineElapsed` if no response arrives within `limit`.
    pub fn deadline(mut self, limit: Duration) -> Self {
        self.deadline = Some(limit);
        self
    }

    /// Abandon the request when `token` is cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Overlay `overrides` on `base`; header names compare case-insensitively and
/// the last value for a name wins.
pub(crate) fn merge_headers(
    base: Vec<(String, String)>,
    overrides: &[(String, String)],
) -> Vec<(String, String)> {
    let mut merged = base;
    for (name, value) in overrides {
        set_header(&mut merged, name, value);
    }
    merged
}

pub(crate) fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    headers.push((name.to_owned(), value.to_owned()));
}

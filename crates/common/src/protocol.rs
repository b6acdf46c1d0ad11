//! Wire formats exchanged between the sealed client and the server.
//!
//! Two request framings exist: an inline JSON envelope carrying every field
//! in the body, and a header-framed variant that sends the raw ciphertext as a
//! `text/plain` body with the key material in request headers. Sealed
//! responses always use the `iv::ciphertext::tag` text frame.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Header names
// ---------------------------------------------------------------------------

/// Trace identifier propagated on every request.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Product code of the form journey issuing the request.
pub const PRODUCT_CODE_HEADER: &str = "X-Product-Code";

/// Version token selecting the cipher suite (header-framed requests).
pub const VERSION_HEADER: &str = "e-version";

/// Base64 RSA-wrapped symmetric key (header-framed requests).
pub const WRAPPED_KEY_HEADER: &str = "x-encrypted";

/// Encoded initialisation vector (header-framed requests).
pub const IV_HEADER: &str = "x-iv";

/// Base64 authentication tag, authenticated modes only (header-framed requests).
pub const TAG_HEADER: &str = "x-tag";

/// Product code sent when the session has none.
pub const DEFAULT_PRODUCT_CODE: &str = "N/A";

// ---------------------------------------------------------------------------
// Inline envelope
// ---------------------------------------------------------------------------

/// Request body for the inline framing, sent as `application/json`.
///
/// Field names on the wire are deliberately short: `{ev, pa, xe, xs, xtd, xpc, xl?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineEnvelope {
    /// Version token the payload was sealed under.
    #[serde(rename = "ev")]
    pub version: String,
    /// Encoded ciphertext of the JSON request body.
    #[serde(rename = "pa")]
    pub payload: String,
    /// Base64 RSA-wrapped symmetric key.
    #[serde(rename = "xe")]
    pub wrapped_key: String,
    /// Encoded initialisation vector.
    #[serde(rename = "xs")]
    pub iv: String,
    /// Trace identifier of the session.
    #[serde(rename = "xtd")]
    pub trace_id: String,
    /// Product code of the session.
    #[serde(rename = "xpc")]
    pub product_code: String,
    /// Base64 authentication tag; present only for authenticated modes.
    #[serde(rename = "xl", default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

// ---------------------------------------------------------------------------
// Response frame
// ---------------------------------------------------------------------------

/// Separator between the segments of a sealed response body.
pub const FRAME_SEPARATOR: &str = "::";

/// Errors produced while splitting a sealed response body.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The body does not contain the `iv::ciphertext` segments.
    #[error("response frame has {0} segment(s); expected 2 or 3")]
    SegmentCount(usize),

    /// A mandatory segment is empty.
    #[error("response frame segment `{0}` is empty")]
    EmptySegment(&'static str),
}

/// A sealed response body: `<iv>::<ciphertext>[::<tag>]`, each segment text-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Encoded initialisation vector.
    pub iv: String,
    /// Encoded ciphertext.
    pub ciphertext: String,
    /// Encoded authentication tag, authenticated modes only.
    pub tag: Option<String>,
}

impl ResponseFrame {
    /// Split a response body into its frame segments.
    ///
    /// An empty trailing tag segment (`iv::ct::`) is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] if the body has fewer than two or more than three
    /// segments, or if the IV or ciphertext segment is empty.
    pub fn parse(body: &str) -> Result<Self, FrameError> {
        let parts: Vec<&str> = body.trim().split(FRAME_SEPARATOR).collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(FrameError::SegmentCount(parts.len()));
        }
        if parts[0].is_empty() {
            return Err(FrameError::EmptySegment("iv"));
        }
        if parts[1].is_empty() {
            return Err(FrameError::EmptySegment("ciphertext"));
        }
        let tag = parts
            .get(2)
            .filter(|t| !t.is_empty())
            .map(|t| (*t).to_owned());

        Ok(Self {
            iv: parts[0].to_owned(),
            ciphertext: parts[1].to_owned(),
            tag,
        })
    }
}

impl std::fmt::Display for ResponseFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{FRAME_SEPARATOR}{}", self.iv, self.ciphertext)?;
        if let Some(tag) = &self.tag {
            write!(f, "{FRAME_SEPARATOR}{tag}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Failure report
// ---------------------------------------------------------------------------

/// Structured description of a failed HTTP exchange, delivered to the caller's
/// failure path instead of an error being raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    /// HTTP status code, or `0` when the server was never reached.
    pub status: u16,
    /// Reason phrase, or the transport error description when unreachable.
    pub status_text: String,
    /// Response body exactly as received (empty when unreachable).
    pub raw_body: String,
}

impl FailureReport {
    /// Report for a request that never produced an HTTP response.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            status: 0,
            status_text: reason.into(),
            raw_body: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway bodies
// ---------------------------------------------------------------------------

/// Standard error response body returned by the gateway on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"bad_request"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Body returned (sealed or plain) by the gateway's `POST /echo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoResponse {
    /// The opened request body.
    pub echo: serde_json::Value,
    /// Trace identifier the request carried, if any.
    pub trace_id: Option<String>,
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: String,
    /// Gateway build version.
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_envelope_uses_short_wire_names() {
        let env = InlineEnvelope {
            version: "epsilon.alpha.tau.omega.sigma".into(),
            payload: "cGF5bG9hZA==".into(),
            wrapped_key: "a2V5".into(),
            iv: "aXY=".into(),
            trace_id: "trace-1".into(),
            product_code: "SAV".into(),
            tag: Some("dGFn".into()),
        };
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["ev"], "epsilon.alpha.tau.omega.sigma");
        assert_eq!(v["pa"], "cGF5bG9hZA==");
        assert_eq!(v["xe"], "a2V5");
        assert_eq!(v["xs"], "aXY=");
        assert_eq!(v["xtd"], "trace-1");
        assert_eq!(v["xpc"], "SAV");
        assert_eq!(v["xl"], "dGFn");
    }

    #[test]
    fn inline_envelope_omits_absent_tag() {
        let env = InlineEnvelope {
            version: "alpha.alpha.psi.lambda".into(),
            payload: "p".into(),
            wrapped_key: "k".into(),
            iv: "00".into(),
            trace_id: String::new(),
            product_code: DEFAULT_PRODUCT_CODE.into(),
            tag: None,
        };
        let json = serde_json::to_string(&env).unwrap();
        assert!(!json.contains("\"xl\""));
        let decoded: InlineEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.tag, None);
    }

    #[test]
    fn response_frame_with_tag() {
        let frame = ResponseFrame::parse("aXY=::Y3Q=::dGFn").unwrap();
        assert_eq!(frame.iv, "aXY=");
        assert_eq!(frame.ciphertext, "Y3Q=");
        assert_eq!(frame.tag.as_deref(), Some("dGFn"));
        assert_eq!(frame.to_string(), "aXY=::Y3Q=::dGFn");
    }

    #[test]
    fn response_frame_without_tag() {
        let frame = ResponseFrame::parse("00ff::Y3Q=").unwrap();
        assert_eq!(frame.tag, None);
        assert_eq!(frame.to_string(), "00ff::Y3Q=");
    }

    #[test]
    fn response_frame_empty_tag_is_absent() {
        let frame = ResponseFrame::parse("00ff::Y3Q=::").unwrap();
        assert_eq!(frame.tag, None);
    }

    #[test]
    fn response_frame_rejects_plain_json() {
        assert_eq!(
            ResponseFrame::parse(r#"{"error":"boom"}"#),
            Err(FrameError::SegmentCount(1))
        );
    }

    #[test]
    fn response_frame_rejects_extra_segments() {
        assert_eq!(
            ResponseFrame::parse("a::b::c::d"),
            Err(FrameError::SegmentCount(4))
        );
    }

    #[test]
    fn response_frame_rejects_empty_iv() {
        assert_eq!(
            ResponseFrame::parse("::Y3Q="),
            Err(FrameError::EmptySegment("iv"))
        );
    }

    #[test]
    fn failure_report_camel_case() {
        let report = FailureReport {
            status: 502,
            status_text: "Bad Gateway".into(),
            raw_body: "upstream down".into(),
        };
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["statusText"], "Bad Gateway");
        assert_eq!(v["rawBody"], "upstream down");
    }

    #[test]
    fn unreachable_report_has_zero_status() {
        let report = FailureReport::unreachable("connection refused");
        assert_eq!(report.status, 0);
        assert!(report.raw_body.is_empty());
    }
}

//! Opening sealed requests and sealing the matching responses.
//!
//! A request is recognised by shape:
//! - `e-version` header present: header framing, ciphertext is the body text;
//! - JSON body with an `ev` field: inline envelope;
//! - anything else: plain JSON.

use axum::http::HeaderMap;
use common::protocol::{
    InlineEnvelope, ResponseFrame, IV_HEADER, TAG_HEADER, TRACE_ID_HEADER, VERSION_HEADER,
    WRAPPED_KEY_HEADER,
};
use common::ServiceError;
use rsa::RsaPrivateKey;
use sealed_client::crypto::{
    payload, wrap, CipherConfiguration, CipherFrame, CryptoError, EncodedFrame, SymmetricKey,
    VersionToken, WrappedKey,
};
use serde::Serialize;
use serde_json::Value;

/// A request after opening.
#[derive(Debug)]
pub struct OpenedRequest {
    pub body: Value,
    pub trace_id: Option<String>,
    /// Present when the request was sealed; the reply must be sealed with it.
    pub seal: Option<ResponseSeal>,
}

/// The unwrapped session key and suite of a sealed request.
#[derive(Debug)]
pub struct ResponseSeal {
    config: CipherConfiguration,
    key: SymmetricKey,
}

impl ResponseSeal {
    /// Seal `value` as an `iv::ciphertext[::tag]` frame.
    pub fn seal<T: Serialize>(&self, value: &T) -> Result<String, ServiceError> {
        let plaintext =
            serde_json::to_vec(value).map_err(|e| ServiceError::Internal(e.to_string()))?;
        let frame = payload::encrypt(&self.config, &self.key, &plaintext)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        Ok(ResponseFrame::from(frame.encode(self.config.mode)).to_string())
    }
}

/// Open whatever framing `headers` and `body` carry.
///
/// # Errors
///
/// - [`ServiceError::BadRequest`] for missing headers, non-JSON bodies, or a
///   version token that does not resolve.
/// - [`ServiceError::EnvelopeRejected`] when unwrapping or decryption fails.
pub fn open_request(
    private_key: &RsaPrivateKey,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<OpenedRequest, ServiceError> {
    let header_trace = header(headers, TRACE_ID_HEADER)?;

    if let Some(token) = header(headers, VERSION_HEADER)? {
        let wrapped = required(headers, WRAPPED_KEY_HEADER)?;
        let ciphertext = std::str::from_utf8(body)
            .map_err(|_| ServiceError::BadRequest("sealed body is not text".into()))?;
        let encoded = EncodedFrame {
            ciphertext: ciphertext.trim().to_owned(),
            iv: required(headers, IV_HEADER)?,
            tag: header(headers, TAG_HEADER)?,
        };
        let (body, seal) = open_sealed(private_key, &token, &wrapped, &encoded)?;
        return Ok(OpenedRequest {
            body,
            trace_id: header_trace,
            seal: Some(seal),
        });
    }

    if body.is_empty() {
        return Ok(OpenedRequest {
            body: Value::Null,
            trace_id: header_trace,
            seal: None,
        });
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ServiceError::BadRequest(format!("body is not JSON: {e}")))?;
    if value.get("ev").is_none() {
        return Ok(OpenedRequest {
            body: value,
            trace_id: header_trace,
            seal: None,
        });
    }

    let envelope: InlineEnvelope = serde_json::from_value(value)
        .map_err(|e| ServiceError::BadRequest(format!("malformed envelope: {e}")))?;
    let encoded = EncodedFrame {
        ciphertext: envelope.payload,
        iv: envelope.iv,
        tag: envelope.tag,
    };
    let (body, seal) = open_sealed(private_key, &envelope.version, &envelope.wrapped_key, &encoded)?;
    let trace_id = Some(envelope.trace_id)
        .filter(|t| !t.is_empty())
        .or(header_trace);

    Ok(OpenedRequest {
        body,
        trace_id,
        seal: Some(seal),
    })
}

fn open_sealed(
    private_key: &RsaPrivateKey,
    token: &str,
    wrapped: &str,
    encoded: &EncodedFrame,
) -> Result<(Value, ResponseSeal), ServiceError> {
    let config = VersionToken::new(token).resolve().map_err(classify)?;
    let key = wrap::unwrap(private_key, &WrappedKey::from_encoded(wrapped), &config)
        .map_err(classify)?;
    let frame = CipherFrame::decode(encoded, config.mode).map_err(classify)?;
    let plaintext = payload::decrypt(&config, &key, &frame).map_err(classify)?;
    let body = serde_json::from_slice(&plaintext)
        .map_err(|e| ServiceError::EnvelopeRejected(format!("opened body is not JSON: {e}")))?;

    Ok((body, ResponseSeal { config, key }))
}

fn classify(err: CryptoError) -> ServiceError {
    match err {
        CryptoError::UnsupportedConfiguration(_) | CryptoError::UnsupportedPadding => {
            ServiceError::BadRequest(err.to_string())
        }
        other => ServiceError::EnvelopeRejected(other.to_string()),
    }
}

fn header(headers: &HeaderMap, name: &str) -> Result<Option<String>, ServiceError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map(|s| s.trim().to_owned())
                .map_err(|_| ServiceError::BadRequest(format!("{name} header contains non-ASCII characters")))
        })
        .transpose()
        .map(|v| v.filter(|s| !s.is_empty()))
}

fn required(headers: &HeaderMap, name: &str) -> Result<String, ServiceError> {
    header(headers, name)?.ok_or_else(|| ServiceError::BadRequest(format!("missing {name} header")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::state::test_private_key;
    use axum::http::HeaderValue;
    use sealed_client::crypto::WrappingKey;
    use serde_json::json;

    const TOKEN: &str = "epsilon.alpha.tau.omega.sigma";

    struct Sealed {
        wrapped: String,
        frame: EncodedFrame,
        config: CipherConfiguration,
        key: SymmetricKey,
    }

    fn seal(token: &str, value: &Value) -> Sealed {
        let config = VersionToken::new(token).resolve().unwrap();
        let key = SymmetricKey::generate(&config);
        let public_key = WrappingKey::from(test_private_key().to_public_key());
        let wrapped = wrap::wrap(&key, &public_key, &config).unwrap().into_string();
        let plaintext = serde_json::to_vec(value).unwrap();
        let frame = payload::encrypt(&config, &key, &plaintext)
            .unwrap()
            .encode(config.mode);
        Sealed {
            wrapped,
            frame,
            config,
            key,
        }
    }

    fn header_framed(token: &str, sealed: &Sealed) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(VERSION_HEADER, HeaderValue::from_str(token).unwrap());
        headers.insert(WRAPPED_KEY_HEADER, HeaderValue::from_str(&sealed.wrapped).unwrap());
        headers.insert(IV_HEADER, HeaderValue::from_str(&sealed.frame.iv).unwrap());
        if let Some(tag) = &sealed.frame.tag {
            headers.insert(TAG_HEADER, HeaderValue::from_str(tag).unwrap());
        }
        headers.insert(TRACE_ID_HEADER, HeaderValue::from_static("trace-h"));
        headers
    }

    fn envelope(token: &str, sealed: &Sealed) -> Vec<u8> {
        serde_json::to_vec(&InlineEnvelope {
            version: token.into(),
            payload: sealed.frame.ciphertext.clone(),
            wrapped_key: sealed.wrapped.clone(),
            iv: sealed.frame.iv.clone(),
            trace_id: "trace-i".into(),
            product_code: "N/A".into(),
            tag: sealed.frame.tag.clone(),
        })
        .unwrap()
    }

    #[test]
    fn plain_json_passes_through() {
        let mut headers = HeaderMap::new();
        headers.insert(TRACE_ID_HEADER, HeaderValue::from_static("trace-p"));
        let opened = open_request(test_private_key(), &headers, br#"{"a":1}"#).unwrap();
        assert_eq!(opened.body, json!({"a": 1}));
        assert_eq!(opened.trace_id.as_deref(), Some("trace-p"));
        assert!(opened.seal.is_none());
    }

    #[test]
    fn header_framed_request_opens() {
        let sealed = seal(TOKEN, &json!({"step": 1}));
        let headers = header_framed(TOKEN, &sealed);
        let opened = open_request(
            test_private_key(),
            &headers,
            sealed.frame.ciphertext.as_bytes(),
        )
        .unwrap();
        assert_eq!(opened.body, json!({"step": 1}));
        assert_eq!(opened.trace_id.as_deref(), Some("trace-h"));
        assert!(opened.seal.is_some());
    }

    #[test]
    fn inline_envelope_opens_for_block_mode() {
        let token = "alpha.delta.psi.lambda";
        let sealed = seal(token, &json!({"name": "Ada"}));
        let opened =
            open_request(test_private_key(), &HeaderMap::new(), &envelope(token, &sealed)).unwrap();
        assert_eq!(opened.body, json!({"name": "Ada"}));
        assert_eq!(opened.trace_id.as_deref(), Some("trace-i"));
    }

    #[test]
    fn reply_is_sealed_under_the_request_key() {
        let sealed = seal(TOKEN, &json!({}));
        let opened =
            open_request(test_private_key(), &HeaderMap::new(), &envelope(TOKEN, &sealed)).unwrap();
        let frame_text = opened.seal.unwrap().seal(&json!({"ok": true})).unwrap();

        let encoded = EncodedFrame::from(ResponseFrame::parse(&frame_text).unwrap());
        let frame = CipherFrame::decode(&encoded, sealed.config.mode).unwrap();
        let plaintext = payload::decrypt(&sealed.config, &sealed.key, &frame).unwrap();
        assert_eq!(plaintext, br#"{"ok":true}"#);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let mut sealed = seal(TOKEN, &json!({"a": 1}));
        sealed.frame.ciphertext = "AAAAAAAAAA==".into();
        let err = open_request(test_private_key(), &HeaderMap::new(), &envelope(TOKEN, &sealed))
            .unwrap_err();
        assert_eq!(err.http_status(), 422);
    }

    #[test]
    fn unknown_token_is_bad_request() {
        let sealed = seal(TOKEN, &json!({}));
        let headers = header_framed("bogus.alpha.tau", &sealed);
        let err = open_request(test_private_key(), &headers, sealed.frame.ciphertext.as_bytes())
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn missing_iv_header_is_bad_request() {
        let sealed = seal(TOKEN, &json!({}));
        let mut headers = header_framed(TOKEN, &sealed);
        headers.remove(IV_HEADER);
        let err = open_request(test_private_key(), &headers, sealed.frame.ciphertext.as_bytes())
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(ref m) if m.contains("x-iv")));
    }

    #[test]
    fn non_json_body_is_bad_request() {
        let err = open_request(test_private_key(), &HeaderMap::new(), b"hello").unwrap_err();
        assert_eq!(err.http_status(), 400);
    }
}

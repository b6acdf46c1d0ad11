//! [`SecureDispatcher`]: seals a request, sends it, and opens the response.
//!
//! ```text
//! BUILD -> WRAP_KEY -> ENCRYPT_BODY -> SEND -> AWAIT_RESPONSE -> DECRYPT_RESPONSE -> DELIVER
//! ```
//!
//! Any step may fail. Failures before SEND come back as
//! [`DispatchError::Seal`]; a non-2xx status or a transport failure as
//! [`DispatchError::Network`]. A 2xx response that cannot be opened is not a
//! failure: it is logged and delivered as [`ResponsePayload::Raw`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use common::protocol::{
    FailureReport, FrameError, InlineEnvelope, ResponseFrame, IV_HEADER, TAG_HEADER,
    VERSION_HEADER, WRAPPED_KEY_HEADER,
};
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info_span, warn, Instrument};

use super::request::{merge_headers, set_header, Framing, SecureRequest, SessionContext};
use super::transport::{HttpTransport, InboundResponse, OutboundRequest};
use crate::crypto::{
    payload, wrap, CipherConfiguration, CipherFrame, CryptoError, EncodedFrame,
    SessionKeyManager, SymmetricKey, VersionToken, WrappingKey,
};

const CONTENT_TYPE: &str = "Content-Type";
const JSON: &str = "application/json";
const TEXT: &str = "text/plain";

/// Steps of one dispatch, named in logs and in [`DispatchError::Seal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Build,
    WrapKey,
    EncryptBody,
    Send,
    AwaitResponse,
    DecryptResponse,
    Deliver,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Build => "build",
            Stage::WrapKey => "wrap_key",
            Stage::EncryptBody => "encrypt_body",
            Stage::Send => "send",
            Stage::AwaitResponse => "await_response",
            Stage::DecryptResponse => "decrypt_response",
            Stage::Deliver => "deliver",
        })
    }
}

/// What the caller receives on the success path.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// The response parsed (after opening, when sealed) as JSON.
    Json(Value),
    /// The body exactly as received; it could not be opened or parsed.
    Raw(String),
}

impl ResponsePayload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }
}

/// Errors a dispatch can end with.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The server answered non-2xx, or was never reached (status 0).
    #[error("request failed with status {}: {}", .0.status, .0.status_text)]
    Network(FailureReport),

    /// Sealing the request failed before anything was sent.
    #[error("sealing failed at {stage}: {source}")]
    Seal {
        stage: Stage,
        #[source]
        source: CryptoError,
    },

    /// The request body or envelope could not be serialised.
    #[error("failed to serialise request: {0}")]
    Serialize(#[from] serde_json::Error),

    /// No response within the request's deadline.
    #[error("no response within {0:?}")]
    DeadlineElapsed(Duration),

    /// The request's cancellation token fired.
    #[error("request cancelled")]
    Cancelled,
}

/// Everything needed to seal requests for one session.
#[derive(Debug, Clone)]
pub struct EncryptionContext {
    token: VersionToken,
    config: CipherConfiguration,
    keys: SessionKeyManager,
    public_key: WrappingKey,
}

impl EncryptionContext {
    /// Resolve `token` and generate the session key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnsupportedConfiguration`] if `token` does not resolve.
    pub fn new(token: VersionToken, public_key: WrappingKey) -> Result<Self, CryptoError> {
        let config = token.resolve()?;
        let keys = SessionKeyManager::new(&config);
        Ok(Self::from_parts(token, config, keys, public_key))
    }

    /// Assemble a context from an existing key manager.
    pub fn from_parts(
        token: VersionToken,
        config: CipherConfiguration,
        keys: SessionKeyManager,
        public_key: WrappingKey,
    ) -> Self {
        Self {
            token,
            config,
            keys,
            public_key,
        }
    }

    pub fn token(&self) -> &VersionToken {
        &self.token
    }

    pub fn config(&self) -> &CipherConfiguration {
        &self.config
    }

    /// The session key manager; call [`SessionKeyManager::rotate`] to re-key.
    pub fn keys(&self) -> &SessionKeyManager {
        &self.keys
    }
}

/// Sends JSON requests, sealed when an [`EncryptionContext`] is present.
pub struct SecureDispatcher<T> {
    transport: T,
    session: SessionContext,
    encryption: Option<EncryptionContext>,
}

impl<T: HttpTransport> SecureDispatcher<T> {
    /// `encryption: None` sends and receives plain JSON.
    pub fn new(transport: T, session: SessionContext, encryption: Option<EncryptionContext>) -> Self {
        Self {
            transport,
            session,
            encryption,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn encryption(&self) -> Option<&EncryptionContext> {
        self.encryption.as_ref()
    }

    /// Run one request through the full pipeline.
    ///
    /// # Errors
    ///
    /// See [`DispatchError`]. A successful response that cannot be opened is
    /// returned as `Ok(ResponsePayload::Raw(..))`, not as an error.
    pub async fn dispatch(&self, request: SecureRequest) -> Result<ResponsePayload, DispatchError> {
        let span = info_span!(
            "dispatch",
            method = %request.method,
            url = %request.url,
            trace_id = %self.session.trace_id,
            sealed = self.encryption.is_some(),
        );
        let cancel = request.cancel.clone();
        let deadline = request.deadline;

        let exchange = self.exchange(request);
        let bounded = async move {
            match deadline {
                Some(limit) => match tokio::time::timeout(limit, exchange).await {
                    Ok(result) => result,
                    Err(_) => Err(DispatchError::DeadlineElapsed(limit)),
                },
                None => exchange.await,
            }
        };

        async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(DispatchError::Cancelled),
                result = bounded => result,
            };
            if let Err(error) = &result {
                warn!(%error, "dispatch failed");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn exchange(&self, request: SecureRequest) -> Result<ResponsePayload, DispatchError> {
        // BUILD: the key snapshot taken here seals the request and opens the response.
        let headers = merge_headers(self.session.base_headers(), &request.headers);
        let sealing = self
            .encryption
            .as_ref()
            .map(|ctx| (ctx, ctx.keys.current()));
        debug!(stage = %Stage::Build, has_body = request.body.is_some(), "request built");

        // Only POST bodies are sealed; other methods travel plain.
        let outbound = match (&sealing, &request.body) {
            (Some((ctx, key)), Some(body)) if request.method == Method::POST => {
                self.seal(ctx, key, &request, body, headers)?
            }
            _ => plain(&request, headers)?,
        };

        debug!(stage = %Stage::Send, "sending request");
        let response = self.transport.execute(outbound).await.map_err(|e| {
            DispatchError::Network(FailureReport::unreachable(e.to_string()))
        })?;

        debug!(stage = %Stage::AwaitResponse, status = response.status, "response received");
        if !response.is_success() {
            return Err(DispatchError::Network(failure_report(response)));
        }

        let payload = match &sealing {
            Some((ctx, key)) => open_response(ctx, key, response.body),
            None => parse_plain(response.body),
        };
        debug!(stage = %Stage::Deliver, raw = matches!(payload, ResponsePayload::Raw(_)), "delivering");
        Ok(payload)
    }

    fn seal(
        &self,
        ctx: &EncryptionContext,
        key: &SymmetricKey,
        request: &SecureRequest,
        body: &Value,
        mut headers: Vec<(String, String)>,
    ) -> Result<OutboundRequest, DispatchError> {
        let plaintext = serde_json::to_vec(body)?;

        let wrapped = wrap::wrap(key, &ctx.public_key, &ctx.config).map_err(|source| {
            DispatchError::Seal {
                stage: Stage::WrapKey,
                source,
            }
        })?;
        let frame = payload::encrypt(&ctx.config, key, &plaintext)
            .map_err(|source| DispatchError::Seal {
                stage: Stage::EncryptBody,
                source,
            })?
            .encode(ctx.config.mode);

        let body = match request.framing {
            Framing::Inline => {
                let envelope = InlineEnvelope {
                    version: ctx.token.as_str().to_owned(),
                    payload: frame.ciphertext,
                    wrapped_key: wrapped.into_string(),
                    iv: frame.iv,
                    trace_id: self.session.trace_id.clone(),
                    product_code: self.session.product_code.clone(),
                    tag: frame.tag,
                };
                // Session headers travel inside the envelope as `xtd`/`xpc`.
                headers = vec![(CONTENT_TYPE.to_owned(), JSON.to_owned())];
                Bytes::from(serde_json::to_vec(&envelope)?)
            }
            Framing::HeaderFramed => {
                set_header(&mut headers, CONTENT_TYPE, TEXT);
                set_header(&mut headers, VERSION_HEADER, ctx.token.as_str());
                set_header(&mut headers, WRAPPED_KEY_HEADER, wrapped.as_str());
                set_header(&mut headers, IV_HEADER, &frame.iv);
                if let Some(tag) = &frame.tag {
                    set_header(&mut headers, TAG_HEADER, tag);
                }
                Bytes::from(frame.ciphertext)
            }
        };

        Ok(OutboundRequest {
            method: request.method.clone(),
            url: request.url.clone(),
            query: request.query.clone(),
            headers,
            body: Some(body),
        })
    }
}

fn plain(
    request: &SecureRequest,
    mut headers: Vec<(String, String)>,
) -> Result<OutboundRequest, DispatchError> {
    let body = match &request.body {
        Some(value) => {
            set_header(&mut headers, CONTENT_TYPE, JSON);
            Some(Bytes::from(serde_json::to_vec(value)?))
        }
        None => None,
    };
    Ok(OutboundRequest {
        method: request.method.clone(),
        url: request.url.clone(),
        query: request.query.clone(),
        headers,
        body,
    })
}

fn failure_report(response: InboundResponse) -> FailureReport {
    FailureReport {
        status: response.status,
        status_text: response.status_text,
        raw_body: response.body,
    }
}

#[derive(Debug, Error)]
enum OpenError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("opened body is not JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn open_response(ctx: &EncryptionContext, key: &Arc<SymmetricKey>, body: String) -> ResponsePayload {
    match open(&ctx.config, key, &body) {
        Ok(value) => ResponsePayload::Json(value),
        Err(error) => {
            warn!(stage = %Stage::DecryptResponse, %error, "response could not be opened, delivering raw body");
            ResponsePayload::Raw(body)
        }
    }
}

fn open(config: &CipherConfiguration, key: &SymmetricKey, body: &str) -> Result<Value, OpenError> {
    let encoded = EncodedFrame::from(ResponseFrame::parse(body)?);
    let frame = CipherFrame::decode(&encoded, config.mode)?;
    let plaintext = payload::decrypt(config, key, &frame)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

fn parse_plain(body: String) -> ResponsePayload {
    match serde_json::from_str(&body) {
        Ok(value) => ResponsePayload::Json(value),
        Err(error) => {
            warn!(%error, "response is not JSON, delivering raw body");
            ResponsePayload::Raw(body)
        }
    }
}

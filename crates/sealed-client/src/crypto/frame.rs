//! [`CipherFrame`]: the raw output of one seal, and its wire text encoding.
//!
//! Ciphertext and tag are standard base64. The IV is base64 for GCM and
//! lowercase hex for the other modes, which is what existing servers expect.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::protocol::ResponseFrame;

use super::error::CryptoError;
use super::suite::SymmetricMode;

/// Raw bytes produced by one encryption call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherFrame {
    /// Ciphertext, without the tag.
    pub ciphertext: Vec<u8>,
    /// Initialisation vector (12 bytes for GCM, 16 otherwise).
    pub iv: Vec<u8>,
    /// Authentication tag; `Some` only for authenticated modes.
    pub tag: Option<Vec<u8>>,
}

/// A [`CipherFrame`] with every component text-encoded for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Base64 ciphertext.
    pub ciphertext: String,
    /// Base64 (GCM) or hex (other modes) IV.
    pub iv: String,
    /// Base64 tag, authenticated modes only.
    pub tag: Option<String>,
}

impl CipherFrame {
    /// Text-encode each component for `mode`.
    pub fn encode(&self, mode: SymmetricMode) -> EncodedFrame {
        let iv = if mode.is_authenticated() {
            STANDARD.encode(&self.iv)
        } else {
            hex::encode(&self.iv)
        };
        EncodedFrame {
            ciphertext: STANDARD.encode(&self.ciphertext),
            iv,
            tag: self.tag.as_ref().map(|t| STANDARD.encode(t)),
        }
    }

    /// Decode text components produced by [`encode`](Self::encode) or by the server.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedFrame`] if any component is not valid
    /// base64/hex for `mode`.
    pub fn decode(encoded: &EncodedFrame, mode: SymmetricMode) -> Result<Self, CryptoError> {
        let ciphertext = decode_b64("ciphertext", &encoded.ciphertext)?;
        if !mode.is_authenticated() {
            let iv = hex::decode(encoded.iv.trim())
                .map_err(|e| CryptoError::MalformedFrame(format!("iv: {e}")))?;
            return Ok(Self {
                ciphertext,
                iv,
                tag: None,
            });
        }

        Ok(Self {
            ciphertext,
            iv: decode_b64("iv", &encoded.iv)?,
            tag: encoded
                .tag
                .as_deref()
                .map(|t| decode_b64("tag", t))
                .transpose()?,
        })
    }
}

fn decode_b64(what: &str, text: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| CryptoError::MalformedFrame(format!("{what}: {e}")))
}

impl From<ResponseFrame> for EncodedFrame {
    fn from(frame: ResponseFrame) -> Self {
        Self {
            ciphertext: frame.ciphertext,
            iv: frame.iv,
            tag: frame.tag,
        }
    }
}

impl From<EncodedFrame> for ResponseFrame {
    fn from(frame: EncodedFrame) -> Self {
        Self {
            iv: frame.iv,
            ciphertext: frame.ciphertext,
            tag: frame.tag,
        }
    }
}

//! Error taxonomy of the crypto layer.

use thiserror::Error;

/// Errors produced while resolving, wrapping, sealing or opening.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A version token segment does not resolve to a known option.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// Key wrapping was requested without a usable RSA padding scheme.
    #[error("unsupported RSA padding scheme")]
    UnsupportedPadding,

    /// RSA encryption of the symmetric key failed.
    #[error("key wrap failed: {0}")]
    WrapFailure(String),

    /// RSA decryption of a wrapped key failed.
    #[error("key unwrap failed: {0}")]
    UnwrapFailure(String),

    /// The GCM tag did not verify: wrong key, wrong IV, or tampered data.
    #[error("decryption failed: invalid tag or corrupted data")]
    AuthenticationFailure,

    /// Plaintext could not be padded, or decrypted data carries malformed padding.
    #[error("padding error: {0}")]
    PaddingError(&'static str),

    /// Key material does not match the configured key size.
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    /// The RSA public key could not be decoded.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// A frame component has the wrong length or encoding.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

//! Hybrid-encryption primitives: cipher-suite resolution, the session key,
//! RSA key wrapping, and AES payload sealing.
//!
//! This module is free of HTTP concerns. The dispatcher composes these pieces
//! per request.
//!
//! # Version token
//!
//! ```text
//! <mode>.<padding>.<keySize>[.<rsaPadding>[.<digest>]]
//! epsilon.alpha.tau.omega.sigma  =>  AES-128-GCM, PKCS7, RSA-OAEP, SHA-256
//! ```

pub mod error;
pub mod frame;
pub mod keys;
pub mod padding;
pub mod payload;
pub mod suite;
pub mod wrap;

pub use error::CryptoError;
pub use frame::{CipherFrame, EncodedFrame};
pub use keys::{SessionKeyManager, SymmetricKey};
pub use suite::{CipherConfiguration, VersionToken};
pub use wrap::{WrappedKey, WrappingKey};

//! Hybrid-encryption transport for JSON form submissions.
//!
//! A version token selects the cipher suite. One random AES key lives for the
//! session; every request body is sealed with it, the key itself travels
//! RSA-wrapped under the server's public key, and the server's sealed response
//! is opened with the same key.
//!
//! - [`crypto`]: suite resolution, session key, key wrapping, payload cipher.
//! - [`dispatch`]: the request pipeline and its HTTP seam.
//! - [`config`] and [`telemetry`]: process setup for the `sealed-post` binary.

pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod telemetry;

pub use config::ClientConfig;
pub use dispatch::{
    DispatchError, EncryptionContext, Framing, ResponsePayload, SecureDispatcher, SecureRequest,
    SessionContext,
};

//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use rsa::RsaPrivateKey;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// RSA key that unwraps the session keys of sealed requests.
    pub private_key: Arc<RsaPrivateKey>,
}

impl AppState {
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self {
            private_key: Arc::new(private_key),
        }
    }
}

/// RSA-2048 key shared by the gateway's tests; generated once per process.
#[cfg(test)]
pub(crate) fn test_private_key() -> &'static RsaPrivateKey {
    use std::sync::OnceLock;
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap())
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    AppState::new(test_private_key().clone())
}

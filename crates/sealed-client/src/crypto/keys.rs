//! The session's symmetric key and its owner, [`SessionKeyManager`].
//!
//! One key is generated before the first request and reused for every request
//! of the session. Rotation is explicit: [`SessionKeyManager::rotate`] swaps in
//! a fresh key; requests already in flight keep the snapshot they started with.

use std::sync::Arc;

use arc_swap::ArcSwap;
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

use super::error::CryptoError;
use super::suite::{CipherConfiguration, KeySize};

/// Raw AES key bytes. Zeroed on drop; never printed.
#[derive(Clone)]
pub struct SymmetricKey(Vec<u8>);

impl SymmetricKey {
    /// Generate a fresh random key sized for `config`.
    ///
    /// Draws from the OS CSPRNG. Entropy exhaustion is not recoverable and
    /// panics inside the RNG.
    pub fn generate(config: &CipherConfiguration) -> Self {
        Self::generate_sized(config.key_size)
    }

    fn generate_sized(size: KeySize) -> Self {
        let mut bytes = vec![0u8; size.bytes()];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Adopt existing key bytes, checking them against the configured size.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if `bytes` is not exactly
    /// `key_size / 8` long.
    pub fn from_bytes(bytes: Vec<u8>, size: KeySize) -> Result<Self, CryptoError> {
        if bytes.len() != size.bytes() {
            return Err(CryptoError::InvalidKeyLength {
                expected: size.bytes(),
                got: bytes.len(),
            });
        }
        Ok(Self(bytes))
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for generated keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material, not even in debug builds.
        write!(f, "SymmetricKey([REDACTED; {}])", self.0.len())
    }
}

/// Session-scoped owner of the symmetric key.
///
/// Cheap to clone; all clones share one key slot. Reads are lock-free
/// snapshots via [`ArcSwap`], and [`rotate`](Self::rotate) atomically replaces
/// the key without blocking readers.
#[derive(Clone, Debug)]
pub struct SessionKeyManager {
    size: KeySize,
    current: Arc<ArcSwap<SymmetricKey>>,
}

impl SessionKeyManager {
    /// Create a manager and generate the session's first key.
    pub fn new(config: &CipherConfiguration) -> Self {
        Self::with_key(config.key_size, SymmetricKey::generate(config))
    }

    /// Create a manager around an existing key.
    pub fn with_key(size: KeySize, key: SymmetricKey) -> Self {
        Self {
            size,
            current: Arc::new(ArcSwap::from_pointee(key)),
        }
    }

    /// Snapshot of the current key.
    ///
    /// Hold the snapshot for the whole request so the response is opened with
    /// the key that sealed the request.
    pub fn current(&self) -> Arc<SymmetricKey> {
        self.current.load_full()
    }

    /// Replace the session key with a freshly generated one.
    pub fn rotate(&self) {
        self.current
            .store(Arc::new(SymmetricKey::generate_sized(self.size)));
        tracing::info!(key_bits = self.size.bits(), "session key rotated");
    }

    /// Configured key size.
    pub fn key_size(&self) -> KeySize {
        self.size
    }
}

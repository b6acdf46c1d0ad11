//! RSA wrapping of the session key under the server's long-lived public key.
//!
//! The wrapped key is recomputed for every request: RSA padding is randomised,
//! so the same session key never produces the same envelope twice.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use md5::Md5;
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use super::error::CryptoError;
use super::keys::SymmetricKey;
use super::suite::{AsymmetricPadding, CipherConfiguration, DigestAlgorithm};

/// Digest used when the version token names none.
pub const DEFAULT_DIGEST: DigestAlgorithm = DigestAlgorithm::Sha256;

/// Salt length associated with the `theta` scheme. RSA encryption takes no
/// salt, so it only documents the scheme and is not fed to the padding.
pub const PSS_SALT_LEN: usize = 20;

/// Column width of the PEM body.
const PEM_WIDTH: usize = 64;

/// The server's RSA public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappingKey(RsaPublicKey);

impl WrappingKey {
    /// Decode a base64-delivered public key.
    ///
    /// The decoded bytes may be PEM text (indentation and line width are
    /// normalised) or raw DER `SubjectPublicKeyInfo`, which is reframed into a
    /// `PUBLIC KEY` PEM envelope before parsing.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPublicKey`] if the input is not base64 or
    /// does not hold an RSA public key.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let compact: String = encoded.split_whitespace().collect();
        let decoded = STANDARD
            .decode(compact)
            .map_err(|e| CryptoError::InvalidPublicKey(format!("base64: {e}")))?;

        match std::str::from_utf8(&decoded) {
            Ok(text) if text.contains("-----BEGIN ") => Self::from_pem(text),
            _ => Self::from_pem(&armor("PUBLIC KEY", &STANDARD.encode(&decoded))),
        }
    }

    /// Parse a PEM public key (`PUBLIC KEY` or PKCS#1 `RSA PUBLIC KEY`).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPublicKey`] on any framing or ASN.1 error.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let pem = reframe_pem(pem)?;
        let key = if pem.starts_with("-----BEGIN RSA PUBLIC KEY-----") {
            RsaPublicKey::from_pkcs1_pem(&pem).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?
        } else {
            RsaPublicKey::from_public_key_pem(&pem)
                .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?
        };
        Ok(Self(key))
    }

    /// Borrow the underlying RSA key.
    pub fn as_rsa(&self) -> &RsaPublicKey {
        &self.0
    }
}

impl From<RsaPublicKey> for WrappingKey {
    fn from(key: RsaPublicKey) -> Self {
        Self(key)
    }
}

/// Base64 text of an RSA-wrapped symmetric key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey(String);

impl WrappedKey {
    /// Adopt wrapped-key text received from the wire.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The base64 text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the base64 text.
    pub fn into_string(self) -> String {
        self.0
    }
}

/// Wrap `key` under `public_key` with the RSA padding named by `config`.
///
/// # Errors
///
/// - [`CryptoError::UnsupportedPadding`] if `config` requests no RSA padding.
/// - [`CryptoError::WrapFailure`] if RSA encryption fails (e.g. the modulus is
///   too small for the padding overhead).
pub fn wrap(
    key: &SymmetricKey,
    public_key: &WrappingKey,
    config: &CipherConfiguration,
) -> Result<WrappedKey, CryptoError> {
    let mut rng = OsRng;
    let ciphertext = match wrap_padding(config)? {
        WrapPadding::Oaep(padding) => public_key.0.encrypt(&mut rng, padding, key.as_bytes()),
        WrapPadding::Pkcs1v15 => public_key.0.encrypt(&mut rng, Pkcs1v15Encrypt, key.as_bytes()),
    }
    .map_err(|e| CryptoError::WrapFailure(e.to_string()))?;

    Ok(WrappedKey(STANDARD.encode(ciphertext)))
}

/// Recover the symmetric key from `wrapped` with the server's private key.
///
/// # Errors
///
/// - [`CryptoError::UnsupportedPadding`] if `config` requests no RSA padding.
/// - [`CryptoError::UnwrapFailure`] if the text is not base64 or RSA decryption fails.
/// - [`CryptoError::InvalidKeyLength`] if the recovered key does not match the
///   configured key size.
pub fn unwrap(
    private_key: &RsaPrivateKey,
    wrapped: &WrappedKey,
    config: &CipherConfiguration,
) -> Result<SymmetricKey, CryptoError> {
    let ciphertext = STANDARD
        .decode(wrapped.as_str().trim())
        .map_err(|e| CryptoError::UnwrapFailure(format!("base64: {e}")))?;

    let bytes = match wrap_padding(config)? {
        WrapPadding::Oaep(padding) => private_key.decrypt(padding, &ciphertext),
        WrapPadding::Pkcs1v15 => private_key.decrypt(Pkcs1v15Encrypt, &ciphertext),
    }
    .map_err(|e| CryptoError::UnwrapFailure(e.to_string()))?;

    SymmetricKey::from_bytes(bytes, config.key_size)
}

enum WrapPadding {
    Oaep(Oaep),
    Pkcs1v15,
}

fn wrap_padding(config: &CipherConfiguration) -> Result<WrapPadding, CryptoError> {
    let digest = config.digest.unwrap_or(DEFAULT_DIGEST);
    match config.asymmetric_padding {
        Some(AsymmetricPadding::Oaep) => Ok(WrapPadding::Oaep(oaep_hashed_by(digest))),
        Some(AsymmetricPadding::Pss) => Ok(WrapPadding::Oaep(oaep_masked_by(digest))),
        Some(AsymmetricPadding::Pkcs1v15) => Ok(WrapPadding::Pkcs1v15),
        None => Err(CryptoError::UnsupportedPadding),
    }
}

/// OAEP with `digest` as both the label hash and the MGF1 hash.
fn oaep_hashed_by(digest: DigestAlgorithm) -> Oaep {
    match digest {
        DigestAlgorithm::Sha256 => Oaep::new::<Sha256>(),
        DigestAlgorithm::Sha1 => Oaep::new::<Sha1>(),
        DigestAlgorithm::Sha512 => Oaep::new::<Sha512>(),
        DigestAlgorithm::Md5 => Oaep::new::<Md5>(),
    }
}

/// OAEP with a SHA-256 label hash and MGF1 keyed by `digest`.
fn oaep_masked_by(digest: DigestAlgorithm) -> Oaep {
    match digest {
        DigestAlgorithm::Sha256 => Oaep::new::<Sha256>(),
        DigestAlgorithm::Sha1 => Oaep::new_with_mgf_hash::<Sha256, Sha1>(),
        DigestAlgorithm::Sha512 => Oaep::new_with_mgf_hash::<Sha256, Sha512>(),
        DigestAlgorithm::Md5 => Oaep::new_with_mgf_hash::<Sha256, Md5>(),
    }
}

/// Rebuild a PEM document with a clean header, footer and 64-column body.
fn reframe_pem(text: &str) -> Result<String, CryptoError> {
    let mut label = None;
    let mut body = String::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(rest) = line.strip_prefix("-----BEGIN ") {
            label = rest.strip_suffix("-----").map(str::to_owned);
        } else if line.starts_with("-----END ") {
            break;
        } else if label.is_some() {
            body.push_str(line);
        }
    }
    let label =
        label.ok_or_else(|| CryptoError::InvalidPublicKey("missing PEM header".into()))?;
    Ok(armor(&label, &body))
}

fn armor(label: &str, body: &str) -> String {
    let mut pem = format!("-----BEGIN {label}-----\n");
    for chunk in body.as_bytes().chunks(PEM_WIDTH) {
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {label}-----\n"));
    pem
}

/// RSA-2048 key pair shared by the crate's tests; generated once per process.
#[cfg(test)]
pub(crate) fn test_private_key() -> &'static RsaPrivateKey {
    use std::sync::OnceLock;
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 2048).unwrap())
}

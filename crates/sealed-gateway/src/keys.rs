//! Loading the gateway's RSA private key.

use std::path::{Path, PathBuf};

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyLoadError {
    #[error("failed to read private key from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("private key is neither PKCS#8 nor PKCS#1 PEM: {0}")]
    Parse(String),
}

/// Read a PEM private key (`PRIVATE KEY` or `RSA PRIVATE KEY`) from `path`.
pub fn load_private_key(path: impl AsRef<Path>) -> Result<RsaPrivateKey, KeyLoadError> {
    let path = path.as_ref();
    let pem = std::fs::read_to_string(path).map_err(|source| KeyLoadError::Io {
        path: path.to_owned(),
        source,
    })?;
    parse_private_key(&pem)
}

pub fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, KeyLoadError> {
    RsaPrivateKey::from_pkcs8_pem(pem).or_else(|pkcs8_err| {
        RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|pkcs1_err| KeyLoadError::Parse(format!("{pkcs8_err}; {pkcs1_err}")))
    })
}

//! Configuration loading and validation for the sealed client.
//!
//! All values are read from environment variables. Validation runs before any
//! request is attempted, so a bad token or public key fails at startup rather
//! than on the first submit.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::crypto::{CipherConfiguration, SessionKeyManager, VersionToken, WrappingKey};
use crate::dispatch::{EncryptionContext, Framing, SessionContext};

/// Validated client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// URL requests are sent to. **Required.**
    pub endpoint_url: String,

    /// Version token selecting the cipher suite. Absent or empty disables
    /// encryption.
    #[serde(default)]
    pub e_version: Option<String>,

    /// Base64 of the server's RSA public key (PEM text or DER). Required when
    /// `e_version` is set.
    #[serde(default)]
    pub public_key_b64: Option<String>,

    /// Session trace id; generated when absent.
    #[serde(default)]
    pub trace_id: Option<String>,

    #[serde(default = "default_product_code")]
    pub product_code: String,

    /// `header` or `inline`.
    #[serde(default)]
    pub framing: Framing,

    /// Per-request deadline in seconds; `0` disables it.
    #[serde(default = "default_request_deadline")]
    pub request_deadline_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP collector endpoint; span export is off when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

fn default_product_code() -> String {
    common::protocol::DEFAULT_PRODUCT_CODE.into()
}
fn default_request_deadline() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl ClientConfig {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is absent, cannot be parsed, or
    /// the encryption settings do not resolve.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: ClientConfig = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    fn validate(&self) -> Result<()> {
        if self.endpoint_url.trim().is_empty() {
            anyhow::bail!("ENDPOINT_URL is required and must not be empty");
        }
        self.encryption_settings().map(|_| ())
    }

    /// The configured version token, if encryption is on.
    pub fn version_token(&self) -> Option<VersionToken> {
        self.e_version
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(VersionToken::new)
    }

    /// Build the session's encryption context; `None` when no token is set.
    ///
    /// Each call generates a fresh session key.
    ///
    /// # Errors
    ///
    /// Returns an error if the token does not resolve or the public key is
    /// missing or invalid.
    pub fn encryption(&self) -> Result<Option<EncryptionContext>> {
        Ok(self
            .encryption_settings()?
            .map(|(token, config, public_key)| {
                let keys = SessionKeyManager::new(&config);
                EncryptionContext::from_parts(token, config, keys, public_key)
            }))
    }

    /// Resolve the token and parse the public key. No key material is generated.
    fn encryption_settings(&self) -> Result<Option<(VersionToken, CipherConfiguration, WrappingKey)>> {
        let Some(token) = self.version_token() else {
            return Ok(None);
        };
        let config = token.resolve().context("E_VERSION is invalid")?;
        let encoded = self
            .public_key_b64
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .context("PUBLIC_KEY_B64 is required when E_VERSION is set")?;
        let public_key = WrappingKey::from_base64(encoded).context("PUBLIC_KEY_B64 is invalid")?;
        Ok(Some((token, config, public_key)))
    }

    pub fn session(&self) -> SessionContext {
        let product_code = Some(self.product_code.clone());
        match self.trace_id.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(trace_id) => SessionContext::new(trace_id, product_code),
            None => SessionContext::generated(product_code),
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        (self.request_deadline_secs > 0).then(|| Duration::from_secs(self.request_deadline_secs))
    }

    pub fn otlp_endpoint(&self) -> Option<&str> {
        self.otel_exporter_otlp_endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
    }
}
